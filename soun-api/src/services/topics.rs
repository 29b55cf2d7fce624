//! Topic extraction from free text
//!
//! Candidates come from three sources, in priority order:
//! 1. Question patterns ("what is X", "explain X", "how does X work", "define X")
//! 2. Capitalised multi-word phrases
//! 3. Frequent non-stopword terms of four or more characters
//!
//! Output is de-duplicated case-insensitively and capped at `k`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

static QUESTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?im)\bwhat\s+(?:is|are|was|were)\s+([a-z][\w\s'-]{2,60}?)\s*(?:[?.!,;]|$)",
        r"(?im)\bexplain\s+(?:to\s+me\s+)?([a-z][\w\s'-]{2,60}?)\s*(?:[?.!,;]|$)",
        r"(?im)\bhow\s+(?:does|do|did)\s+([a-z][\w\s'-]{2,60}?)\s+work",
        r"(?im)\bdefine\s+([a-z][\w\s'-]{2,60}?)\s*(?:[?.!,;]|$)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static CAPITALISED_PHRASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z][a-z]+(?:\s+(?:of\s+)?[A-Z][a-z]+)+)\b").unwrap());

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z][A-Za-z'-]*").unwrap());

const MIN_TERM_LEN: usize = 4;

/// Frequency candidates must appear at least this often
const MIN_TERM_COUNT: usize = 2;

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "also", "an", "and", "any", "are",
        "because", "been", "before", "being", "below", "between", "both", "but", "by", "can",
        "could", "did", "does", "doing", "down", "during", "each", "even", "every", "explain",
        "define", "from", "further", "have", "having", "here", "how", "into", "just", "know",
        "like", "made", "make", "many", "more", "most", "much", "must", "need", "only", "other",
        "over", "please", "same", "should", "some", "such", "tell", "than", "that", "their",
        "them", "then", "there", "these", "they", "thing", "things", "this", "those", "through",
        "under", "until", "very", "want", "were", "what", "when", "where", "which", "while",
        "who", "whom", "why", "will", "with", "work", "works", "would", "your", "yours", "the",
        "is", "it", "its", "of", "on", "or", "to", "in", "for", "as", "at", "be", "was", "i",
        "me", "my", "we", "our", "you", "do", "so", "if", "not", "no", "yes", "used", "using",
        "use", "well", "really", "still", "think", "understand", "mean", "means",
    ]
    .into_iter()
    .collect()
});

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(word.to_lowercase().as_str())
}

/// Distinct lowercase content words (four or more characters, no stopwords)
pub fn content_terms(text: &str) -> HashSet<String> {
    WORD.find_iter(text)
        .map(|m| m.as_str().trim_matches(|c| c == '\'' || c == '-').to_lowercase())
        .filter(|w| w.chars().count() >= MIN_TERM_LEN && !is_stopword(w))
        .collect()
}

/// Trim punctuation, collapse whitespace and drop leading articles/stopwords
pub fn normalize_topic(raw: &str) -> Option<String> {
    let words: Vec<&str> = raw
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '-'))
        .filter(|w| !w.is_empty())
        .collect();

    let start = words.iter().position(|w| !is_stopword(w))?;
    let end = words.iter().rposition(|w| !is_stopword(w))?;

    let topic = words[start..=end].join(" ");
    if topic.chars().count() < 3 {
        None
    } else {
        Some(topic)
    }
}

fn pattern_topics(text: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();

    for pattern in QUESTION_PATTERNS.iter() {
        for caps in pattern.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                if let Some(topic) = normalize_topic(m.as_str()) {
                    found.push((m.start(), topic));
                }
            }
        }
    }

    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, t)| t).collect()
}

fn capitalised_phrases(text: &str) -> Vec<String> {
    CAPITALISED_PHRASE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| normalize_topic(m.as_str()))
        .filter(|t| t.contains(' '))
        .collect()
}

fn frequent_terms(text: &str) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();

    for (index, m) in WORD.find_iter(text).enumerate() {
        let word = m.as_str().trim_matches(|c| c == '\'' || c == '-').to_lowercase();
        if word.chars().count() < MIN_TERM_LEN || is_stopword(&word) {
            continue;
        }
        let entry = counts.entry(word).or_insert((0, index));
        entry.0 += 1;
    }

    let mut terms: Vec<(String, usize, usize)> = counts
        .into_iter()
        .filter(|(_, (count, _))| *count >= MIN_TERM_COUNT)
        .map(|(word, (count, first))| (word, count, first))
        .collect();

    // Highest count first, earliest occurrence breaks ties
    terms.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    terms.into_iter().map(|(word, _, _)| word).collect()
}

/// Extract up to `k` topics from `text`
pub fn extract_topics(text: &str, k: usize) -> Vec<String> {
    if k == 0 || text.trim().is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut topics = Vec::with_capacity(k);

    let candidates = pattern_topics(text)
        .into_iter()
        .chain(capitalised_phrases(text))
        .chain(frequent_terms(text));

    for candidate in candidates {
        if seen.insert(candidate.to_lowercase()) {
            topics.push(candidate);
            if topics.len() == k {
                break;
            }
        }
    }

    topics
}
