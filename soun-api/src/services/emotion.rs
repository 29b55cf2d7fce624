//! Heuristic emotion tags for learner utterances

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Confused,
    Frustrated,
    Anxious,
    Curious,
    Confident,
}

impl Emotion {
    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Confused => "confused",
            Emotion::Frustrated => "frustrated",
            Emotion::Anxious => "anxious",
            Emotion::Curious => "curious",
            Emotion::Confident => "confident",
        }
    }

    fn tone(self) -> &'static str {
        match self {
            Emotion::Confused => {
                "The student is confused. Break the idea into small steps and use a concrete example."
            }
            Emotion::Frustrated => {
                "The student is frustrated. Be patient and encouraging, and keep the answer short."
            }
            Emotion::Anxious => {
                "The student is anxious. Be calm and reassuring, and focus on what matters most."
            }
            Emotion::Curious => {
                "The student is curious. Add an interesting connection or a follow-up idea."
            }
            Emotion::Confident => {
                "The student is confident. Be concise and offer a slightly harder follow-up question."
            }
        }
    }
}

static PATTERNS: Lazy<Vec<(Emotion, Regex)>> = Lazy::new(|| {
    [
        (
            Emotion::Confused,
            r"(?i)\b(confus\w*|don'?t (?:get|understand)|doesn'?t make sense|makes? no sense|lost|unclear|what do you mean)\b",
        ),
        (
            Emotion::Frustrated,
            r"(?i)\b(frustrat\w*|annoy\w*|ugh+|give up|giving up|stuck|sick of|tired of|hate this)\b",
        ),
        (
            Emotion::Anxious,
            r"(?i)\b(anxious|nervous|worried|worry|stress\w*|panic\w*|scared|afraid|exam (?:is )?tomorrow|running out of time)\b",
        ),
        (
            Emotion::Curious,
            r"(?i)\b(curious|wonder\w*|interesting|why (?:does|do|is|are)|what if|how come|tell me more)\b",
        ),
        (
            Emotion::Confident,
            r"(?i)\b(i (?:get|understand) it|got it|makes sense now|confident|i know this|nailed it|easy)\b",
        ),
    ]
    .into_iter()
    .map(|(emotion, pattern)| (emotion, Regex::new(pattern).unwrap()))
    .collect()
});

/// Emotion tags present in `text`, in a fixed order
pub fn detect_emotions(text: &str) -> Vec<Emotion> {
    PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(emotion, _)| *emotion)
        .collect()
}

/// Tone guidance appended to the tutor's system prompt
pub fn tone_instruction(emotions: &[Emotion]) -> Option<String> {
    if emotions.is_empty() {
        return None;
    }

    Some(
        emotions
            .iter()
            .map(|e| e.tone())
            .collect::<Vec<_>>()
            .join(" "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_single_emotions() {
        assert_eq!(detect_emotions("I'm so confused about vectors"), vec![Emotion::Confused]);
        assert_eq!(detect_emotions("ugh I keep getting this wrong"), vec![Emotion::Frustrated]);
        assert_eq!(detect_emotions("my exam is tomorrow"), vec![Emotion::Anxious]);
        assert_eq!(detect_emotions("I wonder why leaves change color"), vec![Emotion::Curious]);
        assert_eq!(detect_emotions("ok got it, next one"), vec![Emotion::Confident]);
    }

    #[test]
    fn test_multiple_emotions_in_fixed_order() {
        let emotions = detect_emotions("I'm stressed and I don't understand recursion");
        assert_eq!(emotions, vec![Emotion::Confused, Emotion::Anxious]);
    }

    #[test]
    fn test_neutral_text() {
        assert!(detect_emotions("Summarize chapter three").is_empty());
        assert_eq!(tone_instruction(&[]), None);
    }

    #[test]
    fn test_tone_instruction_combines() {
        let tone = tone_instruction(&[Emotion::Confused, Emotion::Curious]).unwrap();
        assert!(tone.contains("small steps"));
        assert!(tone.contains("follow-up idea"));
    }

    #[test]
    fn test_serializes_lowercase() {
        let json = serde_json::to_string(&vec![Emotion::Anxious]).unwrap();
        assert_eq!(json, r#"["anxious"]"#);
    }
}
