//! Mastery arithmetic and adaptive learning rules
//!
//! Mastery is an integer in `0..=100` per user, course and topic. Quiz answers
//! move it by +10 / -5 and flashcard reviews by +2 / -1. Everything else here
//! (levels, difficulty, struggle, recommendations, learning paths) is a fixed
//! threshold over those counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use soun_common::db::StudyLevel;
use std::collections::HashSet;

pub const MASTERY_MIN: i32 = 0;
pub const MASTERY_MAX: i32 = 100;

/// Days without study before a review reminder is recommended
pub const REVIEW_AFTER_DAYS: i64 = 7;

/// An event that moves mastery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudyActivity {
    QuizAnswer { correct: bool },
    FlashcardReview { knew: bool },
}

impl StudyActivity {
    pub fn mastery_delta(self) -> i32 {
        match self {
            StudyActivity::QuizAnswer { correct: true } => 10,
            StudyActivity::QuizAnswer { correct: false } => -5,
            StudyActivity::FlashcardReview { knew: true } => 2,
            StudyActivity::FlashcardReview { knew: false } => -1,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(
            self,
            StudyActivity::QuizAnswer { correct: true } | StudyActivity::FlashcardReview { knew: true }
        )
    }
}

/// Apply a delta, clamped into `0..=100`
pub fn apply_delta(mastery: i32, delta: i32) -> i32 {
    mastery.saturating_add(delta).clamp(MASTERY_MIN, MASTERY_MAX)
}

/// Named band for a mastery value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Proficiency {
    Novice,
    Developing,
    Proficient,
    Mastered,
}

impl Proficiency {
    pub fn from_mastery(mastery: i32) -> Self {
        match mastery {
            m if m < 25 => Proficiency::Novice,
            m if m < 50 => Proficiency::Developing,
            m if m < 80 => Proficiency::Proficient,
            _ => Proficiency::Mastered,
        }
    }
}

/// Question difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Difficulty matched to current mastery
    pub fn for_mastery(mastery: i32) -> Self {
        match mastery {
            m if m < 40 => Difficulty::Easy,
            m if m < 75 => Difficulty::Medium,
            _ => Difficulty::Hard,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

/// Fraction of attempts answered correctly (0.0 with no attempts)
pub fn accuracy(attempts: i32, correct: i32) -> f64 {
    if attempts <= 0 {
        0.0
    } else {
        f64::from(correct.min(attempts)) / f64::from(attempts)
    }
}

/// A topic is struggling after enough attempts with low accuracy or low mastery
pub fn is_struggling(attempts: i32, correct: i32, mastery: i32) -> bool {
    (attempts >= 3 && accuracy(attempts, correct) < 0.5) || (attempts >= 5 && mastery < 30)
}

pub fn level_is_struggling(level: &StudyLevel) -> bool {
    is_struggling(level.attempts, level.correct, level.mastery_level)
}

/// Whole days since `last`, never negative
pub fn days_since(last: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - last).num_days().max(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Remediate,
    Review,
    Practice,
    Advance,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub course_id: uuid::Uuid,
    pub topic: String,
    pub kind: RecommendationKind,
    pub message: String,
    pub proficiency: Proficiency,
    pub mastery: i32,
}

/// Recommendations for one topic
///
/// A struggling topic gets a remediation entry, a stale topic gets a review
/// reminder, and every topic gets the next step for its proficiency band.
pub fn recommend_for(level: &StudyLevel, now: DateTime<Utc>) -> Vec<Recommendation> {
    let proficiency = Proficiency::from_mastery(level.mastery_level);
    let topic = level.topic.as_str();
    let make = |kind, message: String| Recommendation {
        course_id: level.course_id,
        topic: topic.to_string(),
        kind,
        message,
        proficiency,
        mastery: level.mastery_level,
    };

    let mut out = Vec::new();

    if level_is_struggling(level) {
        out.push(make(
            RecommendationKind::Remediate,
            format!(
                "You're finding {} difficult. Revisit your notes and retry easy questions before moving on.",
                topic
            ),
        ));
    }

    let idle_days = days_since(level.last_studied_at, now);
    if idle_days >= REVIEW_AFTER_DAYS {
        out.push(make(
            RecommendationKind::Review,
            format!(
                "It has been {} days since you studied {}. A short review will keep it fresh.",
                idle_days, topic
            ),
        ));
    }

    let next_step = match proficiency {
        Proficiency::Novice => make(
            RecommendationKind::Practice,
            format!("Start with flashcards on {} to build the core vocabulary.", topic),
        ),
        Proficiency::Developing => make(
            RecommendationKind::Practice,
            format!("Take a medium quiz on {} to reinforce what you know.", topic),
        ),
        Proficiency::Proficient => make(
            RecommendationKind::Practice,
            format!("Challenge yourself with hard questions on {}.", topic),
        ),
        Proficiency::Mastered => make(
            RecommendationKind::Advance,
            format!("You've mastered {}. Explain it in your own words or move to a new topic.", topic),
        ),
    };
    out.push(next_step);

    out
}

/// Recommendations across topics, most urgent kinds first then weakest mastery
pub fn recommend(levels: &[StudyLevel], now: DateTime<Utc>, limit: usize) -> Vec<Recommendation> {
    let mut all: Vec<Recommendation> = levels.iter().flat_map(|l| recommend_for(l, now)).collect();
    all.sort_by(|a, b| a.kind.cmp(&b.kind).then(a.mastery.cmp(&b.mastery)));
    all.truncate(limit);
    all
}

#[derive(Debug, Clone, Serialize)]
pub struct LearningPathStep {
    pub position: usize,
    pub topic: String,
    pub mastery: i32,
    pub proficiency: Proficiency,
    pub studied: bool,
    pub struggling: bool,
    pub recommended_difficulty: Difficulty,
    pub action: String,
}

fn action_for(proficiency: Proficiency, struggling: bool, studied: bool) -> &'static str {
    if !studied {
        return "Start with an introductory flashcard session";
    }
    if struggling {
        return "Review fundamentals, then retry easy questions";
    }
    match proficiency {
        Proficiency::Novice => "Build foundations with flashcards",
        Proficiency::Developing => "Practice with quizzes",
        Proficiency::Proficient => "Take harder quizzes",
        Proficiency::Mastered => "Maintain with occasional review",
    }
}

/// Learning path for a course
///
/// Studied topics weakest first, then topics found in course documents that
/// have never been studied.
pub fn learning_path(levels: &[StudyLevel], document_topics: &[String]) -> Vec<LearningPathStep> {
    let mut studied: Vec<&StudyLevel> = levels.iter().collect();
    studied.sort_by(|a, b| {
        a.mastery_level
            .cmp(&b.mastery_level)
            .then_with(|| a.last_studied_at.cmp(&b.last_studied_at))
    });

    let mut seen: HashSet<String> = HashSet::new();
    let mut steps = Vec::new();

    for level in studied {
        if !seen.insert(level.topic.to_lowercase()) {
            continue;
        }
        let proficiency = Proficiency::from_mastery(level.mastery_level);
        let struggling = level_is_struggling(level);
        steps.push(LearningPathStep {
            position: steps.len() + 1,
            topic: level.topic.clone(),
            mastery: level.mastery_level,
            proficiency,
            studied: true,
            struggling,
            recommended_difficulty: Difficulty::for_mastery(level.mastery_level),
            action: action_for(proficiency, struggling, true).to_string(),
        });
    }

    for topic in document_topics {
        if !seen.insert(topic.to_lowercase()) {
            continue;
        }
        steps.push(LearningPathStep {
            position: steps.len() + 1,
            topic: topic.clone(),
            mastery: 0,
            proficiency: Proficiency::Novice,
            studied: false,
            struggling: false,
            recommended_difficulty: Difficulty::Easy,
            action: action_for(Proficiency::Novice, false, false).to_string(),
        });
    }

    steps
}
