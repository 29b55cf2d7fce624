//! Study analytics assembled from aggregate rows

use crate::db::analytics::{DailyAttempts, OverviewCounts, TopicAttempts};
use crate::services::adaptive::{accuracy, is_struggling, Proficiency};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use soun_common::db::StudyLevel;
use std::collections::{BTreeMap, HashMap, HashSet};

pub const DEFAULT_TIMELINE_DAYS: i64 = 30;
pub const MAX_TIMELINE_DAYS: i64 = 365;

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub courses: i64,
    pub documents: i64,
    pub completed_quizzes: i64,
    pub questions_answered: i64,
    pub correct_answers: i64,
    pub accuracy: f64,
    pub average_mastery: f64,
    pub flashcards_reviewed: i64,
    pub streak_days: u32,
}

pub fn overview(counts: OverviewCounts, activity: &[NaiveDate], today: NaiveDate) -> Overview {
    let accuracy = if counts.questions_answered > 0 {
        counts.correct_answers as f64 / counts.questions_answered as f64
    } else {
        0.0
    };

    Overview {
        courses: counts.courses,
        documents: counts.documents,
        completed_quizzes: counts.completed_quizzes,
        questions_answered: counts.questions_answered,
        correct_answers: counts.correct_answers,
        accuracy,
        average_mastery: counts.average_mastery.unwrap_or(0.0),
        flashcards_reviewed: counts.flashcards_reviewed,
        streak_days: current_streak(activity, today),
    }
}

/// Consecutive days of activity ending today or yesterday
///
/// A streak survives until the end of the day after the last activity.
pub fn current_streak(activity: &[NaiveDate], today: NaiveDate) -> u32 {
    let days: HashSet<NaiveDate> = activity.iter().copied().collect();

    let mut day = if days.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut streak = 0;
    while days.contains(&day) {
        streak += 1;
        day -= Duration::days(1);
    }
    streak
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TopicBreakdown {
    pub topic: String,
    pub attempts: i64,
    pub correct: i64,
    pub accuracy: f64,
    pub mastery: i32,
    pub proficiency: Proficiency,
    pub struggling: bool,
}

/// Merge quiz attempt counts with mastery rows, one entry per topic
///
/// Struggle is judged on the mastery row's counters, which include flashcard
/// reviews. Topics only seen in quizzes fall back to their quiz counts.
pub fn topic_breakdown(attempts: &[TopicAttempts], levels: &[StudyLevel]) -> Vec<TopicBreakdown> {
    let levels_by_topic: HashMap<&str, &StudyLevel> =
        levels.iter().map(|l| (l.topic.as_str(), l)).collect();
    let mut merged: BTreeMap<String, TopicBreakdown> = BTreeMap::new();

    for row in attempts {
        let level = levels_by_topic.get(row.topic.as_str());
        let mastery = level.map_or(0, |l| l.mastery_level);
        let struggling = match level {
            Some(l) => is_struggling(l.attempts, l.correct, l.mastery_level),
            None => is_struggling(row.attempts as i32, row.correct as i32, mastery),
        };

        merged.insert(
            row.topic.clone(),
            TopicBreakdown {
                topic: row.topic.clone(),
                attempts: row.attempts,
                correct: row.correct,
                accuracy: ratio(row.correct, row.attempts),
                mastery,
                proficiency: Proficiency::from_mastery(mastery),
                struggling,
            },
        );
    }

    for level in levels {
        merged.entry(level.topic.clone()).or_insert_with(|| TopicBreakdown {
            topic: level.topic.clone(),
            attempts: 0,
            correct: 0,
            accuracy: 0.0,
            mastery: level.mastery_level,
            proficiency: Proficiency::from_mastery(level.mastery_level),
            struggling: is_struggling(level.attempts, level.correct, level.mastery_level),
        });
    }

    merged.into_values().collect()
}

fn ratio(correct: i64, attempts: i64) -> f64 {
    accuracy(attempts.clamp(0, i32::MAX as i64) as i32, correct.clamp(0, i32::MAX as i64) as i32)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DailyProgress {
    pub date: NaiveDate,
    pub attempts: i64,
    pub correct: i64,
    pub accuracy: f64,
}

/// Clamp a requested timeline length into `1..=365`, defaulting to 30
pub fn timeline_days(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_TIMELINE_DAYS)
        .clamp(1, MAX_TIMELINE_DAYS)
}

/// One entry per day for the `days` days ending today, oldest first
pub fn fill_timeline(rows: &[DailyAttempts], days: i64, today: NaiveDate) -> Vec<DailyProgress> {
    let by_day: HashMap<NaiveDate, &DailyAttempts> = rows.iter().map(|r| (r.day, r)).collect();

    (0..days)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            match by_day.get(&date) {
                Some(row) => DailyProgress {
                    date,
                    attempts: row.attempts,
                    correct: row.correct,
                    accuracy: ratio(row.correct, row.attempts),
                },
                None => DailyProgress {
                    date,
                    attempts: 0,
                    correct: 0,
                    accuracy: 0.0,
                },
            }
        })
        .collect()
}
