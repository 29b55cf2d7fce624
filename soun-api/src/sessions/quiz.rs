//! Quiz session state machine
//!
//! ```text
//! IN_PROGRESS --(last answer)--> COMPLETED
//!      |
//!      +--(abandon / stale)----> ABANDONED
//! ```
//!
//! Sessions are rows in `quiz_sessions`. The functions here decide whether an
//! answer is acceptable and what the row should become; `db::quizzes` applies
//! the change guarded on `current_index`.

use serde::Serialize;
use soun_common::db::QuizSessionRow;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuizState {
    InProgress,
    Completed,
    Abandoned,
}

impl QuizState {
    pub fn as_str(self) -> &'static str {
        match self {
            QuizState::InProgress => "IN_PROGRESS",
            QuizState::Completed => "COMPLETED",
            QuizState::Abandoned => "ABANDONED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "IN_PROGRESS" => Some(QuizState::InProgress),
            "COMPLETED" => Some(QuizState::Completed),
            "ABANDONED" => Some(QuizState::Abandoned),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, QuizState::InProgress)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizSessionError {
    #[error("Quiz session is {0:?}")]
    NotInProgress(QuizState),

    #[error("Expected an answer to question {expected}, got {got}")]
    OutOfOrder { expected: Uuid, got: Uuid },

    #[error("Quiz session has invalid state: {0}")]
    Corrupt(String),
}

/// What the session row becomes after an accepted answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerTransition {
    /// Index that was answered (guard for the conditional update)
    pub answered_index: i32,
    pub next_index: i32,
    pub correct_count: i32,
    pub answered_count: i32,
    pub next_state: QuizState,
}

pub fn session_state(row: &QuizSessionRow) -> Result<QuizState, QuizSessionError> {
    QuizState::parse(&row.state).ok_or_else(|| QuizSessionError::Corrupt(row.state.clone()))
}

/// Question currently awaiting an answer, if the session is still running
pub fn current_question(row: &QuizSessionRow) -> Option<Uuid> {
    match session_state(row) {
        Ok(QuizState::InProgress) => usize::try_from(row.current_index)
            .ok()
            .and_then(|i| row.question_ids.0.get(i).copied()),
        _ => None,
    }
}

/// Validate an answer against the session and compute the resulting row
pub fn plan_answer(
    row: &QuizSessionRow,
    question_id: Uuid,
    correct: bool,
) -> Result<AnswerTransition, QuizSessionError> {
    let state = session_state(row)?;
    if state.is_terminal() {
        return Err(QuizSessionError::NotInProgress(state));
    }

    let expected = current_question(row).ok_or_else(|| {
        QuizSessionError::Corrupt(format!(
            "current_index {} outside {} questions",
            row.current_index,
            row.question_ids.0.len()
        ))
    })?;

    if expected != question_id {
        return Err(QuizSessionError::OutOfOrder {
            expected,
            got: question_id,
        });
    }

    let next_index = row.current_index + 1;
    let total = row.question_ids.0.len() as i32;

    Ok(AnswerTransition {
        answered_index: row.current_index,
        next_index,
        correct_count: row.correct_count + i32::from(correct),
        answered_count: row.answered_count + 1,
        next_state: if next_index >= total {
            QuizState::Completed
        } else {
            QuizState::InProgress
        },
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizSummary {
    pub session_id: Uuid,
    pub state: QuizState,
    pub total_questions: usize,
    pub answered: i32,
    pub correct: i32,
    pub accuracy: f64,
    pub duration_seconds: i64,
}

pub fn summarize(row: &QuizSessionRow) -> QuizSummary {
    let accuracy = if row.answered_count > 0 {
        f64::from(row.correct_count) / f64::from(row.answered_count)
    } else {
        0.0
    };
    let ended = row.ended_at.unwrap_or_else(chrono::Utc::now);

    QuizSummary {
        session_id: row.id,
        state: session_state(row).unwrap_or(QuizState::Abandoned),
        total_questions: row.question_ids.0.len(),
        answered: row.answered_count,
        correct: row.correct_count,
        accuracy,
        duration_seconds: (ended - row.started_at).num_seconds().max(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::types::Json;

    fn session(question_ids: Vec<Uuid>, current_index: i32, state: QuizState) -> QuizSessionRow {
        QuizSessionRow {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            course_id: Uuid::nil(),
            topic: None,
            state: state.as_str().to_string(),
            question_ids: Json(question_ids),
            current_index,
            correct_count: 0,
            answered_count: current_index,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    #[test]
    fn test_state_round_trip_names() {
        for state in [QuizState::InProgress, QuizState::Completed, QuizState::Abandoned] {
            assert_eq!(QuizState::parse(state.as_str()), Some(state));
        }
        assert_eq!(QuizState::parse("in_progress"), None);
    }

    #[test]
    fn test_answer_advances() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let row = session(ids.clone(), 0, QuizState::InProgress);

        let t = plan_answer(&row, ids[0], true).unwrap();
        assert_eq!(t.answered_index, 0);
        assert_eq!(t.next_index, 1);
        assert_eq!(t.correct_count, 1);
        assert_eq!(t.answered_count, 1);
        assert_eq!(t.next_state, QuizState::InProgress);
    }

    #[test]
    fn test_last_answer_completes() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let row = session(ids.clone(), 1, QuizState::InProgress);

        let t = plan_answer(&row, ids[1], false).unwrap();
        assert_eq!(t.next_state, QuizState::Completed);
        assert_eq!(t.correct_count, 0);
    }

    #[test]
    fn test_out_of_order_answer_rejected() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let row = session(ids.clone(), 0, QuizState::InProgress);

        assert_eq!(
            plan_answer(&row, ids[1], true),
            Err(QuizSessionError::OutOfOrder {
                expected: ids[0],
                got: ids[1]
            })
        );
    }

    #[test]
    fn test_terminal_session_rejects_answers() {
        let ids = vec![Uuid::new_v4()];
        let row = session(ids.clone(), 0, QuizState::Abandoned);

        assert_eq!(
            plan_answer(&row, ids[0], true),
            Err(QuizSessionError::NotInProgress(QuizState::Abandoned))
        );
        assert_eq!(current_question(&row), None);
    }

    #[test]
    fn test_corrupt_state_detected() {
        let ids = vec![Uuid::new_v4()];
        let mut row = session(ids.clone(), 0, QuizState::InProgress);
        row.state = "PAUSED".to_string();
        assert!(matches!(plan_answer(&row, ids[0], true), Err(QuizSessionError::Corrupt(_))));

        let row = session(ids.clone(), 5, QuizState::InProgress);
        assert!(matches!(plan_answer(&row, ids[0], true), Err(QuizSessionError::Corrupt(_))));
    }

    #[test]
    fn test_summary_accuracy() {
        let mut row = session(vec![Uuid::new_v4(); 4], 4, QuizState::Completed);
        row.correct_count = 3;
        row.ended_at = Some(row.started_at + chrono::Duration::seconds(90));

        let summary = summarize(&row);
        assert_eq!(summary.total_questions, 4);
        assert_eq!(summary.accuracy, 0.75);
        assert_eq!(summary.duration_seconds, 90);
        assert_eq!(summary.state, QuizState::Completed);
    }
}
