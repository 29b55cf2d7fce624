//! Flashcard review sessions
//!
//! A session is an ordered deck of card ids reviewed one at a time. Sessions
//! live only in the process-local `SessionStore`. A review claims its card by
//! advancing the session before anything is persisted; `undo_review` and
//! `skip_review` settle the claim when persisting fails or the card is gone.

use chrono::{DateTime, Utc};
use serde::Serialize;
use soun_common::db::Flashcard;
use std::cmp::Ordering;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("Expected card {expected}, got {got}")]
    WrongCard { expected: Uuid, got: Uuid },

    #[error("Session has no cards left to review")]
    Finished,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlashcardSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub topic: Option<String>,
    pub card_ids: Vec<Uuid>,
    pub current_index: usize,
    pub knew_count: u32,
    pub missed_count: u32,
    pub skipped_count: u32,
    pub started_at: DateTime<Utc>,
}

/// Result of a single review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewOutcome {
    pub card_id: Uuid,
    pub knew: bool,
    pub finished: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlashcardSummary {
    pub session_id: Uuid,
    pub total_cards: usize,
    pub reviewed: usize,
    pub knew: u32,
    pub missed: u32,
    pub skipped: u32,
    pub accuracy: f64,
    pub duration_seconds: i64,
}

impl FlashcardSession {
    pub fn new(user_id: Uuid, course_id: Uuid, topic: Option<String>, card_ids: Vec<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            course_id,
            topic,
            card_ids,
            current_index: 0,
            knew_count: 0,
            missed_count: 0,
            skipped_count: 0,
            started_at: Utc::now(),
        }
    }

    pub fn current_card(&self) -> Option<Uuid> {
        self.card_ids.get(self.current_index).copied()
    }

    pub fn is_finished(&self) -> bool {
        self.current_index >= self.card_ids.len()
    }

    /// Record a review of the current card and advance
    pub fn record_review(&mut self, card_id: Uuid, knew: bool) -> Result<ReviewOutcome, ReviewError> {
        let expected = self.current_card().ok_or(ReviewError::Finished)?;
        if expected != card_id {
            return Err(ReviewError::WrongCard {
                expected,
                got: card_id,
            });
        }

        if knew {
            self.knew_count += 1;
        } else {
            self.missed_count += 1;
        }
        self.current_index += 1;

        Ok(ReviewOutcome {
            card_id,
            knew,
            finished: self.is_finished(),
        })
    }

    fn is_last_claimed(&self, card_id: Uuid) -> bool {
        self.current_index
            .checked_sub(1)
            .and_then(|i| self.card_ids.get(i))
            .is_some_and(|id| *id == card_id)
    }

    fn uncount(&mut self, knew: bool) {
        if knew {
            self.knew_count = self.knew_count.saturating_sub(1);
        } else {
            self.missed_count = self.missed_count.saturating_sub(1);
        }
    }

    /// Revert the latest claimed review so the card can be reviewed again
    ///
    /// Returns false when `card_id` is not the latest claimed card.
    pub fn undo_review(&mut self, card_id: Uuid, knew: bool) -> bool {
        if !self.is_last_claimed(card_id) {
            return false;
        }
        self.uncount(knew);
        self.current_index -= 1;
        true
    }

    /// Keep the session advanced past a claimed card but count it as skipped
    pub fn skip_review(&mut self, card_id: Uuid, knew: bool) -> bool {
        if !self.is_last_claimed(card_id) {
            return false;
        }
        self.uncount(knew);
        self.skipped_count += 1;
        true
    }

    pub fn summary(&self) -> FlashcardSummary {
        let reviewed = (self.knew_count + self.missed_count) as usize;
        let accuracy = if reviewed == 0 {
            0.0
        } else {
            f64::from(self.knew_count) / reviewed as f64
        };

        FlashcardSummary {
            session_id: self.id,
            total_cards: self.card_ids.len(),
            reviewed,
            knew: self.knew_count,
            missed: self.missed_count,
            skipped: self.skipped_count,
            accuracy,
            duration_seconds: (Utc::now() - self.started_at).num_seconds().max(0),
        }
    }
}

fn correct_ratio(card: &Flashcard) -> f64 {
    if card.review_count <= 0 {
        0.0
    } else {
        f64::from(card.correct_count) / f64::from(card.review_count)
    }
}

/// Weakest cards first: lowest correct ratio, then never reviewed, then oldest review
pub fn order_weakest_first(cards: &mut [Flashcard]) {
    cards.sort_by(|a, b| {
        correct_ratio(a)
            .partial_cmp(&correct_ratio(b))
            .unwrap_or(Ordering::Equal)
            .then_with(|| (a.review_count > 0).cmp(&(b.review_count > 0)))
            .then_with(|| a.last_reviewed_at.cmp(&b.last_reviewed_at))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn card(front: &str, reviews: i32, correct: i32, reviewed_days_ago: Option<i64>) -> Flashcard {
        Flashcard {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            course_id: Uuid::nil(),
            topic: "Biology".to_string(),
            front: front.to_string(),
            back: "back".to_string(),
            review_count: reviews,
            correct_count: correct,
            last_reviewed_at: reviewed_days_ago.map(|d| Utc::now() - Duration::days(d)),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_order_weakest_first() {
        let mut cards = vec![
            card("strong", 4, 4, Some(1)),
            card("half", 4, 2, Some(1)),
            card("wrong-recent", 2, 0, Some(1)),
            card("new", 0, 0, None),
            card("wrong-old", 3, 0, Some(10)),
        ];

        order_weakest_first(&mut cards);
        let fronts: Vec<_> = cards.iter().map(|c| c.front.as_str()).collect();
        assert_eq!(fronts, vec!["new", "wrong-old", "wrong-recent", "half", "strong"]);
    }

    #[test]
    fn test_review_flow_and_summary() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let mut session = FlashcardSession::new(Uuid::nil(), Uuid::nil(), None, ids.clone());

        let outcome = session.record_review(ids[0], true).unwrap();
        assert!(!outcome.finished);
        assert_eq!(session.current_card(), Some(ids[1]));

        let outcome = session.record_review(ids[1], false).unwrap();
        assert!(outcome.finished);
        assert!(session.is_finished());

        let summary = session.summary();
        assert_eq!(summary.reviewed, 2);
        assert_eq!(summary.knew, 1);
        assert_eq!(summary.missed, 1);
        assert_eq!(summary.accuracy, 0.5);
    }

    #[test]
    fn test_review_wrong_card_rejected() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let mut session = FlashcardSession::new(Uuid::nil(), Uuid::nil(), None, ids.clone());

        let err = session.record_review(ids[1], true).unwrap_err();
        assert_eq!(
            err,
            ReviewError::WrongCard {
                expected: ids[0],
                got: ids[1]
            }
        );
        assert_eq!(session.current_index, 0);
    }

    #[test]
    fn test_review_after_finish_rejected() {
        let id = Uuid::new_v4();
        let mut session = FlashcardSession::new(Uuid::nil(), Uuid::nil(), None, vec![id]);
        session.record_review(id, true).unwrap();

        assert_eq!(session.record_review(id, true), Err(ReviewError::Finished));
    }

    #[test]
    fn test_undo_review_restores_card() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let mut session = FlashcardSession::new(Uuid::nil(), Uuid::nil(), None, ids.clone());
        session.record_review(ids[0], false).unwrap();

        assert!(!session.undo_review(ids[1], false));
        assert!(session.undo_review(ids[0], false));
        assert_eq!(session.current_card(), Some(ids[0]));
        assert_eq!(session.missed_count, 0);
        assert!(!session.undo_review(ids[0], false));
    }

    #[test]
    fn test_skip_review_advances_without_counting() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let mut session = FlashcardSession::new(Uuid::nil(), Uuid::nil(), None, ids.clone());
        session.record_review(ids[0], true).unwrap();

        assert!(session.skip_review(ids[0], true));
        assert_eq!(session.current_card(), Some(ids[1]));

        session.record_review(ids[1], true).unwrap();
        let summary = session.summary();
        assert_eq!(summary.reviewed, 1);
        assert_eq!(summary.knew, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.accuracy, 1.0);
    }

    #[tokio::test]
    async fn test_concurrent_reviews_claim_card_once() {
        use crate::sessions::store::SessionStore;
        use std::sync::Arc;

        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let session = FlashcardSession::new(Uuid::nil(), Uuid::nil(), None, ids.clone());
        let session_id = session.id;
        let store = Arc::new(SessionStore::with_defaults());
        store.insert(session_id, session).await;

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                let card = ids[0];
                tokio::spawn(async move {
                    store
                        .update(&session_id, |s| s.record_review(card, true))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut claimed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => claimed += 1,
                Err(err) => assert!(matches!(err, ReviewError::WrongCard { .. })),
            }
        }

        assert_eq!(claimed, 1);
        let session = store.get(&session_id).await.unwrap();
        assert_eq!(session.knew_count, 1);
        assert_eq!(session.current_card(), Some(ids[1]));
    }
}
