//! Study sessions
//!
//! Quiz sessions are persisted rows driven by the state machine in `quiz`.
//! Flashcard sessions are process-local and held in a bounded `SessionStore`.

pub mod flashcard;
pub mod quiz;
pub mod store;

pub use flashcard::{FlashcardSession, FlashcardSummary, ReviewError};
pub use quiz::{QuizState, QuizSessionError, QuizSummary};
pub use store::SessionStore;
