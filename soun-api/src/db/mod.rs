//! Database access for soun-api
//!
//! Every query that touches user-owned rows filters on `user_id`, so a row
//! belonging to someone else looks exactly like a missing row.

pub mod analytics;
pub mod courses;
pub mod documents;
pub mod flashcards;
pub mod mastery;
pub mod quizzes;
pub mod settings;
pub mod study_guides;
pub mod tokens;
pub mod users;
pub mod voice_commands;
