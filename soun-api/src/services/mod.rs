//! Business logic
//!
//! Pure rules (mastery, topics, emotions, analytics) and the model-backed
//! generators. Nothing here touches HTTP; only `analytics` reads db row types.

pub mod adaptive;
pub mod analytics;
pub mod context;
pub mod emotion;
pub mod evaluation;
pub mod flashcard_generator;
pub mod quiz_generator;
pub mod study_guide;
pub mod topics;
pub mod tutor;
