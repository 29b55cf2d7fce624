//! HTTP API handlers for soun-api
//!
//! Each submodule exposes a `*_routes()` function merged by `build_router`.

pub mod analytics;
pub mod auth;
pub mod courses;
pub mod documents;
pub mod flashcards;
pub mod health;
pub mod learning;
pub mod quizzes;
pub mod study_guides;
pub mod voice;

pub use analytics::analytics_routes;
pub use auth::{account_routes, auth_middleware, public_auth_routes, AuthUser};
pub use courses::course_routes;
pub use documents::document_routes;
pub use flashcards::flashcard_routes;
pub use health::health_routes;
pub use learning::learning_routes;
pub use quizzes::quiz_routes;
pub use study_guides::study_guide_routes;
pub use voice::voice_routes;

use crate::{ApiError, AppState};
use soun_common::db::Course;
use uuid::Uuid;

/// Course owned by `user_id`, or 404
pub(crate) async fn require_course(
    state: &AppState,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<Course, ApiError> {
    crate::db::courses::get_course(&state.db, user_id, course_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Course {}", course_id)))
}

/// Trimmed, non-empty text no longer than `max_chars`
pub(crate) fn required_text(field: &str, value: &str, max_chars: usize) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::BadRequest(format!("{} must not be empty", field)));
    }
    if value.chars().count() > max_chars {
        return Err(ApiError::BadRequest(format!(
            "{} must be at most {} characters",
            field, max_chars
        )));
    }
    Ok(value.to_string())
}

/// Like `required_text`, but blank input becomes `None`
pub(crate) fn optional_text(
    field: &str,
    value: Option<&str>,
    max_chars: usize,
) -> Result<Option<String>, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => required_text(field, v, max_chars).map(Some),
    }
}
