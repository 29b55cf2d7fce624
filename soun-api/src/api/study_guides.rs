//! Study guides

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use soun_common::db::StudyGuide;
use tracing::info;
use uuid::Uuid;

use super::{optional_text, require_course, AuthUser};
use crate::db::{documents, study_guides};
use crate::services::context::{course_context, MAX_CONTEXT_CHARS};
use crate::services::study_guide::{generate_guide, GuideRequest};
use crate::{ApiError, ApiResult, AppState};

const MAX_TOPIC_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub course_id: Uuid,
    #[serde(default)]
    pub topic: Option<String>,
}

/// POST /api/study-guides/generate
///
/// Always stores a guide; without a working model it is a topic outline.
pub async fn generate(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<Json<StudyGuide>> {
    let course = require_course(&state, user.id, req.course_id).await?;
    let topic = optional_text("topic", req.topic.as_deref(), MAX_TOPIC_CHARS)?;

    let texts = documents::course_texts(&state.db, user.id, course.id).await?;
    let context = course_context(&texts, MAX_CONTEXT_CHARS);

    let guide = generate_guide(
        state.llm.as_ref(),
        &GuideRequest {
            course_name: &course.name,
            topic: topic.as_deref(),
            context: &context,
        },
    )
    .await;

    let content = serde_json::to_value(&guide)
        .map_err(|e| ApiError::Internal(format!("Failed to encode study guide: {}", e)))?;
    let stored =
        study_guides::insert_study_guide(&state.db, user.id, course.id, &guide.title, &content).await?;

    info!(
        user_id = %user.id,
        course_id = %course.id,
        guide_id = %stored.id,
        sections = guide.sections.len(),
        generated = guide.generated,
        "Stored study guide"
    );

    Ok(Json(stored))
}

/// GET /api/courses/:course_id/study-guides
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<Json<Vec<StudyGuide>>> {
    let course = require_course(&state, user.id, course_id).await?;
    Ok(Json(
        study_guides::list_study_guides(&state.db, user.id, course.id).await?,
    ))
}

/// GET /api/study-guides/:guide_id
pub async fn get_guide(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(guide_id): Path<Uuid>,
) -> ApiResult<Json<StudyGuide>> {
    study_guides::get_study_guide(&state.db, user.id, guide_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Study guide {}", guide_id)))
}

/// DELETE /api/study-guides/:guide_id
pub async fn remove(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(guide_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if study_guides::delete_study_guide(&state.db, user.id, guide_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Study guide {}", guide_id)))
    }
}

pub fn study_guide_routes() -> Router<AppState> {
    Router::new()
        .route("/api/study-guides/generate", post(generate))
        .route("/api/courses/:course_id/study-guides", get(list))
        .route("/api/study-guides/:guide_id", get(get_guide).delete(remove))
}
