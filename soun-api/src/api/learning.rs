//! Mastery, learning paths, recommendations and struggling topics

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use soun_common::db::StudyLevel;
use uuid::Uuid;

use super::{require_course, AuthUser};
use crate::db::{documents, mastery};
use crate::services::adaptive::{
    self, learning_path, level_is_struggling, recommend, Difficulty, LearningPathStep, Proficiency,
    Recommendation,
};
use crate::services::context::{course_context, MAX_CONTEXT_CHARS};
use crate::services::topics::extract_topics;
use crate::{ApiResult, AppState};

/// Topics pulled from course documents for the learning path
const PATH_DOCUMENT_TOPICS: usize = 10;
const DEFAULT_RECOMMENDATIONS: usize = 10;
const MAX_RECOMMENDATIONS: usize = 50;

#[derive(Debug, Serialize)]
pub struct MasteryView {
    pub course_id: Uuid,
    pub topic: String,
    pub mastery: i32,
    pub proficiency: Proficiency,
    pub attempts: i32,
    pub correct: i32,
    pub accuracy: f64,
    pub struggling: bool,
    pub recommended_difficulty: Difficulty,
    pub last_studied_at: DateTime<Utc>,
}

impl From<&StudyLevel> for MasteryView {
    fn from(level: &StudyLevel) -> Self {
        Self {
            course_id: level.course_id,
            topic: level.topic.clone(),
            mastery: level.mastery_level,
            proficiency: Proficiency::from_mastery(level.mastery_level),
            attempts: level.attempts,
            correct: level.correct,
            accuracy: adaptive::accuracy(level.attempts, level.correct),
            struggling: level_is_struggling(level),
            recommended_difficulty: Difficulty::for_mastery(level.mastery_level),
            last_studied_at: level.last_studied_at,
        }
    }
}

/// Levels for one course, or across all courses when `course_id` is absent
async fn levels_in_scope(state: &AppState, user_id: Uuid, course_id: Option<Uuid>) -> ApiResult<Vec<StudyLevel>> {
    Ok(match course_id {
        Some(course_id) => {
            require_course(state, user_id, course_id).await?;
            mastery::levels_for_course(&state.db, user_id, course_id).await?
        }
        None => mastery::all_levels(&state.db, user_id).await?,
    })
}

/// GET /api/courses/:course_id/mastery
pub async fn course_mastery(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<Json<Vec<MasteryView>>> {
    let levels = levels_in_scope(&state, user.id, Some(course_id)).await?;
    Ok(Json(levels.iter().map(MasteryView::from).collect()))
}

/// GET /api/courses/:course_id/learning-path
///
/// Studied topics weakest first, then topics found in course documents that
/// have not been studied yet.
pub async fn course_learning_path(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<Json<Vec<LearningPathStep>>> {
    let levels = levels_in_scope(&state, user.id, Some(course_id)).await?;

    let texts = documents::course_texts(&state.db, user.id, course_id).await?;
    let context = course_context(&texts, MAX_CONTEXT_CHARS);
    let document_topics = extract_topics(&context, PATH_DOCUMENT_TOPICS);

    Ok(Json(learning_path(&levels, &document_topics)))
}

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    #[serde(default)]
    pub course_id: Option<Uuid>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// GET /api/learning/recommendations
pub async fn recommendations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<RecommendationQuery>,
) -> ApiResult<Json<Vec<Recommendation>>> {
    let levels = levels_in_scope(&state, user.id, query.course_id).await?;
    let limit = query.limit.unwrap_or(DEFAULT_RECOMMENDATIONS).clamp(1, MAX_RECOMMENDATIONS);
    Ok(Json(recommend(&levels, Utc::now(), limit)))
}

#[derive(Debug, Deserialize)]
pub struct StruggleQuery {
    #[serde(default)]
    pub course_id: Option<Uuid>,
}

/// GET /api/learning/struggles
pub async fn struggles(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<StruggleQuery>,
) -> ApiResult<Json<Vec<MasteryView>>> {
    let levels = levels_in_scope(&state, user.id, query.course_id).await?;
    Ok(Json(struggling_views(&levels)))
}

/// Struggling topics, lowest mastery first
fn struggling_views(levels: &[StudyLevel]) -> Vec<MasteryView> {
    let mut views: Vec<MasteryView> = levels
        .iter()
        .filter(|l| level_is_struggling(l))
        .map(MasteryView::from)
        .collect();
    views.sort_by(|a, b| a.mastery.cmp(&b.mastery).then_with(|| a.topic.cmp(&b.topic)));
    views
}

pub fn learning_routes() -> Router<AppState> {
    Router::new()
        .route("/api/courses/:course_id/mastery", get(course_mastery))
        .route("/api/courses/:course_id/learning-path", get(course_learning_path))
        .route("/api/learning/recommendations", get(recommendations))
        .route("/api/learning/struggles", get(struggles))
}
