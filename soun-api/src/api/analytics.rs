//! Study analytics

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Extension, Json, Router,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{require_course, AuthUser};
use crate::db::{analytics as analytics_db, mastery, quizzes};
use crate::services::analytics::{
    fill_timeline, overview, timeline_days, topic_breakdown, DailyProgress, Overview, TopicBreakdown,
};
use crate::sessions::quiz::{summarize, QuizSummary};
use crate::{ApiResult, AppState};

const RECENT_SESSIONS: i64 = 10;

/// GET /api/analytics/overview
pub async fn get_overview(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Overview>> {
    let counts = analytics_db::overview_counts(&state.db, user.id).await?;
    let activity = analytics_db::activity_dates(&state.db, user.id).await?;
    Ok(Json(overview(counts, &activity, Utc::now().date_naive())))
}

#[derive(Debug, Serialize)]
pub struct CourseAnalytics {
    pub course_id: Uuid,
    pub course_name: String,
    pub topics: Vec<TopicBreakdown>,
    pub struggling_topics: Vec<String>,
    pub recent_sessions: Vec<QuizSummary>,
}

/// GET /api/analytics/courses/:course_id
pub async fn course_analytics(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<Json<CourseAnalytics>> {
    let course = require_course(&state, user.id, course_id).await?;

    let attempts = analytics_db::topic_attempts(&state.db, user.id, course.id).await?;
    let levels = mastery::levels_for_course(&state.db, user.id, course.id).await?;
    let topics = topic_breakdown(&attempts, &levels);

    let struggling_topics = topics
        .iter()
        .filter(|t| t.struggling)
        .map(|t| t.topic.clone())
        .collect();

    let recent_sessions = quizzes::recent_sessions(&state.db, user.id, course.id, RECENT_SESSIONS)
        .await?
        .iter()
        .map(summarize)
        .collect();

    Ok(Json(CourseAnalytics {
        course_id: course.id,
        course_name: course.name,
        topics,
        struggling_topics,
        recent_sessions,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    #[serde(default)]
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub days: i64,
    pub timeline: Vec<DailyProgress>,
}

/// GET /api/analytics/progress
pub async fn progress(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ProgressQuery>,
) -> ApiResult<Json<ProgressResponse>> {
    let days = timeline_days(query.days);
    let now = Utc::now();
    let today = now.date_naive();

    let since = today
        .checked_sub_signed(Duration::days(days - 1))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
        .unwrap_or(now);

    let rows = analytics_db::daily_attempts(&state.db, user.id, since).await?;
    Ok(Json(ProgressResponse {
        days,
        timeline: fill_timeline(&rows, days, today),
    }))
}

pub fn analytics_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analytics/overview", get(get_overview))
        .route("/api/analytics/courses/:course_id", get(course_analytics))
        .route("/api/analytics/progress", get(progress))
}
