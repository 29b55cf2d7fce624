//! Course CRUD

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use soun_common::db::Course;
use std::path::Path as FsPath;
use tracing::{info, warn};
use uuid::Uuid;

use super::{optional_text, require_course, required_text, AuthUser};
use crate::db::courses::{self, CourseUpdate};
use crate::upload::storage::remove_upload;
use crate::{ApiError, ApiResult, AppState};

const MAX_NAME_CHARS: usize = 100;
const MAX_DESCRIPTION_CHARS: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct CreateCourseRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCourseRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// `#rgb` or `#rrggbb`
fn is_valid_color(color: &str) -> bool {
    match color.strip_prefix('#') {
        Some(hex) => matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

fn validate_color(color: Option<&str>) -> ApiResult<Option<String>> {
    match optional_text("color", color, 7)? {
        Some(c) if !is_valid_color(&c) => Err(ApiError::BadRequest(
            "color must look like #rgb or #rrggbb".to_string(),
        )),
        other => Ok(other),
    }
}

/// GET /api/courses
pub async fn list_courses(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<Course>>> {
    Ok(Json(courses::list_courses(&state.db, user.id).await?))
}

/// POST /api/courses
pub async fn create_course(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateCourseRequest>,
) -> ApiResult<Json<Course>> {
    let name = required_text("name", &req.name, MAX_NAME_CHARS)?;
    let description = optional_text("description", req.description.as_deref(), MAX_DESCRIPTION_CHARS)?;
    let color = validate_color(req.color.as_deref())?;

    let course = courses::create_course(
        &state.db,
        user.id,
        &name,
        description.as_deref(),
        color.as_deref(),
    )
    .await?;

    info!(user_id = %user.id, course_id = %course.id, "Created course");
    Ok(Json(course))
}

/// GET /api/courses/:course_id
pub async fn get_course(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<Json<Course>> {
    Ok(Json(require_course(&state, user.id, course_id).await?))
}

/// PUT /api/courses/:course_id
pub async fn update_course(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<Uuid>,
    Json(req): Json<UpdateCourseRequest>,
) -> ApiResult<Json<Course>> {
    let name = match req.name.as_deref() {
        Some(n) => Some(required_text("name", n, MAX_NAME_CHARS)?),
        None => None,
    };
    let description = optional_text("description", req.description.as_deref(), MAX_DESCRIPTION_CHARS)?;
    let color = validate_color(req.color.as_deref())?;

    let update = CourseUpdate {
        name: name.as_deref(),
        description: description.as_deref(),
        color: color.as_deref(),
    };

    courses::update_course(&state.db, user.id, course_id, update)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Course {}", course_id)))
}

/// DELETE /api/courses/:course_id
///
/// Removes the course, everything attached to it, and its uploaded files.
pub async fn delete_course(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let paths = courses::delete_course(&state.db, user.id, course_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Course {}", course_id)))?;

    for path in &paths {
        if let Err(e) = remove_upload(&state.uploads_dir, FsPath::new(path)).await {
            warn!(course_id = %course_id, path = %path, error = %e, "Failed to remove upload");
        }
    }

    info!(user_id = %user.id, course_id = %course_id, files = paths.len(), "Deleted course");
    Ok(StatusCode::NO_CONTENT)
}

pub fn course_routes() -> Router<AppState> {
    Router::new()
        .route("/api/courses", get(list_courses).post(create_course))
        .route(
            "/api/courses/:course_id",
            get(get_course).put(update_course).delete(delete_course),
        )
}
