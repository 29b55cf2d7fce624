//! Accounts and bearer-token authentication
//!
//! `auth_middleware` guards every protected route. A valid token puts an
//! `AuthUser` into the request extensions for handlers to extract.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use soun_common::db::User;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{
    bearer_token, generate_token, hash_password, is_plausible_email, is_valid_username,
    token_digest, verify_decoy, verify_password, MAX_PASSWORD_LEN, MIN_PASSWORD_LEN,
};
use crate::db::{settings, tokens, users};
use crate::{ApiError, ApiResult, AppState};

const DEFAULT_TOKEN_TTL_DAYS: i64 = 14;
const MAX_TOKEN_TTL_DAYS: i64 = 3650;

/// Authenticated caller, inserted by `auth_middleware`
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    /// Stored digest of the presented token
    pub token_digest: String,
}

/// Reject requests without a live bearer token (401)
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    let token = bearer_token(header_value)
        .ok_or_else(|| ApiError::Unauthorized("Malformed Authorization header".to_string()))?;

    let digest = token_digest(token);
    let user = tokens::find_user_by_token(&state.db, &digest)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

    request.extensions_mut().insert(AuthUser {
        id: user.id,
        username: user.username,
        token_digest: digest,
    });

    Ok(next.run(request).await)
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

async fn hash_off_thread(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| ApiError::Internal(e.to_string()))
}

async fn verify_off_thread(password: String, stored_hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|e| ApiError::Internal(format!("Password verification task failed: {}", e)))
}

/// Token lifetime from the stored setting, clamped to 1..=3650 days
fn token_ttl(days: i64) -> Duration {
    Duration::days(days.clamp(1, MAX_TOKEN_TTL_DAYS))
}

async fn issue_token(state: &AppState, user: User) -> ApiResult<AuthResponse> {
    let ttl_days = settings::get_setting_or(&state.db, "session_token_ttl_days", DEFAULT_TOKEN_TTL_DAYS).await?;

    let token = generate_token();
    let expires_at = Utc::now() + token_ttl(ttl_days);
    tokens::create_token(&state.db, &token_digest(&token), user.id, expires_at).await?;

    Ok(AuthResponse {
        token,
        expires_at,
        user,
    })
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let username = req.username.trim();
    let email = req.email.trim();

    if !is_valid_username(username) {
        return Err(ApiError::BadRequest(
            "Username must be 3-32 letters, digits, '_' or '-'".to_string(),
        ));
    }
    if !is_plausible_email(email) {
        return Err(ApiError::BadRequest("Invalid email address".to_string()));
    }
    let password_len = req.password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&password_len) {
        return Err(ApiError::BadRequest(format!(
            "Password must be {}-{} characters",
            MIN_PASSWORD_LEN, MAX_PASSWORD_LEN
        )));
    }
    let display_name = super::optional_text("display_name", req.display_name.as_deref(), 100)?;

    let password_hash = hash_off_thread(req.password).await?;
    let user = users::create_user(
        &state.db,
        username,
        email,
        &password_hash,
        display_name.as_deref(),
    )
    .await?;

    info!(user_id = %user.id, username = %user.username, "Registered user");
    Ok(Json(issue_token(&state, user).await?))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());

    let Some(user) = users::find_by_login(&state.db, req.login.trim()).await? else {
        // Unknown accounts pay the same hashing cost as wrong passwords
        let password = req.password;
        tokio::task::spawn_blocking(move || verify_decoy(&password))
            .await
            .map_err(|e| ApiError::Internal(format!("Password verification task failed: {}", e)))?;
        return Err(invalid());
    };

    if !verify_off_thread(req.password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "Failed login");
        return Err(invalid());
    }

    info!(user_id = %user.id, "User logged in");
    Ok(Json(issue_token(&state, user).await?))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<StatusCode> {
    tokens::delete_token(&state.db, &user.token_digest).await?;
    info!(user_id = %user.id, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<User>> {
    users::get_user(&state.db, user.id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("User".to_string()))
}

pub fn public_auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_ttl_clamped() {
        assert_eq!(token_ttl(14), Duration::days(14));
        assert_eq!(token_ttl(0), Duration::days(1));
        assert_eq!(token_ttl(-5), Duration::days(1));
        assert_eq!(token_ttl(i64::MAX), Duration::days(MAX_TOKEN_TTL_DAYS));
    }
}
