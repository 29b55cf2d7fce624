//! soun-api library interface
//!
//! Exposes the router and state for the binary and for integration tests.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod services;
pub mod sessions;
pub mod upload;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sessions::{FlashcardSession, SessionStore};
use sqlx::PgPool;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::llm::LanguageModel;

/// Default upload limit (25 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub llm: Arc<dyn LanguageModel>,
    /// In-memory flashcard review sessions
    pub flashcard_sessions: Arc<SessionStore<FlashcardSession>>,
    /// Root of stored uploads (`<data_folder>/uploads`)
    pub uploads_dir: PathBuf,
    pub max_upload_bytes: usize,
    /// Attempts for retried database writes
    pub db_retry_attempts: u32,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: PgPool, llm: Arc<dyn LanguageModel>, uploads_dir: PathBuf) -> Self {
        Self {
            db,
            llm,
            flashcard_sessions: Arc::new(SessionStore::with_defaults()),
            uploads_dir,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            db_retry_attempts: 3,
            startup_time: Utc::now(),
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub fn with_db_retry_attempts(mut self, attempts: u32) -> Self {
        self.db_retry_attempts = attempts.max(1);
        self
    }
}

/// Build application router
///
/// `/health`, register and login are public; everything else under `/api`
/// requires a bearer token.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;

    let protected = Router::new()
        .merge(api::account_routes())
        .merge(api::course_routes())
        .merge(api::document_routes(state.max_upload_bytes))
        .merge(api::voice_routes())
        .merge(api::quiz_routes())
        .merge(api::flashcard_routes())
        .merge(api::study_guide_routes())
        .merge(api::learning_routes())
        .merge(api::analytics_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    let public = Router::new()
        .merge(api::health_routes())
        .merge(api::public_auth_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
