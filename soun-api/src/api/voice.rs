//! Tutor conversation endpoint
//!
//! Speech-to-text happens on the client; the server receives the transcript.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use soun_common::db::VoiceCommand;
use soun_common::pagination::{Page, PageQuery};
use tracing::info;
use uuid::Uuid;

use super::{require_course, required_text, AuthUser};
use crate::db::{documents, voice_commands};
use crate::services::context::{course_context, MAX_CONTEXT_CHARS};
use crate::services::emotion::{detect_emotions, Emotion};
use crate::services::topics::extract_topics;
use crate::services::tutor::{self, TutorRequest};
use crate::{ApiResult, AppState};

const MAX_TRANSCRIPT_CHARS: usize = 4000;
const TOPICS_PER_COMMAND: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    #[default]
    Voice,
    Text,
}

impl InputMode {
    fn as_str(self) -> &'static str {
        match self {
            InputMode::Voice => "voice",
            InputMode::Text => "text",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub transcript: String,
    #[serde(default)]
    pub input_mode: InputMode,
    #[serde(default)]
    pub course_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub id: Uuid,
    pub answer: String,
    pub emotions: Vec<Emotion>,
    pub topics: Vec<String>,
    /// False when the tutor used its canned reply
    pub generated: bool,
    pub created_at: DateTime<Utc>,
}

/// POST /api/voice/process
pub async fn process(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ProcessRequest>,
) -> ApiResult<Json<ProcessResponse>> {
    let transcript = required_text("transcript", &req.transcript, MAX_TRANSCRIPT_CHARS)?;

    let (course_name, context) = match req.course_id {
        Some(course_id) => {
            let course = require_course(&state, user.id, course_id).await?;
            let texts = documents::course_texts(&state.db, user.id, course_id).await?;
            (Some(course.name), course_context(&texts, MAX_CONTEXT_CHARS))
        }
        None => (None, String::new()),
    };

    let emotions = detect_emotions(&transcript);
    let topics = extract_topics(&transcript, TOPICS_PER_COMMAND);

    let reply = tutor::answer(
        state.llm.as_ref(),
        &TutorRequest {
            question: &transcript,
            course_name: course_name.as_deref(),
            context: &context,
            emotions: &emotions,
            topics: &topics,
        },
    )
    .await;

    let row = voice_commands::insert_voice_command(
        &state.db,
        voice_commands::NewVoiceCommand {
            user_id: user.id,
            course_id: req.course_id,
            input_mode: req.input_mode.as_str(),
            transcript: &transcript,
            response: &reply.answer,
            emotions: emotions.iter().map(|e| e.as_str().to_string()).collect(),
            topics: topics.clone(),
        },
    )
    .await?;

    info!(
        user_id = %user.id,
        command_id = %row.id,
        emotions = ?emotions,
        generated = reply.generated,
        "Processed tutor request"
    );

    Ok(Json(ProcessResponse {
        id: row.id,
        answer: reply.answer,
        emotions,
        topics,
        generated: reply.generated,
        created_at: row.created_at,
    }))
}

/// GET /api/voice/history
pub async fn history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<VoiceCommand>>> {
    Ok(Json(voice_commands::history(&state.db, user.id, &query).await?))
}

pub fn voice_routes() -> Router<AppState> {
    Router::new()
        .route("/api/voice/process", post(process))
        .route("/api/voice/history", get(history))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_mode_defaults_to_voice() {
        let req: ProcessRequest = serde_json::from_str(r#"{"transcript": "hi"}"#).unwrap();
        assert_eq!(req.input_mode, InputMode::Voice);
        assert_eq!(req.course_id, None);

        let req: ProcessRequest =
            serde_json::from_str(r#"{"transcript": "hi", "input_mode": "text"}"#).unwrap();
        assert_eq!(req.input_mode.as_str(), "text");
    }
}
