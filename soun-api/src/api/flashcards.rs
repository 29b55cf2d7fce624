//! Flashcard generation, listing and review sessions

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use soun_common::db::Flashcard;
use tracing::{info, warn};
use uuid::Uuid;

use super::{optional_text, require_course, AuthUser};
use crate::db::flashcards::{self, NewFlashcard};
use crate::db::documents;
use crate::llm::json::GeneratedFlashcard;
use crate::services::adaptive::Proficiency;
use crate::services::context::{course_context, MAX_CONTEXT_CHARS};
use crate::services::flashcard_generator::{
    generate_flashcards, FlashcardRequest, DEFAULT_CARD_COUNT, MAX_CARD_COUNT,
};
use crate::sessions::flashcard::{order_weakest_first, FlashcardSession, FlashcardSummary, ReviewError};
use crate::{ApiError, ApiResult, AppState};

const MAX_TOPIC_CHARS: usize = 200;
const DEFAULT_SESSION_CARDS: usize = 20;
const MAX_SESSION_CARDS: usize = 100;

fn to_new_cards(generated: Vec<GeneratedFlashcard>, fallback_topic: &str) -> Vec<NewFlashcard> {
    generated
        .into_iter()
        .map(|c| NewFlashcard {
            topic: c
                .topic
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| fallback_topic.to_string()),
            front: c.front.trim().to_string(),
            back: c.back.trim().to_string(),
        })
        .collect()
}

fn map_review_error(err: ReviewError) -> ApiError {
    ApiError::Conflict(err.to_string())
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub course_id: Uuid,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub count: Option<usize>,
}

/// POST /api/flashcards/generate
pub async fn generate(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<Json<Vec<Flashcard>>> {
    let course = require_course(&state, user.id, req.course_id).await?;
    let topic = optional_text("topic", req.topic.as_deref(), MAX_TOPIC_CHARS)?;
    let count = req.count.unwrap_or(DEFAULT_CARD_COUNT).clamp(1, MAX_CARD_COUNT);

    let texts = documents::course_texts(&state.db, user.id, course.id).await?;
    let context = course_context(&texts, MAX_CONTEXT_CHARS);

    let generated = generate_flashcards(
        state.llm.as_ref(),
        &FlashcardRequest {
            course_name: &course.name,
            topic: topic.as_deref(),
            count,
            context: &context,
        },
    )
    .await?;

    let new_cards = to_new_cards(generated, topic.as_deref().unwrap_or(&course.name));
    let cards = flashcards::insert_flashcards(&state.db, user.id, course.id, &new_cards).await?;

    info!(user_id = %user.id, course_id = %course.id, count = cards.len(), "Generated flashcards");
    Ok(Json(cards))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub topic: Option<String>,
}

/// GET /api/courses/:course_id/flashcards
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(course_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Flashcard>>> {
    let course = require_course(&state, user.id, course_id).await?;
    let topic = query.topic.as_deref().map(str::trim).filter(|t| !t.is_empty());
    Ok(Json(
        flashcards::list_flashcards(&state.db, user.id, course.id, topic).await?,
    ))
}

/// DELETE /api/flashcards/:card_id
pub async fn remove(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(card_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if flashcards::delete_flashcard(&state.db, user.id, card_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Flashcard {}", card_id)))
    }
}

#[derive(Debug, Serialize)]
pub struct CardView {
    pub id: Uuid,
    pub topic: String,
    pub front: String,
    pub back: String,
}

impl From<Flashcard> for CardView {
    fn from(card: Flashcard) -> Self {
        Self {
            id: card.id,
            topic: card.topic,
            front: card.front,
            back: card.back,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub course_id: Uuid,
    pub topic: Option<String>,
    pub total_cards: usize,
    pub position: usize,
    pub knew: u32,
    pub missed: u32,
    pub current_card: Option<CardView>,
}

async fn session_view(state: &AppState, session: &FlashcardSession) -> ApiResult<SessionView> {
    let current_card = match session.current_card() {
        Some(card_id) => flashcards::get_flashcard(&state.db, session.user_id, card_id)
            .await?
            .map(CardView::from),
        None => None,
    };

    Ok(SessionView {
        session_id: session.id,
        course_id: session.course_id,
        topic: session.topic.clone(),
        total_cards: session.card_ids.len(),
        position: session.current_index,
        knew: session.knew_count,
        missed: session.missed_count,
        current_card,
    })
}

/// Live session owned by `user_id`; other users' sessions look missing
async fn owned_session(state: &AppState, user_id: Uuid, session_id: Uuid) -> ApiResult<FlashcardSession> {
    state
        .flashcard_sessions
        .get(&session_id)
        .await
        .filter(|s| s.user_id == user_id)
        .ok_or_else(|| ApiError::NotFound(format!("Flashcard session {}", session_id)))
}

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub course_id: Uuid,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// POST /api/flashcards/sessions
pub async fn start_session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<StartSessionRequest>,
) -> ApiResult<Json<SessionView>> {
    let course = require_course(&state, user.id, req.course_id).await?;
    let topic = optional_text("topic", req.topic.as_deref(), MAX_TOPIC_CHARS)?;
    let limit = req.limit.unwrap_or(DEFAULT_SESSION_CARDS).clamp(1, MAX_SESSION_CARDS);

    let mut cards = flashcards::list_flashcards(&state.db, user.id, course.id, topic.as_deref()).await?;
    if cards.is_empty() {
        return Err(ApiError::BadRequest(
            "No flashcards to review; generate some first".to_string(),
        ));
    }

    order_weakest_first(&mut cards);
    let card_ids: Vec<Uuid> = cards.iter().take(limit).map(|c| c.id).collect();

    let session = FlashcardSession::new(user.id, course.id, topic, card_ids);
    if let Some(evicted) = state.flashcard_sessions.insert(session.id, session.clone()).await {
        info!(session_id = %evicted, "Flashcard session evicted to make room");
    }

    info!(
        user_id = %user.id,
        session_id = %session.id,
        cards = session.card_ids.len(),
        "Started flashcard session"
    );

    Ok(Json(session_view(&state, &session).await?))
}

/// GET /api/flashcards/sessions/:session_id
pub async fn get_session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionView>> {
    let session = owned_session(&state, user.id, session_id).await?;
    Ok(Json(session_view(&state, &session).await?))
}

/// DELETE /api/flashcards/sessions/:session_id
pub async fn end_session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<FlashcardSummary>> {
    owned_session(&state, user.id, session_id).await?;

    let session = state
        .flashcard_sessions
        .remove(&session_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Flashcard session {}", session_id)))?;

    info!(user_id = %user.id, session_id = %session_id, "Ended flashcard session");
    Ok(Json(session.summary()))
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub card_id: Uuid,
    pub knew: bool,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub card_id: Uuid,
    pub knew: bool,
    /// The card was deleted mid-session; nothing was recorded
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mastery: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proficiency: Option<Proficiency>,
    pub finished: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionView>,
    /// Present once the deck is exhausted; the session is then closed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<FlashcardSummary>,
}

/// POST /api/flashcards/sessions/:session_id/review
pub async fn review(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> ApiResult<Json<ReviewResponse>> {
    owned_session(&state, user.id, session_id).await?;

    // Claim the card first; a duplicate request fails here with 409
    let (outcome, mut updated) = state
        .flashcard_sessions
        .update(&session_id, |s| s.record_review(req.card_id, req.knew).map(|o| (o, s.clone())))
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Flashcard session {}", session_id)))?
        .map_err(map_review_error)?;

    let applied = match flashcards::apply_review(
        &state.db,
        state.db_retry_attempts,
        user.id,
        req.card_id,
        req.knew,
    )
    .await
    {
        Ok(applied) => applied,
        Err(err) => {
            let restored = state
                .flashcard_sessions
                .update(&session_id, |s| s.undo_review(req.card_id, req.knew))
                .await
                .unwrap_or(false);
            if !restored {
                warn!(session_id = %session_id, card_id = %req.card_id, "Could not release flashcard claim");
            }
            return Err(err.into());
        }
    };

    if applied.is_none() {
        info!(session_id = %session_id, card_id = %req.card_id, "Skipped deleted flashcard");
        if let Some(skipped) = state
            .flashcard_sessions
            .update(&session_id, |s| s.skip_review(req.card_id, req.knew).then(|| s.clone()))
            .await
            .flatten()
        {
            updated = skipped;
        }
    }

    let (session_view_out, summary) = if outcome.finished {
        state.flashcard_sessions.remove(&session_id).await;
        info!(user_id = %user.id, session_id = %session_id, "Completed flashcard session");
        (None, Some(updated.summary()))
    } else {
        (Some(session_view(&state, &updated).await?), None)
    };

    let mastery = applied.as_ref().map(|a| a.level.mastery_level);
    Ok(Json(ReviewResponse {
        card_id: outcome.card_id,
        knew: outcome.knew,
        skipped: applied.is_none(),
        mastery,
        proficiency: mastery.map(Proficiency::from_mastery),
        finished: outcome.finished,
        session: session_view_out,
        summary,
    }))
}

pub fn flashcard_routes() -> Router<AppState> {
    Router::new()
        .route("/api/flashcards/generate", post(generate))
        .route("/api/courses/:course_id/flashcards", get(list))
        .route("/api/flashcards/:card_id", delete(remove))
        .route("/api/flashcards/sessions", post(start_session))
        .route(
            "/api/flashcards/sessions/:session_id",
            get(get_session).delete(end_session),
        )
        .route("/api/flashcards/sessions/:session_id/review", post(review))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_new_cards_falls_back_to_topic() {
        let generated = vec![
            GeneratedFlashcard {
                front: " Osmosis ".to_string(),
                back: "Diffusion of water ".to_string(),
                topic: Some("  ".to_string()),
            },
            GeneratedFlashcard {
                front: "ATP".to_string(),
                back: "Energy carrier".to_string(),
                topic: Some("Metabolism".to_string()),
            },
        ];

        let cards = to_new_cards(generated, "Biology");
        assert_eq!(cards[0].topic, "Biology");
        assert_eq!(cards[0].front, "Osmosis");
        assert_eq!(cards[0].back, "Diffusion of water");
        assert_eq!(cards[1].topic, "Metabolism");
    }

    #[test]
    fn test_review_errors_are_conflicts() {
        assert!(matches!(map_review_error(ReviewError::Finished), ApiError::Conflict(_)));
    }
}
