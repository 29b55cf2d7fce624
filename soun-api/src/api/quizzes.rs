//! Quiz generation, evaluation and persisted quiz sessions

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use soun_common::db::{QuizQuestion, QuizSessionRow, StudyLevel};
use soun_common::pagination::{Page, PageQuery};
use tracing::{info, warn};
use uuid::Uuid;

use super::{optional_text, require_course, required_text, AuthUser};
use crate::db::quizzes::{self, AnswerRecord, AttemptHistoryItem, NewQuestion};
use crate::db::{documents, mastery};
use crate::services::adaptive::{Difficulty, Proficiency, StudyActivity};
use crate::services::context::{course_context, MAX_CONTEXT_CHARS};
use crate::services::evaluation::{self, Evaluation, EvaluationRequest};
use crate::services::quiz_generator::{
    generate_questions, QuestionRequest, DEFAULT_QUESTION_COUNT, MAX_QUESTION_COUNT,
};
use crate::sessions::quiz::{self as quiz_session, QuizSessionError, QuizState, QuizSummary};
use crate::{ApiError, ApiResult, AppState};

const MAX_TOPIC_CHARS: usize = 200;
const MAX_ANSWER_CHARS: usize = 4000;

/// Question as shown while it is being answered (no answer key)
#[derive(Debug, Serialize)]
pub struct QuestionView {
    pub id: Uuid,
    pub topic: String,
    pub question: String,
    pub options: Vec<String>,
    pub difficulty: String,
}

impl From<&QuizQuestion> for QuestionView {
    fn from(q: &QuizQuestion) -> Self {
        Self {
            id: q.id,
            topic: q.topic.clone(),
            question: q.question.clone(),
            options: q.options.0.clone(),
            difficulty: q.difficulty.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub course_id: Uuid,
    pub topic: Option<String>,
    pub state: QuizState,
    pub total_questions: usize,
    pub current_index: i32,
    pub answered: i32,
    pub correct: i32,
    pub current_question: Option<QuestionView>,
}

fn map_session_error(err: QuizSessionError) -> ApiError {
    match err {
        QuizSessionError::NotInProgress(_) | QuizSessionError::OutOfOrder { .. } => {
            ApiError::Conflict(err.to_string())
        }
        QuizSessionError::Corrupt(_) => ApiError::Internal(err.to_string()),
    }
}

async fn session_view(state: &AppState, row: &QuizSessionRow) -> ApiResult<SessionView> {
    let session_state = quiz_session::session_state(row).map_err(map_session_error)?;

    let current_question = match quiz_session::current_question(row) {
        Some(question_id) => quizzes::get_question(&state.db, row.user_id, question_id)
            .await?
            .as_ref()
            .map(QuestionView::from),
        None => None,
    };

    Ok(SessionView {
        session_id: row.id,
        course_id: row.course_id,
        topic: row.topic.clone(),
        state: session_state,
        total_questions: row.question_ids.0.len(),
        current_index: row.current_index,
        answered: row.answered_count,
        correct: row.correct_count,
        current_question,
    })
}

async fn load_session(state: &AppState, user_id: Uuid, session_id: Uuid) -> ApiResult<QuizSessionRow> {
    quizzes::get_session(&state.db, user_id, session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Quiz session {}", session_id)))
}

fn to_new_questions(
    generated: Vec<crate::llm::json::GeneratedQuestion>,
    fallback_topic: &str,
    difficulty: Difficulty,
) -> Vec<NewQuestion> {
    generated
        .into_iter()
        .map(|q| NewQuestion {
            topic: q.topic.unwrap_or_else(|| fallback_topic.to_string()),
            question: q.question.trim().to_string(),
            options: q.options.into_iter().map(|o| o.trim().to_string()).collect(),
            correct_index: q.correct_index as i32,
            explanation: q.explanation.filter(|e| !e.trim().is_empty()),
            difficulty: difficulty.as_str().to_string(),
        })
        .collect()
}

/// Generate and store questions for a course
async fn generate_and_store(
    state: &AppState,
    user_id: Uuid,
    course_id: Uuid,
    course_name: &str,
    topic: Option<&str>,
    difficulty: Difficulty,
    count: usize,
) -> ApiResult<Vec<QuizQuestion>> {
    let texts = documents::course_texts(&state.db, user_id, course_id).await?;
    let context = course_context(&texts, MAX_CONTEXT_CHARS);

    let generated = generate_questions(
        state.llm.as_ref(),
        &QuestionRequest {
            course_name,
            topic,
            difficulty,
            count,
            context: &context,
        },
    )
    .await?;

    let new_questions = to_new_questions(generated, topic.unwrap_or(course_name), difficulty);
    Ok(quizzes::insert_questions(&state.db, user_id, course_id, &new_questions).await?)
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub course_id: Uuid,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub count: Option<usize>,
    /// Defaults to the difficulty matched to current mastery
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub difficulty: Difficulty,
    pub questions: Vec<QuizQuestion>,
}

/// POST /api/quizzes/generate
pub async fn generate(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<Json<GenerateResponse>> {
    let course = require_course(&state, user.id, req.course_id).await?;
    let topic = optional_text("topic", req.topic.as_deref(), MAX_TOPIC_CHARS)?;
    let count = req.count.unwrap_or(DEFAULT_QUESTION_COUNT).clamp(1, MAX_QUESTION_COUNT);

    let difficulty = match req.difficulty {
        Some(d) => d,
        None => Difficulty::for_mastery(
            mastery::mastery_for(&state.db, user.id, course.id, topic.as_deref()).await?,
        ),
    };

    let questions = generate_and_store(
        &state,
        user.id,
        course.id,
        &course.name,
        topic.as_deref(),
        difficulty,
        count,
    )
    .await?;

    info!(
        user_id = %user.id,
        course_id = %course.id,
        count = questions.len(),
        difficulty = difficulty.as_str(),
        "Generated quiz questions"
    );

    Ok(Json(GenerateResponse {
        difficulty,
        questions,
    }))
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub expected_answer: Option<String>,
    /// With `topic`, the result also moves mastery
    #[serde(default)]
    pub course_id: Option<Uuid>,
    #[serde(default)]
    pub topic: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    #[serde(flatten)]
    pub evaluation: Evaluation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub study_level: Option<StudyLevel>,
}

/// POST /api/quizzes/evaluate
pub async fn evaluate(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<EvaluateRequest>,
) -> ApiResult<Json<EvaluateResponse>> {
    let question = required_text("question", &req.question, MAX_ANSWER_CHARS)?;
    let answer = req.answer.trim();
    if answer.chars().count() > MAX_ANSWER_CHARS {
        return Err(ApiError::BadRequest(format!(
            "answer must be at most {} characters",
            MAX_ANSWER_CHARS
        )));
    }
    let expected = optional_text("expected_answer", req.expected_answer.as_deref(), MAX_ANSWER_CHARS)?;
    let topic = optional_text("topic", req.topic.as_deref(), MAX_TOPIC_CHARS)?;

    // Validate ownership before spending a model call
    if let Some(course_id) = req.course_id {
        require_course(&state, user.id, course_id).await?;
    }

    let evaluation = evaluation::evaluate_answer(
        state.llm.as_ref(),
        &EvaluationRequest {
            question: &question,
            answer,
            expected_answer: expected.as_deref(),
        },
    )
    .await;

    let study_level = match (req.course_id, topic.as_deref()) {
        (Some(course_id), Some(topic)) if evaluation.is_graded() => Some(
            mastery::apply_activity(
                &state.db,
                user.id,
                course_id,
                topic,
                StudyActivity::QuizAnswer {
                    correct: evaluation.is_correct,
                },
            )
            .await?,
        ),
        _ => None,
    };

    Ok(Json(EvaluateResponse {
        evaluation,
        study_level,
    }))
}

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub course_id: Uuid,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub count: Option<usize>,
}

/// POST /api/quizzes/sessions
///
/// Draws stored questions at the adaptive difficulty and tops up with newly
/// generated ones when there are not enough.
pub async fn start_session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<StartSessionRequest>,
) -> ApiResult<Json<SessionView>> {
    let course = require_course(&state, user.id, req.course_id).await?;
    let topic = optional_text("topic", req.topic.as_deref(), MAX_TOPIC_CHARS)?;
    let count = req.count.unwrap_or(DEFAULT_QUESTION_COUNT).clamp(1, MAX_QUESTION_COUNT);

    let current_mastery = mastery::mastery_for(&state.db, user.id, course.id, topic.as_deref()).await?;
    let difficulty = Difficulty::for_mastery(current_mastery);

    let mut questions = quizzes::select_questions(
        &state.db,
        user.id,
        course.id,
        topic.as_deref(),
        difficulty.as_str(),
        count as i64,
    )
    .await?;

    if questions.len() < count {
        let missing = count - questions.len();
        match generate_and_store(
            &state,
            user.id,
            course.id,
            &course.name,
            topic.as_deref(),
            difficulty,
            missing,
        )
        .await
        {
            Ok(generated) => questions.extend(generated.into_iter().take(missing)),
            Err(e) if !questions.is_empty() => {
                warn!(
                    course_id = %course.id,
                    available = questions.len(),
                    error = %e,
                    "Could not generate more questions; starting with stored ones"
                );
            }
            Err(e) => return Err(e),
        }
    }

    let question_ids: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
    let row = quizzes::create_session(&state.db, user.id, course.id, topic.as_deref(), &question_ids).await?;

    info!(
        user_id = %user.id,
        session_id = %row.id,
        questions = question_ids.len(),
        difficulty = difficulty.as_str(),
        "Started quiz session"
    );

    Ok(Json(session_view(&state, &row).await?))
}

/// GET /api/quizzes/sessions/:session_id
pub async fn get_session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionView>> {
    let row = load_session(&state, user.id, session_id).await?;
    Ok(Json(session_view(&state, &row).await?))
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question_id: Uuid,
    pub selected_index: i32,
    #[serde(default)]
    pub response_time_ms: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub correct: bool,
    pub correct_index: i32,
    pub explanation: Option<String>,
    pub mastery: i32,
    pub proficiency: Proficiency,
    pub session: SessionView,
    /// Present once the last question has been answered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<QuizSummary>,
}

/// POST /api/quizzes/sessions/:session_id/answer
pub async fn answer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<AnswerRequest>,
) -> ApiResult<Json<AnswerResponse>> {
    let row = load_session(&state, user.id, session_id).await?;

    let question = quizzes::get_question(&state.db, user.id, req.question_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Question {}", req.question_id)))?;

    let option_count = question.options.0.len() as i32;
    if !(0..option_count).contains(&req.selected_index) {
        return Err(ApiError::BadRequest(format!(
            "selected_index must be between 0 and {}",
            option_count - 1
        )));
    }

    let correct = req.selected_index == question.correct_index;
    let transition = quiz_session::plan_answer(&row, question.id, correct).map_err(map_session_error)?;

    let applied = quizzes::apply_answer(
        &state.db,
        state.db_retry_attempts,
        &row,
        transition,
        &AnswerRecord {
            question: &question,
            selected_index: req.selected_index,
            is_correct: correct,
            response_time_ms: req.response_time_ms.filter(|ms| *ms >= 0),
        },
    )
    .await?
    .ok_or_else(|| ApiError::Conflict("Quiz session changed; reload and try again".to_string()))?;

    let session = applied.session;
    let summary = (session.state == QuizState::Completed.as_str()).then(|| quiz_session::summarize(&session));

    if let Some(summary) = &summary {
        info!(
            user_id = %user.id,
            session_id = %session.id,
            correct = summary.correct,
            answered = summary.answered,
            "Completed quiz session"
        );
    }

    Ok(Json(AnswerResponse {
        correct,
        correct_index: question.correct_index,
        explanation: question.explanation.clone(),
        mastery: applied.level.mastery_level,
        proficiency: Proficiency::from_mastery(applied.level.mastery_level),
        session: session_view(&state, &session).await?,
        summary,
    }))
}

/// POST /api/quizzes/sessions/:session_id/abandon
pub async fn abandon(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<QuizSummary>> {
    match quizzes::abandon_session(&state.db, user.id, session_id).await? {
        Some(row) => {
            info!(user_id = %user.id, session_id = %session_id, "Abandoned quiz session");
            Ok(Json(quiz_session::summarize(&row)))
        }
        None => {
            let row = load_session(&state, user.id, session_id).await?;
            let current = quiz_session::session_state(&row).map_err(map_session_error)?;
            Err(map_session_error(QuizSessionError::NotInProgress(current)))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub course_id: Option<Uuid>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
}

impl HistoryQuery {
    fn page_query(&self) -> PageQuery {
        let defaults = PageQuery::default();
        PageQuery {
            page: self.page.unwrap_or(defaults.page),
            page_size: self.page_size.unwrap_or(defaults.page_size),
        }
    }
}

/// GET /api/quizzes/history
pub async fn history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Page<AttemptHistoryItem>>> {
    Ok(Json(
        quizzes::attempt_history(&state.db, user.id, query.course_id, &query.page_query()).await?,
    ))
}

pub fn quiz_routes() -> Router<AppState> {
    Router::new()
        .route("/api/quizzes/generate", post(generate))
        .route("/api/quizzes/evaluate", post(evaluate))
        .route("/api/quizzes/sessions", post(start_session))
        .route("/api/quizzes/sessions/:session_id", get(get_session))
        .route("/api/quizzes/sessions/:session_id/answer", post(answer))
        .route("/api/quizzes/sessions/:session_id/abandon", post(abandon))
        .route("/api/quizzes/history", get(history))
}
