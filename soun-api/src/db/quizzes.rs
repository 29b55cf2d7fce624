//! Quiz questions, sessions and attempts
//!
//! Answers are applied in one transaction: the session row is updated only if
//! it is still IN_PROGRESS at the expected `current_index`, then the attempt
//! and the mastery change are written. A concurrent answer to the same
//! question loses the race and sees `None`.

use crate::db::mastery;
use crate::services::adaptive::StudyActivity;
use crate::sessions::quiz::{AnswerTransition, QuizState};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use soun_common::db::{retry_transient, QuizQuestion, QuizSessionRow, StudyLevel};
use soun_common::pagination::{calculate_pagination, Page, PageQuery};
use soun_common::Result;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

pub struct NewQuestion {
    pub topic: String,
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: i32,
    pub explanation: Option<String>,
    pub difficulty: String,
}

pub async fn insert_questions(
    pool: &PgPool,
    user_id: Uuid,
    course_id: Uuid,
    questions: &[NewQuestion],
) -> Result<Vec<QuizQuestion>> {
    let mut tx = pool.begin().await?;
    let mut inserted = Vec::with_capacity(questions.len());

    for q in questions {
        let row = sqlx::query_as::<_, QuizQuestion>(
            r#"
            INSERT INTO quiz_questions
                (id, user_id, course_id, topic, question, options, correct_index, explanation, difficulty)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(course_id)
        .bind(&q.topic)
        .bind(&q.question)
        .bind(Json(&q.options))
        .bind(q.correct_index)
        .bind(&q.explanation)
        .bind(&q.difficulty)
        .fetch_one(&mut *tx)
        .await?;
        inserted.push(row);
    }

    tx.commit().await?;
    Ok(inserted)
}

pub async fn get_question(pool: &PgPool, user_id: Uuid, question_id: Uuid) -> Result<Option<QuizQuestion>> {
    let question = sqlx::query_as::<_, QuizQuestion>(
        "SELECT * FROM quiz_questions WHERE id = $1 AND user_id = $2",
    )
    .bind(question_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(question)
}

/// Pick up to `limit` questions, preferring the requested difficulty
pub async fn select_questions(
    pool: &PgPool,
    user_id: Uuid,
    course_id: Uuid,
    topic: Option<&str>,
    difficulty: &str,
    limit: i64,
) -> Result<Vec<QuizQuestion>> {
    let questions = sqlx::query_as::<_, QuizQuestion>(
        r#"
        SELECT * FROM quiz_questions
        WHERE user_id = $1 AND course_id = $2 AND ($3::text IS NULL OR topic = $3)
        ORDER BY (difficulty = $4) DESC, RANDOM()
        LIMIT $5
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .bind(topic)
    .bind(difficulty)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(questions)
}

pub async fn create_session(
    pool: &PgPool,
    user_id: Uuid,
    course_id: Uuid,
    topic: Option<&str>,
    question_ids: &[Uuid],
) -> Result<QuizSessionRow> {
    let row = sqlx::query_as::<_, QuizSessionRow>(
        r#"
        INSERT INTO quiz_sessions (id, user_id, course_id, topic, state, question_ids)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(course_id)
    .bind(topic)
    .bind(QuizState::InProgress.as_str())
    .bind(Json(question_ids))
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn get_session(pool: &PgPool, user_id: Uuid, session_id: Uuid) -> Result<Option<QuizSessionRow>> {
    let row = sqlx::query_as::<_, QuizSessionRow>(
        "SELECT * FROM quiz_sessions WHERE id = $1 AND user_id = $2",
    )
    .bind(session_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// The answer being recorded against the session's current question
pub struct AnswerRecord<'a> {
    pub question: &'a QuizQuestion,
    pub selected_index: i32,
    pub is_correct: bool,
    pub response_time_ms: Option<i64>,
}

pub struct AppliedAnswer {
    pub session: QuizSessionRow,
    pub level: StudyLevel,
}

/// Apply an accepted answer; `None` when the session moved underneath us
pub async fn apply_answer(
    pool: &PgPool,
    max_attempts: u32,
    session: &QuizSessionRow,
    transition: AnswerTransition,
    answer: &AnswerRecord<'_>,
) -> Result<Option<AppliedAnswer>> {
    retry_transient("record quiz answer", max_attempts, || async move {
        let mut tx = pool.begin().await?;

        let updated = sqlx::query_as::<_, QuizSessionRow>(
            r#"
            UPDATE quiz_sessions
            SET current_index = $3,
                correct_count = $4,
                answered_count = $5,
                state = $6,
                ended_at = CASE WHEN $6 = 'IN_PROGRESS' THEN NULL ELSE NOW() END
            WHERE id = $1 AND user_id = $2 AND state = 'IN_PROGRESS' AND current_index = $7
            RETURNING *
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(transition.next_index)
        .bind(transition.correct_count)
        .bind(transition.answered_count)
        .bind(transition.next_state.as_str())
        .bind(transition.answered_index)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(updated) = updated else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO quiz_attempts
                (id, user_id, session_id, question_id, course_id, topic,
                 selected_index, is_correct, response_time_ms)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session.user_id)
        .bind(session.id)
        .bind(answer.question.id)
        .bind(answer.question.course_id)
        .bind(&answer.question.topic)
        .bind(answer.selected_index)
        .bind(answer.is_correct)
        .bind(answer.response_time_ms)
        .execute(&mut *tx)
        .await?;

        let level = mastery::apply_activity(
            &mut *tx,
            session.user_id,
            answer.question.course_id,
            &answer.question.topic,
            StudyActivity::QuizAnswer {
                correct: answer.is_correct,
            },
        )
        .await?;

        tx.commit().await?;

        Ok(Some(AppliedAnswer {
            session: updated,
            level,
        }))
    })
    .await
}

/// Mark a running session ABANDONED; `None` if it is missing or already over
pub async fn abandon_session(pool: &PgPool, user_id: Uuid, session_id: Uuid) -> Result<Option<QuizSessionRow>> {
    let row = sqlx::query_as::<_, QuizSessionRow>(
        r#"
        UPDATE quiz_sessions
        SET state = $3, ended_at = NOW()
        WHERE id = $1 AND user_id = $2 AND state = 'IN_PROGRESS'
        RETURNING *
        "#,
    )
    .bind(session_id)
    .bind(user_id)
    .bind(QuizState::Abandoned.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Ten years
const MAX_STALE_HOURS: i64 = 24 * 365 * 10;

fn stale_cutoff(now: DateTime<Utc>, hours: i64) -> DateTime<Utc> {
    now - Duration::hours(hours.clamp(0, MAX_STALE_HOURS))
}

/// Abandon IN_PROGRESS sessions started more than `hours` ago
pub async fn abandon_stale_sessions(pool: &PgPool, hours: i64) -> Result<u64> {
    let cutoff = stale_cutoff(Utc::now(), hours);

    let result = sqlx::query(
        r#"
        UPDATE quiz_sessions
        SET state = $1, ended_at = NOW()
        WHERE state = 'IN_PROGRESS' AND started_at < $2
        "#,
    )
    .bind(QuizState::Abandoned.as_str())
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Recent sessions for a course, newest first
pub async fn recent_sessions(
    pool: &PgPool,
    user_id: Uuid,
    course_id: Uuid,
    limit: i64,
) -> Result<Vec<QuizSessionRow>> {
    let rows = sqlx::query_as::<_, QuizSessionRow>(
        r#"
        SELECT * FROM quiz_sessions
        WHERE user_id = $1 AND course_id = $2
        ORDER BY started_at DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// One answered question in the history listing
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AttemptHistoryItem {
    pub id: Uuid,
    pub session_id: Option<Uuid>,
    pub question_id: Uuid,
    pub course_id: Uuid,
    pub topic: String,
    pub question: String,
    pub selected_index: i32,
    pub correct_index: i32,
    pub is_correct: bool,
    pub response_time_ms: Option<i64>,
    pub attempted_at: DateTime<Utc>,
}

pub async fn attempt_history(
    pool: &PgPool,
    user_id: Uuid,
    course_id: Option<Uuid>,
    query: &PageQuery,
) -> Result<Page<AttemptHistoryItem>> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM quiz_attempts WHERE user_id = $1 AND ($2::uuid IS NULL OR course_id = $2)",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(pool)
    .await?;

    let pagination = calculate_pagination(total, query.page, query.page_size);

    let items = sqlx::query_as::<_, AttemptHistoryItem>(
        r#"
        SELECT a.id, a.session_id, a.question_id, a.course_id, a.topic, q.question,
               a.selected_index, q.correct_index, a.is_correct, a.response_time_ms, a.attempted_at
        FROM quiz_attempts a
        JOIN quiz_questions q ON q.id = a.question_id
        WHERE a.user_id = $1 AND ($2::uuid IS NULL OR a.course_id = $2)
        ORDER BY a.attempted_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .bind(pagination.page_size)
    .bind(pagination.offset)
    .fetch_all(pool)
    .await?;

    Ok(Page { items, pagination })
}
