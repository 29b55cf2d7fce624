//! Aggregate queries behind the analytics endpoints

use chrono::{DateTime, NaiveDate, Utc};
use soun_common::Result;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OverviewCounts {
    pub courses: i64,
    pub documents: i64,
    pub completed_quizzes: i64,
    pub questions_answered: i64,
    pub correct_answers: i64,
    pub average_mastery: Option<f64>,
    pub flashcards_reviewed: i64,
}

pub async fn overview_counts(pool: &PgPool, user_id: Uuid) -> Result<OverviewCounts> {
    let counts = sqlx::query_as::<_, OverviewCounts>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM courses WHERE user_id = $1) AS courses,
            (SELECT COUNT(*) FROM documents WHERE user_id = $1) AS documents,
            (SELECT COUNT(*) FROM quiz_sessions
                WHERE user_id = $1 AND state = 'COMPLETED') AS completed_quizzes,
            (SELECT COUNT(*) FROM quiz_attempts WHERE user_id = $1) AS questions_answered,
            (SELECT COUNT(*) FROM quiz_attempts
                WHERE user_id = $1 AND is_correct) AS correct_answers,
            (SELECT AVG(mastery_level)::float8 FROM study_levels
                WHERE user_id = $1) AS average_mastery,
            (SELECT COALESCE(SUM(review_count), 0)::bigint FROM flashcards
                WHERE user_id = $1) AS flashcards_reviewed
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(counts)
}

/// Distinct UTC dates with any study activity, newest first
pub async fn activity_dates(pool: &PgPool, user_id: Uuid) -> Result<Vec<NaiveDate>> {
    let dates: Vec<NaiveDate> = sqlx::query_scalar(
        r#"
        SELECT day FROM (
            SELECT (attempted_at AT TIME ZONE 'UTC')::date AS day
                FROM quiz_attempts WHERE user_id = $1
            UNION
            SELECT (created_at AT TIME ZONE 'UTC')::date
                FROM voice_commands WHERE user_id = $1
            UNION
            SELECT (last_reviewed_at AT TIME ZONE 'UTC')::date
                FROM flashcards WHERE user_id = $1 AND last_reviewed_at IS NOT NULL
        ) activity
        ORDER BY day DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(dates)
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TopicAttempts {
    pub topic: String,
    pub attempts: i64,
    pub correct: i64,
}

pub async fn topic_attempts(pool: &PgPool, user_id: Uuid, course_id: Uuid) -> Result<Vec<TopicAttempts>> {
    let rows = sqlx::query_as::<_, TopicAttempts>(
        r#"
        SELECT topic,
               COUNT(*) AS attempts,
               COUNT(*) FILTER (WHERE is_correct) AS correct
        FROM quiz_attempts
        WHERE user_id = $1 AND course_id = $2
        GROUP BY topic
        ORDER BY topic
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DailyAttempts {
    pub day: NaiveDate,
    pub attempts: i64,
    pub correct: i64,
}

/// Quiz attempts per UTC day since `since`; days without attempts are absent
pub async fn daily_attempts(
    pool: &PgPool,
    user_id: Uuid,
    since: DateTime<Utc>,
) -> Result<Vec<DailyAttempts>> {
    let rows = sqlx::query_as::<_, DailyAttempts>(
        r#"
        SELECT (attempted_at AT TIME ZONE 'UTC')::date AS day,
               COUNT(*) AS attempts,
               COUNT(*) FILTER (WHERE is_correct) AS correct
        FROM quiz_attempts
        WHERE user_id = $1 AND attempted_at >= $2
        GROUP BY day
        ORDER BY day
        "#,
    )
    .bind(user_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
