//! Per-topic mastery (`study_levels`)
//!
//! Mastery is clamped in SQL with the same bounds as `adaptive::apply_delta`,
//! so concurrent updates to one topic never lose an increment.

use crate::services::adaptive::{apply_delta, StudyActivity, MASTERY_MAX, MASTERY_MIN};
use soun_common::db::StudyLevel;
use soun_common::Result;
use sqlx::postgres::PgExecutor;
use sqlx::PgPool;
use uuid::Uuid;

/// Apply one study event to a topic, creating the row on first use
pub async fn apply_activity<'e, E>(
    executor: E,
    user_id: Uuid,
    course_id: Uuid,
    topic: &str,
    activity: StudyActivity,
) -> Result<StudyLevel>
where
    E: PgExecutor<'e>,
{
    let delta = activity.mastery_delta();

    let level = sqlx::query_as::<_, StudyLevel>(
        r#"
        INSERT INTO study_levels
            (id, user_id, course_id, topic, mastery_level, attempts, correct, last_studied_at)
        VALUES ($1, $2, $3, $4, $5, 1, $6, NOW())
        ON CONFLICT (user_id, course_id, topic) DO UPDATE
        SET mastery_level = GREATEST($8, LEAST($9, study_levels.mastery_level + $7)),
            attempts = study_levels.attempts + 1,
            correct = study_levels.correct + $6,
            last_studied_at = NOW()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(course_id)
    .bind(topic)
    .bind(apply_delta(MASTERY_MIN, delta))
    .bind(i32::from(activity.is_success()))
    .bind(delta)
    .bind(MASTERY_MIN)
    .bind(MASTERY_MAX)
    .fetch_one(executor)
    .await?;

    Ok(level)
}

pub async fn levels_for_course(pool: &PgPool, user_id: Uuid, course_id: Uuid) -> Result<Vec<StudyLevel>> {
    let levels = sqlx::query_as::<_, StudyLevel>(
        r#"
        SELECT * FROM study_levels
        WHERE user_id = $1 AND course_id = $2
        ORDER BY mastery_level, topic
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_all(pool)
    .await?;

    Ok(levels)
}

pub async fn all_levels(pool: &PgPool, user_id: Uuid) -> Result<Vec<StudyLevel>> {
    let levels = sqlx::query_as::<_, StudyLevel>(
        "SELECT * FROM study_levels WHERE user_id = $1 ORDER BY mastery_level, topic",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(levels)
}

/// Mastery used to pick a difficulty: the topic's own level when a topic is
/// given, otherwise the course average. Unstudied means 0.
pub async fn mastery_for(
    pool: &PgPool,
    user_id: Uuid,
    course_id: Uuid,
    topic: Option<&str>,
) -> Result<i32> {
    let mastery: Option<f64> = sqlx::query_scalar(
        r#"
        SELECT AVG(mastery_level)::float8 FROM study_levels
        WHERE user_id = $1 AND course_id = $2 AND ($3::text IS NULL OR topic = $3)
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .bind(topic)
    .fetch_one(pool)
    .await?;

    Ok(mastery.map(|m| m.round() as i32).unwrap_or(MASTERY_MIN))
}
