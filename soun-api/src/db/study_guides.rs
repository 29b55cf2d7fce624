//! Generated study guides

use soun_common::db::StudyGuide;
use soun_common::Result;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

pub async fn insert_study_guide(
    pool: &PgPool,
    user_id: Uuid,
    course_id: Uuid,
    title: &str,
    content: &serde_json::Value,
) -> Result<StudyGuide> {
    let guide = sqlx::query_as::<_, StudyGuide>(
        r#"
        INSERT INTO study_guides (id, user_id, course_id, title, content)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(course_id)
    .bind(title)
    .bind(Json(content))
    .fetch_one(pool)
    .await?;

    Ok(guide)
}

pub async fn list_study_guides(pool: &PgPool, user_id: Uuid, course_id: Uuid) -> Result<Vec<StudyGuide>> {
    let guides = sqlx::query_as::<_, StudyGuide>(
        "SELECT * FROM study_guides WHERE user_id = $1 AND course_id = $2 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_all(pool)
    .await?;

    Ok(guides)
}

pub async fn get_study_guide(pool: &PgPool, user_id: Uuid, guide_id: Uuid) -> Result<Option<StudyGuide>> {
    let guide =
        sqlx::query_as::<_, StudyGuide>("SELECT * FROM study_guides WHERE id = $1 AND user_id = $2")
            .bind(guide_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    Ok(guide)
}

pub async fn delete_study_guide(pool: &PgPool, user_id: Uuid, guide_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM study_guides WHERE id = $1 AND user_id = $2")
        .bind(guide_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
