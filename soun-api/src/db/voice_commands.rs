//! Tutor conversation log

use soun_common::db::VoiceCommand;
use soun_common::pagination::{calculate_pagination, Page, PageQuery};
use soun_common::Result;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

pub struct NewVoiceCommand<'a> {
    pub user_id: Uuid,
    pub course_id: Option<Uuid>,
    pub input_mode: &'a str,
    pub transcript: &'a str,
    pub response: &'a str,
    pub emotions: Vec<String>,
    pub topics: Vec<String>,
}

pub async fn insert_voice_command(pool: &PgPool, cmd: NewVoiceCommand<'_>) -> Result<VoiceCommand> {
    let row = sqlx::query_as::<_, VoiceCommand>(
        r#"
        INSERT INTO voice_commands
            (id, user_id, course_id, input_mode, transcript, response, emotions, topics)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(cmd.user_id)
    .bind(cmd.course_id)
    .bind(cmd.input_mode)
    .bind(cmd.transcript)
    .bind(cmd.response)
    .bind(Json(&cmd.emotions))
    .bind(Json(&cmd.topics))
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Newest first
pub async fn history(pool: &PgPool, user_id: Uuid, query: &PageQuery) -> Result<Page<VoiceCommand>> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM voice_commands WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    let pagination = calculate_pagination(total, query.page, query.page_size);

    let items = sqlx::query_as::<_, VoiceCommand>(
        r#"
        SELECT * FROM voice_commands
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(pagination.page_size)
    .bind(pagination.offset)
    .fetch_all(pool)
    .await?;

    Ok(Page { items, pagination })
}
