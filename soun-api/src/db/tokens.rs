//! Bearer token persistence
//!
//! Only the SHA-256 of a token is stored; the raw token exists on the client.

use chrono::{DateTime, Utc};
use soun_common::db::User;
use soun_common::Result;
use sqlx::PgPool;
use uuid::Uuid;

pub async fn create_token(
    pool: &PgPool,
    token_hash: &str,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("INSERT INTO user_sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(())
}

/// User owning an unexpired token
pub async fn find_user_by_token(pool: &PgPool, token_hash: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT u.*
        FROM user_sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token = $1 AND s.expires_at > NOW()
        "#,
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn delete_token(pool: &PgPool, token_hash: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM user_sessions WHERE token = $1")
        .bind(token_hash)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn purge_expired(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at <= NOW()")
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
