//! Runtime settings table

use soun_common::Result;
use sqlx::PgPool;
use std::str::FromStr;

pub async fn get_setting(pool: &PgPool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    Ok(value.flatten())
}

/// Parsed setting, falling back to `default` when missing or unparseable
pub async fn get_setting_or<T: FromStr>(pool: &PgPool, key: &str, default: T) -> Result<T> {
    let value = get_setting(pool, key).await?;

    Ok(match value {
        Some(raw) => match raw.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!(key, value = %raw, "Unparseable setting, using default");
                default
            }
        },
        None => default,
    })
}

pub async fn get_openai_api_key(pool: &PgPool) -> Result<Option<String>> {
    get_setting(pool, "openai_api_key").await
}
