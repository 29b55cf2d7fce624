//! Database schema migrations
//!
//! Versioned changes applied after the idempotent `CREATE TABLE IF NOT EXISTS`
//! pass. Each migration checks for its own effect first so it can run against
//! databases created by any earlier version.
//!
//! # Migration Guidelines
//!
//! 1. Never modify an existing migration
//! 2. Add a new `migrate_vN` and bump `CURRENT_SCHEMA_VERSION`
//! 3. Prefer `ADD COLUMN IF NOT EXISTS` / `CREATE INDEX IF NOT EXISTS`

use crate::Result;
use sqlx::PgPool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database
///
/// Returns 0 if schema_version has no rows
pub async fn get_schema_version(pool: &PgPool) -> Result<i32> {
    let version: Option<i32> =
        sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &PgPool, version: i32) -> Result<()> {
    sqlx::query("INSERT INTO schema_version (version) VALUES ($1) ON CONFLICT DO NOTHING")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("Migration v2 completed");
    }

    Ok(())
}

/// Migration v1: indexes for history and analytics queries
async fn migrate_v1(pool: &PgPool) -> Result<()> {
    info!("Running migration v1: history and analytics indexes");

    let statements = [
        "CREATE INDEX IF NOT EXISTS idx_quiz_attempts_user_time ON quiz_attempts(user_id, attempted_at)",
        "CREATE INDEX IF NOT EXISTS idx_quiz_attempts_course ON quiz_attempts(course_id, topic)",
        "CREATE INDEX IF NOT EXISTS idx_quiz_questions_course ON quiz_questions(course_id, topic)",
        "CREATE INDEX IF NOT EXISTS idx_flashcards_course ON flashcards(course_id)",
        "CREATE INDEX IF NOT EXISTS idx_documents_course ON documents(course_id)",
        "CREATE INDEX IF NOT EXISTS idx_voice_commands_user_time ON voice_commands(user_id, created_at)",
        "CREATE INDEX IF NOT EXISTS idx_quiz_sessions_state ON quiz_sessions(state, started_at)",
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}

/// Migration v2: add `topics` column to voice_commands
///
/// Voice commands were first stored without the topics extracted from them.
async fn migrate_v2(pool: &PgPool) -> Result<()> {
    info!("Running migration v2: Add topics column to voice_commands");

    sqlx::query(
        "ALTER TABLE voice_commands ADD COLUMN IF NOT EXISTS topics JSONB NOT NULL DEFAULT '[]'::jsonb",
    )
    .execute(pool)
    .await?;

    Ok(())
}
