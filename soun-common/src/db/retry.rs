//! Database Retry Logic
//!
//! Retries transient database failures a fixed number of times with
//! exponential backoff. Anything that is not transient fails immediately.
//!
//! **Backoff Strategy:**
//! - Initial delay: 50ms
//! - Max delay: 1000ms
//! - Multiplier: 2.0 (exponential)

use crate::{Error, Result};
use std::time::{Duration, Instant};

const INITIAL_BACKOFF_MS: u64 = 50;
const MAX_BACKOFF_MS: u64 = 1000;

/// Whether a database error is worth retrying
///
/// Pool exhaustion, dropped connections and serialization failures
/// (SQLSTATE 40001) / deadlocks (40P01) are transient. Constraint
/// violations, missing rows and decode errors are not.
pub fn is_transient(err: &Error) -> bool {
    match err {
        Error::Database(db_err) => match db_err {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
            sqlx::Error::Database(e) => {
                matches!(e.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        },
        _ => false,
    }
}

/// Run a database operation, retrying transient failures up to `max_attempts` times.
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g., "record quiz answer")
/// * `max_attempts` - Total attempts including the first (values below 1 are treated as 1)
/// * `operation` - Async closure that performs the database operation
pub async fn retry_transient<F, Fut, T>(
    operation_name: &str,
    max_attempts: u32,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let start_time = Instant::now();
    let mut attempt = 0;
    let mut backoff_ms = INITIAL_BACKOFF_MS;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Database operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_transient(&err) {
                    return Err(err);
                }

                if attempt >= max_attempts {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        error = %err,
                        "Database operation failed: retry attempts exhausted"
                    );
                    return Err(err);
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms,
                    error = %err,
                    "Transient database error, will retry after backoff"
                );

                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }
        }
    }
}
