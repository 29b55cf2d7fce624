//! Runtime configuration resolution for soun-api
//!
//! The OpenAI API key resolves Database → ENV → TOML. Without a key the
//! service still starts and runs on `DisabledModel`.

use crate::llm::{DisabledModel, LanguageModel, OpenAiClient};
use soun_common::config::{LlmConfig, TomlConfig};
use soun_common::Result;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Non-empty, non-whitespace
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Pick the highest-priority valid key, with the name of its source
///
/// Warns when more than one source is set.
pub fn pick_api_key(
    db_key: Option<String>,
    env_key: Option<String>,
    toml_key: Option<String>,
) -> Option<(String, &'static str)> {
    let candidates: Vec<(String, &'static str)> = [
        (db_key, "database"),
        (env_key, "environment"),
        (toml_key, "TOML"),
    ]
    .into_iter()
    .filter_map(|(key, source)| key.filter(|k| is_valid_key(k)).map(|k| (k, source)))
    .collect();

    if candidates.len() > 1 {
        let sources: Vec<&str> = candidates.iter().map(|(_, s)| *s).collect();
        warn!(
            "OpenAI API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    candidates.into_iter().next()
}

pub async fn resolve_openai_api_key(db: &PgPool, toml_config: &TomlConfig) -> Result<Option<String>> {
    let db_key = crate::db::settings::get_openai_api_key(db).await?;
    let env_key = std::env::var(OPENAI_API_KEY_ENV).ok();

    match pick_api_key(db_key, env_key, toml_config.llm.api_key.clone()) {
        Some((key, source)) => {
            info!("OpenAI API key loaded from {}", source);
            Ok(Some(key))
        }
        None => {
            warn!(
                "OpenAI API key not configured; model-backed features will use fallbacks. \
                 Set settings.openai_api_key, {} or [llm] api_key in the TOML config.",
                OPENAI_API_KEY_ENV
            );
            Ok(None)
        }
    }
}

/// Build the language model for the resolved key
pub fn build_language_model(api_key: Option<String>, llm: &LlmConfig) -> Arc<dyn LanguageModel> {
    let Some(api_key) = api_key else {
        return Arc::new(DisabledModel);
    };

    match OpenAiClient::new(api_key, llm.model.clone(), &llm.base_url) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!(error = %e, "Failed to build OpenAI client, using disabled model");
            Arc::new(DisabledModel)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_key_wins() {
        let picked = pick_api_key(
            Some("db-key".into()),
            Some("env-key".into()),
            Some("toml-key".into()),
        );
        assert_eq!(picked, Some(("db-key".to_string(), "database")));
    }

    #[test]
    fn test_blank_keys_are_skipped() {
        let picked = pick_api_key(Some("   ".into()), None, Some("toml-key".into()));
        assert_eq!(picked, Some(("toml-key".to_string(), "TOML")));
    }

    #[test]
    fn test_no_key() {
        assert_eq!(pick_api_key(None, Some(String::new()), None), None);
    }

    #[test]
    fn test_missing_key_builds_disabled_model() {
        let model = build_language_model(None, &LlmConfig::default());
        assert_eq!(model.name(), "disabled");
    }
}
