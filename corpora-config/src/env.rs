//! `CORPORA_*` environment variable overrides.
//!
//! One override per tunable, applied on top of whatever the file supplied.
//! Values that fail to parse are rejected rather than silently ignored.

use std::env;
use std::str::FromStr;

use tracing::debug;

use corpora_core::types::FilterMode;

use crate::{ConfigError, CorporaConfig};

/// Apply every recognized `CORPORA_*` variable to `config`.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] naming the first malformed variable.
pub fn apply_overrides(config: &mut CorporaConfig) -> Result<(), ConfigError> {
    if let Some(url) = read("CORPORA_DATABASE_URL") {
        config.database.url = url;
    }
    parse_into("CORPORA_DATABASE_POOL_MAX", &mut config.database.pool_max)?;
    parse_into(
        "CORPORA_DATABASE_STATEMENT_TIMEOUT_MS",
        &mut config.database.statement_timeout_ms,
    )?;
    if let Some(value) = read("CORPORA_TEXT_SEARCH_CONFIG") {
        config.database.text_search_config = value;
    }

    if let Some(root) = read("CORPORA_OBJECT_STORE_ROOT") {
        config.object_store.root = root;
    }

    if let Some(model) = read("CORPORA_EMBEDDING_MODEL") {
        config.embedding.model_id = model;
    }
    if let Some(url) = read("CORPORA_EMBEDDING_BASE_URL") {
        config.embedding.base_url = url;
    }
    parse_into("CORPORA_EMBEDDING_BATCH_LIMIT", &mut config.embedding.batch_limit)?;

    if let Some(model) = read("CORPORA_LLM_MODEL") {
        config.llm.model = model;
    }
    if let Some(url) = read("CORPORA_LLM_BASE_URL") {
        config.llm.base_url = url;
    }
    if let Some(version) = read("CORPORA_PROMPT_VERSION") {
        config.llm.prompt_version = version;
    }

    parse_into("CORPORA_CHUNK_SIZE", &mut config.chunking.chunk_size)?;
    parse_into("CORPORA_CHUNK_OVERLAP", &mut config.chunking.overlap)?;

    parse_into("CORPORA_TOP_K_DEFAULT", &mut config.retrieval.top_k_default)?;
    parse_into("CORPORA_TOP_K_MAX", &mut config.retrieval.top_k_max)?;
    parse_into("CORPORA_CONTEXT_BUDGET", &mut config.retrieval.context_budget)?;
    if let Some(raw) = read("CORPORA_FILTER_MODE") {
        config.retrieval.filter_mode = match raw.as_str() {
            "off" => FilterMode::Off,
            "downrank" => FilterMode::Downrank,
            "exclude" => FilterMode::Exclude,
            other => {
                return Err(ConfigError::Invalid(format!(
                    "CORPORA_FILTER_MODE: unknown mode '{other}'"
                )))
            }
        };
    }

    parse_into("CORPORA_RETRY_MAX_ATTEMPTS", &mut config.retry.max_attempts)?;
    parse_into("CORPORA_RETRY_BASE_DELAY_MS", &mut config.retry.base_delay_ms)?;
    parse_into("CORPORA_RETRY_MAX_DELAY_MS", &mut config.retry.max_delay_ms)?;

    parse_into(
        "CORPORA_QUEUE_VISIBILITY_SECS",
        &mut config.ingestion.queue_visibility_secs,
    )?;
    parse_into(
        "CORPORA_JOB_MAX_ATTEMPTS",
        &mut config.ingestion.job_max_attempts,
    )?;
    parse_into("CORPORA_MAX_FILE_BYTES", &mut config.ingestion.max_file_bytes)?;

    parse_into("CORPORA_CACHE_TTL_SECS", &mut config.cache.ttl_secs)?;

    Ok(())
}

fn read(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => {
            debug!(variable = name, "applying environment override");
            Some(value)
        }
        _ => None,
    }
}

fn parse_into<T: FromStr>(name: &str, slot: &mut T) -> Result<(), ConfigError> {
    if let Some(raw) = read(name) {
        *slot = raw
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{name}: cannot parse '{raw}'")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; each uses a distinct variable so
    // they stay independent under parallel execution.

    #[test]
    fn test_override_applies() {
        env::set_var("CORPORA_CHUNK_SIZE", "640");
        let mut config = CorporaConfig::default();
        apply_overrides(&mut config).unwrap();
        assert_eq!(config.chunking.chunk_size, 640);
        env::remove_var("CORPORA_CHUNK_SIZE");
    }

    #[test]
    fn test_malformed_override_rejected() {
        env::set_var("CORPORA_TOP_K_MAX", "many");
        let mut config = CorporaConfig::default();
        assert!(apply_overrides(&mut config).is_err());
        env::remove_var("CORPORA_TOP_K_MAX");
    }

    #[test]
    fn test_filter_mode_parsing() {
        env::set_var("CORPORA_FILTER_MODE", "exclude");
        let mut config = CorporaConfig::default();
        apply_overrides(&mut config).unwrap();
        assert_eq!(config.retrieval.filter_mode, FilterMode::Exclude);

        env::set_var("CORPORA_FILTER_MODE", "loud");
        assert!(apply_overrides(&mut config).is_err());
        env::remove_var("CORPORA_FILTER_MODE");
    }
}
