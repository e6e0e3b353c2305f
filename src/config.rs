//! Environment-based configuration.
//!
//! Settings come from environment variables rather than a config file so the
//! same configuration serves the CLI, the tool server, and embedded library
//! use. Missing required variables are fatal at construction time.

use std::time::Duration;

use crate::error::{Error, Result};

/// Default embedding model. Its vectors are 768 wide and must match the
/// store's vector column width exactly or inserts fail.
pub const DEFAULT_EMBEDDING_MODEL: &str = "models/text-embedding-004";
pub const DEFAULT_EMBEDDING_DIMS: usize = 768;
pub const DEFAULT_EMBEDDING_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the hosted document store (PostgREST endpoint).
    pub store_url: String,
    /// Access key for the store, sent as both `apikey` and bearer token.
    pub store_key: String,
    /// API key for the embedding provider.
    pub embedding_api_key: String,
    /// Embedding model identifier, e.g. `models/text-embedding-004`.
    pub embedding_model: String,
    /// Embedding vector width; must match the store's vector column.
    pub embedding_dims: usize,
    /// Base URL of the embedding provider (overridable for tests).
    pub embedding_base_url: String,
    /// Timeout applied uniformly to all outbound HTTP calls.
    pub timeout: Duration,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Required: `DOCVAULT_STORE_URL`, `DOCVAULT_STORE_KEY`, `GEMINI_API_KEY`.
    /// Optional: `EMBEDDING_MODEL`, `EMBEDDING_DIMS`, `EMBEDDING_BASE_URL`,
    /// `DOCVAULT_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let store_url = require_var("DOCVAULT_STORE_URL")?;
        let store_key = require_var("DOCVAULT_STORE_KEY")?;
        let embedding_api_key = require_var("GEMINI_API_KEY")?;

        let embedding_model = std::env::var("EMBEDDING_MODEL")
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string());

        let embedding_dims = match std::env::var("EMBEDDING_DIMS") {
            Ok(raw) => raw
                .parse::<usize>()
                .map_err(|_| Error::Config(format!("EMBEDDING_DIMS is not a number: {raw}")))?,
            Err(_) => DEFAULT_EMBEDDING_DIMS,
        };

        let embedding_base_url = std::env::var("EMBEDDING_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_EMBEDDING_BASE_URL.to_string());

        let timeout_secs = match std::env::var("DOCVAULT_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                Error::Config(format!("DOCVAULT_TIMEOUT_SECS is not a number: {raw}"))
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        let config = Self {
            store_url,
            store_key,
            embedding_api_key,
            embedding_model,
            embedding_dims,
            embedding_base_url,
            timeout: Duration::from_secs(timeout_secs),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.embedding_dims == 0 {
            return Err(Error::Config("EMBEDDING_DIMS must be > 0".into()));
        }
        if self.timeout.is_zero() {
            return Err(Error::Config("DOCVAULT_TIMEOUT_SECS must be > 0".into()));
        }
        if !self.store_url.starts_with("http") {
            return Err(Error::Config(format!(
                "DOCVAULT_STORE_URL must be an http(s) URL, got '{}'",
                self.store_url
            )));
        }
        Ok(())
    }
}

fn require_var(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::Config(format!(
            "missing required environment variable: {name}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            store_url: "https://store.example.com".into(),
            store_key: "key".into(),
            embedding_api_key: "key".into(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.into(),
            embedding_dims: DEFAULT_EMBEDDING_DIMS,
            embedding_base_url: DEFAULT_EMBEDDING_BASE_URL.into(),
            timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_dims() {
        let mut config = base_config();
        config.embedding_dims = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn validate_rejects_non_http_store_url() {
        let mut config = base_config();
        config.store_url = "postgres://localhost".into();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
