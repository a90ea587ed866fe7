//! Configuration loading for the query engine and ingestion binaries.
//!
//! Every variable listed here is required. Unlike a development-convenience loader that
//! defaults every field, `AppConfig::load()` fails the moment one is missing or fails to parse,
//! so a misconfigured deployment never starts serving requests with a silently wrong default.

use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    pub query: QueryConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// PORT
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// DB_URL
    pub url: String,
    /// DB_POOL_SIZE
    pub pool_size: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// EMBEDDING_SERVICE_URL
    pub service_url: String,
    /// EMBEDDING_API_KEY
    pub api_key: String,
    /// EMBEDDING_MODEL
    pub model: String,
    /// EMBEDDING_DIM
    pub dimension: usize,
    /// EMBEDDING_CACHE_TTL_SECONDS
    pub cache_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    /// ENABLED_SOURCES, comma-separated
    pub enabled_sources: Vec<String>,
    /// MAX_LIMIT
    pub max_limit: u32,
    /// COUNT_TIMEOUT_MS
    pub count_timeout_ms: u64,
    /// MAIN_QUERY_TIMEOUT_MS
    pub main_query_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// LOG_LEVEL
    pub log_level: String,
}

/// Names of every environment variable `AppConfig::load()` requires. Kept in one place so a
/// missing-variable error message can point at the exact name the deployment needs to set.
const REQUIRED_VARS: &[&str] = &[
    "DB_URL",
    "DB_POOL_SIZE",
    "EMBEDDING_SERVICE_URL",
    "EMBEDDING_API_KEY",
    "EMBEDDING_MODEL",
    "EMBEDDING_DIM",
    "EMBEDDING_CACHE_TTL_SECONDS",
    "ENABLED_SOURCES",
    "MAX_LIMIT",
    "COUNT_TIMEOUT_MS",
    "MAIN_QUERY_TIMEOUT_MS",
    "LOG_LEVEL",
    "PORT",
];

impl AppConfig {
    /// Load configuration from the process environment (with an optional local `.env` as a
    /// convenience overlay). Fails hard: a missing or unparsable required variable is an error,
    /// never a default.
    pub fn load() -> Result<Self, ConfigError> {
        // dotenvy only fills in variables not already set in the real environment, so real
        // deployment env vars always win over a stray .env left in the working directory.
        dotenvy::dotenv().ok();

        for name in REQUIRED_VARS {
            if std::env::var(name).is_err() {
                return Err(ConfigError::NotFound(format!(
                    "required environment variable {name} is not set"
                )));
            }
        }

        let enabled_sources = std::env::var("ENABLED_SOURCES")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();
        if enabled_sources.is_empty() {
            return Err(ConfigError::Message(
                "ENABLED_SOURCES must name at least one source".into(),
            ));
        }

        let raw = Config::builder()
            .add_source(Environment::default().try_parsing(true))
            .build()?;

        let port: u16 = raw
            .get_string("port")?
            .parse()
            .map_err(|e| ConfigError::Message(format!("PORT: {e}")))?;
        let pool_size: u32 = raw
            .get_string("db_pool_size")?
            .parse()
            .map_err(|e| ConfigError::Message(format!("DB_POOL_SIZE: {e}")))?;
        let dimension: usize = raw
            .get_string("embedding_dim")?
            .parse()
            .map_err(|e| ConfigError::Message(format!("EMBEDDING_DIM: {e}")))?;
        let cache_ttl_seconds: u64 = raw
            .get_string("embedding_cache_ttl_seconds")?
            .parse()
            .map_err(|e| ConfigError::Message(format!("EMBEDDING_CACHE_TTL_SECONDS: {e}")))?;
        let max_limit: u32 = raw
            .get_string("max_limit")?
            .parse()
            .map_err(|e| ConfigError::Message(format!("MAX_LIMIT: {e}")))?;
        let count_timeout_ms: u64 = raw
            .get_string("count_timeout_ms")?
            .parse()
            .map_err(|e| ConfigError::Message(format!("COUNT_TIMEOUT_MS: {e}")))?;
        let main_query_timeout_ms: u64 = raw
            .get_string("main_query_timeout_ms")?
            .parse()
            .map_err(|e| ConfigError::Message(format!("MAIN_QUERY_TIMEOUT_MS: {e}")))?;

        Ok(AppConfig {
            server: ServerConfig { port },
            database: DatabaseConfig {
                url: raw.get_string("db_url")?,
                pool_size,
            },
            embedding: EmbeddingConfig {
                service_url: raw.get_string("embedding_service_url")?,
                api_key: raw.get_string("embedding_api_key")?,
                model: raw.get_string("embedding_model")?,
                dimension,
                cache_ttl_seconds,
            },
            query: QueryConfig {
                enabled_sources,
                max_limit,
                count_timeout_ms,
                main_query_timeout_ms,
            },
            observability: ObservabilityConfig {
                log_level: raw.get_string("log_level")?,
            },
        })
    }

    pub fn count_timeout(&self) -> Duration {
        Duration::from_millis(self.query.count_timeout_ms)
    }

    pub fn main_query_timeout(&self) -> Duration {
        Duration::from_millis(self.query.main_query_timeout_ms)
    }

    pub fn embedding_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.embedding.cache_ttl_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment-variable mutation is process-global; serialize these tests so they don't
    // stomp on each other when run concurrently.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn set_all_required() {
        std::env::set_var("DB_URL", "postgres://localhost/docexplorer");
        std::env::set_var("DB_POOL_SIZE", "20");
        std::env::set_var("EMBEDDING_SERVICE_URL", "https://embeddings.example.com/v1");
        std::env::set_var("EMBEDDING_API_KEY", "test-key");
        std::env::set_var("EMBEDDING_MODEL", "text-embedding-3-small");
        std::env::set_var("EMBEDDING_DIM", "1536");
        std::env::set_var("EMBEDDING_CACHE_TTL_SECONDS", "3600");
        std::env::set_var("ENABLED_SOURCES", "openalex,arxiv,randpub,extpub");
        std::env::set_var("MAX_LIMIT", "50000");
        std::env::set_var("COUNT_TIMEOUT_MS", "1200");
        std::env::set_var("MAIN_QUERY_TIMEOUT_MS", "5000");
        std::env::set_var("LOG_LEVEL", "info");
        std::env::set_var("PORT", "8080");
    }

    #[test]
    fn loads_when_all_required_vars_present() {
        let _guard = ENV_LOCK.lock().unwrap();
        set_all_required();
        let config = AppConfig::load().expect("should load with all vars set");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.embedding.dimension, 1536);
        assert_eq!(config.query.enabled_sources.len(), 4);
    }

    #[test]
    fn fails_hard_on_missing_required_var() {
        let _guard = ENV_LOCK.lock().unwrap();
        set_all_required();
        std::env::remove_var("EMBEDDING_API_KEY");
        let result = AppConfig::load();
        assert!(result.is_err());
        std::env::set_var("EMBEDDING_API_KEY", "test-key");
    }
}
