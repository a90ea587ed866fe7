//! Database layer.
//!
//! The Planner and Executor project an arbitrary, request-chosen subset of catalog fields and
//! join an arbitrary subset of enrichment tables, so a statically typed entity layer does not
//! fit this access path; the pool is a plain `sqlx::PgPool` and the Planner/Executor build and
//! bind SQL directly (see `paperforge-query-api`'s `planner`/`executor` modules).

pub mod models;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct DbPool {
    pool: PgPool,
}

impl DbPool {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!(pool_size = config.pool_size, "connecting to database");

        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .connect(&config.url)
            .await
            .map_err(|e| AppError::DatabaseUnavailable {
                message: format!("failed to connect: {e}"),
            })?;

        info!("database pool established");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseUnavailable {
                message: format!("ping failed: {e}"),
            })?;
        Ok(())
    }
}

/// Parse the Postgres point text form `"(x,y)"` into a two-element array.
///
/// This is the one place both the Executor's column post-processing (§4.4.4) and ingestion's
/// read-back paths need to agree on point parsing, so it lives in `common` rather than being
/// duplicated.
pub fn parse_point(text: &str) -> Option<[f64; 2]> {
    let trimmed = text.trim().trim_start_matches('(').trim_end_matches(')');
    let mut parts = trimmed.splitn(2, ',');
    let x: f64 = parts.next()?.trim().parse().ok()?;
    let y: f64 = parts.next()?.trim().parse().ok()?;
    if x.is_finite() && y.is_finite() {
        Some([x, y])
    } else {
        None
    }
}

/// Parse the pgvector text form `"[v1,v2,...]"` into a dense float vector.
pub fn parse_vector(text: &str) -> Option<Vec<f32>> {
    let trimmed = text.trim().trim_start_matches('[').trim_end_matches(']');
    if trimmed.is_empty() {
        return Some(Vec::new());
    }
    trimmed
        .split(',')
        .map(|s| s.trim().parse::<f32>().ok())
        .collect()
}

/// Format a dense embedding as the vector extension's accepted string-literal form, ready to be
/// bound as `'[v1,v2,...]'::vector`.
pub fn format_embedding_literal(embedding: &[f32]) -> String {
    let mut out = String::with_capacity(embedding.len() * 12 + 2);
    out.push('[');
    for (i, v) in embedding.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&v.to_string());
    }
    out.push(']');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_postgres_point_text() {
        assert_eq!(parse_point("(1.5,-2.25)"), Some([1.5, -2.25]));
        assert_eq!(parse_point(" (0,0) "), Some([0.0, 0.0]));
    }

    #[test]
    fn rejects_malformed_point_text() {
        assert_eq!(parse_point("not-a-point"), None);
        assert_eq!(parse_point("(1.5)"), None);
    }

    #[test]
    fn parses_pgvector_text() {
        assert_eq!(parse_vector("[0.1,0.2,0.3]"), Some(vec![0.1, 0.2, 0.3]));
        assert_eq!(parse_vector("[]"), Some(vec![]));
    }

    #[test]
    fn formats_embedding_literal_round_trips() {
        let embedding = vec![0.1f32, 0.2, 0.3];
        let literal = format_embedding_literal(&embedding);
        assert_eq!(literal, "[0.1,0.2,0.3]");
        assert_eq!(parse_vector(&literal).unwrap(), embedding);
    }
}
