//! The Query Executor (§4.4): embedding acquisition, SQL execution, adaptive counting, and
//! result post-processing. Where the Planner is pure and synchronous, the Executor is where all
//! I/O (database, embedding service) actually happens.

mod count;
pub(crate) mod rows;

use crate::planner::{self, BindParam, CompiledQuery, FilterRequest, PlannerOptions};
use paperforge_common::cache::EmbeddingCache;
use paperforge_common::db::DbPool;
use paperforge_common::embeddings::Embedder;
use paperforge_common::errors::{AppError, Result};
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::Postgres;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Everything the Executor needs that isn't part of a single request: the pool, the embedder,
/// the shared embedding cache, and the deployment-configured planner options and timeouts.
#[derive(Clone)]
pub struct ExecutorContext {
    pub db: DbPool,
    pub embedder: Arc<dyn Embedder>,
    pub cache: Arc<EmbeddingCache>,
    pub options: PlannerOptions,
    pub count_timeout: Duration,
    pub main_query_timeout: Duration,
}

/// Result of running a `list_papers`-shaped request end to end.
pub struct ExecutionResult {
    pub results: Vec<Map<String, Value>>,
    pub total_count: i64,
    pub total_count_is_estimate: bool,
    pub warnings: Vec<String>,
    pub query: String,
    pub count_query: Option<String>,
    pub execution_time_ms: u64,
    pub query_execution_time_ms: u64,
    pub count_query_execution_time_ms: u64,
}

pub async fn execute(mut request: FilterRequest, ctx: &ExecutorContext) -> Result<ExecutionResult> {
    let overall_start = Instant::now();
    let mut warnings = Vec::new();

    let embedding = match &request.search_text {
        Some(text) => match resolve_embedding(text, ctx).await {
            Ok(embedding) => Some(embedding),
            Err(err) => {
                warn!(error = %err, "embedding service degraded, continuing without semantic ranking");
                warnings.push(format!(
                    "semantic search unavailable ({err}); results are not ranked by similarity"
                ));
                request.search_text = None;
                None
            }
        },
        None => None,
    };

    let compiled = planner::compile(&request, embedding.as_deref(), &ctx.options)?;

    let main_start = Instant::now();
    let raw_rows = run_main_query(ctx, &compiled).await?;
    let query_execution_time_ms = main_start.elapsed().as_millis() as u64;

    let rows::ExtractedRows { mut results, dropped } = rows::extract_rows(&raw_rows, &compiled.fields);
    if dropped > 0 {
        warnings.push(format!("{dropped} row(s) dropped due to malformed column data"));
    }

    let (total_count, total_count_is_estimate, count_query_execution_time_ms) = if compiled.is_semantic {
        let threshold = request.similarity_threshold;
        results.retain(|row| row_similarity(row) >= threshold);
        let filtered_total = results.len() as i64;
        results.truncate(request.limit as usize);
        (filtered_total, true, 0)
    } else {
        let count_start = Instant::now();
        let (total, is_estimate) = count::adaptive_count(&ctx.db, &compiled, ctx.count_timeout).await;
        (total, is_estimate, count_start.elapsed().as_millis() as u64)
    };

    warnings.extend(compiled.warnings.clone());

    info!(
        strategy = ?compiled.strategy,
        rows = results.len(),
        total_count,
        is_estimate = total_count_is_estimate,
        query_ms = query_execution_time_ms,
        "query executed"
    );

    Ok(ExecutionResult {
        results,
        total_count,
        total_count_is_estimate,
        warnings,
        query: compiled.sql.clone(),
        count_query: compiled.count_sql.clone(),
        execution_time_ms: overall_start.elapsed().as_millis() as u64,
        query_execution_time_ms,
        count_query_execution_time_ms,
    })
}

fn row_similarity(row: &Map<String, Value>) -> f64 {
    row.get("similarity_score").and_then(Value::as_f64).unwrap_or(0.0)
}

/// Resolve `search_text` to an embedding, consulting the shared cache first (§4.4.1).
async fn resolve_embedding(text: &str, ctx: &ExecutorContext) -> Result<Vec<f32>> {
    if let Some(cached) = ctx.cache.get(text) {
        return Ok(cached);
    }
    let embedding = tokio::time::timeout(Duration::from_secs(10), ctx.embedder.embed(text))
        .await
        .map_err(|_| AppError::EmbeddingServiceUnavailable {
            message: "embedding request timed out".into(),
        })??;
    ctx.cache.put(text, embedding.clone());
    Ok(embedding)
}

async fn run_main_query(ctx: &ExecutorContext, compiled: &CompiledQuery) -> Result<Vec<PgRow>> {
    let mut tx = ctx.db.pool().begin().await?;
    set_statement_timeout(&mut tx, ctx.main_query_timeout).await?;

    let mut query = sqlx::query(&compiled.sql);
    query = bind_params(query, &compiled.params);

    let rows = query.fetch_all(&mut *tx).await.map_err(map_main_query_error)?;
    tx.commit().await?;
    Ok(rows)
}

async fn set_statement_timeout(tx: &mut sqlx::Transaction<'_, Postgres>, timeout: Duration) -> Result<()> {
    let sql = format!("SET LOCAL statement_timeout = {}", timeout.as_millis());
    sqlx::query(&sql).execute(&mut **tx).await?;
    Ok(())
}

fn map_main_query_error(err: sqlx::Error) -> AppError {
    if is_statement_timeout(&err) {
        AppError::QueryTimeout
    } else {
        AppError::from(err)
    }
}

/// Postgres SQLSTATE `57014` is `query_canceled`, raised when `statement_timeout` fires.
fn is_statement_timeout(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("57014"))
}

pub(crate) fn bind_params<'q>(
    mut query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    params: &'q [BindParam],
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    for param in params {
        query = match param {
            BindParam::Text(s) => query.bind(s),
            BindParam::Int(i) => query.bind(i),
            BindParam::Float(f) => query.bind(f),
            BindParam::Date(d) => query.bind(d),
        };
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_similarity_defaults_to_zero_when_absent() {
        let row = Map::new();
        assert_eq!(row_similarity(&row), 0.0);
    }

    #[test]
    fn row_similarity_reads_the_computed_column() {
        let mut row = Map::new();
        row.insert("similarity_score".to_string(), serde_json::json!(0.87));
        assert_eq!(row_similarity(&row), 0.87);
    }
}
