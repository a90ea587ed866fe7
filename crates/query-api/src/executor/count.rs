//! Adaptive count query (§4.4.3): exact count with a short timeout, falling back to a planner
//! row estimate via `EXPLAIN (FORMAT JSON)` on timeout or error. Never fatal to the request —
//! every failure here degrades to an estimate rather than propagating.

use crate::planner::{BindParam, CompiledQuery};
use paperforge_common::db::DbPool;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

/// Returns `(total, is_estimate)`. `compiled.count_sql` is `None` only for semantic strategies,
/// which never reach this function (the caller skips straight to the similarity post-filter
/// count, §4.4.5) — but an absent count query still degrades gracefully here rather than
/// panicking, in case that invariant ever drifts.
pub async fn adaptive_count(db: &DbPool, compiled: &CompiledQuery, timeout: Duration) -> (i64, bool) {
    let Some(count_sql) = compiled.count_sql.as_deref() else {
        return (0, false);
    };

    match run_exact_count(db, count_sql, &compiled.count_params, timeout).await {
        Ok(count) => (count, false),
        Err(err) => {
            warn!(error = %err, "count query timed out or failed, falling back to planner estimate");
            match run_explain_estimate(db, count_sql, &compiled.count_params).await {
                Ok(estimate) => (estimate, true),
                Err(err) => {
                    warn!(error = %err, "planner estimate also failed, reporting 0");
                    (0, true)
                }
            }
        }
    }
}

async fn run_exact_count(
    db: &DbPool,
    count_sql: &str,
    params: &[BindParam],
    timeout: Duration,
) -> Result<i64, sqlx::Error> {
    let mut tx = db.pool().begin().await?;
    sqlx::query(&format!("SET LOCAL statement_timeout = {}", timeout.as_millis()))
        .execute(&mut *tx)
        .await?;

    let mut query = sqlx::query_scalar::<_, i64>(count_sql);
    query = bind_scalar(query, params);
    let count = query.fetch_one(&mut *tx).await?;
    tx.commit().await?;
    Ok(count)
}

async fn run_explain_estimate(db: &DbPool, count_sql: &str, params: &[BindParam]) -> Result<i64, sqlx::Error> {
    let explain_sql = count_sql.replacen("SELECT COUNT(*)", "EXPLAIN (FORMAT JSON) SELECT 1", 1);

    let mut query = sqlx::query_scalar::<_, Value>(&explain_sql);
    query = bind_scalar_json(query, params);
    let plan = query.fetch_one(db.pool()).await?;

    Ok(extract_plan_rows(&plan))
}

/// `EXPLAIN (FORMAT JSON)` returns a single-element array of `{"Plan": {"Plan Rows": N, ...}}`.
fn extract_plan_rows(plan: &Value) -> i64 {
    plan.get(0)
        .and_then(|root| root.get("Plan"))
        .and_then(|node| node.get("Plan Rows").or_else(|| node.get("Rows")))
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

fn bind_scalar<'q>(
    mut query: sqlx::query::QueryScalar<'q, sqlx::Postgres, i64, sqlx::postgres::PgArguments>,
    params: &'q [BindParam],
) -> sqlx::query::QueryScalar<'q, sqlx::Postgres, i64, sqlx::postgres::PgArguments> {
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

fn bind_scalar_json<'q>(
    mut query: sqlx::query::QueryScalar<'q, sqlx::Postgres, Value, sqlx::postgres::PgArguments>,
    params: &'q [BindParam],
) -> sqlx::query::QueryScalar<'q, sqlx::Postgres, Value, sqlx::postgres::PgArguments> {
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
    use serde_json::json;

    #[test]
    fn extracts_plan_rows_from_explain_json() {
        let plan = json!([{"Plan": {"Node Type": "Seq Scan", "Plan Rows": 4821}}]);
        assert_eq!(extract_plan_rows(&plan), 4821);
    }

    #[test]
    fn falls_back_to_rows_key_when_plan_rows_absent() {
        let plan = json!([{"Plan": {"Rows": 12}}]);
        assert_eq!(extract_plan_rows(&plan), 12);
    }

    #[test]
    fn malformed_plan_json_yields_zero() {
        assert_eq!(extract_plan_rows(&json!({})), 0);
    }
}
