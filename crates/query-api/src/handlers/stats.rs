//! `GET /stats` (§4.5): deliberately avoids `GROUP BY source` over the full table. Issues one
//! targeted `COUNT(*) WHERE source = $1` per configured source instead, and sorts in memory.

use axum::extract::State;
use axum::Json;
use paperforge_common::errors::Result;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct StatsResponse {
    pub total_papers: i64,
    pub papers_with_embeddings: i64,
    pub source_distribution: Vec<SourceCount>,
}

#[derive(Serialize)]
pub struct SourceCount {
    pub source: String,
    pub count: i64,
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let pool = state.db.pool();

    let total_papers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM papers").fetch_one(pool).await?;
    let papers_with_embeddings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM papers WHERE embedding IS NOT NULL")
        .fetch_one(pool)
        .await?;

    let mut source_distribution = Vec::with_capacity(state.executor.options.enabled_sources.len());
    for source in &state.executor.options.enabled_sources {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM papers WHERE source = $1")
            .bind(source)
            .fetch_one(pool)
            .await?;
        source_distribution.push(SourceCount {
            source: source.clone(),
            count,
        });
    }
    source_distribution.sort_by(|a, b| b.count.cmp(&a.count));

    Ok(Json(StatsResponse {
        total_papers,
        papers_with_embeddings,
        source_distribution,
    }))
}
