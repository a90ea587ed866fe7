//! Ingestion pipeline binary (§4.2).
//!
//! Usage: `ingestion <source> <path>`, where `<source>` is one of `openalex`, `arxiv`, `randpub`,
//! `extpub`, and `<path>` is a newline-delimited JSON file, or `-` to read from stdin. Each line
//! is one raw source record; malformed lines are silently skipped, matching the historical
//! ingesters' behavior.

mod errors;
mod pipeline;
mod transformers;

use errors::IngestionError;
use futures::stream::{self, Stream};
use paperforge_common::{
    cache::EmbeddingCache,
    config::AppConfig,
    db::DbPool,
    embeddings::create_embedder,
    metrics,
};
use pipeline::IngestionPipeline;
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{error, info, Level};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt().with_max_level(Level::INFO).with_target(true).json().init();

    info!("starting ingestion v{}", paperforge_common::VERSION);

    let mut args = std::env::args().skip(1);
    let source = args.next().ok_or("usage: ingestion <source> <path|->")?;
    let path = args.next().ok_or("usage: ingestion <source> <path|->")?;

    let transform = transformers::for_source(&source).ok_or_else(|| format!("unknown source: {source}"))?;

    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "failed to load configuration");
        e
    })?;

    metrics::register_metrics();

    let db = DbPool::new(&config.database).await?;
    let embedder = create_embedder(
        config.embedding.service_url.clone(),
        config.embedding.api_key.clone(),
        config.embedding.model.clone(),
        config.embedding.dimension,
    );
    let cache = Arc::new(EmbeddingCache::new(config.embedding_cache_ttl()));

    let records = open_record_stream(&path).await?;

    let pipeline = IngestionPipeline::new(db, embedder, cache);
    let report = pipeline.run(transform.as_ref(), records).await?;

    if report.errors > 0 {
        error!(
            total = report.total,
            processed = report.processed,
            errors = report.errors,
            "ingestion run completed with rejected records"
        );
    } else {
        info!(total = report.total, processed = report.processed, "ingestion run completed");
    }

    Ok(())
}

async fn open_record_stream(path: &str) -> Result<Pin<Box<dyn Stream<Item = Value> + Send>>, IngestionError> {
    if path == "-" {
        let reader = BufReader::new(tokio::io::stdin());
        return Ok(Box::pin(record_stream(reader)));
    }
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| IngestionError::Source(format!("failed to open {path}: {e}")))?;
    Ok(Box::pin(record_stream(BufReader::new(file))))
}

/// Adapt a line-oriented reader into a stream of parsed JSON records, skipping blank and
/// malformed lines without surfacing an error (matching the historical gzipped-JSONL ingesters,
/// which silently drop unreadable lines rather than abort the run).
fn record_stream<R>(reader: R) -> impl Stream<Item = Value>
where
    R: AsyncBufRead + Unpin,
{
    stream::unfold(reader.lines(), |mut lines| async move {
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Value>(trimmed) {
                        Ok(value) => return Some((value, lines)),
                        Err(_) => continue,
                    }
                }
                Ok(None) | Err(_) => return None,
            }
        }
    })
}
