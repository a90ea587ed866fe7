//! Streaming batch ingestion pipeline (§4.2): `stream source records -> filter -> transform ->
//! validate -> batch -> upsert`. Restartable at batch granularity; a batch either writes in full
//! or not at all.

use crate::errors::IngestionError;
use crate::transformers::{EnrichmentPayload, Transform, TransformedRecord};
use futures::{Stream, StreamExt};
use paperforge_common::cache::EmbeddingCache;
use paperforge_common::db::{format_embedding_literal, DbPool};
use paperforge_common::embeddings::Embedder;
use paperforge_common::metrics::record_ingestion;
use serde_json::Value;
use sqlx::{Postgres, Transaction};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Per-batch outcome, per §4.2's `{total, processed, errors}` report.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub total: usize,
    pub processed: usize,
    pub errors: usize,
}

impl BatchReport {
    fn accumulate(&mut self, other: &BatchReport) {
        self.total += other.total;
        self.processed += other.processed;
        self.errors += other.errors;
    }
}

pub struct IngestionPipeline {
    db: DbPool,
    embedder: Arc<dyn Embedder>,
    cache: Arc<EmbeddingCache>,
    batch_size: usize,
}

impl IngestionPipeline {
    pub fn new(db: DbPool, embedder: Arc<dyn Embedder>, cache: Arc<EmbeddingCache>) -> Self {
        Self {
            db,
            embedder,
            cache,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Drain a stream of raw source records, accumulating and writing one batch at a time.
    pub async fn run(
        &self,
        transform: &dyn Transform,
        mut records: impl Stream<Item = Value> + Unpin,
    ) -> Result<BatchReport, IngestionError> {
        let mut total_report = BatchReport::default();
        let mut batch: Vec<Value> = Vec::with_capacity(self.batch_size);

        while let Some(record) = records.next().await {
            batch.push(record);
            if batch.len() >= self.batch_size {
                let report = self.process_batch(transform, std::mem::take(&mut batch)).await?;
                total_report.accumulate(&report);
            }
        }
        if !batch.is_empty() {
            let report = self.process_batch(transform, batch).await?;
            total_report.accumulate(&report);
        }

        Ok(total_report)
    }

    #[instrument(skip(self, transform, raw_records), fields(source = transform.source_name()))]
    async fn process_batch(&self, transform: &dyn Transform, raw_records: Vec<Value>) -> Result<BatchReport, IngestionError> {
        let total = raw_records.len();
        let mut rejected = 0usize;
        let mut transformed = Vec::with_capacity(total);

        for raw in &raw_records {
            if !transform.accept(raw) {
                rejected += 1;
                continue;
            }
            match transform.transform(raw) {
                Ok(record) => transformed.push(record),
                Err(_) => rejected += 1,
            }
        }

        let mut with_embeddings = Vec::with_capacity(transformed.len());
        for mut record in transformed {
            record.paper.embedding = self.resolve_embedding(&record.combined_text).await;
            with_embeddings.push(record);
        }

        let processed = with_embeddings.len();

        match self.upsert_batch(&with_embeddings).await {
            Ok(()) => {
                if rejected > 0 {
                    warn!(total, processed, rejected, "batch completed with rejected records");
                } else {
                    info!(total, processed, "batch completed");
                }
                record_ingestion(transform.source_name(), processed, rejected, 0);
                Ok(BatchReport {
                    total,
                    processed,
                    errors: rejected,
                })
            }
            Err(e) => {
                record_ingestion(transform.source_name(), 0, rejected, 1);
                Err(e)
            }
        }
    }

    /// Best-effort embedding resolution: a cache hit or a successful call returns `Some`; a
    /// permanent failure returns `None` rather than failing the record (§4.2 — acceptance is not
    /// embedding-gated). The embedder itself already retries transient failures with exponential
    /// backoff (3 attempts, base delay 100ms, doubling) before giving up.
    async fn resolve_embedding(&self, combined_text: &str) -> Option<Vec<f32>> {
        if let Some(cached) = self.cache.get(combined_text) {
            return Some(cached);
        }
        match self.embedder.embed(combined_text).await {
            Ok(embedding) => {
                self.cache.put(combined_text, embedding.clone());
                Some(embedding)
            }
            Err(e) => {
                warn!(error = %e, "embedding request failed permanently, inserting with null embedding");
                None
            }
        }
    }

    async fn upsert_batch(&self, records: &[TransformedRecord]) -> Result<(), IngestionError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.db.pool().begin().await?;

        for record in records {
            let paper = &record.paper;
            let embedding_literal = paper.embedding.as_deref().map(format_embedding_literal);

            let paper_id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO papers
                    (source, source_id, title, abstract_text, authors, primary_date, doi, links,
                     embedding, publication_year, updated_at)
                VALUES
                    ($1, $2, $3, $4, $5, $6, $7, $8, $9::vector,
                     EXTRACT(YEAR FROM $6::date)::int, now())
                ON CONFLICT (source, source_id) DO UPDATE SET
                    title = EXCLUDED.title,
                    abstract_text = EXCLUDED.abstract_text,
                    authors = EXCLUDED.authors,
                    primary_date = EXCLUDED.primary_date,
                    doi = EXCLUDED.doi,
                    links = EXCLUDED.links,
                    embedding = EXCLUDED.embedding,
                    publication_year = EXCLUDED.publication_year,
                    updated_at = now()
                RETURNING paper_id
                "#,
            )
            .bind(&paper.source)
            .bind(&paper.source_id)
            .bind(&paper.title)
            .bind(&paper.abstract_text)
            .bind(&paper.authors)
            .bind(paper.primary_date)
            .bind(&paper.doi)
            .bind(&paper.links)
            .bind(embedding_literal)
            .fetch_one(&mut *tx)
            .await?;

            upsert_enrichment(&mut tx, paper_id, &record.enrichment).await?;
        }

        tx.commit().await?;

        // Refresh policy per §3: concurrent refresh after each batch commits, staleness up to
        // one batch is acceptable. A failed refresh is logged, not fatal — the base table write
        // already succeeded.
        if let Err(e) = sqlx::query("REFRESH MATERIALIZED VIEW CONCURRENTLY papers_sorted_by_year")
            .execute(self.db.pool())
            .await
        {
            warn!(error = %e, "materialized view refresh failed, next query sees stale ordering");
        }

        Ok(())
    }
}

async fn upsert_enrichment(
    tx: &mut Transaction<'_, Postgres>,
    paper_id: Uuid,
    enrichment: &EnrichmentPayload,
) -> Result<(), IngestionError> {
    match enrichment {
        EnrichmentPayload::None => Ok(()),
        EnrichmentPayload::Randpub(fields) => {
            sqlx::query(
                r#"
                INSERT INTO randpub_metadata
                    (paper_id, doi, marc_id, processing_date, source_type, document_type,
                     rand_project, local_call_number, funding_info, corporate_names)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (paper_id) DO UPDATE SET
                    doi = EXCLUDED.doi,
                    marc_id = EXCLUDED.marc_id,
                    processing_date = EXCLUDED.processing_date,
                    source_type = EXCLUDED.source_type,
                    document_type = EXCLUDED.document_type,
                    rand_project = EXCLUDED.rand_project,
                    local_call_number = EXCLUDED.local_call_number,
                    funding_info = EXCLUDED.funding_info,
                    corporate_names = EXCLUDED.corporate_names
                "#,
            )
            .bind(paper_id)
            .bind(&fields.doi)
            .bind(&fields.marc_id)
            .bind(&fields.processing_date)
            .bind(&fields.source_type)
            .bind(&fields.document_type)
            .bind(&fields.rand_project)
            .bind(&fields.local_call_number)
            .bind(&fields.funding_info)
            .bind(&fields.corporate_names)
            .execute(&mut **tx)
            .await?;
            Ok(())
        }
        EnrichmentPayload::Extpub(fields) => {
            sqlx::query(
                r#"
                INSERT INTO extpub_metadata (paper_id, doi, publisher, journal_name, volume, issue)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (paper_id) DO UPDATE SET
                    doi = EXCLUDED.doi,
                    publisher = EXCLUDED.publisher,
                    journal_name = EXCLUDED.journal_name,
                    volume = EXCLUDED.volume,
                    issue = EXCLUDED.issue
                "#,
            )
            .bind(paper_id)
            .bind(&fields.doi)
            .bind(&fields.publisher)
            .bind(&fields.journal_name)
            .bind(&fields.volume)
            .bind(&fields.issue)
            .execute(&mut **tx)
            .await?;
            Ok(())
        }
        EnrichmentPayload::Arxiv(fields) => {
            sqlx::query(
                r#"
                INSERT INTO arxiv_metadata (paper_id, category, primary_category, journal_ref, comment)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (paper_id) DO UPDATE SET
                    category = EXCLUDED.category,
                    primary_category = EXCLUDED.primary_category,
                    journal_ref = EXCLUDED.journal_ref,
                    comment = EXCLUDED.comment
                "#,
            )
            .bind(paper_id)
            .bind(&fields.category)
            .bind(&fields.primary_category)
            .bind(&fields.journal_ref)
            .bind(&fields.comment)
            .execute(&mut **tx)
            .await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_report_accumulates_across_batches() {
        let mut total = BatchReport::default();
        total.accumulate(&BatchReport {
            total: 1000,
            processed: 950,
            errors: 50,
        });
        total.accumulate(&BatchReport {
            total: 500,
            processed: 480,
            errors: 20,
        });
        assert_eq!(total.total, 1500);
        assert_eq!(total.processed, 1430);
        assert_eq!(total.errors, 70);
    }
}
