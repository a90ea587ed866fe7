//! Per-source transformers (§4.2): pure `source_record -> canonical row` functions, one per
//! source, each implementing a common `Transform` trait so the streaming pipeline driver stays
//! source-agnostic.

pub mod arxiv;
pub mod extpub;
pub mod openalex;
pub mod randpub;
mod sanitize;

pub use sanitize::{combined_text, flatten_abstract_index, normalize_date, sanitize_text, truncate_title};

use paperforge_common::db::models::PaperUpsert;
use serde_json::Value;
use thiserror::Error;

/// The canonical row plus the source-specific enrichment fields carried alongside it, plus the
/// text actually fed to the embedding service (title+abstract, not stored as a column).
#[derive(Debug, Clone)]
pub struct TransformedRecord {
    pub paper: PaperUpsert,
    pub combined_text: String,
    pub enrichment: EnrichmentPayload,
}

/// Source-specific enrichment row, upserted into its own table keyed on `paper_id`. `None` for a
/// source with no enrichment table of its own.
#[derive(Debug, Clone)]
pub enum EnrichmentPayload {
    None,
    Randpub(RandpubFields),
    Extpub(ExtpubFields),
    Arxiv(ArxivFields),
}

#[derive(Debug, Clone, Default)]
pub struct RandpubFields {
    pub doi: Option<String>,
    pub marc_id: Option<String>,
    pub processing_date: Option<String>,
    pub source_type: Option<String>,
    pub document_type: Option<String>,
    pub rand_project: Option<String>,
    pub local_call_number: Option<String>,
    pub funding_info: Option<String>,
    pub corporate_names: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ExtpubFields {
    pub doi: Option<String>,
    pub publisher: Option<String>,
    pub journal_name: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ArxivFields {
    pub category: Option<String>,
    pub primary_category: Option<String>,
    pub journal_ref: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("record rejected: {reason}")]
    Rejected { reason: String },
}

/// Shared acceptance rule (§4.2): non-empty sanitized title of at least 5 characters, a non-empty
/// source id, and a declared type outside the source's blocklist (`blocklist` is empty for
/// sources with no such concept).
pub fn acceptable(title: &str, source_id: &str, declared_type: Option<&str>, blocklist: &[&str]) -> bool {
    if title.trim().chars().count() < 5 {
        return false;
    }
    if source_id.trim().is_empty() {
        return false;
    }
    if let Some(declared_type) = declared_type {
        if blocklist.contains(&declared_type) {
            return false;
        }
    }
    true
}

/// A pure transform from one source's raw JSON record to a canonical row. `accept` implements
/// the per-source acceptance criteria (§4.2); `transform` is only ever called on a record that
/// `accept` returned true for, but still returns `Result` since sanitization/extraction can fail
/// in ways acceptance doesn't pre-check (e.g. a malformed nested structure).
pub trait Transform: Send + Sync {
    fn source_name(&self) -> &'static str;
    fn accept(&self, raw: &Value) -> bool;
    fn transform(&self, raw: &Value) -> Result<TransformedRecord, TransformError>;
}

/// Look up the transformer for a source name, the pipeline's one point of source-to-transformer
/// dispatch.
pub fn for_source(name: &str) -> Option<Box<dyn Transform>> {
    match name {
        "openalex" => Some(Box::new(openalex::OpenAlexTransform)),
        "arxiv" => Some(Box::new(arxiv::ArxivTransform)),
        "randpub" => Some(Box::new(randpub::RandpubTransform)),
        "extpub" => Some(Box::new(extpub::ExtpubTransform)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_source_resolves_every_enabled_source() {
        for name in ["openalex", "arxiv", "randpub", "extpub"] {
            assert!(for_source(name).is_some(), "{name} should resolve to a transformer");
        }
    }

    #[test]
    fn for_source_rejects_unknown_source() {
        assert!(for_source("not-a-source").is_none());
    }
}
