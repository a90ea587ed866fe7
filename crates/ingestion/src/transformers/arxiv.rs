//! arXiv transformer (§4.2), grounded on the historical arXiv OAI/Atom ingester: records arrive
//! pre-parsed to `{id, title, abstract, authors, categories, created, doi, journal_ref}`.

use super::{
    acceptable, combined_text, normalize_date, sanitize_text, truncate_title, ArxivFields, EnrichmentPayload,
    Transform, TransformError, TransformedRecord,
};
use paperforge_common::db::models::PaperUpsert;
use serde_json::Value;

pub struct ArxivTransform;

/// arXiv ids carry a version suffix (`2301.12345v2`); the canonical source_id drops it so
/// re-ingesting a new version upserts the same row rather than creating a duplicate.
fn normalize_arxiv_id(raw_id: &str) -> String {
    match raw_id.rsplit_once('v') {
        Some((base, version)) if version.chars().all(|c| c.is_ascii_digit()) && !version.is_empty() => base.to_string(),
        _ => raw_id.to_string(),
    }
}

fn extract_categories(raw: &Value) -> Vec<String> {
    raw.get("categories")
        .and_then(Value::as_array)
        .map(|cats| cats.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

impl Transform for ArxivTransform {
    fn source_name(&self) -> &'static str {
        "arxiv"
    }

    fn accept(&self, raw: &Value) -> bool {
        let title = raw.get("title").and_then(Value::as_str).unwrap_or("");
        let source_id = raw.get("id").and_then(Value::as_str).unwrap_or("");
        acceptable(title, source_id, None, &[])
    }

    fn transform(&self, raw: &Value) -> Result<TransformedRecord, TransformError> {
        let raw_id = raw
            .get("id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TransformError::Rejected {
                reason: "missing id".into(),
            })?;
        let source_id = normalize_arxiv_id(raw_id);

        let title = truncate_title(&sanitize_text(raw.get("title").and_then(Value::as_str).unwrap_or("")));
        if title.chars().count() < 5 {
            return Err(TransformError::Rejected {
                reason: "title too short after sanitization".into(),
            });
        }

        let abstract_text = raw
            .get("abstract")
            .and_then(Value::as_str)
            .map(sanitize_text)
            .filter(|s| !s.is_empty());

        let authors: Vec<String> = raw
            .get("authors")
            .and_then(Value::as_array)
            .map(|authors| {
                authors
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let primary_date = normalize_date(raw.get("created").and_then(Value::as_str));
        let doi = raw.get("doi").and_then(Value::as_str).map(str::to_string);

        let categories = extract_categories(raw);
        let primary_category = categories.first().cloned();
        let category = (!categories.is_empty()).then(|| categories.join(", "));
        let journal_ref = raw.get("journal_ref").and_then(Value::as_str).map(str::to_string);

        let combined = combined_text(&title, abstract_text.as_deref());

        Ok(TransformedRecord {
            paper: PaperUpsert {
                source: "arxiv".to_string(),
                source_id,
                title,
                abstract_text,
                authors,
                primary_date,
                doi,
                links: None,
                embedding: None,
            },
            combined_text: combined,
            enrichment: EnrichmentPayload::Arxiv(ArxivFields {
                category,
                primary_category,
                journal_ref,
                comment: raw.get("comment").and_then(Value::as_str).map(str::to_string),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_version_suffix_from_source_id() {
        assert_eq!(normalize_arxiv_id("2301.12345v2"), "2301.12345");
        assert_eq!(normalize_arxiv_id("2301.12345"), "2301.12345");
    }

    #[test]
    fn transform_extracts_primary_category_from_first_entry() {
        let raw = json!({
            "id": "2301.12345v1",
            "title": "Deep Learning for Spatial Search",
            "abstract": "We study spatial retrieval.",
            "authors": ["Ada Lovelace", "Alan Turing"],
            "categories": ["cs.LG", "cs.AI"],
            "created": "2023-01-15",
        });
        let record = ArxivTransform.transform(&raw).unwrap();
        assert_eq!(record.paper.source_id, "2301.12345");
        match record.enrichment {
            EnrichmentPayload::Arxiv(fields) => {
                assert_eq!(fields.primary_category.as_deref(), Some("cs.LG"));
                assert_eq!(fields.category.as_deref(), Some("cs.LG, cs.AI"));
            }
            _ => panic!("expected arxiv enrichment"),
        }
    }

    #[test]
    fn rejects_missing_title() {
        let raw = json!({"id": "2301.12345", "title": ""});
        assert!(!ArxivTransform.accept(&raw));
    }
}
