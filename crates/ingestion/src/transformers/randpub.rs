//! RAND publications transformer (§4.2). No historical source example exists for this feed; the
//! extraction shape follows `openalex.rs`'s idiom (plain field lookups, same sanitize/accept
//! rules) against the `randpub_metadata` enrichment columns the catalog already names.

use super::{
    acceptable, combined_text, normalize_date, sanitize_text, truncate_title, EnrichmentPayload, RandpubFields,
    Transform, TransformError, TransformedRecord,
};
use paperforge_common::db::models::PaperUpsert;
use serde_json::Value;

pub struct RandpubTransform;

fn str_field<'a>(raw: &'a Value, key: &str) -> Option<&'a str> {
    raw.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

impl Transform for RandpubTransform {
    fn source_name(&self) -> &'static str {
        "randpub"
    }

    fn accept(&self, raw: &Value) -> bool {
        let title = raw.get("title").and_then(Value::as_str).unwrap_or("");
        let source_id = raw.get("marc_id").and_then(Value::as_str).unwrap_or("");
        acceptable(title, source_id, None, &[])
    }

    fn transform(&self, raw: &Value) -> Result<TransformedRecord, TransformError> {
        let source_id = str_field(raw, "marc_id")
            .ok_or_else(|| TransformError::Rejected {
                reason: "missing marc_id".into(),
            })?
            .to_string();

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

        let primary_date = normalize_date(raw.get("processing_date").and_then(Value::as_str));
        let doi = str_field(raw, "doi").map(str::to_string);

        let combined = combined_text(&title, abstract_text.as_deref());

        Ok(TransformedRecord {
            paper: PaperUpsert {
                source: "randpub".to_string(),
                source_id: source_id.clone(),
                title,
                abstract_text,
                authors,
                primary_date,
                doi: doi.clone(),
                links: None,
                embedding: None,
            },
            combined_text: combined,
            enrichment: EnrichmentPayload::Randpub(RandpubFields {
                doi,
                marc_id: Some(source_id),
                processing_date: str_field(raw, "processing_date").map(str::to_string),
                source_type: str_field(raw, "source_type").map(str::to_string),
                document_type: str_field(raw, "document_type").map(str::to_string),
                rand_project: str_field(raw, "rand_project").map(str::to_string),
                local_call_number: str_field(raw, "local_call_number").map(str::to_string),
                funding_info: str_field(raw, "funding_info").map(str::to_string),
                corporate_names: str_field(raw, "corporate_names").map(str::to_string),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transform_carries_marc_id_into_both_canonical_and_enrichment_rows() {
        let raw = json!({
            "marc_id": "RAND-12345",
            "title": "Assessing Supply Chain Resilience",
            "rand_project": "RC-100",
            "document_type": "report",
        });
        let record = RandpubTransform.transform(&raw).unwrap();
        assert_eq!(record.paper.source_id, "RAND-12345");
        match record.enrichment {
            EnrichmentPayload::Randpub(fields) => {
                assert_eq!(fields.marc_id.as_deref(), Some("RAND-12345"));
                assert_eq!(fields.rand_project.as_deref(), Some("RC-100"));
            }
            _ => panic!("expected randpub enrichment"),
        }
    }

    #[test]
    fn rejects_missing_marc_id() {
        let raw = json!({"title": "A sufficiently long title"});
        assert!(!RandpubTransform.accept(&raw));
    }
}
