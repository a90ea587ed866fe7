//! External publications transformer (§4.2). No historical source example exists for this feed
//! either; grounded in the same idiom as `randpub.rs` against the `extpub_metadata` columns.

use super::{
    acceptable, combined_text, normalize_date, sanitize_text, truncate_title, EnrichmentPayload, ExtpubFields,
    Transform, TransformError, TransformedRecord,
};
use paperforge_common::db::models::PaperUpsert;
use serde_json::Value;

pub struct ExtpubTransform;

fn str_field<'a>(raw: &'a Value, key: &str) -> Option<&'a str> {
    raw.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

impl Transform for ExtpubTransform {
    fn source_name(&self) -> &'static str {
        "extpub"
    }

    fn accept(&self, raw: &Value) -> bool {
        let title = raw.get("title").and_then(Value::as_str).unwrap_or("");
        let source_id = raw.get("external_id").and_then(Value::as_str).unwrap_or("");
        acceptable(title, source_id, None, &[])
    }

    fn transform(&self, raw: &Value) -> Result<TransformedRecord, TransformError> {
        let source_id = str_field(raw, "external_id")
            .ok_or_else(|| TransformError::Rejected {
                reason: "missing external_id".into(),
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

        let primary_date = normalize_date(raw.get("publication_date").and_then(Value::as_str));
        let doi = str_field(raw, "doi").map(str::to_string);

        let combined = combined_text(&title, abstract_text.as_deref());

        Ok(TransformedRecord {
            paper: PaperUpsert {
                source: "extpub".to_string(),
                source_id,
                title,
                abstract_text,
                authors,
                primary_date,
                doi: doi.clone(),
                links: None,
                embedding: None,
            },
            combined_text: combined,
            enrichment: EnrichmentPayload::Extpub(ExtpubFields {
                doi,
                publisher: str_field(raw, "publisher").map(str::to_string),
                journal_name: str_field(raw, "journal_name").map(str::to_string),
                volume: str_field(raw, "volume").map(str::to_string),
                issue: str_field(raw, "issue").map(str::to_string),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transform_carries_journal_fields_into_enrichment_row() {
        let raw = json!({
            "external_id": "EXT-998",
            "title": "Climate Policy and Trade Dynamics",
            "publisher": "Acme Press",
            "journal_name": "Journal of Policy Studies",
            "volume": "12",
            "issue": "3",
        });
        let record = ExtpubTransform.transform(&raw).unwrap();
        match record.enrichment {
            EnrichmentPayload::Extpub(fields) => {
                assert_eq!(fields.publisher.as_deref(), Some("Acme Press"));
                assert_eq!(fields.volume.as_deref(), Some("12"));
            }
            _ => panic!("expected extpub enrichment"),
        }
    }

    #[test]
    fn rejects_missing_external_id() {
        let raw = json!({"title": "A sufficiently long title"});
        assert!(!ExtpubTransform.accept(&raw));
    }
}
