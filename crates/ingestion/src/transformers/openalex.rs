//! OpenAlex transformer (§4.2), grounded on the historical `transform_openalex_work` pipeline:
//! flatten the inverted abstract index, sanitize title/abstract, extract authors from
//! `authorships[].author.display_name`, normalize the publication date.

use super::{
    acceptable, combined_text, flatten_abstract_index, normalize_date, sanitize_text, truncate_title,
    EnrichmentPayload, Transform, TransformError, TransformedRecord,
};
use paperforge_common::db::models::PaperUpsert;
use serde_json::Value;
use std::collections::HashMap;

const BLOCKLIST: &[&str] = &["dataset", "software", "other"];

pub struct OpenAlexTransform;

fn extract_authors(raw: &Value) -> Vec<String> {
    raw.get("authorships")
        .and_then(Value::as_array)
        .map(|authorships| {
            authorships
                .iter()
                .filter_map(|authorship| authorship.get("author")?.get("display_name")?.as_str())
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn extract_abstract(raw: &Value) -> Option<String> {
    let index_value = raw.get("abstract_inverted_index")?;
    let index: HashMap<String, Vec<u32>> = serde_json::from_value(index_value.clone()).ok()?;
    flatten_abstract_index(&index)
}

impl Transform for OpenAlexTransform {
    fn source_name(&self) -> &'static str {
        "openalex"
    }

    fn accept(&self, raw: &Value) -> bool {
        let title = raw.get("display_name").and_then(Value::as_str).unwrap_or("");
        let source_id = raw.get("id").and_then(Value::as_str).unwrap_or("");
        let work_type = raw.get("type").and_then(Value::as_str);
        acceptable(title, source_id, work_type, BLOCKLIST)
    }

    fn transform(&self, raw: &Value) -> Result<TransformedRecord, TransformError> {
        let source_id = raw
            .get("id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TransformError::Rejected {
                reason: "missing id".into(),
            })?
            .to_string();

        let raw_title = raw.get("display_name").and_then(Value::as_str).unwrap_or("");
        let title = truncate_title(&sanitize_text(raw_title));
        if title.chars().count() < 5 {
            return Err(TransformError::Rejected {
                reason: "title too short after sanitization".into(),
            });
        }

        let abstract_text = extract_abstract(raw).map(|text| sanitize_text(&text));
        let authors = extract_authors(raw);

        let primary_date = normalize_date(
            raw.get("publication_date")
                .or_else(|| raw.get("created_date"))
                .and_then(Value::as_str),
        );

        let doi = raw.get("doi").and_then(Value::as_str).map(str::to_string);
        let links = raw
            .get("open_access")
            .map(|v| v.to_string())
            .filter(|s| s != "null");

        let combined = combined_text(&title, abstract_text.as_deref());

        Ok(TransformedRecord {
            paper: PaperUpsert {
                source: "openalex".to_string(),
                source_id,
                title,
                abstract_text,
                authors,
                primary_date,
                doi,
                links,
                embedding: None,
            },
            combined_text: combined,
            enrichment: EnrichmentPayload::None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_a_well_formed_work() {
        let raw = json!({
            "id": "W123",
            "display_name": "A meaningful title",
            "type": "article",
        });
        assert!(OpenAlexTransform.accept(&raw));
    }

    #[test]
    fn rejects_blocklisted_type() {
        let raw = json!({
            "id": "W123",
            "display_name": "A meaningful title",
            "type": "dataset",
        });
        assert!(!OpenAlexTransform.accept(&raw));
    }

    #[test]
    fn rejects_short_title() {
        let raw = json!({"id": "W123", "display_name": "Hi", "type": "article"});
        assert!(!OpenAlexTransform.accept(&raw));
    }

    #[test]
    fn transform_flattens_inverted_abstract_and_extracts_authors() {
        let raw = json!({
            "id": "W123",
            "display_name": "Reinforcement Learning Survey",
            "type": "article",
            "abstract_inverted_index": {"The": [0], "quick": [1], "survey": [2]},
            "authorships": [
                {"author": {"display_name": "Ada Lovelace"}},
                {"author": {"display_name": " "}},
            ],
            "publication_date": "2023-05-01",
        });
        let record = OpenAlexTransform.transform(&raw).unwrap();
        assert_eq!(record.paper.abstract_text.as_deref(), Some("The quick survey"));
        assert_eq!(record.paper.authors, vec!["Ada Lovelace".to_string()]);
        assert_eq!(record.paper.primary_date.unwrap().to_string(), "2023-05-01");
        assert_eq!(record.combined_text, "Title: Reinforcement Learning Survey Abstract: The quick survey");
    }

    #[test]
    fn transform_without_abstract_uses_title_only_combined_text() {
        let raw = json!({"id": "W456", "display_name": "Just A Title Here", "type": "article"});
        let record = OpenAlexTransform.transform(&raw).unwrap();
        assert_eq!(record.combined_text, "Title: Just A Title Here");
        assert!(record.paper.abstract_text.is_none());
    }
}
