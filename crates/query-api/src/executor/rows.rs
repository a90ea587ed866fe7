//! Column post-processing (§4.4.4): each result row is converted from a `PgRow` into a
//! `{field: value}` JSON map keyed by logical field name, regardless of which fields a request
//! actually projected. Point and vector columns arrive as text (cast by the Planner's select
//! list, see `planner::validate::resolve_projection`) and are parsed here.

use chrono::{DateTime, NaiveDate, Utc};
use paperforge_common::catalog::{self, FieldType};
use paperforge_common::db::{parse_point, parse_vector};
use serde_json::{json, Map, Value};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

pub struct ExtractedRows {
    pub results: Vec<Map<String, Value>>,
    pub dropped: usize,
}

pub fn extract_rows(rows: &[PgRow], fields: &[String]) -> ExtractedRows {
    let mut results = Vec::with_capacity(rows.len());
    let mut dropped = 0;

    for row in rows {
        match extract_row(row, fields) {
            Some(map) => results.push(map),
            None => dropped += 1,
        }
    }

    ExtractedRows { results, dropped }
}

pub(crate) fn extract_row(row: &PgRow, fields: &[String]) -> Option<Map<String, Value>> {
    let mut map = Map::with_capacity(fields.len());
    for field in fields {
        map.insert(field.clone(), extract_field(row, field)?);
    }
    Some(map)
}

fn extract_field(row: &PgRow, field: &str) -> Option<Value> {
    if field == "similarity_score" {
        return Some(optional_f64(row, field).map(|v| json!(v)).unwrap_or(Value::Null));
    }

    let info = catalog::resolve(field)?;
    match info.ty {
        FieldType::Uuid => Some(optional_uuid(row, field).map(|v| json!(v.to_string())).unwrap_or(Value::Null)),
        FieldType::Text => Some(optional_string(row, field).map(Value::String).unwrap_or(Value::Null)),
        FieldType::TextArray => Some(
            optional_text_array(row, field)
                .map(|items| Value::Array(items.into_iter().map(Value::String).collect()))
                .unwrap_or(Value::Null),
        ),
        FieldType::Date => Some(optional_date(row, field).map(|d| json!(d.to_string())).unwrap_or(Value::Null)),
        FieldType::Timestamp => Some(
            optional_timestamp(row, field)
                .map(|ts| json!(ts.to_rfc3339()))
                .unwrap_or(Value::Null),
        ),
        FieldType::Float => Some(optional_f64(row, field).map(|v| json!(v)).unwrap_or(Value::Null)),
        FieldType::Integer => Some(optional_i64(row, field).map(|v| json!(v)).unwrap_or(Value::Null)),
        FieldType::Point => match optional_string(row, field) {
            None => Some(Value::Null),
            Some(text) => parse_point(&text).map(|[x, y]| json!([x, y])),
        },
        FieldType::Vector => match optional_string(row, field) {
            None => Some(Value::Null),
            Some(text) => parse_vector(&text).map(|v| json!(v)),
        },
    }
}

fn optional_string(row: &PgRow, field: &str) -> Option<String> {
    row.try_get::<Option<String>, _>(field).ok().flatten()
}

fn optional_uuid(row: &PgRow, field: &str) -> Option<Uuid> {
    row.try_get::<Option<Uuid>, _>(field).ok().flatten()
}

fn optional_f64(row: &PgRow, field: &str) -> Option<f64> {
    row.try_get::<Option<f64>, _>(field).ok().flatten()
}

fn optional_i64(row: &PgRow, field: &str) -> Option<i64> {
    row.try_get::<Option<i64>, _>(field)
        .ok()
        .flatten()
        .or_else(|| row.try_get::<Option<i32>, _>(field).ok().flatten().map(i64::from))
}

fn optional_date(row: &PgRow, field: &str) -> Option<NaiveDate> {
    row.try_get::<Option<NaiveDate>, _>(field).ok().flatten()
}

fn optional_timestamp(row: &PgRow, field: &str) -> Option<DateTime<Utc>> {
    row.try_get::<Option<DateTime<Utc>>, _>(field).ok().flatten()
}

fn optional_text_array(row: &PgRow, field: &str) -> Option<Vec<String>> {
    row.try_get::<Option<Vec<String>>, _>(field).ok().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_row_set_yields_empty_results_and_no_drops() {
        let extracted = extract_rows(&[], &["title".to_string()]);
        assert!(extracted.results.is_empty());
        assert_eq!(extracted.dropped, 0);
    }
}
