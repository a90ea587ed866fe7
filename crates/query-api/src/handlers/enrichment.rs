//! Catalog introspection (`GET /sources/{source}/enrichment-fields`) and batch enrichment
//! lookup (`GET /enrichment/data`). Both are thin reads that bypass the Planner's strategy
//! selection entirely (§4.5).

use axum::extract::{Path, Query, State};
use axum::Json;
use paperforge_common::catalog;
use paperforge_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;

/// Maps a source name to the enrichment table that carries its source-specific fields, per the
/// `{source}_{field}` naming convention (§3).
fn source_table(source: &str) -> Option<&'static str> {
    match source {
        "randpub" => Some("randpub_metadata"),
        "extpub" => Some("extpub_metadata"),
        "arxiv" => Some("arxiv_metadata"),
        _ => None,
    }
}

#[derive(Serialize)]
pub struct EnrichmentFieldsResponse {
    pub source: String,
    pub tables: Vec<EnrichmentTable>,
}

#[derive(Serialize)]
pub struct EnrichmentTable {
    pub table: String,
    pub fields: Vec<String>,
}

/// `GET /sources/{source}/enrichment-fields`: the source-specific table's fields plus every
/// source-agnostic enrichment table's fields (e.g. `enrichment_country`), since those apply
/// regardless of source.
pub async fn enrichment_fields(Path(source): Path<String>) -> Result<Json<EnrichmentFieldsResponse>> {
    let expected_table = source_table(&source);
    if expected_table.is_none() && source != "all" {
        return Err(AppError::ResourceNotFound {
            resource_type: "source".into(),
            id: source,
        });
    }

    let mut tables: std::collections::BTreeMap<&'static str, Vec<String>> = std::collections::BTreeMap::new();
    for (name, info) in catalog::all_fields() {
        let is_source_table = Some(info.table) == expected_table;
        let is_shared_enrichment = info.table.starts_with("enrichment_");
        if info.table != "papers" && (is_source_table || is_shared_enrichment) {
            tables.entry(info.table).or_default().push(name.to_string());
        }
    }

    Ok(Json(EnrichmentFieldsResponse {
        source,
        tables: tables
            .into_iter()
            .map(|(table, mut fields)| {
                fields.sort();
                EnrichmentTable {
                    table: table.to_string(),
                    fields,
                }
            })
            .collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct EnrichmentDataQuery {
    /// Comma-separated paper ids.
    pub paper_ids: String,
    pub source: String,
    pub table: String,
    pub field: String,
}

#[derive(Serialize)]
pub struct EnrichmentDataItem {
    pub paper_id: Uuid,
    pub value: Option<String>,
}

/// `GET /enrichment/data`: a single `WHERE paper_id = ANY($1)` lookup against one enrichment
/// column, named via the field catalog so only registered tables/columns are reachable.
pub async fn enrichment_data(
    State(state): State<AppState>,
    Query(params): Query<EnrichmentDataQuery>,
) -> Result<Json<Vec<EnrichmentDataItem>>> {
    let paper_ids: Vec<Uuid> = params
        .paper_ids
        .split(',')
        .map(|s| s.trim().parse())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| AppError::InvalidParameter {
            parameter: "paper_ids".into(),
            reason: "must be a comma-separated list of UUIDs".into(),
        })?;

    let info = catalog::resolve(&params.field).filter(|info| info.table == params.table).ok_or_else(|| {
        AppError::ResourceNotFound {
            resource_type: "field".into(),
            id: format!("{}.{}", params.table, params.field),
        }
    })?;

    if source_table(&params.source) != Some(info.table) && !info.table.starts_with("enrichment_") {
        return Err(AppError::InvalidParameter {
            parameter: "source".into(),
            reason: format!("{} does not own table {}", params.source, info.table),
        });
    }

    let sql = format!(
        "SELECT paper_id, {column}::text AS value FROM {table} WHERE paper_id = ANY($1)",
        column = info.column,
        table = info.table,
    );

    let rows: Vec<(Uuid, Option<String>)> = sqlx::query_as(&sql).bind(&paper_ids).fetch_all(state.db.pool()).await?;

    Ok(Json(
        rows.into_iter().map(|(paper_id, value)| EnrichmentDataItem { paper_id, value }).collect(),
    ))
}
