//! `GET /papers` (full Query Engine pipeline) and `GET /papers/{id}` (single-row lookup by
//! primary key, joined against every enrichment table — does not run the Planner's strategy
//! selection, per §4.5).

use axum::{
    extract::{Path, Query, State},
    Json,
};
use paperforge_common::catalog::{self, FieldType};
use paperforge_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::executor::{self, rows};
use crate::planner::{FilterRequest, SortDirection};
use crate::AppState;

fn default_embedding_type() -> String {
    "default".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ListPapersQuery {
    pub fields: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub bbox: Option<String>,
    pub year_range: Option<String>,
    pub year_start: Option<i32>,
    pub year_end: Option<i32>,
    pub sql_filter: Option<String>,
    #[serde(default = "default_embedding_type")]
    pub embedding_type: String,
    pub search_text: Option<String>,
    #[serde(default)]
    pub similarity_threshold: f64,
    pub target_count: Option<u32>,
    pub sort_field: Option<String>,
    #[serde(default)]
    pub sort_direction: SortDirection,
    #[serde(default)]
    pub disable_sort: bool,
}

#[derive(Serialize)]
pub struct ListPapersResponse {
    pub results: Vec<Map<String, Value>>,
    pub total_count: i64,
    pub total_count_is_estimate: bool,
    pub warnings: Vec<String>,
    pub query: String,
    pub count_query: Option<String>,
    pub execution_time_ms: u64,
    pub query_execution_time_ms: u64,
    pub count_query_execution_time_ms: u64,
}

const DEFAULT_LIMIT: u32 = 100;
const DEFAULT_FIELDS: &[&str] = &["paper_id", "title", "abstract_text", "authors", "source", "primary_date"];

pub async fn list_papers(
    State(state): State<AppState>,
    Query(params): Query<ListPapersQuery>,
) -> Result<Json<ListPapersResponse>> {
    let mut warnings = Vec::new();

    let fields = match &params.fields {
        Some(raw) => raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
        None => DEFAULT_FIELDS.iter().map(|s| s.to_string()).collect(),
    };

    let mut limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    if let Some(target_count) = params.target_count {
        if target_count == 0 {
            return Err(AppError::InvalidParameter {
                parameter: "target_count".into(),
                reason: "must be positive".into(),
            });
        }
        if target_count < limit {
            warnings.push(format!(
                "using effective limit of {target_count} (minimum of limit={limit} and target_count={target_count})"
            ));
            limit = target_count;
        }
    }

    let bbox = match &params.bbox {
        Some(raw) => Some(parse_bbox(raw)?),
        None => None,
    };

    let year_range = parse_year_range(&params)?;

    let request = FilterRequest {
        fields,
        sql_filter: params.sql_filter.clone(),
        bbox,
        year_range,
        search_text: params.search_text.clone().filter(|s| !s.trim().is_empty()),
        similarity_threshold: params.similarity_threshold,
        embedding_type: params.embedding_type.clone(),
        limit,
        offset: params.offset.unwrap_or(0),
        sort_field: params.sort_field.clone(),
        sort_direction: params.sort_direction,
        disable_sort: params.disable_sort,
    };

    let result = executor::execute(request, &state.executor).await?;

    warnings.extend(result.warnings);

    Ok(Json(ListPapersResponse {
        results: result.results,
        total_count: result.total_count,
        total_count_is_estimate: result.total_count_is_estimate,
        warnings,
        query: result.query,
        count_query: result.count_query,
        execution_time_ms: result.execution_time_ms,
        query_execution_time_ms: result.query_execution_time_ms,
        count_query_execution_time_ms: result.count_query_execution_time_ms,
    }))
}

/// Accepts either a combined `year_range=start,end` parameter or the separate
/// `year_start`/`year_end` pair; the combined form wins if both are present.
fn parse_year_range(params: &ListPapersQuery) -> Result<Option<(i32, i32)>> {
    if let Some(raw) = &params.year_range {
        let parts: Vec<&str> = raw.split(',').collect();
        if parts.len() != 2 {
            return Err(AppError::InvalidParameter {
                parameter: "year_range".into(),
                reason: "must be start,end".into(),
            });
        }
        let start = parts[0].trim().parse().map_err(|_| AppError::InvalidParameter {
            parameter: "year_range".into(),
            reason: format!("{:?} is not a valid year", parts[0]),
        })?;
        let end = parts[1].trim().parse().map_err(|_| AppError::InvalidParameter {
            parameter: "year_range".into(),
            reason: format!("{:?} is not a valid year", parts[1]),
        })?;
        return Ok(Some((start, end)));
    }
    match (params.year_start, params.year_end) {
        (Some(start), Some(end)) => Ok(Some((start, end))),
        (None, None) => Ok(None),
        _ => Err(AppError::InvalidParameter {
            parameter: "year_start/year_end".into(),
            reason: "both must be provided together".into(),
        }),
    }
}

fn parse_bbox(raw: &str) -> Result<(f64, f64, f64, f64)> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 4 {
        return Err(AppError::InvalidParameter {
            parameter: "bbox".into(),
            reason: "must be x1,y1,x2,y2".into(),
        });
    }
    let mut values = [0.0f64; 4];
    for (i, part) in parts.iter().enumerate() {
        values[i] = part.trim().parse().map_err(|_| AppError::InvalidParameter {
            parameter: "bbox".into(),
            reason: format!("{part:?} is not a valid number"),
        })?;
    }
    Ok((values[0], values[1], values[2], values[3]))
}

/// `GET /papers/{id}`: every catalog field, left-joined against every enrichment table, by
/// primary key. This is a thin single-row read, not a Planner-compiled query (§4.5).
pub async fn get_paper(State(state): State<AppState>, Path(paper_id): Path<Uuid>) -> Result<Json<Map<String, Value>>> {
    let all_fields = catalog::all_fields();

    let mut select_parts = Vec::with_capacity(all_fields.len());
    let mut joins: Vec<(&str, &str)> = Vec::new();
    let mut field_names = Vec::with_capacity(all_fields.len());

    for (name, info) in &all_fields {
        if info.table != "papers" && !joins.iter().any(|&(t, _)| t == info.table) {
            joins.push((info.table, info.alias));
        }
        let expr = match info.ty {
            FieldType::Point | FieldType::Vector => format!("{}.{}::text AS \"{}\"", info.alias, info.column, name),
            _ => format!("{}.{} AS \"{}\"", info.alias, info.column, name),
        };
        select_parts.push(expr);
        field_names.push(name.to_string());
    }

    let join_sql = joins
        .iter()
        .map(|(table, alias)| format!("LEFT JOIN {table} {alias} ON {alias}.paper_id = dp.paper_id"))
        .collect::<Vec<_>>()
        .join(" ");

    let sql = format!(
        "SELECT {select_list} FROM papers dp {join_sql} WHERE dp.paper_id = $1",
        select_list = select_parts.join(", "),
    );

    let row = sqlx::query(&sql)
        .bind(paper_id)
        .fetch_optional(state.db.pool())
        .await?
        .ok_or_else(|| AppError::PaperNotFound {
            paper_id: paper_id.to_string(),
        })?;

    let paper = rows::extract_row(&row, &field_names).ok_or_else(|| AppError::InternalError {
        message: format!("paper {paper_id} has malformed column data"),
    })?;

    Ok(Json(paper))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_bbox() {
        assert_eq!(parse_bbox("-1.0,-1.0,1.0,1.0").unwrap(), (-1.0, -1.0, 1.0, 1.0));
    }

    #[test]
    fn rejects_bbox_with_wrong_arity() {
        assert!(parse_bbox("1.0,2.0").is_err());
    }

    #[test]
    fn rejects_bbox_with_non_numeric_component() {
        assert!(parse_bbox("a,b,c,d").is_err());
    }
}
