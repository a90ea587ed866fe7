//! The Query Planner (§4.3): compiles a [`FilterRequest`] into SQL plus a parameter vector,
//! choosing one of three execution strategies. Pure, synchronous, allocation-heavy, I/O-free —
//! every function here is a plain `fn`, never `async fn`, so suspension inside planning is
//! structurally impossible rather than merely avoided by convention (§5).

mod joins;
mod rewrite;
mod strategy;
mod validate;

use paperforge_common::db::format_embedding_literal;
use paperforge_common::errors::{AppError, Result};
use serde::Deserialize;

pub use strategy::Strategy;

/// A bound query parameter. Kept as an enum (rather than `sqlx::query!`'s compile-time typed
/// binding) because the Planner builds an arbitrary, request-shaped parameter list that isn't
/// known until a request arrives.
#[derive(Debug, Clone, PartialEq)]
pub enum BindParam {
    Text(String),
    Int(i64),
    Float(f64),
    Date(chrono::NaiveDate),
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Desc,
    Asc,
}

impl SortDirection {
    fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// The Planner's input contract (§4.3).
#[derive(Debug, Clone, Default)]
pub struct FilterRequest {
    pub fields: Vec<String>,
    pub sql_filter: Option<String>,
    pub bbox: Option<(f64, f64, f64, f64)>,
    pub year_range: Option<(i32, i32)>,
    pub search_text: Option<String>,
    pub similarity_threshold: f64,
    pub embedding_type: String,
    pub limit: u32,
    pub offset: u32,
    pub sort_field: Option<String>,
    pub sort_direction: SortDirection,
    pub disable_sort: bool,
}

/// Parameters the Planner needs but that are deployment configuration, not part of the request
/// itself — kept separate so the Planner stays a pure function of (request, options).
#[derive(Debug, Clone)]
pub struct PlannerOptions {
    pub enabled_sources: Vec<String>,
    pub max_limit: u32,
}

/// A compiled query ready for the Executor to bind and run.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<BindParam>,
    /// Present unless the strategy is semantic (S2/S3), in which case count is always skipped
    /// per the adaptive-count tier 1 rule (§4.4.3) and this is `None`.
    pub count_sql: Option<String>,
    pub count_params: Vec<BindParam>,
    pub strategy: Strategy,
    pub warnings: Vec<String>,
    pub is_semantic: bool,
    /// Logical field names actually projected (unknown requested fields already dropped), in the
    /// same order as the select list — the Executor uses this to read each result row back out.
    pub fields: Vec<String>,
}

/// Resolved shape of the query: which joins are needed, the rewritten filter fragment, the
/// projected column list, all computed once and shared by both the main-query and count-query
/// compilation paths.
struct ResolvedPlan {
    select_list: String,
    fields: Vec<String>,
    joins: String,
    where_clauses: Vec<String>,
    warnings: Vec<String>,
}

pub fn compile(request: &FilterRequest, embedding: Option<&[f32]>, options: &PlannerOptions) -> Result<CompiledQuery> {
    validate::validate(request, options)?;

    let resolved = build_resolved_plan(request, options)?;
    let is_semantic = request.search_text.is_some() && embedding.is_some();
    let strategy = strategy::select(request, &resolved, is_semantic);

    let (sql, params) = match strategy {
        Strategy::MaterializedView => strategy::build_s1(request, &resolved),
        Strategy::Base => strategy::build_base(request, &resolved),
        Strategy::DirectSemantic => strategy::build_s2(request, &resolved, embedding.expect("semantic strategy requires an embedding")),
        Strategy::SemanticFirstCte => strategy::build_s3(request, &resolved, embedding.expect("semantic strategy requires an embedding")),
    };

    self_check(&sql, &params)?;

    let (count_sql, count_params) = if is_semantic {
        (None, Vec::new())
    } else {
        let (sql, params) = strategy::build_count(request, &resolved, matches!(strategy, Strategy::MaterializedView));
        self_check(&sql, &params)?;
        (Some(sql), params)
    };

    let mut fields = resolved.fields;
    if is_semantic {
        fields.push("similarity_score".to_string());
    }

    Ok(CompiledQuery {
        sql,
        params,
        count_sql,
        count_params,
        strategy,
        warnings: resolved.warnings,
        is_semantic,
        fields,
    })
}

fn build_resolved_plan(request: &FilterRequest, options: &PlannerOptions) -> Result<ResolvedPlan> {
    let mut warnings = Vec::new();

    let projected = validate::resolve_projection(&request.fields, &mut warnings)?;
    let filter_fields = rewrite::referenced_fields(request.sql_filter.as_deref());
    validate::check_known(&filter_fields)?;
    if let Some(sort_field) = &request.sort_field {
        validate::check_sortable(sort_field)?;
    }

    let mut joinable_fields: Vec<String> = projected.iter().map(|f| f.logical_name.clone()).collect();
    joinable_fields.extend(filter_fields.iter().cloned());
    if let Some(sort_field) = &request.sort_field {
        joinable_fields.push(sort_field.clone());
    }

    let joins = joins::infer(&joinable_fields, request.sql_filter.as_deref());
    let select_list = validate::render_select_list(&projected);
    let fields: Vec<String> = projected.iter().map(|f| f.logical_name.clone()).collect();

    // Sources come from deployment configuration, not the request body, so they're inlined as a
    // literal list rather than parameterized.
    let sources_list = options
        .enabled_sources
        .iter()
        .map(|s| format!("'{}'", s.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(", ");
    let mut where_clauses = vec![format!("dp.source IN ({sources_list})")];

    if let Some((x1, y1, x2, y2)) = request.bbox {
        where_clauses.push(format!(
            "dp.embedding_2d <@ box(point({x1}, {y1}), point({x2}, {y2}))"
        ));
    }
    if let Some((start, end)) = request.year_range {
        where_clauses.push(format!(
            "dp.primary_date BETWEEN '{start}-01-01' AND '{end}-12-31'"
        ));
    }
    where_clauses.extend(joins::guard_clauses(&joins));
    if let Some(filter) = &request.sql_filter {
        let rewritten = rewrite::rewrite_filter(filter, &joins);
        where_clauses.push(format!("({rewritten})"));
    }

    Ok(ResolvedPlan {
        select_list,
        fields,
        joins: joins::render(&joins),
        where_clauses,
        warnings,
    })
}

/// Invariant 1 (§8): the number of `$n` placeholders in `sql` must equal `params.len()`.
/// Checked immediately after assembly, before the SQL is returned to any caller.
fn self_check(sql: &str, params: &[BindParam]) -> Result<()> {
    let placeholder_count = count_placeholders(sql);
    if placeholder_count != params.len() {
        return Err(AppError::InternalPlanError {
            message: format!(
                "placeholder count {placeholder_count} does not match parameter count {}",
                params.len()
            ),
        });
    }
    Ok(())
}

fn count_placeholders(sql: &str) -> usize {
    let mut seen = std::collections::HashSet::new();
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j > i + 1 {
                seen.insert(sql[i + 1..j].to_string());
            }
            i = j;
        } else {
            i += 1;
        }
    }
    seen.len()
}

pub(crate) fn bind_embedding(embedding: &[f32]) -> BindParam {
    BindParam::Text(format_embedding_literal(embedding))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> PlannerOptions {
        PlannerOptions {
            enabled_sources: vec!["openalex".into(), "arxiv".into(), "randpub".into(), "extpub".into()],
            max_limit: 50_000,
        }
    }

    #[test]
    fn scenario_a_non_semantic_default_sort_selects_s1() {
        let request = FilterRequest {
            fields: vec!["paper_id".into(), "title".into(), "embedding_2d".into()],
            limit: 100,
            ..Default::default()
        };
        let compiled = compile(&request, None, &options()).unwrap();
        assert_eq!(compiled.strategy, Strategy::MaterializedView);
        assert!(compiled.sql.contains("papers_sorted_by_year"));
        assert!(compiled.count_sql.is_some());
    }

    #[test]
    fn scenario_b_bbox_only_uses_base_path() {
        let request = FilterRequest {
            fields: vec!["paper_id".into()],
            bbox: Some((-1.0, -1.0, 1.0, 1.0)),
            limit: 5000,
            ..Default::default()
        };
        let compiled = compile(&request, None, &options()).unwrap();
        assert_eq!(compiled.strategy, Strategy::Base);
        assert!(compiled.sql.contains("embedding_2d <@ box"));
    }

    #[test]
    fn scenario_c_semantic_no_cofilters_uses_s2_with_overfetch_500() {
        let request = FilterRequest {
            fields: vec!["paper_id".into(), "title".into()],
            search_text: Some("reinforcement learning for robotics".into()),
            similarity_threshold: 0.3,
            limit: 100,
            ..Default::default()
        };
        let embedding = vec![0.1f32; 8];
        let compiled = compile(&request, Some(&embedding), &options()).unwrap();
        assert_eq!(compiled.strategy, Strategy::DirectSemantic);
        assert!(compiled.sql.contains("LIMIT 500"));
        assert!(compiled.count_sql.is_none());
        assert!(compiled.is_semantic);
    }

    #[test]
    fn scenario_d_semantic_plus_bbox_uses_s3_with_cte() {
        let request = FilterRequest {
            fields: vec!["paper_id".into()],
            search_text: Some("digital twins".into()),
            bbox: Some((9.0, -2.0, 13.0, 2.0)),
            similarity_threshold: 0.5,
            limit: 200,
            ..Default::default()
        };
        let embedding = vec![0.2f32; 8];
        let compiled = compile(&request, Some(&embedding), &options()).unwrap();
        assert_eq!(compiled.strategy, Strategy::SemanticFirstCte);
        assert!(compiled.sql.contains("WITH semantic_candidates AS"));
        assert!(compiled.sql.contains("LIMIT 50000") || compiled.sql.contains("cte_cap"));
    }

    #[test]
    fn scenario_f_malicious_filter_is_rejected() {
        let request = FilterRequest {
            fields: vec!["paper_id".into()],
            sql_filter: Some("title = 'x'; DROP TABLE papers".into()),
            limit: 10,
            ..Default::default()
        };
        let err = compile(&request, None, &options()).unwrap_err();
        assert!(matches!(err, AppError::ForbiddenSql { .. }));
    }

    #[test]
    fn limit_zero_is_a_validation_error() {
        let request = FilterRequest {
            fields: vec!["paper_id".into()],
            limit: 0,
            ..Default::default()
        };
        assert!(matches!(
            compile(&request, None, &options()),
            Err(AppError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn limit_above_max_is_a_validation_error() {
        let request = FilterRequest {
            fields: vec!["paper_id".into()],
            limit: 50_001,
            ..Default::default()
        };
        assert!(matches!(
            compile(&request, None, &options()),
            Err(AppError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn strategy_selection_is_deterministic() {
        let request = FilterRequest {
            fields: vec!["paper_id".into(), "title".into()],
            limit: 50,
            ..Default::default()
        };
        let a = compile(&request, None, &options()).unwrap();
        let b = compile(&request, None, &options()).unwrap();
        assert_eq!(a.strategy, b.strategy);
    }

    #[test]
    fn placeholder_count_always_matches_param_count() {
        let request = FilterRequest {
            fields: vec!["paper_id".into(), "randpub_doi".into()],
            sql_filter: Some("randpub_doi IS NOT NULL".into()),
            limit: 50,
            ..Default::default()
        };
        let compiled = compile(&request, None, &options()).unwrap();
        assert_eq!(count_placeholders(&compiled.sql), compiled.params.len());
    }
}
