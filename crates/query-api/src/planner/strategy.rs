//! Execution strategy selection and SQL assembly (§4.3.4, §4.3.6).

use super::{bind_embedding, BindParam, FilterRequest, ResolvedPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// S1 — materialized-view fast path.
    MaterializedView,
    /// Non-semantic path over the base table (bbox/filter/sort prevent the S1 fast path).
    Base,
    /// S2 — direct semantic ANN path, no selective co-filters.
    DirectSemantic,
    /// S3 — semantic-first CTE path, selective co-filters present.
    SemanticFirstCte,
}

fn is_default_sort(request: &FilterRequest) -> bool {
    request.sort_field.is_none() && !request.disable_sort
}

fn has_selective_cofilter(request: &FilterRequest) -> bool {
    request.bbox.is_some() || request.sql_filter.as_deref().is_some_and(|f| !f.trim().is_empty())
}

pub fn select(request: &FilterRequest, resolved: &ResolvedPlan, is_semantic: bool) -> Strategy {
    if is_semantic {
        if has_selective_cofilter(request) {
            Strategy::SemanticFirstCte
        } else {
            Strategy::DirectSemantic
        }
    } else if resolved.joins.is_empty() && is_default_sort(request) {
        Strategy::MaterializedView
    } else {
        Strategy::Base
    }
}

/// `overfetch = max(limit*f, floor)`, per the exact tiers in §4.3.4.
pub fn overfetch(limit: u32) -> u32 {
    if limit <= 100 {
        (limit * 3).max(500)
    } else if limit <= 1000 {
        (((limit as f64) * 1.5) as u32).max(1500)
    } else {
        limit + 500
    }
}

fn cte_cap(limit: u32) -> u32 {
    50_000.max(overfetch(limit) * 10)
}

fn order_by_sql(request: &FilterRequest) -> String {
    if request.disable_sort {
        return String::new();
    }
    match &request.sort_field {
        Some(field) => format!(" ORDER BY dp.{} {}, dp.paper_id ASC", field, request.sort_direction.as_sql()),
        None => " ORDER BY dp.publication_year DESC NULLS LAST, dp.paper_id ASC".to_string(),
    }
}

fn where_sql(resolved: &ResolvedPlan) -> String {
    resolved.where_clauses.join(" AND ")
}

pub fn build_s1(request: &FilterRequest, resolved: &ResolvedPlan) -> (String, Vec<BindParam>) {
    let sql = format!(
        "SELECT {select} FROM papers_sorted_by_year dp {joins} WHERE {where_sql}{order_by} LIMIT {limit} OFFSET {offset}",
        select = resolved.select_list,
        joins = resolved.joins,
        where_sql = where_sql(resolved),
        order_by = order_by_sql(request),
        limit = request.limit,
        offset = request.offset,
    );
    (sql, Vec::new())
}

pub fn build_base(request: &FilterRequest, resolved: &ResolvedPlan) -> (String, Vec<BindParam>) {
    let sql = format!(
        "SELECT {select} FROM papers dp {joins} WHERE {where_sql}{order_by} LIMIT {limit} OFFSET {offset}",
        select = resolved.select_list,
        joins = resolved.joins,
        where_sql = where_sql(resolved),
        order_by = order_by_sql(request),
        limit = request.limit,
        offset = request.offset,
    );
    (sql, Vec::new())
}

pub fn build_s2(request: &FilterRequest, resolved: &ResolvedPlan, embedding: &[f32]) -> (String, Vec<BindParam>) {
    let limit = overfetch(request.limit);
    let param = bind_embedding(embedding);
    let sql = format!(
        "SELECT {select}, (1 - (dp.embedding <=> $1::vector)) AS similarity_score \
         FROM papers dp {joins} WHERE {where_sql} AND dp.embedding IS NOT NULL \
         ORDER BY dp.embedding <=> $1::vector LIMIT {limit}",
        select = resolved.select_list,
        joins = resolved.joins,
        where_sql = where_sql(resolved),
    );
    (sql, vec![param])
}

pub fn build_s3(request: &FilterRequest, resolved: &ResolvedPlan, embedding: &[f32]) -> (String, Vec<BindParam>) {
    let overfetch_limit = overfetch(request.limit);
    let cap = cte_cap(request.limit);

    // Bound three times: CTE ordering, similarity projection, outer ordering (§4.3.5).
    let params = vec![bind_embedding(embedding), bind_embedding(embedding), bind_embedding(embedding)];

    let sql = format!(
        "WITH semantic_candidates AS ( \
           SELECT dp.* FROM papers dp \
           WHERE {sources_only} AND dp.embedding IS NOT NULL \
           ORDER BY dp.embedding <=> $1::vector LIMIT {cap} \
         ) \
         SELECT {select}, (1 - (dp.embedding <=> $2::vector)) AS similarity_score \
         FROM semantic_candidates dp {joins} \
         WHERE {post_filter} \
         ORDER BY dp.embedding <=> $3::vector LIMIT {overfetch_limit}",
        sources_only = resolved.where_clauses.first().cloned().unwrap_or_else(|| "TRUE".to_string()),
        cap = cap,
        select = resolved.select_list,
        joins = resolved.joins,
        post_filter = post_filter_sql(resolved),
    );

    (sql, params)
}

/// S3's outer WHERE applies everything except the bare `dp.source IN (...)` clause, which was
/// already enforced inside the CTE.
fn post_filter_sql(resolved: &ResolvedPlan) -> String {
    let rest: Vec<&String> = resolved.where_clauses.iter().skip(1).collect();
    if rest.is_empty() {
        "TRUE".to_string()
    } else {
        rest.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" AND ")
    }
}

/// The count query mirrors the main query's filters without the semantic ordering/limit — it is
/// only ever built for non-semantic strategies (§4.4.3 tier 1 skips count for semantic requests).
pub fn build_count(request: &FilterRequest, resolved: &ResolvedPlan, use_materialized_view: bool) -> (String, Vec<BindParam>) {
    let table = if use_materialized_view { "papers_sorted_by_year" } else { "papers" };
    let sql = format!(
        "SELECT COUNT(*) FROM {table} dp {joins} WHERE {where_sql}",
        joins = resolved.joins,
        where_sql = where_sql(resolved),
    );
    let _ = request;
    (sql, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overfetch_small_limit_uses_3x_with_floor_500() {
        assert_eq!(overfetch(10), 500);
        assert_eq!(overfetch(100), 500);
    }

    #[test]
    fn overfetch_mid_tier_uses_1point5x_with_floor_1500() {
        assert_eq!(overfetch(101), 1500);
        assert_eq!(overfetch(200), 1500);
        assert_eq!(overfetch(1000), 1500);
    }

    #[test]
    fn overfetch_large_limit_is_additive() {
        assert_eq!(overfetch(2000), 2500);
    }

    #[test]
    fn cte_cap_is_at_least_50000() {
        assert_eq!(cte_cap(10), 50_000);
        assert_eq!(cte_cap(5000), 55_000);
    }
}
