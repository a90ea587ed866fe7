//! Join inference (§4.3.2): joins are inferred from the fields a request actually touches, never
//! taken from the request directly.

use super::rewrite;
use paperforge_common::catalog;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct Join {
    pub table: &'static str,
    pub alias: &'static str,
    /// Whether a column from this table is referenced in `sql_filter` — if so, the Executor
    /// adds an `alias.paper_id IS NOT NULL` guard so the left join doesn't silently widen the
    /// result set with nulls the filter wasn't meant to admit.
    pub guarded: bool,
}

pub fn infer(fields: &[String], sql_filter: Option<&str>) -> Vec<Join> {
    let required = catalog::required_joins(fields);
    let filter_tables = tables_referenced_in_filter(sql_filter);

    required
        .into_iter()
        .map(|(table, alias)| Join {
            table,
            alias,
            guarded: filter_tables.contains(table),
        })
        .collect()
}

fn tables_referenced_in_filter(sql_filter: Option<&str>) -> HashSet<&'static str> {
    rewrite::referenced_fields(sql_filter)
        .iter()
        .filter_map(|field| catalog::resolve(field))
        .filter(|info| info.table != "papers")
        .map(|info| info.table)
        .collect()
}

pub fn render(joins: &[Join]) -> String {
    joins
        .iter()
        .map(|j| format!("LEFT JOIN {} {} ON {}.paper_id = dp.paper_id", j.table, j.alias, j.alias))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn guard_clauses(joins: &[Join]) -> Vec<String> {
    joins
        .iter()
        .filter(|j| j.guarded)
        .map(|j| format!("{}.paper_id IS NOT NULL", j.alias))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_only_field_infers_join_without_guard() {
        let fields = vec!["title".to_string(), "randpub_rand_project".to_string()];
        let joins = infer(&fields, None);
        assert_eq!(joins.len(), 1);
        assert!(!joins[0].guarded);
    }

    #[test]
    fn filter_referenced_table_is_guarded() {
        let fields = vec!["title".to_string(), "randpub_rand_project".to_string()];
        let joins = infer(&fields, Some("randpub_rand_project = 'RAND-123'"));
        assert!(joins[0].guarded);
        assert_eq!(guard_clauses(&joins), vec!["rm.paper_id IS NOT NULL".to_string()]);
    }

    #[test]
    fn base_table_fields_never_produce_a_join() {
        let fields = vec!["title".to_string(), "source".to_string()];
        assert!(infer(&fields, None).is_empty());
    }
}
