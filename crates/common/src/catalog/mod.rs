//! The process-wide field catalog (§3, §4.3.1).
//!
//! Every field a request can filter, sort, or project by is registered here exactly once, with
//! the table/alias/column it resolves to and the capabilities (filterable/sortable/searchable)
//! the Planner is allowed to exercise on it. The catalog is immutable after first access; a
//! `HashMap` guarded by `OnceLock` avoids re-registering on every request.

use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    Uuid,
    Text,
    TextArray,
    Date,
    Timestamp,
    Vector,
    Point,
    Float,
    Integer,
}

/// A single catalog entry: where a logical field name lives and what a request may do with it.
#[derive(Clone, Copy, Debug)]
pub struct FieldInfo {
    pub table: &'static str,
    pub alias: &'static str,
    pub column: &'static str,
    pub ty: FieldType,
    pub filterable: bool,
    pub sortable: bool,
    pub searchable: bool,
}

fn entry(
    table: &'static str,
    alias: &'static str,
    column: &'static str,
    ty: FieldType,
    filterable: bool,
    sortable: bool,
    searchable: bool,
) -> FieldInfo {
    FieldInfo {
        table,
        alias,
        column,
        ty,
        filterable,
        sortable,
        searchable,
    }
}

fn build_catalog() -> HashMap<&'static str, FieldInfo> {
    use FieldType::*;
    let mut m = HashMap::new();

    // Core paper fields. Aliases are stable per table, `dp` for the base `papers` table (§4.3.2).
    m.insert("paper_id", entry("papers", "dp", "paper_id", Uuid, true, true, false));
    m.insert("title", entry("papers", "dp", "title", Text, true, true, true));
    m.insert("abstract_text", entry("papers", "dp", "abstract_text", Text, true, false, true));
    m.insert("authors", entry("papers", "dp", "authors", TextArray, true, false, true));
    m.insert("source", entry("papers", "dp", "source", Text, true, true, false));
    m.insert("source_id", entry("papers", "dp", "source_id", Text, true, true, false));
    m.insert("doi", entry("papers", "dp", "doi", Text, true, true, false));
    m.insert("primary_date", entry("papers", "dp", "primary_date", Date, true, true, false));
    m.insert(
        "publication_year",
        entry("papers", "dp", "publication_year", Integer, true, true, false),
    );
    m.insert("links", entry("papers", "dp", "links", Text, true, false, false));
    m.insert("created_at", entry("papers", "dp", "created_at", Timestamp, true, true, false));
    m.insert("updated_at", entry("papers", "dp", "updated_at", Timestamp, true, true, false));

    // Embedding-derived fields. embedding itself is never filterable/sortable; similarity_score
    // is computed per-row by the Executor, not read from a column (§4.4.5).
    m.insert("embedding", entry("papers", "dp", "embedding", Vector, false, false, false));
    m.insert("embedding_2d", entry("papers", "dp", "embedding_2d", Point, true, false, false));
    m.insert(
        "similarity_score",
        entry("papers", "dp", "similarity_score", Float, false, true, false),
    );

    // Source-specific enrichment tables, following the {source}_{field} naming convention.
    for (field, column) in [
        ("randpub_doi", "doi"),
        ("randpub_marc_id", "marc_id"),
        ("randpub_processing_date", "processing_date"),
        ("randpub_source_type", "source_type"),
        ("randpub_document_type", "document_type"),
        ("randpub_rand_project", "rand_project"),
        ("randpub_local_call_number", "local_call_number"),
        ("randpub_funding_info", "funding_info"),
        ("randpub_corporate_names", "corporate_names"),
    ] {
        let searchable = matches!(field, "randpub_rand_project" | "randpub_funding_info");
        m.insert(field, entry("randpub_metadata", "rm", column, Text, true, true, searchable));
    }

    for (field, column) in [
        ("extpub_doi", "doi"),
        ("extpub_publisher", "publisher"),
        ("extpub_journal_name", "journal_name"),
        ("extpub_volume", "volume"),
        ("extpub_issue", "issue"),
    ] {
        m.insert(field, entry("extpub_metadata", "em", column, Text, true, true, false));
    }

    for (field, column) in [
        ("arxiv_category", "category"),
        ("arxiv_primary_category", "primary_category"),
        ("arxiv_journal_ref", "journal_ref"),
        ("arxiv_comment", "comment"),
    ] {
        m.insert(field, entry("arxiv_metadata", "am", column, Text, true, true, false));
    }

    // Non-source-specific enrichment tables, following {category}_{field}.
    for (field, column) in [
        ("country_name", "country_name"),
        ("country_uschina", "country_uschina"),
        ("institution_name", "institution_name"),
        ("enrichment_method", "enrichment_method"),
    ] {
        m.insert(field, entry("enrichment_country", "ec", column, Text, true, true, false));
    }

    m
}

fn catalog() -> &'static HashMap<&'static str, FieldInfo> {
    static CATALOG: OnceLock<HashMap<&'static str, FieldInfo>> = OnceLock::new();
    CATALOG.get_or_init(build_catalog)
}

/// Resolve a logical field name or a qualified `table.column` name to its catalog entry.
/// Qualified names are accepted per §3 and resolve to the same entry as the simple name.
pub fn resolve(field: &str) -> Option<FieldInfo> {
    if let Some(info) = catalog().get(field).copied() {
        return Some(info);
    }
    if let Some((table, column)) = field.split_once('.') {
        return catalog().values().find(|info| info.table == table && info.column == column).copied();
    }
    None
}

pub fn is_known(field: &str) -> bool {
    resolve(field).is_some()
}

pub fn is_sortable(field: &str) -> bool {
    resolve(field).is_some_and(|f| f.sortable)
}

/// Every registered logical field name and its catalog entry, in no particular order. Used by
/// `get_paper` (which projects every field, joined, by primary key) and by the
/// `/sources/{source}/enrichment-fields` introspection endpoint.
pub fn all_fields() -> Vec<(&'static str, FieldInfo)> {
    catalog().iter().map(|(&name, &info)| (name, info)).collect()
}

/// All distinct (table, alias) pairs referenced by a set of fields, in first-seen order, used by
/// the Planner to infer which joins a request needs (§4.3.2). `papers`/`dp` is never included;
/// it's the query's base table and always present.
pub fn required_joins(fields: &[String]) -> Vec<(&'static str, &'static str)> {
    let mut seen = Vec::new();
    for field in fields {
        if let Some(info) = resolve(field) {
            if info.table != "papers" && !seen.iter().any(|&(t, _)| t == info.table) {
                seen.push((info.table, info.alias));
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_fields_resolve_to_the_papers_table() {
        let info = resolve("title").unwrap();
        assert_eq!(info.table, "papers");
        assert_eq!(info.alias, "dp");
        assert!(info.filterable && info.sortable && info.searchable);
    }

    #[test]
    fn embedding_is_neither_filterable_nor_sortable() {
        let info = resolve("embedding").unwrap();
        assert!(!info.filterable);
        assert!(!info.sortable);
    }

    #[test]
    fn similarity_score_is_sortable_but_not_filterable() {
        let info = resolve("similarity_score").unwrap();
        assert!(info.sortable);
        assert!(!info.filterable);
    }

    #[test]
    fn source_specific_enrichment_fields_resolve_their_alias() {
        let info = resolve("randpub_rand_project").unwrap();
        assert_eq!(info.table, "randpub_metadata");
        assert_eq!(info.alias, "rm");
        assert!(info.searchable);
    }

    #[test]
    fn qualified_table_column_name_resolves_to_the_same_entry() {
        let simple = resolve("country_name").unwrap();
        let qualified = resolve("enrichment_country.country_name").unwrap();
        assert_eq!(simple.table, qualified.table);
        assert_eq!(simple.column, qualified.column);
    }

    #[test]
    fn unknown_field_resolves_to_none() {
        assert!(resolve("not_a_real_field").is_none());
        assert!(!is_known("not_a_real_field"));
    }

    #[test]
    fn required_joins_deduplicates_and_excludes_base_table() {
        let fields = vec![
            "title".to_string(),
            "randpub_doi".to_string(),
            "randpub_marc_id".to_string(),
            "country_name".to_string(),
        ];
        let joins = required_joins(&fields);
        assert_eq!(joins, vec![("randpub_metadata", "rm"), ("enrichment_country", "ec")]);
    }
}
