//! Request validation (§4.3.1): catalog lookups, the `sql_filter` deny-list, and the numeric
//! bounds on limit/offset/similarity_threshold.

use super::{FilterRequest, PlannerOptions};
use paperforge_common::catalog::{self, FieldType};
use paperforge_common::errors::{AppError, Result};

/// Tokens and keywords that must never appear, case-insensitively, as a whole token inside
/// `sql_filter`. `sql_filter` is a boolean expression fragment only — none of these are ever
/// legitimate there.
const DENYLISTED_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "UPDATE", "INSERT", "CREATE", "ALTER", "EXEC", "EXECUTE", "TRUNCATE",
    "MERGE", "REPLACE", "GRANT", "REVOKE", "COMMIT", "ROLLBACK", "SAVEPOINT", "TRANSACTION",
    "LOCK", "UNLOCK", "ANALYZE", "VACUUM", "REINDEX", "CLUSTER", "COPY", "BULK", "LOAD",
    "IMPORT", "EXPORT", "UNION", "SELECT", "FROM", "WHERE", "JOIN", "HAVING", "GROUP", "ORDER",
];

const DENYLISTED_PATTERNS: &[&str] = &[";", "--", "/*", "*/"];

pub struct ProjectedField {
    pub logical_name: String,
    pub sql_expr: String,
}

pub fn validate(request: &FilterRequest, options: &PlannerOptions) -> Result<()> {
    if request.limit == 0 || request.limit > options.max_limit {
        return Err(AppError::InvalidParameter {
            parameter: "limit".into(),
            reason: format!("must be in [1, {}]", options.max_limit),
        });
    }
    if !(0.0..=1.0).contains(&request.similarity_threshold) {
        return Err(AppError::InvalidParameter {
            parameter: "similarity_threshold".into(),
            reason: "must be in [0.0, 1.0]".into(),
        });
    }
    if let Some((x1, y1, x2, y2)) = request.bbox {
        for (name, v) in [("bbox.x1", x1), ("bbox.y1", y1), ("bbox.x2", x2), ("bbox.y2", y2)] {
            if !v.is_finite() {
                return Err(AppError::InvalidParameter {
                    parameter: name.into(),
                    reason: "must be finite".into(),
                });
            }
        }
    }
    if let Some(filter) = &request.sql_filter {
        check_denylist(filter)?;
    }
    Ok(())
}

fn check_denylist(filter: &str) -> Result<()> {
    for pattern in DENYLISTED_PATTERNS {
        if filter.contains(pattern) {
            return Err(AppError::ForbiddenSql {
                reason: format!("contains disallowed pattern {pattern:?}"),
            });
        }
    }
    for token in tokenize(filter) {
        if DENYLISTED_KEYWORDS.contains(&token.to_uppercase().as_str()) {
            return Err(AppError::ForbiddenSql {
                reason: format!("contains disallowed keyword {token:?}"),
            });
        }
    }
    Ok(())
}

/// Split on non-identifier characters to get whole-word tokens; used both for the deny-list
/// check and for extracting candidate field names referenced in the filter.
pub(super) fn tokenize(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|s| !s.is_empty())
        .collect()
}

/// Project each requested field to its `alias.column AS "logical_name"` SQL form. Unknown
/// fields are dropped with a warning rather than failing the request (§4.3.1). Point and vector
/// columns are cast to `::text` so the Executor always receives Postgres's textual `"(x,y)"` /
/// `"[v1,v2,...]"` forms to parse (§4.4.4), rather than depending on binary-format decoding.
pub fn resolve_projection(fields: &[String], warnings: &mut Vec<String>) -> Result<Vec<ProjectedField>> {
    let mut projected = Vec::with_capacity(fields.len());
    for field in fields {
        match catalog::resolve(field) {
            Some(info) => {
                let sql_expr = match info.ty {
                    FieldType::Point | FieldType::Vector => {
                        format!("{}.{}::text AS \"{}\"", info.alias, info.column, field)
                    }
                    _ => format!("{}.{} AS \"{}\"", info.alias, info.column, field),
                };
                projected.push(ProjectedField {
                    logical_name: field.clone(),
                    sql_expr,
                });
            }
            None => warnings.push(format!("unknown field: {field}")),
        }
    }
    Ok(projected)
}

pub fn render_select_list(projected: &[ProjectedField]) -> String {
    projected
        .iter()
        .map(|f| f.sql_expr.clone())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Fields referenced by filter/sort are not survivable if unknown — unlike projection, which
/// merely drops them, an unresolvable filter or sort field fails the whole request.
pub fn check_known(fields: &[String]) -> Result<()> {
    for field in fields {
        if !catalog::is_known(field) {
            return Err(AppError::InvalidParameter {
                parameter: field.clone(),
                reason: "unknown field".into(),
            });
        }
    }
    Ok(())
}

pub fn check_sortable(field: &str) -> Result<()> {
    if !catalog::is_known(field) {
        return Err(AppError::InvalidParameter {
            parameter: field.into(),
            reason: "unknown field".into(),
        });
    }
    if !catalog::is_sortable(field) {
        return Err(AppError::InvalidParameter {
            parameter: field.into(),
            reason: "field is not sortable".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denylist_catches_statement_terminator() {
        assert!(check_denylist("title = 'x'; DROP TABLE papers").is_err());
    }

    #[test]
    fn denylist_catches_keyword_regardless_of_case() {
        assert!(check_denylist("title = 'x' or 1=1 union select 1").is_err());
    }

    #[test]
    fn denylist_allows_an_ordinary_boolean_expression() {
        assert!(check_denylist("publication_year > 2015 AND source = 'arxiv'").is_ok());
    }

    #[test]
    fn unknown_projection_field_is_dropped_with_warning() {
        let mut warnings = Vec::new();
        let projected = resolve_projection(&["title".to_string(), "not_a_field".to_string()], &mut warnings).unwrap();
        assert_eq!(projected.len(), 1);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn unknown_filter_field_is_a_hard_error() {
        assert!(check_known(&["not_a_field".to_string()]).is_err());
    }

    #[test]
    fn embedding_is_not_sortable() {
        assert!(check_sortable("embedding").is_err());
    }
}
