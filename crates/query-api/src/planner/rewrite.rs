//! Filter rewriting (§4.3.3): qualified field names are aliased, and `%` is doubled uniformly
//! on every parameterized path so a user-controlled `LIKE` pattern can never collide with a
//! positional placeholder.

use paperforge_common::catalog;

/// Walk `sql_filter` outside single-quoted string literals, rewriting every catalog field
/// reference (simple or `table.column` qualified) to its `alias.column` form.
pub fn rewrite_filter(filter: &str, _joins: &[super::joins::Join]) -> String {
    let doubled = filter.replace('%', "%%");
    rewrite_field_references(&doubled)
}

fn rewrite_field_references(filter: &str) -> String {
    let chars: Vec<char> = filter.chars().collect();
    let mut out = String::with_capacity(filter.len());
    let mut i = 0;
    let mut in_quote = false;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            in_quote = !in_quote;
            out.push(c);
            i += 1;
            continue;
        }
        if in_quote {
            out.push(c);
            i += 1;
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();

            if i < chars.len() && chars[i] == '.' {
                let dot = i;
                let mut j = i + 1;
                while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
                    j += 1;
                }
                if j > dot + 1 {
                    let column: String = chars[dot + 1..j].iter().collect();
                    if let Some(info) = catalog::resolve(&format!("{ident}.{column}")) {
                        out.push_str(info.alias);
                        out.push('.');
                        out.push_str(info.column);
                    } else {
                        out.push_str(&ident);
                        out.push('.');
                        out.push_str(&column);
                    }
                    i = j;
                    continue;
                }
            }

            if let Some(info) = catalog::resolve(&ident) {
                out.push_str(info.alias);
                out.push('.');
                out.push_str(info.column);
            } else {
                out.push_str(&ident);
            }
            continue;
        }

        out.push(c);
        i += 1;
    }

    out
}

/// Extract candidate catalog field names referenced anywhere in `sql_filter`, simple or
/// qualified, for join inference and validation. Unknown identifiers (column aliases like `dp`,
/// SQL keywords, table names) are not catalog fields and are silently skipped here — the
/// deny-list pass already rejected dangerous keywords before this runs.
pub fn referenced_fields(sql_filter: Option<&str>) -> Vec<String> {
    let Some(filter) = sql_filter else {
        return Vec::new();
    };

    let chars: Vec<char> = filter.chars().collect();
    let mut found = Vec::new();
    let mut i = 0;
    let mut in_quote = false;

    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            in_quote = !in_quote;
            i += 1;
            continue;
        }
        if in_quote {
            i += 1;
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();

            if i < chars.len() && chars[i] == '.' {
                let dot = i;
                let mut j = i + 1;
                while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
                    j += 1;
                }
                if j > dot + 1 {
                    let column: String = chars[dot + 1..j].iter().collect();
                    let qualified = format!("{ident}.{column}");
                    if catalog::is_known(&qualified) {
                        found.push(qualified);
                    }
                    i = j;
                    continue;
                }
            }

            if catalog::is_known(&ident) {
                found.push(ident);
            }
            continue;
        }
        i += 1;
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_doubled_uniformly() {
        let out = rewrite_filter("title ILIKE '%robot%'", &[]);
        assert_eq!(out, "title ILIKE '%%robot%%'");
    }

    #[test]
    fn qualified_field_name_rewrites_to_alias() {
        let out = rewrite_filter("enrichment_country.country_name = 'France'", &[]);
        assert_eq!(out, "ec.country_name = 'France'");
    }

    #[test]
    fn simple_catalog_field_name_rewrites_to_alias_column() {
        let out = rewrite_filter("randpub_rand_project = 'RAND-123'", &[]);
        assert_eq!(out, "rm.rand_project = 'RAND-123'");
    }

    #[test]
    fn literal_content_inside_quotes_is_left_untouched() {
        let out = rewrite_filter("title = 'randpub_rand_project'", &[]);
        assert_eq!(out, "title = 'randpub_rand_project'");
    }

    #[test]
    fn referenced_fields_finds_simple_and_qualified_names() {
        let fields = referenced_fields(Some("randpub_rand_project = 'x' AND enrichment_country.country_name = 'France'"));
        assert!(fields.contains(&"randpub_rand_project".to_string()));
        assert!(fields.contains(&"enrichment_country.country_name".to_string()));
    }
}
