//! Text hygiene shared by every per-source transformer (§4.2).
//!
//! Unlike the historical source's quote-doubling workaround (needed only when building raw SQL
//! strings by hand), nothing here escapes for SQL purposes — every write goes through
//! parameterized `sqlx` queries. This is purely about clean display text and clean embedding
//! input.

use chrono::NaiveDate;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn html_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").unwrap())
}

/// Strip HTML tags, normalize Unicode punctuation to ASCII, drop control characters, trim.
pub fn sanitize_text(text: &str) -> String {
    let without_tags = html_tag_re().replace_all(text, "");

    let normalized = without_tags
        .replace(['\u{2013}', '\u{2014}', '\u{2010}'], "-")
        .replace('\u{2026}', "...")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    let cleaned: String = normalized
        .chars()
        .filter(|&c| c as u32 >= 32 || matches!(c, '\n' | '\r' | '\t'))
        .collect();

    cleaned.trim().to_string()
}

const MAX_TITLE_LEN: usize = 1000;

/// Truncate a sanitized title to the catalog's display limit, appending `...` when cut.
pub fn truncate_title(title: &str) -> String {
    if title.chars().count() <= MAX_TITLE_LEN {
        return title.to_string();
    }
    let truncated: String = title.chars().take(MAX_TITLE_LEN).collect();
    format!("{truncated}...")
}

/// Reconstruct an OpenAlex-style inverted abstract index (word -> token positions) into
/// plaintext by sorting `(position, word)` pairs.
pub fn flatten_abstract_index(index: &HashMap<String, Vec<u32>>) -> Option<String> {
    if index.is_empty() {
        return None;
    }
    let mut words: Vec<(u32, &str)> = index
        .iter()
        .flat_map(|(word, positions)| positions.iter().map(move |&pos| (pos, word.as_str())))
        .collect();
    words.sort_by_key(|&(pos, _)| pos);
    Some(words.into_iter().map(|(_, word)| word).collect::<Vec<_>>().join(" "))
}

/// Normalize a source date string (with or without a time component) to a calendar date.
/// Unparseable or absent input becomes `None`.
pub fn normalize_date(date_str: Option<&str>) -> Option<NaiveDate> {
    let date_str = date_str?.trim();
    if date_str.is_empty() {
        return None;
    }
    if let Some((date_part, _)) = date_str.split_once('T') {
        return NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok();
    }
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()
}

/// Build the combined text fed to the embedding service: `"Title: {title} Abstract: {abstract}"`,
/// or just the title clause when there is no abstract.
pub fn combined_text(title: &str, abstract_text: Option<&str>) -> String {
    match abstract_text {
        Some(abstract_text) if !abstract_text.is_empty() => {
            format!("Title: {title} Abstract: {abstract_text}")
        }
        _ => format!("Title: {title}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_html_tags() {
        assert_eq!(sanitize_text("<b>bold</b> text"), "bold text");
    }

    #[test]
    fn normalizes_unicode_dashes_and_ellipsis() {
        assert_eq!(sanitize_text("a\u{2013}b\u{2014}c\u{2026}"), "a-b-c...");
    }

    #[test]
    fn normalizes_smart_quotes() {
        assert_eq!(sanitize_text("\u{201C}hello\u{201D} \u{2018}world\u{2019}"), "\"hello\" 'world'");
    }

    #[test]
    fn drops_control_characters_but_keeps_whitespace() {
        let input = "a\u{0007}b\nc\td";
        assert_eq!(sanitize_text(input), "ab\nc\td");
    }

    #[test]
    fn truncates_long_titles_with_ellipsis() {
        let title: String = "a".repeat(1010);
        let truncated = truncate_title(&title);
        assert_eq!(truncated.chars().count(), MAX_TITLE_LEN + 3);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn short_titles_pass_through_unchanged() {
        assert_eq!(truncate_title("short title"), "short title");
    }

    #[test]
    fn flattens_inverted_index_in_position_order() {
        let mut index = HashMap::new();
        index.insert("brown".to_string(), vec![2]);
        index.insert("The".to_string(), vec![0]);
        index.insert("fox".to_string(), vec![3]);
        index.insert("quick".to_string(), vec![1]);
        assert_eq!(flatten_abstract_index(&index).unwrap(), "The quick brown fox");
    }

    #[test]
    fn empty_index_flattens_to_none() {
        assert_eq!(flatten_abstract_index(&HashMap::new()), None);
    }

    #[test]
    fn normalizes_date_with_time_component() {
        assert_eq!(
            normalize_date(Some("2023-05-01T12:00:00Z")),
            NaiveDate::from_ymd_opt(2023, 5, 1)
        );
    }

    #[test]
    fn normalizes_plain_date() {
        assert_eq!(normalize_date(Some("2023-05-01")), NaiveDate::from_ymd_opt(2023, 5, 1));
    }

    #[test]
    fn unparseable_date_is_none() {
        assert_eq!(normalize_date(Some("not a date")), None);
        assert_eq!(normalize_date(None), None);
    }

    #[test]
    fn combined_text_omits_abstract_clause_when_absent() {
        assert_eq!(combined_text("Title A", None), "Title: Title A");
        assert_eq!(combined_text("Title A", Some("")), "Title: Title A");
    }

    #[test]
    fn combined_text_includes_abstract_when_present() {
        assert_eq!(combined_text("Title A", Some("Some abstract")), "Title: Title A Abstract: Some abstract");
    }
}
