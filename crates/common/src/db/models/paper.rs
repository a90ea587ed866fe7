//! The canonical paper row (§3).

use chrono::NaiveDate;

/// The fields ingestion writes or updates for a canonical row; embeddings are supplied
/// separately since they may be null on permanent embedding-service failure (§4.2).
#[derive(Clone, Debug)]
pub struct PaperUpsert {
    pub source: String,
    pub source_id: String,
    pub title: String,
    pub abstract_text: Option<String>,
    pub authors: Vec<String>,
    pub primary_date: Option<NaiveDate>,
    pub doi: Option<String>,
    pub links: Option<String>,
    pub embedding: Option<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publication_year_is_independent_field_not_computed_here() {
        // publication_year is derived by the database (extract(year from primary_date)) at
        // write time, per invariant 5; this struct only carries it back out on read.
        let upsert = PaperUpsert {
            source: "openalex".into(),
            source_id: "W123".into(),
            title: "Title".into(),
            abstract_text: None,
            authors: vec![],
            primary_date: None,
            doi: None,
            links: None,
            embedding: None,
        };
        assert_eq!(upsert.source, "openalex");
    }
}
