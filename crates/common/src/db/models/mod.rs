//! Plain data-transfer structs for the canonical paper row.
//!
//! Unlike a typed-entity ORM layer, these are not the Planner/Executor's primary read path
//! (which projects an arbitrary catalog-chosen subset of fields into a dynamic map); they exist
//! for `get_paper`'s full-row response and for ingestion's write path.

mod paper;

pub use paper::PaperUpsert;
