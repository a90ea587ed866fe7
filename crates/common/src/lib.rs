//! Shared library for the document explorer query engine.
//!
//! Carries the pieces common to both the query API and the ingestion pipeline: configuration,
//! the field catalog, error types, the database pool and SQL helpers, the embedding client, the
//! embedding cache, and metrics.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod errors;
pub mod metrics;

pub use config::AppConfig;
pub use db::models::PaperUpsert;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
