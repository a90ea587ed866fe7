//! Ingestion pipeline error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("source error: {0}")]
    Source(String),
}

impl From<paperforge_common::errors::AppError> for IngestionError {
    fn from(e: paperforge_common::errors::AppError) -> Self {
        IngestionError::Source(e.to_string())
    }
}
