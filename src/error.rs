//! Error types shared by the store, search engine and pipeline

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the library.
///
/// Command handlers wrap these in `anyhow::Error` with extra context.
#[derive(Debug, Error)]
pub enum ExpertError {
    /// Persisted pattern data could not be parsed
    #[error("Malformed pattern data in {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("Pattern not found: {0}")]
    NotFound(String),

    #[error("Invalid rating {0} (must be 1-5)")]
    InvalidRating(u8),

    /// Partial update could not be applied to a pattern
    #[error("Invalid update for pattern '{id}': {reason}")]
    InvalidUpdate { id: String, reason: String },

    #[error("Vector dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("Embedding backend error: {0}")]
    Embedding(String),

    #[error("Enricher '{enricher}' failed: {reason}")]
    Enrichment { enricher: String, reason: String },

    #[error("Specialist '{specialist}' failed: {reason}")]
    Specialist { specialist: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for library operations
pub type Result<T> = std::result::Result<T, ExpertError>;
