//! Error types for Wrench.

use thiserror::Error;

/// Library-level error type for Wrench operations.
#[derive(Error, Debug)]
pub enum WrenchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Record store error: {0}")]
    RecordStore(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    /// Completion failures carry the upstream message verbatim.
    #[error("{0}")]
    Generation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl WrenchError {
    /// Whether this error means the record store or vector index could not be reached or queried.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            WrenchError::Database(_)
                | WrenchError::RecordStore(_)
                | WrenchError::VectorStore(_)
                | WrenchError::Io(_)
        )
    }
}

/// Result type alias for Wrench operations.
pub type Result<T> = std::result::Result<T, WrenchError>;
