use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (reading or rewriting a snapshot).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot or document (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The value given to the store did not serialize to a JSON object.
    #[error("Document is not a JSON object")]
    NotADocument,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
