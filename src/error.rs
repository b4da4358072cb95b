//! Error types for paraselect
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Paraselect error types
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid argument (partition counts, key lists, empty input)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A named column is missing from a record batch
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// A fitted selector exposes no scoring table
    #[error("Fitted selector has no best scores\nSelector::fit must populate the scoring table")]
    MissingScores,

    /// Per-partition scoring tables cannot be concatenated
    #[error("Schema mismatch between partition score tables: expected {expected}, got {found}")]
    SchemaMismatch {
        /// Schema of the first partition's scoring table
        expected: String,
        /// Schema of the offending table
        found: String,
    },

    /// Selector fit failure (raised by selector implementations)
    #[error("Selector fit failed: {0}")]
    Fit(String),

    /// Worker pool could not be created
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// Arrow error (row format, take, concat)
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
