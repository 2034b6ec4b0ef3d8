//! Error types for comembed.

use thiserror::Error;

/// Errors that can occur while building training inputs or applying updates.
#[derive(Error, Debug)]
pub enum Error {
    /// Two operands disagree on a dimension (embedding width, community count, ...).
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Which operand pair was being checked.
        context: &'static str,
        /// Dimension required by the receiving side.
        expected: usize,
        /// Dimension actually supplied.
        actual: usize,
    },

    /// A vocabulary index points past the end of a matrix or table.
    #[error("Index {index} out of bounds for {what} with {len} rows")]
    IndexOutOfBounds {
        /// Offending index.
        index: usize,
        /// Number of rows available.
        len: usize,
        /// Name of the indexed structure.
        what: &'static str,
    },

    /// The rejection loop for negative samples ran out of draws.
    #[error(
        "Negative sampling exhausted after {attempts} draws for pair (target {target}, context {context})"
    )]
    SamplingExhausted {
        /// Row whose embedding was being updated.
        target: usize,
        /// True context row.
        context: usize,
        /// Draws spent before giving up.
        attempts: usize,
    },

    /// Hyperparameters outside their admissible range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Covariance matrix could not be factorised or inverted.
    #[error("Linear algebra error: {0}")]
    Linalg(String),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for comembed operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for [`Error::DimensionMismatch`].
    pub fn dim(context: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            context,
            expected,
            actual,
        }
    }
}
