//! Error types shared across the crate.

use thiserror::Error;

/// Errors surfaced by tree construction, checked distance computation and
/// record persistence.
///
/// Query-time problems on a well-formed tree are deliberately *not* errors:
/// prediction degrades to an unknown result so evaluation loops keep running.
#[derive(Error, Debug)]
pub enum ClassifyError {
    /// A training batch contained a vector with no components.
    #[error("feature vectors must have at least one component")]
    EmptyFeatures,

    /// Vectors in one training batch disagree on dimensionality.
    #[error("dimension mismatch: expected {expected} components, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// Two vectors of different lengths were handed to a checked distance
    /// computation.
    #[error("metric incompatibility: cannot compare vectors of length {left} and {right}")]
    MetricIncompatibility { left: usize, right: usize },

    /// A persisted record could not be parsed.
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
