//! Error types for dccp.

use thiserror::Error;

/// Error type for dccp operations.
#[derive(Debug, Error)]
pub enum CvxError {
    /// A non-affine expression has no numeric value at the current point.
    #[error("Cannot linearize a non-affine expression whose value is undefined at the current point: {0}")]
    UndefinedValue(String),

    /// Shape mismatch.
    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    /// Invalid argument or expression.
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    /// Numerical error.
    #[error("Numerical error: {0}")]
    NumericalError(String),
}

/// Result type for dccp operations.
pub type Result<T> = std::result::Result<T, CvxError>;
