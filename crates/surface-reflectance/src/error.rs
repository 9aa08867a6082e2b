//! Error types for reflectance processing.

use thiserror::Error;

/// Result type for reflectance operations.
pub type ReflectanceResult<T> = Result<T, ReflectanceError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReflectanceError {
    /// Array length does not match the grid it should describe.
    #[error("dimension mismatch: expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Two grids that should line up have different shapes.
    #[error("shape mismatch: expected {}x{}, got {}x{}", expected.0, expected.1, actual.0, actual.1)]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Cell count of a `width x height` grid does not fit in `usize`.
    #[error("grid {width}x{height} is too large")]
    GridTooLarge { width: usize, height: usize },

    /// Stretch bounds or gamma outside their valid domain.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// No finite values to compute a statistic over.
    #[error("band has no valid pixels")]
    NoValidPixels,
}
