//! Error types for the embedrt-core library.

use thiserror::Error;

/// Main error type for the embedrt library.
#[derive(Error, Debug)]
pub enum EmbedRtError {
    /// Distance computation error.
    #[error("distance error: {0}")]
    Distance(#[from] DistanceError),

    /// Inference error from the inference layer.
    #[error("inference error: {0}")]
    Inference(#[from] embedrt_inference::InferenceError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors from a distance range computation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DistanceError {
    /// Query index outside the matrix.
    #[error("query index {index} out of range for {len} vectors")]
    IndexOutOfRange { index: usize, len: usize },

    /// Comparison range is reversed or extends past the matrix.
    #[error("invalid range [{start}, {end}) for {len} vectors")]
    InvalidRange { start: usize, end: usize, len: usize },

    /// A vector touched by the computation has the wrong length.
    #[error("vector {row} has {actual} elements, expected {expected}")]
    DimensionMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// Scratch memory for the packed computation was not available.
    #[error("distance scratch unavailable: {0}")]
    Scratch(String),
}

/// Result type for the embedrt library.
pub type Result<T> = std::result::Result<T, EmbedRtError>;
