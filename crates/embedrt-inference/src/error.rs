//! Error types for the inference layer.

use thiserror::Error;

use crate::provider::ExecutionProvider;
use crate::tensor::ElementType;

/// Errors that can occur while managing sessions and tensors.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// Failed to load the ONNX model.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// The requested execution provider cannot be used by this backend or platform.
    #[error("execution provider {provider} is not supported: {reason}")]
    UnsupportedProvider {
        provider: ExecutionProvider,
        reason: String,
    },

    /// One or more declared inputs were absent from the inference request.
    #[error("missing input: {}", .0.join(", "))]
    MissingInput(Vec<String>),

    /// A buffer or value list does not match the size implied by a shape.
    #[error("size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Tensor creation was given no values.
    #[error("tensor values are empty")]
    EmptyInput,

    /// Typed read-out requested with the wrong element type.
    #[error("element type mismatch: tensor holds {actual}, requested {expected}")]
    ElementTypeMismatch {
        expected: ElementType,
        actual: ElementType,
    },

    /// Dimension index outside the tensor rank.
    #[error("index {index} out of range for {len} dimensions")]
    IndexOutOfRange { index: usize, len: usize },

    /// Operation attempted on a handle that was already released.
    #[error("{0} used after release")]
    UseAfterRelease(&'static str),

    /// Invalid argument.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Inference execution failed.
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    /// Output tensor extraction failed.
    #[error("failed to extract output: {0}")]
    OutputExtraction(String),

    /// I/O error when loading model files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
