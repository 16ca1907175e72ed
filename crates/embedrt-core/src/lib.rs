//! Core library for embedding inference and similarity search.
//!
//! This crate provides:
//! - Batch Euclidean distance over 512-dimensional embeddings, with a
//!   portable and an accelerated engine behind one trait
//! - Configuration for model sessions and engine selection
//! - Re-exports of the session and tensor types from `embedrt-inference`

pub mod config;
pub mod distance;
pub mod error;

pub use config::{DistanceConfig, EmbedRtConfig};
pub use distance::{
    engine_for, AcceleratedEngine, DistanceEngine, DistanceKind, PortableEngine,
    EMBEDDING_DIM,
};
pub use error::{DistanceError, EmbedRtError, Result};

/// Re-export inference types.
pub use embedrt_inference::{
    redundant_releases, ElementType, ExecutionProvider, InferenceBackend, InferenceError, Model, NativeBuffer,
    Owner, SessionConfig, Tensor, TensorElement,
};

#[cfg(feature = "native")]
pub use embedrt_inference::OrtBackend;

#[cfg(feature = "tract")]
pub use embedrt_inference::TractBackend;

#[cfg(any(feature = "native", feature = "tract"))]
pub use embedrt_inference::DefaultBackend;
