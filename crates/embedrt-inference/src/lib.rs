//! Owned sessions and tensors over ONNX inference engines.
//!
//! This crate wraps the engine objects that live outside Rust's ownership
//! model (sessions, tensor values) in types with explicit, idempotent release:
//! - [`Model`] binds a loaded model to fixed input/output name lists and runs it
//! - [`Tensor`] owns one engine value and exposes its shape and data
//! - [`NativeBuffer`] is the ownership-tagged wrapper both are built on
//!
//! Engines plug in through [`InferenceBackend`]:
//! - `ort` (ONNX Runtime, feature `native`) for CPU, CUDA, TensorRT and CoreML
//! - `tract` (feature `tract`) as a pure-Rust CPU engine

mod backend;
mod buffer;
mod error;
mod model;
mod provider;
mod tensor;

pub use backend::InferenceBackend;
pub use buffer::{redundant_releases, NativeBuffer, Owner};
pub use error::InferenceError;
pub use model::{Model, SessionConfig};
pub use provider::ExecutionProvider;
pub use tensor::{ElementType, Tensor, TensorData, TensorElement};

#[cfg(feature = "native")]
pub use backend::ort::OrtBackend;

#[cfg(feature = "tract")]
pub use backend::tract::{TractBackend, TractSession};

/// Backend used when the caller does not pick one.
#[cfg(feature = "native")]
pub type DefaultBackend = OrtBackend;

/// Backend used when the caller does not pick one.
#[cfg(all(feature = "tract", not(feature = "native")))]
pub type DefaultBackend = TractBackend;

/// Result type for inference operations.
pub type Result<T> = std::result::Result<T, InferenceError>;
