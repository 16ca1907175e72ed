//! Inference backend implementations.

#[cfg(feature = "native")]
pub mod ort;

#[cfg(feature = "tract")]
pub mod tract;

#[cfg(test)]
pub(crate) mod fake;

use std::path::Path;

use crate::tensor::{ElementType, TensorData};
use crate::{ExecutionProvider, Result};

/// The narrow contract between this crate and an ONNX engine.
///
/// Backends own the raw engine objects through the associated `Session`
/// and `Value` types; dropping either frees the engine memory behind it.
/// [`crate::Model`] and [`crate::Tensor`] layer liveness tracking, argument
/// validation and name binding on top, so implementations may assume their
/// inputs have already been checked.
pub trait InferenceBackend: Sized + 'static {
    /// Loaded model bound to an execution provider.
    type Session: Send;

    /// One tensor value.
    type Value: Send;

    /// Short backend name for logs.
    fn name() -> &'static str;

    /// Rejects providers this backend cannot drive.
    fn check_provider(provider: ExecutionProvider) -> Result<()>;

    /// Loads the model at `path` on `provider`.
    fn load_session(path: &Path, provider: ExecutionProvider) -> Result<Self::Session>;

    /// Creates a value holding a copy of `data` with shape `dims`.
    fn create_value(dims: &[i64], data: TensorData<'_>) -> Result<Self::Value>;

    fn value_num_dims(value: &Self::Value) -> Result<usize>;

    /// Extent of dimension `index`, which is below `value_num_dims`.
    fn value_dim(value: &Self::Value, index: usize) -> Result<i64>;

    fn value_element_type(value: &Self::Value) -> Result<ElementType>;

    /// Writes the value's elements as native-endian bytes. `dst` is exactly
    /// the value's byte length.
    fn value_copy_to(value: &Self::Value, dst: &mut [u8]) -> Result<()>;

    /// Runs the model once.
    ///
    /// `inputs` are in the caller's declared order; the returned values
    /// must follow `output_names`.
    fn run(
        session: &mut Self::Session,
        inputs: &[(&str, &Self::Value)],
        output_names: &[String],
    ) -> Result<Vec<Self::Value>>;
}

/// Copies typed elements into a native-endian byte buffer.
pub(crate) fn write_ne_bytes(data: TensorData<'_>, dst: &mut [u8]) -> Result<()> {
    let width = data.element_type().width();
    if dst.len() != data.len() * width {
        return Err(crate::InferenceError::SizeMismatch {
            expected: data.len() * width,
            actual: dst.len(),
        });
    }

    match data {
        TensorData::Int64(values) => {
            for (chunk, v) in dst.chunks_exact_mut(width).zip(values) {
                chunk.copy_from_slice(&v.to_ne_bytes());
            }
        }
        TensorData::Float32(values) => {
            for (chunk, v) in dst.chunks_exact_mut(width).zip(values) {
                chunk.copy_from_slice(&v.to_ne_bytes());
            }
        }
    }
    Ok(())
}
