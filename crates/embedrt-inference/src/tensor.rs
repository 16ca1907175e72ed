//! Tensors owned across the engine boundary.

use std::fmt;

use ndarray::{ArrayD, IxDyn};

use crate::backend::InferenceBackend;
use crate::buffer::{NativeBuffer, Owner};
use crate::error::InferenceError;
use crate::Result;

/// Supported tensor element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Int64,
    Float32,
}

impl ElementType {
    /// Size of one element in bytes.
    pub fn width(&self) -> usize {
        match self {
            ElementType::Int64 => 8,
            ElementType::Float32 => 4,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Int64 => f.write_str("int64"),
            ElementType::Float32 => f.write_str("float32"),
        }
    }
}

/// Borrowed input data handed to a backend when creating a value.
#[derive(Debug, Clone, Copy)]
pub enum TensorData<'a> {
    Int64(&'a [i64]),
    Float32(&'a [f32]),
}

impl TensorData<'_> {
    pub fn len(&self) -> usize {
        match self {
            TensorData::Int64(v) => v.len(),
            TensorData::Float32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            TensorData::Int64(_) => ElementType::Int64,
            TensorData::Float32(_) => ElementType::Float32,
        }
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for i64 {}
    impl Sealed for f32 {}
}

/// Rust types that map onto a tensor element type.
pub trait TensorElement: sealed::Sealed + Copy + Default + 'static {
    const ELEMENT_TYPE: ElementType;

    /// Decodes one element from native-endian bytes of exactly `ELEMENT_TYPE.width()` length.
    fn from_ne_slice(bytes: &[u8]) -> Self;

    fn as_tensor_data(values: &[Self]) -> TensorData<'_>;
}

impl TensorElement for i64 {
    const ELEMENT_TYPE: ElementType = ElementType::Int64;

    fn from_ne_slice(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        i64::from_ne_bytes(raw)
    }

    fn as_tensor_data(values: &[Self]) -> TensorData<'_> {
        TensorData::Int64(values)
    }
}

impl TensorElement for f32 {
    const ELEMENT_TYPE: ElementType = ElementType::Float32;

    fn from_ne_slice(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(bytes);
        f32::from_ne_bytes(raw)
    }

    fn as_tensor_data(values: &[Self]) -> TensorData<'_> {
        TensorData::Float32(values)
    }
}

/// Checks `dims` against the number of values and returns the element count.
pub(crate) fn validate_shape(dims: &[i64], len: usize) -> Result<usize> {
    if len == 0 {
        return Err(InferenceError::EmptyInput);
    }

    let mut count: usize = 1;
    for &d in dims {
        let extent = usize::try_from(d)
            .map_err(|_| InferenceError::InvalidInput(format!("negative dimension {} in {:?}", d, dims)))?;
        count = count
            .checked_mul(extent)
            .ok_or_else(|| InferenceError::InvalidInput(format!("shape {:?} overflows", dims)))?;
    }

    if count != len {
        return Err(InferenceError::SizeMismatch {
            expected: count,
            actual: len,
        });
    }
    Ok(count)
}

/// One engine-owned tensor value.
///
/// Input tensors are created through [`crate::Model::new_int64_tensor`] and
/// [`crate::Model::new_float32_tensor`]; output tensors come back from
/// [`crate::Model::run_inference`]. Both share this type. Shape information is
/// read from the engine on every call and never cached.
///
/// A tensor is owned by one thread at a time: `release` needs `&mut self`.
pub struct Tensor<B: InferenceBackend> {
    value: NativeBuffer<B::Value>,
}

impl<B: InferenceBackend> Tensor<B> {
    pub(crate) fn from_input(dims: &[i64], data: TensorData<'_>) -> Result<Self> {
        validate_shape(dims, data.len())?;
        let value = B::create_value(dims, data)?;
        Ok(Self {
            value: NativeBuffer::managed("tensor", value),
        })
    }

    pub(crate) fn from_output(value: B::Value) -> Self {
        Self {
            value: NativeBuffer::native("tensor", value),
        }
    }

    pub(crate) fn value(&self) -> Result<&B::Value> {
        self.value.get()
    }

    /// Whether the tensor was built by the caller or produced by inference.
    pub fn owner(&self) -> Owner {
        self.value.owner()
    }

    pub fn is_released(&self) -> bool {
        self.value.is_released()
    }

    pub fn num_dimensions(&self) -> Result<usize> {
        B::value_num_dims(self.value()?)
    }

    /// Extent of dimension `index`.
    pub fn dimension_extent(&self, index: usize) -> Result<i64> {
        let value = self.value()?;
        let len = B::value_num_dims(value)?;
        if index >= len {
            return Err(InferenceError::IndexOutOfRange { index, len });
        }
        B::value_dim(value, index)
    }

    /// Shape of the tensor, one engine query per dimension.
    pub fn shape(&self) -> Result<Vec<i64>> {
        let value = self.value()?;
        let ndim = B::value_num_dims(value)?;
        (0..ndim).map(|i| B::value_dim(value, i)).collect()
    }

    /// Total number of elements; `1` for a scalar.
    pub fn element_count(&self) -> Result<i64> {
        Ok(self.shape()?.iter().product())
    }

    pub fn element_type(&self) -> Result<ElementType> {
        B::value_element_type(self.value()?)
    }

    /// Copies exactly `byte_size` bytes of tensor data into `destination`.
    ///
    /// `byte_size` must equal `element_count() * element width` and fit in
    /// `destination`. Bytes are native-endian.
    pub fn copy_out(&self, destination: &mut [u8], byte_size: usize) -> Result<()> {
        let value = self.value()?;
        let width = B::value_element_type(value)?.width();
        let expected = self.byte_len(width)?;

        if byte_size != expected {
            return Err(InferenceError::SizeMismatch {
                expected,
                actual: byte_size,
            });
        }
        if destination.len() < byte_size {
            return Err(InferenceError::SizeMismatch {
                expected: byte_size,
                actual: destination.len(),
            });
        }

        B::value_copy_to(value, &mut destination[..byte_size])
    }

    /// Copies the tensor into a typed slice of exactly `element_count()` elements.
    pub fn copy_to_slice<T: TensorElement>(&self, destination: &mut [T]) -> Result<()> {
        let actual = self.element_type()?;
        if actual != T::ELEMENT_TYPE {
            return Err(InferenceError::ElementTypeMismatch {
                expected: T::ELEMENT_TYPE,
                actual,
            });
        }

        let width = actual.width();
        let byte_size = self.byte_len(width)?;
        if destination.len() * width != byte_size {
            return Err(InferenceError::SizeMismatch {
                expected: byte_size / width,
                actual: destination.len(),
            });
        }

        let mut bytes = vec![0u8; byte_size];
        self.copy_out(&mut bytes, byte_size)?;
        for (dst, chunk) in destination.iter_mut().zip(bytes.chunks_exact(width)) {
            *dst = T::from_ne_slice(chunk);
        }
        Ok(())
    }

    /// Reads the whole tensor into a new vector.
    pub fn to_vec<T: TensorElement>(&self) -> Result<Vec<T>> {
        let count = usize::try_from(self.element_count()?)
            .map_err(|_| InferenceError::OutputExtraction("negative element count".to_string()))?;
        let mut out = vec![T::default(); count];
        self.copy_to_slice(&mut out)?;
        Ok(out)
    }

    /// Reads the whole tensor into an n-dimensional array with the tensor's shape.
    pub fn to_array<T: TensorElement>(&self) -> Result<ArrayD<T>> {
        let shape: Vec<usize> = self
            .shape()?
            .iter()
            .map(|&d| usize::try_from(d))
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| InferenceError::OutputExtraction("negative dimension".to_string()))?;
        let data = self.to_vec::<T>()?;
        ArrayD::from_shape_vec(IxDyn(&shape), data)
            .map_err(|e| InferenceError::OutputExtraction(e.to_string()))
    }

    /// Frees the engine value. Calling it again is a no-op.
    pub fn release(&mut self) {
        self.value.release();
    }

    fn byte_len(&self, width: usize) -> Result<usize> {
        let count = self.element_count()?;
        usize::try_from(count)
            .ok()
            .and_then(|c| c.checked_mul(width))
            .ok_or_else(|| InferenceError::OutputExtraction(format!("invalid element count {}", count)))
    }
}

impl<B: InferenceBackend> fmt::Debug for Tensor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Tensor");
        s.field("backend", &B::name()).field("owner", &self.owner());
        match self.shape() {
            Ok(shape) => s.field("shape", &shape),
            Err(_) => s.field("released", &true),
        };
        s.finish()
    }
}
