//! ONNX Runtime (ort) backend for native platforms.
//!
//! The runtime library is loaded dynamically (`ORT_DYLIB_PATH`), so CUDA,
//! TensorRT and CoreML availability depends on the library found at run
//! time. Providers other than CPU are registered with `error_on_failure`,
//! which turns a missing provider into a construction error instead of a
//! silent CPU fallback.

use std::path::Path;

use ort::ep;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::{Session, SessionInputValue};
use ort::value::{DynValue, Tensor};
use tracing::debug;

use super::{write_ne_bytes, InferenceBackend};
use crate::error::InferenceError;
use crate::tensor::{ElementType, TensorData};
use crate::{ExecutionProvider, Result};

/// Backend using ONNX Runtime for native inference.
pub struct OrtBackend;

/// Shape, element type and data of an ort value, borrowed.
enum Extracted<'a> {
    Int64(Vec<i64>, &'a [i64]),
    Float32(Vec<i64>, &'a [f32]),
}

impl Extracted<'_> {
    fn shape(&self) -> &[i64] {
        match self {
            Extracted::Int64(shape, _) | Extracted::Float32(shape, _) => shape,
        }
    }
}

fn extract(value: &DynValue) -> Result<Extracted<'_>> {
    if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
        return Ok(Extracted::Float32(shape.iter().copied().collect(), data));
    }
    if let Ok((shape, data)) = value.try_extract_tensor::<i64>() {
        return Ok(Extracted::Int64(shape.iter().copied().collect(), data));
    }
    Err(InferenceError::OutputExtraction(
        "value is not an int64 or float32 tensor".to_string(),
    ))
}

impl InferenceBackend for OrtBackend {
    type Session = Session;
    type Value = DynValue;

    fn name() -> &'static str {
        "ort"
    }

    fn check_provider(_provider: ExecutionProvider) -> Result<()> {
        // Availability is only known once the provider is registered on a session.
        Ok(())
    }

    fn load_session(path: &Path, provider: ExecutionProvider) -> Result<Self::Session> {
        debug!("Reading ONNX model from: {}", path.display());
        let bytes = std::fs::read(path)
            .map_err(|e| InferenceError::ModelLoad(format!("{}: {}", path.display(), e)))?;

        let builder = Session::builder().map_err(|e| InferenceError::ModelLoad(e.to_string()))?;
        let builder = match provider {
            ExecutionProvider::Cpu => builder.with_execution_providers([ep::CPU::default().build()]),
            ExecutionProvider::Cuda => {
                builder.with_execution_providers([ep::CUDA::default().build().error_on_failure()])
            }
            ExecutionProvider::TensorRt => {
                builder.with_execution_providers([ep::TensorRT::default().build().error_on_failure()])
            }
            ExecutionProvider::CoreMl => {
                builder.with_execution_providers([ep::CoreML::default().build().error_on_failure()])
            }
        }
        .map_err(|e| InferenceError::UnsupportedProvider {
            provider,
            reason: e.to_string(),
        })?;

        builder
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| InferenceError::ModelLoad(e.to_string()))?
            .commit_from_memory(&bytes)
            .map_err(|e| InferenceError::ModelLoad(e.to_string()))
    }

    fn create_value(dims: &[i64], data: TensorData<'_>) -> Result<Self::Value> {
        let shape = dims.to_vec();
        match data {
            TensorData::Int64(values) => Tensor::from_array((shape, values.to_vec())).map(|t| t.into_dyn()),
            TensorData::Float32(values) => Tensor::from_array((shape, values.to_vec())).map(|t| t.into_dyn()),
        }
        .map_err(|e| InferenceError::InvalidInput(e.to_string()))
    }

    fn value_num_dims(value: &Self::Value) -> Result<usize> {
        Ok(extract(value)?.shape().len())
    }

    fn value_dim(value: &Self::Value, index: usize) -> Result<i64> {
        let extracted = extract(value)?;
        let len = extracted.shape().len();
        extracted
            .shape()
            .get(index)
            .copied()
            .ok_or(InferenceError::IndexOutOfRange { index, len })
    }

    fn value_element_type(value: &Self::Value) -> Result<ElementType> {
        Ok(match extract(value)? {
            Extracted::Int64(..) => ElementType::Int64,
            Extracted::Float32(..) => ElementType::Float32,
        })
    }

    fn value_copy_to(value: &Self::Value, dst: &mut [u8]) -> Result<()> {
        match extract(value)? {
            Extracted::Int64(_, data) => write_ne_bytes(TensorData::Int64(data), dst),
            Extracted::Float32(_, data) => write_ne_bytes(TensorData::Float32(data), dst),
        }
    }

    fn run(
        session: &mut Self::Session,
        inputs: &[(&str, &Self::Value)],
        output_names: &[String],
    ) -> Result<Vec<Self::Value>> {
        let ort_inputs: Vec<(&str, SessionInputValue<'_>)> = inputs
            .iter()
            .map(|(name, value)| (*name, SessionInputValue::from(value.view())))
            .collect();

        let mut outputs = session
            .run(ort_inputs)
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

        output_names
            .iter()
            .map(|name| {
                outputs
                    .remove(name.as_str())
                    .ok_or_else(|| InferenceError::OutputExtraction(format!("model has no output '{}'", name)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    //! These need an ONNX Runtime library (`ORT_DYLIB_PATH`) and a model at
    //! `EMBEDRT_TEST_MODEL` taking one float32 input `x` and producing `y`.

    use std::collections::HashMap;

    use super::*;
    use crate::Model;
    use pretty_assertions::assert_eq;

    fn test_model_path() -> String {
        std::env::var("EMBEDRT_TEST_MODEL").expect("EMBEDRT_TEST_MODEL not set")
    }

    #[test]
    #[ignore = "needs the ONNX Runtime library"]
    fn tensor_create_and_read() {
        let data: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let value = OrtBackend::create_value(&[3, 4], TensorData::Float32(&data)).unwrap();

        assert_eq!(OrtBackend::value_num_dims(&value).unwrap(), 2);
        assert_eq!(OrtBackend::value_dim(&value, 1).unwrap(), 4);
        assert_eq!(OrtBackend::value_element_type(&value).unwrap(), ElementType::Float32);

        let mut bytes = vec![0u8; 48];
        OrtBackend::value_copy_to(&value, &mut bytes).unwrap();
        assert_eq!(&bytes[4..8], &1.0f32.to_ne_bytes());
    }

    #[test]
    #[ignore = "needs the ONNX Runtime library and EMBEDRT_TEST_MODEL"]
    fn model_inference() {
        let model = Model::<OrtBackend>::new(test_model_path(), ["x"], ["y"], ExecutionProvider::Cpu).unwrap();
        let x = model.new_float32_tensor(&[1, 4], &[0.1, 0.2, 0.3, 0.4]).unwrap();

        let inputs: HashMap<&str, &crate::Tensor<OrtBackend>> = [("x", &x)].into_iter().collect();
        let outputs = model.run_inference(&inputs).unwrap();
        assert_eq!(outputs.len(), 1);

        let y = outputs[0].to_vec::<f32>().unwrap();
        assert_eq!(y.len() as i64, outputs[0].element_count().unwrap());
        assert!(y.iter().all(|v| v.is_finite()));
        model.release();
    }

    #[test]
    fn missing_model_file() {
        let result = OrtBackend::load_session(Path::new("does/not/exist.onnx"), ExecutionProvider::Cpu);
        assert!(matches!(result, Err(InferenceError::ModelLoad(_))));
    }
}
