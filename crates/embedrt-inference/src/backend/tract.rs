//! Tract backend for pure-Rust ONNX inference.

use std::path::Path;

use tract_onnx::prelude::*;
use tracing::debug;

use super::{write_ne_bytes, InferenceBackend};
use crate::error::InferenceError;
use crate::tensor::{ElementType, TensorData};
use crate::{ExecutionProvider, Result};

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Backend using Tract. Runs on the CPU only.
pub struct TractBackend;

/// A runnable plan plus the model's own input and output names.
pub struct TractSession {
    plan: Plan,
    model_inputs: Vec<String>,
    model_outputs: Vec<String>,
}

fn element_type(tensor: &tract_onnx::prelude::Tensor) -> Result<ElementType> {
    match tensor.datum_type() {
        DatumType::I64 => Ok(ElementType::Int64),
        DatumType::F32 => Ok(ElementType::Float32),
        other => Err(InferenceError::OutputExtraction(format!(
            "unsupported element type {:?}",
            other
        ))),
    }
}

impl InferenceBackend for TractBackend {
    type Session = TractSession;
    type Value = tract_onnx::prelude::Tensor;

    fn name() -> &'static str {
        "tract"
    }

    fn check_provider(provider: ExecutionProvider) -> Result<()> {
        if provider != ExecutionProvider::Cpu {
            return Err(InferenceError::UnsupportedProvider {
                provider,
                reason: "tract only runs on the CPU".to_string(),
            });
        }
        Ok(())
    }

    fn load_session(path: &Path, _provider: ExecutionProvider) -> Result<Self::Session> {
        debug!("Loading ONNX model with Tract from: {}", path.display());

        let model = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| InferenceError::ModelLoad(format!("Failed to load model: {}", e)))?;

        // Names come from the ONNX graph before optimization renames nodes.
        let model_inputs = model
            .input_outlets()
            .map_err(|e| InferenceError::ModelLoad(e.to_string()))?
            .iter()
            .map(|outlet| model.node(outlet.node).name.clone())
            .collect();
        let model_outputs = model
            .output_outlets()
            .map_err(|e| InferenceError::ModelLoad(e.to_string()))?
            .iter()
            .map(|outlet| {
                model
                    .outlet_label(*outlet)
                    .map(str::to_string)
                    .unwrap_or_else(|| model.node(outlet.node).name.clone())
            })
            .collect();

        let plan = model
            .into_typed()
            .map_err(|e| InferenceError::ModelLoad(format!("Failed to type model: {}", e)))?
            .into_optimized()
            .map_err(|e| InferenceError::ModelLoad(format!("Failed to optimize: {}", e)))?
            .into_runnable()
            .map_err(|e| InferenceError::ModelLoad(e.to_string()))?;

        Ok(TractSession {
            plan,
            model_inputs,
            model_outputs,
        })
    }

    fn create_value(dims: &[i64], data: TensorData<'_>) -> Result<Self::Value> {
        let shape: Vec<usize> = dims.iter().map(|&d| d as usize).collect();
        match data {
            TensorData::Int64(values) => tract_onnx::prelude::Tensor::from_shape(&shape, values),
            TensorData::Float32(values) => tract_onnx::prelude::Tensor::from_shape(&shape, values),
        }
        .map_err(|e| InferenceError::InvalidInput(e.to_string()))
    }

    fn value_num_dims(value: &Self::Value) -> Result<usize> {
        Ok(value.rank())
    }

    fn value_dim(value: &Self::Value, index: usize) -> Result<i64> {
        value
            .shape()
            .get(index)
            .map(|&d| d as i64)
            .ok_or(InferenceError::IndexOutOfRange {
                index,
                len: value.rank(),
            })
    }

    fn value_element_type(value: &Self::Value) -> Result<ElementType> {
        element_type(value)
    }

    fn value_copy_to(value: &Self::Value, dst: &mut [u8]) -> Result<()> {
        match element_type(value)? {
            ElementType::Int64 => {
                let data = value
                    .as_slice::<i64>()
                    .map_err(|e| InferenceError::OutputExtraction(e.to_string()))?;
                write_ne_bytes(TensorData::Int64(data), dst)
            }
            ElementType::Float32 => {
                let data = value
                    .as_slice::<f32>()
                    .map_err(|e| InferenceError::OutputExtraction(e.to_string()))?;
                write_ne_bytes(TensorData::Float32(data), dst)
            }
        }
    }

    fn run(
        session: &mut Self::Session,
        inputs: &[(&str, &Self::Value)],
        output_names: &[String],
    ) -> Result<Vec<Self::Value>> {
        // The plan takes inputs in graph order, which may differ from the caller's order.
        let tract_inputs: TVec<TValue> = session
            .model_inputs
            .iter()
            .map(|model_input| {
                inputs
                    .iter()
                    .find(|(name, _)| *name == model_input.as_str())
                    .map(|(_, value)| (*value).clone().into_tvalue())
                    .ok_or_else(|| {
                        InferenceError::InvalidInput(format!("model input '{}' is not bound", model_input))
                    })
            })
            .collect::<Result<TVec<_>>>()?;

        let mut outputs: Vec<Option<TValue>> = session
            .plan
            .run(tract_inputs)
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?
            .into_iter()
            .map(Some)
            .collect();

        output_names
            .iter()
            .map(|name| {
                session
                    .model_outputs
                    .iter()
                    .position(|o| o == name)
                    .and_then(|idx| outputs.get_mut(idx).and_then(Option::take))
                    .map(|v| v.into_tensor())
                    .ok_or_else(|| InferenceError::OutputExtraction(format!("model has no output '{}'", name)))
            })
            .collect()
    }
}
