//! Inference sessions bound to fixed input and output names.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::InferenceBackend;
use crate::buffer::NativeBuffer;
use crate::error::InferenceError;
use crate::provider::ExecutionProvider;
use crate::tensor::{Tensor, TensorData};
use crate::Result;

/// Everything needed to open a [`Model`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Path to the ONNX model file.
    pub model_path: PathBuf,

    /// Input names, in the order the model expects them.
    pub input_names: Vec<String>,

    /// Output names, in the order results are returned.
    pub output_names: Vec<String>,

    /// Execution provider.
    pub provider: ExecutionProvider,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/model.onnx"),
            input_names: vec!["input".to_string()],
            output_names: vec!["output".to_string()],
            provider: ExecutionProvider::Cpu,
        }
    }
}

/// A loaded model with a fixed list of input and output names.
///
/// The session handle sits behind a mutex: a `Model` can be shared between
/// threads, inference calls are serialized, and `release` waits for any
/// running inference to finish. Tensors created from or returned by a model
/// are independent of it and must be released (or dropped) separately.
pub struct Model<B: InferenceBackend> {
    session: Mutex<NativeBuffer<B::Session>>,
    input_names: Vec<String>,
    output_names: Vec<String>,
    provider: ExecutionProvider,
}

impl<B: InferenceBackend> Model<B> {
    /// Loads the model at `model_path` on `provider` and binds the name lists.
    ///
    /// Names must be unique within each list and neither list may be empty.
    pub fn new<P, I, O>(model_path: P, input_names: I, output_names: O, provider: ExecutionProvider) -> Result<Self>
    where
        P: AsRef<Path>,
        I: IntoIterator,
        I::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        let path = model_path.as_ref();
        let input_names: Vec<String> = input_names.into_iter().map(Into::into).collect();
        let output_names: Vec<String> = output_names.into_iter().map(Into::into).collect();

        check_names("input", &input_names)?;
        check_names("output", &output_names)?;

        provider.check_platform()?;
        B::check_provider(provider)?;

        debug!(
            "Loading ONNX model from: {} ({} backend, {} provider)",
            path.display(),
            B::name(),
            provider
        );
        let session = B::load_session(path, provider)?;

        debug!("Model inputs: {:?}", input_names);
        debug!("Model outputs: {:?}", output_names);
        info!("Loaded model {}", path.display());

        Ok(Self {
            session: Mutex::new(NativeBuffer::native("session", session)),
            input_names,
            output_names,
            provider,
        })
    }

    /// Opens a model from a [`SessionConfig`].
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        Self::new(
            &config.model_path,
            config.input_names.iter().cloned(),
            config.output_names.iter().cloned(),
            config.provider,
        )
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    pub fn provider(&self) -> ExecutionProvider {
        self.provider
    }

    pub fn is_released(&self) -> bool {
        self.lock_for_release().is_released()
    }

    /// Creates an `int64` input tensor. `values.len()` must equal the product of `dims`.
    pub fn new_int64_tensor(&self, dims: &[i64], values: &[i64]) -> Result<Tensor<B>> {
        self.ensure_live()?;
        Tensor::from_input(dims, TensorData::Int64(values))
    }

    /// Creates a `float32` input tensor. `values.len()` must equal the product of `dims`.
    pub fn new_float32_tensor(&self, dims: &[i64], values: &[f32]) -> Result<Tensor<B>> {
        self.ensure_live()?;
        Tensor::from_input(dims, TensorData::Float32(values))
    }

    /// Runs the model once.
    ///
    /// Every declared input must be present in `inputs`; entries for other
    /// names are ignored. Returns one tensor per declared output, in declared
    /// order. Blocks until the engine finishes; there is no timeout.
    pub fn run_inference(&self, inputs: &HashMap<&str, &Tensor<B>>) -> Result<Vec<Tensor<B>>> {
        let missing: Vec<String> = self
            .input_names
            .iter()
            .filter(|name| !inputs.contains_key(name.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(InferenceError::MissingInput(missing));
        }

        let ordered = self
            .input_names
            .iter()
            .map(|name| {
                let tensor = inputs
                    .get(name.as_str())
                    .ok_or_else(|| InferenceError::MissingInput(vec![name.clone()]))?;
                Ok((name.as_str(), tensor.value()?))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut guard = self
            .session
            .lock()
            .map_err(|e| InferenceError::InferenceFailed(format!("Failed to lock session: {}", e)))?;
        let session = guard.get_mut()?;

        debug!("Running inference with {} inputs", ordered.len());
        let values = B::run(session, &ordered, &self.output_names)?;

        if values.len() != self.output_names.len() {
            return Err(InferenceError::OutputExtraction(format!(
                "expected {} outputs, engine returned {}",
                self.output_names.len(),
                values.len()
            )));
        }

        Ok(values.into_iter().map(Tensor::from_output).collect())
    }

    /// Frees the engine session. Calling it again is a no-op.
    pub fn release(&self) {
        if self.lock_for_release().release() {
            debug!("Released {} session", B::name());
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_released() {
            return Err(InferenceError::UseAfterRelease("session"));
        }
        Ok(())
    }

    // Release must work even if an inference call panicked while holding the lock.
    fn lock_for_release(&self) -> MutexGuard<'_, NativeBuffer<B::Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<B: InferenceBackend> fmt::Debug for Model<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("backend", &B::name())
            .field("input_names", &self.input_names)
            .field("output_names", &self.output_names)
            .field("provider", &self.provider)
            .finish()
    }
}

fn check_names(kind: &str, names: &[String]) -> Result<()> {
    if names.is_empty() {
        return Err(InferenceError::InvalidInput(format!("at least one {} name is required", kind)));
    }

    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(InferenceError::InvalidInput(format!("duplicate {} name '{}'", kind, name)));
        }
    }
    Ok(())
}
