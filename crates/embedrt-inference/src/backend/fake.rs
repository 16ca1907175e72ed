//! In-process backend for unit tests.
//!
//! Sessions record every run in a registry keyed by model path, and values
//! count their drops per thread, so lifecycle rules can be checked without
//! an engine library.

use std::cell::Cell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};

use super::{write_ne_bytes, InferenceBackend};
use crate::tensor::{ElementType, TensorData};
use crate::{ExecutionProvider, InferenceError, Result};

#[derive(Debug, Clone, Default)]
pub(crate) struct RunRecord {
    pub runs: usize,
    pub last_inputs: Vec<String>,
}

static RUNS: LazyLock<Mutex<HashMap<PathBuf, RunRecord>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

thread_local! {
    static DROPPED_VALUES: Cell<usize> = const { Cell::new(0) };
    static DROPPED_SESSIONS: Cell<usize> = const { Cell::new(0) };
}

/// Run history for the model at `path`.
pub(crate) fn runs(path: &str) -> RunRecord {
    RUNS.lock()
        .unwrap()
        .get(Path::new(path))
        .cloned()
        .unwrap_or_default()
}

/// Values dropped on the current thread.
pub(crate) fn dropped_values() -> usize {
    DROPPED_VALUES.with(|c| c.get())
}

/// Sessions dropped on the current thread.
pub(crate) fn dropped_sessions() -> usize {
    DROPPED_SESSIONS.with(|c| c.get())
}

pub(crate) struct FakeBackend;

pub(crate) struct FakeSession {
    path: PathBuf,
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        DROPPED_SESSIONS.with(|c| c.set(c.get() + 1));
    }
}

enum FakeData {
    Int64(Vec<i64>),
    Float32(Vec<f32>),
}

pub(crate) struct FakeValue {
    dims: Vec<i64>,
    data: FakeData,
}

impl Drop for FakeValue {
    fn drop(&mut self) {
        DROPPED_VALUES.with(|c| c.set(c.get() + 1));
    }
}

impl InferenceBackend for FakeBackend {
    type Session = FakeSession;
    type Value = FakeValue;

    fn name() -> &'static str {
        "fake"
    }

    fn check_provider(provider: ExecutionProvider) -> Result<()> {
        match provider {
            ExecutionProvider::Cpu | ExecutionProvider::Cuda => Ok(()),
            other => Err(InferenceError::UnsupportedProvider {
                provider: other,
                reason: "not available in the test backend".to_string(),
            }),
        }
    }

    fn load_session(path: &Path, _provider: ExecutionProvider) -> Result<Self::Session> {
        if path.extension().and_then(|e| e.to_str()) != Some("onnx") {
            return Err(InferenceError::ModelLoad(format!("{} is not an ONNX file", path.display())));
        }
        RUNS.lock().unwrap().insert(path.to_path_buf(), RunRecord::default());
        Ok(FakeSession {
            path: path.to_path_buf(),
        })
    }

    fn create_value(dims: &[i64], data: TensorData<'_>) -> Result<Self::Value> {
        let data = match data {
            TensorData::Int64(v) => FakeData::Int64(v.to_vec()),
            TensorData::Float32(v) => FakeData::Float32(v.to_vec()),
        };
        Ok(FakeValue {
            dims: dims.to_vec(),
            data,
        })
    }

    fn value_num_dims(value: &Self::Value) -> Result<usize> {
        Ok(value.dims.len())
    }

    fn value_dim(value: &Self::Value, index: usize) -> Result<i64> {
        Ok(value.dims[index])
    }

    fn value_element_type(value: &Self::Value) -> Result<ElementType> {
        Ok(match value.data {
            FakeData::Int64(_) => ElementType::Int64,
            FakeData::Float32(_) => ElementType::Float32,
        })
    }

    fn value_copy_to(value: &Self::Value, dst: &mut [u8]) -> Result<()> {
        match &value.data {
            FakeData::Int64(v) => write_ne_bytes(TensorData::Int64(v), dst),
            FakeData::Float32(v) => write_ne_bytes(TensorData::Float32(v), dst),
        }
    }

    /// Output `k` is a `[1, k + 1]` float tensor filled with `k`. An output
    /// named `panic` makes the run panic while the session lock is held.
    fn run(
        session: &mut Self::Session,
        inputs: &[(&str, &Self::Value)],
        output_names: &[String],
    ) -> Result<Vec<Self::Value>> {
        {
            let mut runs = RUNS.lock().unwrap();
            let record = runs.entry(session.path.clone()).or_default();
            record.runs += 1;
            record.last_inputs = inputs.iter().map(|(name, _)| name.to_string()).collect();
        }

        if output_names.iter().any(|name| name == "panic") {
            panic!("engine aborted during run");
        }

        Ok((0..output_names.len())
            .map(|k| FakeValue {
                dims: vec![1, k as i64 + 1],
                data: FakeData::Float32(vec![k as f32; k + 1]),
            })
            .collect())
    }
}
