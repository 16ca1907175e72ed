//! Execution provider selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::InferenceError;

/// Backend the inference engine uses to execute the model graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    #[default]
    Cpu,
    Cuda,
    #[serde(rename = "tensorrt")]
    TensorRt,
    #[serde(rename = "coreml")]
    CoreMl,
}

impl ExecutionProvider {
    /// All providers, in declaration order.
    pub const ALL: [ExecutionProvider; 4] = [
        ExecutionProvider::Cpu,
        ExecutionProvider::Cuda,
        ExecutionProvider::TensorRt,
        ExecutionProvider::CoreMl,
    ];

    /// Canonical lowercase name, as used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionProvider::Cpu => "cpu",
            ExecutionProvider::Cuda => "cuda",
            ExecutionProvider::TensorRt => "tensorrt",
            ExecutionProvider::CoreMl => "coreml",
        }
    }

    /// Checks that the provider can exist on the current target at all.
    ///
    /// CoreML only ships on Apple platforms; everything else is left to the
    /// backend, which knows what its build was linked against.
    pub fn check_platform(&self) -> Result<(), InferenceError> {
        if *self == ExecutionProvider::CoreMl && !cfg!(target_vendor = "apple") {
            return Err(InferenceError::UnsupportedProvider {
                provider: *self,
                reason: "CoreML is only available on Apple platforms".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionProvider {
    type Err = InferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        ExecutionProvider::ALL
            .into_iter()
            .find(|p| p.as_str() == lower)
            .ok_or_else(|| InferenceError::InvalidInput(format!("unknown execution provider '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_provider_names() {
        assert_eq!("cpu".parse::<ExecutionProvider>().unwrap(), ExecutionProvider::Cpu);
        assert_eq!("CUDA".parse::<ExecutionProvider>().unwrap(), ExecutionProvider::Cuda);
        assert_eq!(" TensorRT ".parse::<ExecutionProvider>().unwrap(), ExecutionProvider::TensorRt);
        assert_eq!("coreml".parse::<ExecutionProvider>().unwrap(), ExecutionProvider::CoreMl);
        assert!("vulkan".parse::<ExecutionProvider>().is_err());
    }

    #[test]
    fn test_serde_names_match_display() {
        for provider in ExecutionProvider::ALL {
            let json = serde_json::to_string(&provider).unwrap();
            assert_eq!(json, format!("\"{}\"", provider));
            let back: ExecutionProvider = serde_json::from_str(&json).unwrap();
            assert_eq!(back, provider);
        }
    }

    #[test]
    fn test_coreml_platform_check() {
        let result = ExecutionProvider::CoreMl.check_platform();
        if cfg!(target_vendor = "apple") {
            assert!(result.is_ok());
        } else {
            assert!(matches!(result, Err(InferenceError::UnsupportedProvider { .. })));
        }
        assert!(ExecutionProvider::Cpu.check_platform().is_ok());
    }
}
