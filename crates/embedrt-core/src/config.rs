//! Configuration for sessions and distance computation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use embedrt_inference::SessionConfig;

use crate::distance::{engine_for, DistanceEngine, DistanceKind};
use crate::error::{EmbedRtError, Result};

/// Main configuration for embedrt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedRtConfig {
    /// Model session configuration.
    pub session: SessionConfig,

    /// Distance computation configuration.
    pub distance: DistanceConfig,
}

/// Distance engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceConfig {
    /// Which engine computes distance ranges.
    pub engine: DistanceKind,
}

impl EmbedRtConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| EmbedRtError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).map_err(|e| EmbedRtError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// The distance engine this configuration selects.
    pub fn distance_engine(&self) -> Box<dyn DistanceEngine> {
        engine_for(self.distance.engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedrt_inference::ExecutionProvider;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = EmbedRtConfig {
            session: SessionConfig {
                model_path: PathBuf::from("/models/face.onnx"),
                input_names: vec!["images".to_string()],
                output_names: vec!["embeddings".to_string()],
                provider: ExecutionProvider::Cuda,
            },
            distance: DistanceConfig {
                engine: DistanceKind::Accelerated,
            },
        };
        config.save(&path).unwrap();

        let loaded = EmbedRtConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.distance_engine().kind(), DistanceKind::Accelerated);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "session": { "provider": "tensorrt" } }"#).unwrap();

        let loaded = EmbedRtConfig::from_file(&path).unwrap();
        assert_eq!(loaded.session.provider, ExecutionProvider::TensorRt);
        assert_eq!(loaded.session.input_names, SessionConfig::default().input_names);
        assert_eq!(loaded.distance.engine, DistanceKind::Portable);
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "distance": { "engine": "quantum" } }"#).unwrap();

        assert!(matches!(EmbedRtConfig::from_file(&path), Err(EmbedRtError::Config(_))));
        assert!(matches!(
            EmbedRtConfig::from_file(&dir.path().join("missing.json")),
            Err(EmbedRtError::Io(_))
        ));
    }
}
