//! Benchmark configuration.

use crate::activity::DEFAULT_TEMPLATE;
use rb_render::{BackendKind, RenderContext};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Every field has a default, so a config file only lists what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BenchConfig {
    pub width: u32,
    pub height: u32,
    /// Shapes materialized per batch during a build.
    pub chunk_size: usize,
    pub frame_interval_ms: u64,
    /// Render-loop ticks run with no input after each build.
    pub idle_frames: u32,
    /// Pointer moves in the scripted drag gesture, one per frame.
    pub drag_frames: u32,
    /// Pointer travel per drag frame.
    pub drag_step: f32,
    /// Mutation palette seed; `null` seeds from the OS.
    pub seed: Option<u64>,
    pub activity_template: String,
    /// Root directory for scene, activity and resource locations.
    pub data_root: PathBuf,
    pub backends: Vec<BackendKind>,
    pub activity_advances: u32,
    pub mutations: u32,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            chunk_size: RenderContext::DEFAULT_CHUNK_SIZE,
            frame_interval_ms: 16,
            idle_frames: 60,
            drag_frames: 60,
            drag_step: 4.0,
            seed: Some(RenderContext::DEFAULT_SEED),
            activity_template: DEFAULT_TEMPLATE.to_string(),
            data_root: PathBuf::from("."),
            backends: BackendKind::ALL.to_vec(),
            activity_advances: 2,
            mutations: 1,
        }
    }
}

impl BenchConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_object_is_all_defaults() {
        assert_eq!(BenchConfig::from_json("{}").unwrap(), BenchConfig::default());
    }

    #[test]
    fn partial_file_overrides_named_fields() {
        let config = BenchConfig::from_json(
            r#"{ "width": 640, "backends": ["svg", "canvas"], "seed": null }"#,
        )
        .unwrap();
        assert_eq!(config.width, 640);
        assert_eq!(config.height, 720);
        assert_eq!(config.backends, [BackendKind::Svg, BackendKind::Canvas]);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(BenchConfig::from_json(r#"{ "backends": ["webgl"] }"#).is_err());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = BenchConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn frame_interval_is_never_zero() {
        let config = BenchConfig {
            frame_interval_ms: 0,
            ..BenchConfig::default()
        };
        assert_eq!(config.frame_interval(), Duration::from_millis(1));
    }
}
