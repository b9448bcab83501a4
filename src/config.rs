//! Bridge configuration, loaded from JSON
//!
//! ```json
//! {
//!   "library_name": "libgeobridge_native.so",
//!   "search_paths": ["/opt/geo/lib"],
//!   "log_capacity": 100,
//!   "wire_format": "envelope",
//!   "triangulate_meshes": false,
//!   "builder_capacity": 1024
//! }
//! ```
//! Every field is optional.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::codec::{EncodeOptions, WireFormat, DEFAULT_BUILDER_CAPACITY};
use crate::diagnostics::DEFAULT_LOG_CAPACITY;

fn default_log_capacity() -> usize {
    DEFAULT_LOG_CAPACITY
}

fn default_builder_capacity() -> usize {
    DEFAULT_BUILDER_CAPACITY
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Overrides the platform's native library file name
    #[serde(default)]
    pub library_name: Option<String>,
    /// Searched before the executable directory
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
    #[serde(default)]
    pub wire_format: WireFormat,
    #[serde(default)]
    pub triangulate_meshes: bool,
    #[serde(default = "default_builder_capacity")]
    pub builder_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            library_name: None,
            search_paths: Vec::new(),
            log_capacity: DEFAULT_LOG_CAPACITY,
            wire_format: WireFormat::default(),
            triangulate_meshes: false,
            builder_capacity: DEFAULT_BUILDER_CAPACITY,
        }
    }
}

impl BridgeConfig {
    pub fn from_json(text: &str) -> Result<Self, anyhow::Error> {
        let config: BridgeConfig =
            serde_json::from_str(text).context("Invalid bridge configuration")?;
        if config.log_capacity == 0 {
            return Err(anyhow::anyhow!("log_capacity must be at least 1"));
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, anyhow::Error> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Options for payloads other than meshes (never triangulated)
    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            triangulate: false,
            min_capacity: self.builder_capacity,
        }
    }

    pub fn mesh_encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            triangulate: self.triangulate_meshes,
            min_capacity: self.builder_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = BridgeConfig::from_json("{}").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.log_capacity, 100);
        assert_eq!(config.wire_format, WireFormat::Envelope);
    }

    #[test]
    fn test_partial_config() {
        let config = BridgeConfig::from_json(
            r#"{"wire_format": "flat", "triangulate_meshes": true, "search_paths": ["/opt/geo"]}"#,
        )
        .unwrap();
        assert_eq!(config.wire_format, WireFormat::Flat);
        assert!(config.mesh_encode_options().triangulate);
        assert!(!config.encode_options().triangulate);
        assert_eq!(config.search_paths, vec![PathBuf::from("/opt/geo")]);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(BridgeConfig::from_json(r#"{"wire_format": "xml"}"#).is_err());
        assert!(BridgeConfig::from_json(r#"{"log_capacity": 0}"#).is_err());
        assert!(BridgeConfig::from_json("not json").is_err());
    }
}
