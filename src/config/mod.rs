//! Configuration system for solo
//!
//! A single file (YAML or JSON) with three sections: the served model,
//! the HTTP server, and default generation parameters. CLI flags are
//! applied on top by `solo serve`.

mod generation;
mod inference;
mod server;

pub use generation::GenerationConfig;
pub use inference::InferenceConfig;
pub use server::ServerConfig;

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Solo configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SoloConfig {
    /// Served model settings
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Defaults for omitted request parameters
    #[serde(default)]
    pub generation: GenerationConfig,
}

impl SoloConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("reading {}", path.as_ref().display()))?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("reading {}", path.as_ref().display()))?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load by extension: `.json` is JSON, anything else is YAML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(path),
            _ => Self::from_yaml(path),
        }
    }
}
