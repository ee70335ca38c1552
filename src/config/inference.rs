//! Inference configuration settings

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the single served model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Path to the model file
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Name reported to clients (defaults to the file stem of `model_path`)
    #[serde(default)]
    pub model_name: Option<String>,

    /// Context window size in tokens
    #[serde(default = "default_context_size")]
    pub context_size: usize,

    /// Load the model at startup instead of on the first request
    #[serde(default)]
    pub preload: bool,

    /// How long a request may wait for the execution slot.
    /// None waits until the slot frees up or the client goes away.
    #[serde(default)]
    pub queue_timeout_secs: Option<u64>,
}

fn default_model_path() -> PathBuf {
    PathBuf::from("./models/model.gguf")
}

fn default_context_size() -> usize {
    2048
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            model_name: None,
            context_size: default_context_size(),
            preload: false,
            queue_timeout_secs: None,
        }
    }
}

impl InferenceConfig {
    /// Model id as reported on the wire
    pub fn served_model_name(&self) -> String {
        self.model_name.clone().unwrap_or_else(|| {
            self.model_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "default".to_string())
        })
    }

    pub fn queue_timeout(&self) -> Option<Duration> {
        self.queue_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_served_model_name_from_path() {
        let config = InferenceConfig {
            model_path: PathBuf::from("/models/mistral-7b.Q4_K_M.gguf"),
            ..Default::default()
        };
        assert_eq!(config.served_model_name(), "mistral-7b.Q4_K_M");
    }

    #[test]
    fn test_served_model_name_override() {
        let config = InferenceConfig {
            model_name: Some("local-chat".to_string()),
            ..Default::default()
        };
        assert_eq!(config.served_model_name(), "local-chat");
    }

    #[test]
    fn test_queue_timeout_unbounded_by_default() {
        assert!(InferenceConfig::default().queue_timeout().is_none());
        let config = InferenceConfig {
            queue_timeout_secs: Some(30),
            ..Default::default()
        };
        assert_eq!(config.queue_timeout(), Some(Duration::from_secs(30)));
    }
}
