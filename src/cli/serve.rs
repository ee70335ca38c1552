//! HTTP server command

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::SoloConfig;
use crate::engine::Engine;
use crate::runtime::EchoLoader;
use crate::server;

/// Command-line values that win over the configuration file
#[derive(Debug, Default, Clone)]
pub struct ServeOverrides {
    pub model: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub ctx_size: Option<usize>,
    pub preload: bool,
    pub queue_timeout: Option<u64>,
}

impl ServeOverrides {
    fn apply(self, config: &mut SoloConfig) {
        if let Some(model) = self.model {
            config.inference.model_path = model;
        }
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ctx_size) = self.ctx_size {
            config.inference.context_size = ctx_size;
        }
        if self.preload {
            config.inference.preload = true;
        }
        if self.queue_timeout.is_some() {
            config.inference.queue_timeout_secs = self.queue_timeout;
        }
    }
}

/// Start the inference server
pub async fn serve(config_path: Option<PathBuf>, overrides: ServeOverrides) -> Result<()> {
    let mut config = match config_path {
        Some(path) => {
            tracing::info!("Using configuration from {}", path.display());
            SoloConfig::from_file(&path)?
        }
        None => SoloConfig::default(),
    };
    overrides.apply(&mut config);

    // Bad generation defaults fail before any preload
    server::Admission::new(
        config.generation.clone(),
        config.inference.served_model_name(),
        config.inference.context_size,
    )
    .context("invalid generation defaults")?;

    let engine = Engine::new(Arc::new(EchoLoader), config.inference.clone());

    if config.inference.preload {
        tracing::info!("Pre-loading model: {}", config.inference.model_path.display());
        engine.manager().load().await?;
    }

    server::start(engine, config.generation, config.server).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_win() {
        let mut config = SoloConfig::default();
        config.inference.queue_timeout_secs = Some(5);

        ServeOverrides {
            model: Some(PathBuf::from("/srv/m.gguf")),
            port: Some(9999),
            ctx_size: Some(8192),
            ..Default::default()
        }
        .apply(&mut config);

        assert_eq!(config.inference.model_path, PathBuf::from("/srv/m.gguf"));
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.inference.context_size, 8192);
        assert_eq!(config.inference.queue_timeout_secs, Some(5));
        assert!(!config.inference.preload);
    }
}
