//! Model lifecycle management
//!
//! Owns the one model instance of the process. Loading happens on first
//! use (or at startup when preloading) and is retried after a failure.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::config::InferenceConfig;
use crate::error::{Result, SoloError};
use crate::runtime::{ModelRuntime, RuntimeLoader};

/// Lifecycle state of the served model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

/// In-memory handle to the model. The instance exists only when ready.
#[derive(Clone)]
enum ModelHandle {
    Unloaded,
    Loading,
    Ready(Arc<dyn ModelRuntime>),
    Failed(String),
}

impl ModelHandle {
    fn state(&self) -> ModelState {
        match self {
            ModelHandle::Unloaded => ModelState::Unloaded,
            ModelHandle::Loading => ModelState::Loading,
            ModelHandle::Ready(_) => ModelState::Ready,
            ModelHandle::Failed(_) => ModelState::Failed,
        }
    }
}

/// Model manager
///
/// Constructed once at startup and shared by handle with every request.
pub struct ModelManager {
    loader: Arc<dyn RuntimeLoader>,
    config: InferenceConfig,
    handle: Arc<RwLock<ModelHandle>>,
    /// Serializes load attempts so concurrent first requests load once.
    /// Held by the load task, not by the caller that started it.
    load_lock: Arc<Mutex<()>>,
}

impl ModelManager {
    pub fn new(loader: Arc<dyn RuntimeLoader>, config: InferenceConfig) -> Self {
        Self {
            loader,
            config,
            handle: Arc::new(RwLock::new(ModelHandle::Unloaded)),
            load_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Get the ready model, loading it if necessary
    pub async fn get(&self) -> Result<Arc<dyn ModelRuntime>> {
        self.load().await
    }

    /// Load the model. A no-op returning the existing instance when ready.
    ///
    /// The load itself runs on its own task, so a caller that goes away
    /// mid-load neither aborts it nor lets a second load start.
    pub async fn load(&self) -> Result<Arc<dyn ModelRuntime>> {
        if let Some(runtime) = self.ready().await {
            return Ok(runtime);
        }

        let loading = Arc::clone(&self.load_lock).lock_owned().await;

        // Someone else may have finished loading while we waited
        if let Some(runtime) = self.ready().await {
            return Ok(runtime);
        }

        let task = tokio::spawn(load_model(
            Arc::clone(&self.loader),
            self.config.clone(),
            Arc::clone(&self.handle),
            loading,
        ));

        task.await
            .map_err(|e| SoloError::ModelUnavailable(format!("load task failed: {}", e)))?
    }

    pub async fn state(&self) -> ModelState {
        self.handle.read().await.state()
    }

    /// Error of the most recent failed load, if the model is currently failed
    pub async fn last_error(&self) -> Option<String> {
        match &*self.handle.read().await {
            ModelHandle::Failed(message) => Some(message.clone()),
            _ => None,
        }
    }

    async fn ready(&self) -> Option<Arc<dyn ModelRuntime>> {
        match &*self.handle.read().await {
            ModelHandle::Ready(runtime) => Some(Arc::clone(runtime)),
            _ => None,
        }
    }
}

/// One load attempt. Owns the load lock until the handle reaches a
/// terminal state.
async fn load_model(
    loader: Arc<dyn RuntimeLoader>,
    config: InferenceConfig,
    handle: Arc<RwLock<ModelHandle>>,
    _loading: OwnedMutexGuard<()>,
) -> Result<Arc<dyn ModelRuntime>> {
    *handle.write().await = ModelHandle::Loading;
    tracing::info!("Loading model: {}", config.model_path.display());
    let start = Instant::now();

    let outcome = tokio::task::spawn_blocking(move || loader.load(&config))
        .await
        .map_err(|e| anyhow::anyhow!("loader aborted: {}", e))
        .and_then(|r| r);

    match outcome {
        Ok(runtime) => {
            tracing::info!(
                "Model '{}' loaded in {:.2}s",
                runtime.name(),
                start.elapsed().as_secs_f64()
            );
            *handle.write().await = ModelHandle::Ready(Arc::clone(&runtime));
            Ok(runtime)
        }
        Err(e) => {
            let message = format!("{:#}", e);
            tracing::error!("Model load failed: {}", message);
            *handle.write().await = ModelHandle::Failed(message.clone());
            Err(SoloError::ModelUnavailable(message))
        }
    }
}
