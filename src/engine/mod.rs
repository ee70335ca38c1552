//! Core inference engine
//!
//! - ModelManager: owns the single model instance (load once, retry on failure)
//! - ExecutionGate: one model call at a time, process-wide
//! - NonStreamingExecutor / StreamingEngine: the two execution paths
//! - HealthReporter: liveness from the manager's point of view

mod executor;
mod gate;
mod health;
mod manager;
mod request;
mod stream;

pub use executor::NonStreamingExecutor;
pub use gate::{ExecutionGate, ExecutionPermit};
pub use health::{HealthReporter, HealthStatus};
pub use manager::{ModelManager, ModelState};
pub use request::{Choice, CompletionRequest, CompletionResult, StreamChunk, Usage};
pub use stream::{StreamEvent, StreamHandle, StreamOutcome, StreamingEngine};

use std::sync::Arc;

use crate::config::InferenceConfig;
use crate::error::Result;
use crate::runtime::RuntimeLoader;

/// Everything a request handler needs, wired around one shared gate
#[derive(Clone)]
pub struct Engine {
    manager: Arc<ModelManager>,
    executor: NonStreamingExecutor,
    streaming: StreamingEngine,
    health: HealthReporter,
}

impl Engine {
    pub fn new(loader: Arc<dyn RuntimeLoader>, config: InferenceConfig) -> Self {
        let gate = ExecutionGate::new(config.queue_timeout());
        let manager = Arc::new(ModelManager::new(loader, config));
        Self {
            executor: NonStreamingExecutor::new(gate.clone()),
            streaming: StreamingEngine::new(gate),
            health: HealthReporter::new(Arc::clone(&manager)),
            manager,
        }
    }

    pub fn manager(&self) -> &Arc<ModelManager> {
        &self.manager
    }

    /// Run a non-streaming request
    pub async fn complete(&self, request: CompletionRequest) -> Result<CompletionResult> {
        let runtime = self.manager.get().await?;
        self.executor.execute(runtime, request).await
    }

    /// Start a streaming request
    pub async fn stream(&self, request: CompletionRequest) -> Result<StreamHandle> {
        let runtime = self.manager.get().await?;
        self.streaming.start(runtime, request).await
    }

    pub async fn health(&self) -> HealthStatus {
        self.health.check().await
    }
}
