//! Liveness reporting

use std::sync::Arc;

use super::manager::ModelManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthStatus {
    pub ok: bool,
    pub model_loaded: bool,
}

/// Reports whether the model can serve requests.
///
/// A check goes through [`ModelManager::get`], so probing an unloaded or
/// failed model triggers a load attempt.
#[derive(Clone)]
pub struct HealthReporter {
    manager: Arc<ModelManager>,
}

impl HealthReporter {
    pub fn new(manager: Arc<ModelManager>) -> Self {
        Self { manager }
    }

    pub async fn check(&self) -> HealthStatus {
        match self.manager.get().await {
            Ok(_) => HealthStatus {
                ok: true,
                model_loaded: true,
            },
            Err(e) => {
                tracing::debug!("Health check failed: {}", e);
                HealthStatus {
                    ok: false,
                    model_loaded: false,
                }
            }
        }
    }
}
