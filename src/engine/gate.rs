//! Process-wide execution gate
//!
//! The model runtime is not reentrant, so every call into it happens while
//! holding the one [`ExecutionPermit`]. Waiters are served in FIFO order
//! (tokio's mutex is fair), so nobody starves under normal load.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{Result, SoloError};

/// Single-flight gate in front of the model runtime
#[derive(Debug, Clone)]
pub struct ExecutionGate {
    slot: Arc<Mutex<()>>,
    queue_timeout: Option<Duration>,
}

/// Exclusive access to the model. Released on drop, on every exit path.
#[derive(Debug)]
pub struct ExecutionPermit {
    _guard: OwnedMutexGuard<()>,
    acquired_at: Instant,
}

impl ExecutionPermit {
    /// How long this permit has been held
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

impl Default for ExecutionGate {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ExecutionGate {
    /// `queue_timeout` bounds how long [`acquire`](Self::acquire) waits; None waits forever
    pub fn new(queue_timeout: Option<Duration>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(())),
            queue_timeout,
        }
    }

    /// Wait for exclusive access
    pub async fn acquire(&self) -> Result<ExecutionPermit> {
        let started = Instant::now();
        let guard = match self.queue_timeout {
            None => self.slot.clone().lock_owned().await,
            Some(limit) => tokio::time::timeout(limit, self.slot.clone().lock_owned())
                .await
                .map_err(|_| SoloError::Busy(limit))?,
        };
        tracing::debug!("Execution slot acquired after {:?}", started.elapsed());
        Ok(ExecutionPermit {
            _guard: guard,
            acquired_at: Instant::now(),
        })
    }

    /// Run a blocking closure with exclusive access.
    ///
    /// The permit travels with the closure onto the blocking pool, so it is
    /// released only once `f` has returned, even if the caller stops
    /// awaiting in the meantime.
    pub async fn with_exclusive_access<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self.acquire().await?;
        tokio::task::spawn_blocking(move || {
            let out = f();
            tracing::debug!("Execution slot released after {:?}", permit.held_for());
            drop(permit);
            out
        })
        .await
        .map_err(|e| SoloError::Internal(format!("model call aborted: {}", e)))
    }

    /// Whether someone currently holds the permit
    pub fn is_busy(&self) -> bool {
        self.slot.try_lock().is_err()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_permit_released_on_drop() {
        let gate = ExecutionGate::default();
        let permit = gate.acquire().await.unwrap();
        assert!(gate.is_busy());
        drop(permit);
        assert!(!gate.is_busy());
    }

    #[tokio::test]
    async fn test_queue_timeout_reports_busy() {
        let gate = ExecutionGate::new(Some(Duration::from_millis(20)));
        let _held = gate.acquire().await.unwrap();
        let err = gate.acquire().await.unwrap_err();
        assert_eq!(err, SoloError::Busy(Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn test_released_after_panic() {
        let gate = ExecutionGate::default();
        let err = gate
            .with_exclusive_access::<_, ()>(|| panic!("runtime blew up"))
            .await
            .unwrap_err();
        assert!(matches!(err, SoloError::Internal(_)));
        assert!(!gate.is_busy());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_at_most_one_closure_runs() {
        let gate = ExecutionGate::default();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let gate = gate.clone();
            let active = active.clone();
            let peak = peak.clone();
            tasks.push(tokio::spawn(async move {
                gate.with_exclusive_access(move || {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(5));
                    active.fetch_sub(1, Ordering::SeqCst);
                })
                .await
                .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abandoned_caller_keeps_slot_until_done() {
        let gate = ExecutionGate::default();
        let (started_tx, started_rx) = std::sync::mpsc::channel::<()>();
        let (finish_tx, finish_rx) = std::sync::mpsc::channel::<()>();

        let call = {
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.with_exclusive_access(move || {
                    started_tx.send(()).unwrap();
                    finish_rx.recv().unwrap();
                })
                .await
            })
        };
        tokio::task::spawn_blocking(move || started_rx.recv().unwrap())
            .await
            .unwrap();

        // Caller goes away while the model call is still running
        call.abort();
        let _ = call.await;
        assert!(gate.is_busy());

        finish_tx.send(()).unwrap();
        let permit = gate.acquire().await.unwrap();
        drop(permit);
    }
}
