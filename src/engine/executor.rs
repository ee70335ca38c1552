//! Non-streaming execution
//!
//! Holds the execution gate for the entire model call, then assembles the
//! aggregated result. Either the full result comes back or nothing does.

use std::sync::Arc;

use super::gate::ExecutionGate;
use super::request::{completion_id, unix_now, Choice, CompletionRequest, CompletionResult, Usage};
use crate::config::GenerationConfig;
use crate::error::{Result, SoloError};
use crate::runtime::{CancelFlag, FinishReason, Message, ModelRuntime, RuntimeCompletion};

/// Runs admitted non-streaming requests against the model
#[derive(Debug, Clone)]
pub struct NonStreamingExecutor {
    gate: ExecutionGate,
}

impl NonStreamingExecutor {
    pub fn new(gate: ExecutionGate) -> Self {
        Self { gate }
    }

    /// Run one request to completion
    pub async fn execute(
        &self,
        runtime: Arc<dyn ModelRuntime>,
        request: CompletionRequest,
    ) -> Result<CompletionResult> {
        let cancel = CancelFlag::new();
        // Tell the runtime to give up if this future is dropped mid-call
        let _abandon = cancel.cancel_on_drop();

        let CompletionRequest {
            model,
            messages,
            params,
            ..
        } = request;

        let raw = self
            .gate
            .with_exclusive_access(move || call(runtime.as_ref(), &messages, &params, &cancel))
            .await??;

        assemble(model, raw)
    }
}

/// The model call itself, on the blocking pool with the permit held.
/// Skipped when the caller gave up while queued for the gate.
fn call(
    runtime: &dyn ModelRuntime,
    messages: &[Message],
    params: &GenerationConfig,
    cancel: &CancelFlag,
) -> Result<RuntimeCompletion> {
    if cancel.is_cancelled() {
        tracing::debug!("Caller went away before generation started");
        return Err(SoloError::Cancelled);
    }

    runtime.complete(messages, params, cancel).map_err(|e| {
        if cancel.is_cancelled() {
            tracing::debug!("Generation abandoned: {:#}", e);
            return SoloError::Cancelled;
        }
        tracing::warn!("Generation failed: {:#}", e);
        SoloError::Internal(format!("{:#}", e))
    })
}

fn assemble(model: String, raw: RuntimeCompletion) -> Result<CompletionResult> {
    if raw.choices.is_empty() {
        return Err(SoloError::Internal(
            "model returned no choices".to_string(),
        ));
    }

    let choices = raw
        .choices
        .into_iter()
        .enumerate()
        .map(|(index, choice)| Choice {
            index,
            role: "assistant".to_string(),
            content: choice.text,
            finish_reason: choice.finish_reason.unwrap_or(FinishReason::Stop),
        })
        .collect();

    Ok(CompletionResult {
        id: completion_id(),
        created_at: unix_now(),
        model,
        choices,
        usage: Usage::new(raw.prompt_tokens, raw.completion_tokens),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use anyhow::bail;

    use super::*;
    use crate::runtime::{ChunkIter, RuntimeChoice};

    /// Slow runtime that records the window of every call
    struct SlowRuntime {
        windows: Mutex<Vec<(Instant, Instant)>>,
        reply: Option<&'static str>,
    }

    impl SlowRuntime {
        fn new(reply: Option<&'static str>) -> Self {
            Self {
                windows: Mutex::new(Vec::new()),
                reply,
            }
        }
    }

    impl ModelRuntime for SlowRuntime {
        fn name(&self) -> &str {
            "slow"
        }

        fn context_size(&self) -> usize {
            2048
        }

        fn complete(
            &self,
            _messages: &[Message],
            _params: &GenerationConfig,
            _cancel: &CancelFlag,
        ) -> anyhow::Result<RuntimeCompletion> {
            let start = Instant::now();
            std::thread::sleep(Duration::from_millis(50));
            self.windows.lock().unwrap().push((start, Instant::now()));
            let Some(text) = self.reply else {
                bail!("CUDA error: out of memory");
            };
            Ok(RuntimeCompletion {
                choices: vec![
                    RuntimeChoice {
                        text: text.to_string(),
                        finish_reason: Some(FinishReason::Stop),
                    },
                    RuntimeChoice {
                        text: "second".to_string(),
                        finish_reason: None,
                    },
                ],
                prompt_tokens: 7,
                completion_tokens: None,
            })
        }

        fn stream(
            &self,
            _messages: &[Message],
            _params: &GenerationConfig,
            _cancel: CancelFlag,
        ) -> anyhow::Result<ChunkIter> {
            bail!("not used")
        }
    }

    /// Runtime that blocks until its cancel flag is raised
    struct BlockingRuntime {
        started: Mutex<Option<std::sync::mpsc::Sender<()>>>,
        seen: Mutex<Option<CancelFlag>>,
        calls: Mutex<usize>,
    }

    impl BlockingRuntime {
        fn new(started: std::sync::mpsc::Sender<()>) -> Self {
            Self {
                started: Mutex::new(Some(started)),
                seen: Mutex::new(None),
                calls: Mutex::new(0),
            }
        }
    }

    impl ModelRuntime for BlockingRuntime {
        fn name(&self) -> &str {
            "blocking"
        }

        fn context_size(&self) -> usize {
            2048
        }

        fn complete(
            &self,
            _messages: &[Message],
            _params: &GenerationConfig,
            cancel: &CancelFlag,
        ) -> anyhow::Result<RuntimeCompletion> {
            *self.calls.lock().unwrap() += 1;
            *self.seen.lock().unwrap() = Some(cancel.clone());
            if let Some(started) = self.started.lock().unwrap().take() {
                let _ = started.send(());
            }
            let deadline = Instant::now() + Duration::from_secs(2);
            while !cancel.is_cancelled() {
                if Instant::now() > deadline {
                    bail!("never cancelled");
                }
                std::thread::sleep(Duration::from_millis(5));
            }
            bail!("generation cancelled")
        }

        fn stream(
            &self,
            _messages: &[Message],
            _params: &GenerationConfig,
            _cancel: CancelFlag,
        ) -> anyhow::Result<ChunkIter> {
            bail!("not used")
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "slow".to_string(),
            messages: vec![Message::new("user", "2+2?")],
            params: GenerationConfig::default(),
            stream: false,
        }
    }

    #[tokio::test]
    async fn test_assembles_choices_in_order() {
        let executor = NonStreamingExecutor::new(ExecutionGate::default());
        let result = executor
            .execute(Arc::new(SlowRuntime::new(Some("4"))), request())
            .await
            .unwrap();

        assert!(result.id.starts_with("chatcmpl-"));
        assert_eq!(result.choices.len(), 2);
        assert_eq!(result.choices[0].index, 0);
        assert_eq!(result.choices[0].content, "4");
        assert_eq!(result.choices[0].finish_reason, FinishReason::Stop);
        assert_eq!(result.choices[1].index, 1);
        assert_eq!(result.choices[1].finish_reason, FinishReason::Stop);
        assert_eq!(result.usage.prompt_tokens, 7);
        assert_eq!(result.usage.completion_tokens, None);
    }

    #[tokio::test]
    async fn test_runtime_error_becomes_internal() {
        let gate = ExecutionGate::default();
        let executor = NonStreamingExecutor::new(gate.clone());
        let err = executor
            .execute(Arc::new(SlowRuntime::new(None)), request())
            .await
            .unwrap_err();
        assert_eq!(err, SoloError::Internal("CUDA error: out of memory".into()));
        assert!(!gate.is_busy());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_calls_never_overlap() {
        let runtime = Arc::new(SlowRuntime::new(Some("ok")));
        let executor = NonStreamingExecutor::new(ExecutionGate::default());

        let a = {
            let executor = executor.clone();
            let runtime = Arc::clone(&runtime);
            tokio::spawn(async move { executor.execute(runtime, request()).await })
        };
        let b = {
            let executor = executor.clone();
            let runtime = Arc::clone(&runtime);
            tokio::spawn(async move { executor.execute(runtime, request()).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let mut windows = runtime.windows.lock().unwrap().clone();
        windows.sort();
        assert_eq!(windows.len(), 2);
        assert!(windows[0].1 <= windows[1].0, "execution windows overlap");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_abandoned_call_raises_cancel_flag() {
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let runtime = Arc::new(BlockingRuntime::new(started_tx));
        let gate = ExecutionGate::default();
        let executor = NonStreamingExecutor::new(gate.clone());

        let task = {
            let runtime = Arc::clone(&runtime);
            tokio::spawn(async move { executor.execute(runtime, request()).await })
        };
        tokio::task::spawn_blocking(move || started_rx.recv())
            .await
            .unwrap()
            .unwrap();
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        // The runtime sees the flag, returns, and only then frees the slot
        let _permit = gate.acquire().await.unwrap();
        let cancel = runtime.seen.lock().unwrap().clone().unwrap();
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_cancelled_before_start_skips_runtime() {
        let (started_tx, _started_rx) = std::sync::mpsc::channel();
        let runtime = BlockingRuntime::new(started_tx);
        let cancel = CancelFlag::new();
        cancel.cancel();

        let err = call(&runtime, &[], &GenerationConfig::default(), &cancel).unwrap_err();
        assert_eq!(err, SoloError::Cancelled);
        assert_eq!(*runtime.calls.lock().unwrap(), 0);
    }
}
