//! Streaming protocol engine
//!
//! Per request: `Start -> Emitting -> {Done | Cancelled | Errored}`.
//!
//! The execution permit is taken before the chunk sequence is created and
//! is held until the end-of-stream sentinel has been attempted, so a
//! stream being drained by a slow client still owns the model exclusively.
//! Chunks are handed to the HTTP layer over a bounded channel; a closed
//! channel means the peer is gone.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::gate::{ExecutionGate, ExecutionPermit};
use super::request::{completion_id, unix_now, CompletionRequest, StreamChunk};
use crate::error::{Result, SoloError};
use crate::runtime::{CancelFlag, ModelRuntime};

/// Chunks buffered between the generator and the connection
const STREAM_BUFFER: usize = 32;

/// What the HTTP layer writes to the wire, in order
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// One application chunk
    Chunk(StreamChunk),
    /// Best-effort diagnostic after a mid-stream failure
    Error(SoloError),
    /// End-of-stream sentinel. Always the last event attempted.
    Done,
}

/// Terminal state of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// A chunk carried a finish reason
    Done,
    /// The runtime ran out of chunks without a finish reason
    Exhausted,
    /// The peer disconnected
    Cancelled,
    /// The runtime failed
    Errored,
}

/// A started stream
pub struct StreamHandle {
    pub id: String,
    pub created_at: i64,
    pub model: String,
    pub events: mpsc::Receiver<StreamEvent>,
    /// Resolves once the sentinel was attempted and the model released
    pub task: JoinHandle<StreamOutcome>,
}

/// Drives streamed generations
#[derive(Debug, Clone)]
pub struct StreamingEngine {
    gate: ExecutionGate,
}

impl StreamingEngine {
    pub fn new(gate: ExecutionGate) -> Self {
        Self { gate }
    }

    /// Wait for the model and start generating.
    ///
    /// Errors here (gate timeout) happen before anything was written, so
    /// the caller can still answer with a plain error response.
    pub async fn start(
        &self,
        runtime: Arc<dyn ModelRuntime>,
        request: CompletionRequest,
    ) -> Result<StreamHandle> {
        let permit = self.gate.acquire().await?;
        let (tx, events) = mpsc::channel(STREAM_BUFFER);

        let id = completion_id();
        let created_at = unix_now();
        let model = request.model.clone();
        let meta = ChunkMeta {
            id: id.clone(),
            created_at,
        };

        let task = tokio::task::spawn_blocking(move || run(permit, runtime, request, meta, tx));

        Ok(StreamHandle {
            id,
            created_at,
            model,
            events,
            task,
        })
    }
}

struct ChunkMeta {
    id: String,
    created_at: i64,
}

fn run(
    permit: ExecutionPermit,
    runtime: Arc<dyn ModelRuntime>,
    request: CompletionRequest,
    meta: ChunkMeta,
    tx: mpsc::Sender<StreamEvent>,
) -> StreamOutcome {
    let outcome = catch_unwind(AssertUnwindSafe(|| emit(runtime.as_ref(), &request, &meta, &tx)))
        .unwrap_or_else(|_| {
            tracing::error!("Model runtime panicked during stream {}", meta.id);
            let _ = tx.blocking_send(StreamEvent::Error(SoloError::Internal(
                "model runtime panicked".to_string(),
            )));
            StreamOutcome::Errored
        });

    // Sentinel goes out whatever happened; a gone peer just fails the send
    let _ = tx.blocking_send(StreamEvent::Done);

    match outcome {
        StreamOutcome::Cancelled => tracing::info!(
            "Stream {} abandoned by client after {:?}",
            meta.id,
            permit.held_for()
        ),
        other => tracing::debug!(
            "Stream {} finished: {:?} after {:?}",
            meta.id,
            other,
            permit.held_for()
        ),
    }
    drop(permit);
    outcome
}

fn emit(
    runtime: &dyn ModelRuntime,
    request: &CompletionRequest,
    meta: &ChunkMeta,
    tx: &mpsc::Sender<StreamEvent>,
) -> StreamOutcome {
    let cancel = CancelFlag::new();

    let chunks = match runtime.stream(&request.messages, &request.params, cancel.clone()) {
        Ok(chunks) => chunks,
        Err(e) => return fail(tx, e),
    };

    for item in chunks {
        if tx.is_closed() {
            cancel.cancel();
            return StreamOutcome::Cancelled;
        }

        let raw = match item {
            Ok(raw) => raw,
            Err(e) => return fail(tx, e),
        };

        let chunk = StreamChunk {
            id: meta.id.clone(),
            created_at: meta.created_at,
            choice_index: 0,
            delta_content: raw.delta.unwrap_or_default(),
            finish_reason: raw.finish_reason,
        };
        let finished = chunk.finish_reason.is_some();

        if tx.blocking_send(StreamEvent::Chunk(chunk)).is_err() {
            cancel.cancel();
            return StreamOutcome::Cancelled;
        }
        if finished {
            // Do not wait on the runtime for anything past the finish reason
            return StreamOutcome::Done;
        }
    }

    StreamOutcome::Exhausted
}

fn fail(tx: &mpsc::Sender<StreamEvent>, error: anyhow::Error) -> StreamOutcome {
    tracing::warn!("Generation failed mid-stream: {:#}", error);
    let _ = tx.blocking_send(StreamEvent::Error(SoloError::Internal(format!(
        "{:#}",
        error
    ))));
    StreamOutcome::Errored
}
