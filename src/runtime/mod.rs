//! Model runtime interface
//!
//! The gateway never looks inside the model. A runtime is anything that
//! can turn a chat transcript into text, either all at once or as a lazy
//! sequence of chunks. Runtimes are assumed NOT to be reentrant: the
//! engine guarantees at most one call is in flight at any time.

mod echo;
mod prompt;

pub use echo::{EchoLoader, EchoRuntime};
pub use prompt::format_chat_messages;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::{GenerationConfig, InferenceConfig};

/// One turn of a chat transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Why a generation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of sequence or a stop sequence was hit
    Stop,
    /// `max_tokens` reached
    Length,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
        }
    }
}

/// One choice of a blocking completion
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeChoice {
    pub text: String,
    pub finish_reason: Option<FinishReason>,
}

/// Raw output of [`ModelRuntime::complete`]
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeCompletion {
    pub choices: Vec<RuntimeChoice>,
    pub prompt_tokens: usize,
    /// Not every runtime reports this
    pub completion_tokens: Option<usize>,
}

/// One element of a streamed generation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeChunk {
    pub delta: Option<String>,
    pub finish_reason: Option<FinishReason>,
}

impl RuntimeChunk {
    pub fn text(delta: impl Into<String>) -> Self {
        Self {
            delta: Some(delta.into()),
            finish_reason: None,
        }
    }

    pub fn finished(reason: FinishReason) -> Self {
        Self {
            delta: None,
            finish_reason: Some(reason),
        }
    }
}

/// Lazy, non-restartable sequence of chunks
pub type ChunkIter = Box<dyn Iterator<Item = Result<RuntimeChunk>> + Send>;

/// Cooperative cancellation signal shared between the engine and a runtime call.
///
/// Runtimes poll [`CancelFlag::is_cancelled`] between tokens and bail out early.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Guard that raises the flag when dropped, e.g. when the awaiting
    /// request future is abandoned.
    pub fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop(self.clone())
    }
}

/// See [`CancelFlag::cancel_on_drop`]
#[derive(Debug)]
pub struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// A loaded model instance. All methods block the calling thread.
pub trait ModelRuntime: Send + Sync {
    /// Model name
    fn name(&self) -> &str;

    /// Context window in tokens
    fn context_size(&self) -> usize;

    /// Run a full generation and return every choice at once
    fn complete(
        &self,
        messages: &[Message],
        params: &GenerationConfig,
        cancel: &CancelFlag,
    ) -> Result<RuntimeCompletion>;

    /// Start a generation and return its chunks lazily.
    ///
    /// The last chunk of a well-formed sequence carries a finish reason.
    fn stream(
        &self,
        messages: &[Message],
        params: &GenerationConfig,
        cancel: CancelFlag,
    ) -> Result<ChunkIter>;
}

/// Produces a runtime from the inference settings. May block for a long time.
pub trait RuntimeLoader: Send + Sync {
    fn load(&self, config: &InferenceConfig) -> Result<Arc<dyn ModelRuntime>>;
}
