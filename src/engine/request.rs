//! Admitted requests and the results produced for them

use crate::config::GenerationConfig;
use crate::runtime::{FinishReason, Message};

/// A validated chat completion request. Immutable once admitted.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Model id echoed back to the client
    pub model: String,
    pub messages: Vec<Message>,
    pub params: GenerationConfig,
    pub stream: bool,
}

/// Aggregated result of a non-streaming request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResult {
    pub id: String,
    pub created_at: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub index: usize,
    pub role: String,
    pub content: String,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: Option<usize>,
    pub total_tokens: usize,
}

impl Usage {
    pub fn new(prompt_tokens: usize, completion_tokens: Option<usize>) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens.unwrap_or(0),
        }
    }
}

/// One application chunk of a streamed response
#[derive(Debug, Clone, PartialEq)]
pub struct StreamChunk {
    pub id: String,
    pub created_at: i64,
    pub choice_index: usize,
    /// Never absent; empty when the runtime sent no text
    pub delta_content: String,
    pub finish_reason: Option<FinishReason>,
}

pub(crate) fn completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4())
}

pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
