//! Built-in echo runtime
//!
//! Answers with the last user message, one whitespace-delimited piece per
//! token. Deterministic, dependency-free, and cheap enough to serve the
//! gateway end to end without an accelerator stack.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};

use super::{
    format_chat_messages, CancelFlag, ChunkIter, FinishReason, Message, ModelRuntime,
    RuntimeChoice, RuntimeChunk, RuntimeCompletion, RuntimeLoader,
};
use crate::config::{GenerationConfig, InferenceConfig};

/// Loads an [`EchoRuntime`] once the configured model file is present
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoLoader;

impl RuntimeLoader for EchoLoader {
    fn load(&self, config: &InferenceConfig) -> Result<Arc<dyn ModelRuntime>> {
        let path = &config.model_path;
        if !path.is_file() {
            bail!("model file not found: {}", path.display());
        }
        let runtime = EchoRuntime::new(config.served_model_name(), config.context_size);
        Ok(Arc::new(runtime))
    }
}

pub struct EchoRuntime {
    name: String,
    context_size: usize,
}

impl EchoRuntime {
    pub fn new(name: impl Into<String>, context_size: usize) -> Self {
        Self {
            name: name.into(),
            context_size,
        }
    }

    fn prompt_tokens(&self, messages: &[Message]) -> Result<usize> {
        let count = format_chat_messages(messages).split_whitespace().count();
        if count >= self.context_size {
            bail!(
                "prompt of {} tokens does not fit the context window of {}",
                count,
                self.context_size
            );
        }
        Ok(count)
    }
}

/// Tokens to emit and why emission ends
struct Plan {
    pieces: Vec<String>,
    finish: FinishReason,
}

fn plan(messages: &[Message], params: &GenerationConfig) -> Plan {
    let reply = messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .or_else(|| messages.last())
        .map(|m| m.content.as_str())
        .unwrap_or_default();

    let mut pieces: Vec<String> = Vec::new();
    let mut text = String::new();

    for piece in reply.split_inclusive(char::is_whitespace) {
        if pieces.len() >= params.max_tokens {
            return Plan {
                pieces,
                finish: FinishReason::Length,
            };
        }
        text.push_str(piece);
        pieces.push(piece.to_string());

        if let Some(cut) = earliest_stop(&text, &params.stop_sequences) {
            truncate_pieces(&mut pieces, cut);
            return Plan {
                pieces,
                finish: FinishReason::Stop,
            };
        }
    }

    Plan {
        pieces,
        finish: FinishReason::Stop,
    }
}

fn earliest_stop(text: &str, stops: &[String]) -> Option<usize> {
    stops
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min()
}

/// Keep the first `keep` bytes of the concatenated pieces
fn truncate_pieces(pieces: &mut Vec<String>, mut keep: usize) {
    let mut kept = Vec::with_capacity(pieces.len());
    for piece in pieces.drain(..) {
        if keep == 0 {
            break;
        }
        if piece.len() <= keep {
            keep -= piece.len();
            kept.push(piece);
        } else {
            kept.push(piece[..keep].to_string());
            keep = 0;
        }
    }
    kept.retain(|p| !p.is_empty());
    *pieces = kept;
}

impl ModelRuntime for EchoRuntime {
    fn name(&self) -> &str {
        &self.name
    }

    fn context_size(&self) -> usize {
        self.context_size
    }

    fn complete(
        &self,
        messages: &[Message],
        params: &GenerationConfig,
        cancel: &CancelFlag,
    ) -> Result<RuntimeCompletion> {
        let prompt_tokens = self.prompt_tokens(messages)?;
        let plan = plan(messages, params);

        let mut text = String::new();
        for piece in &plan.pieces {
            if cancel.is_cancelled() {
                return Err(anyhow!("generation cancelled"));
            }
            text.push_str(piece);
        }

        let choice = RuntimeChoice {
            text,
            finish_reason: Some(plan.finish),
        };
        let n = params.n.max(1);
        Ok(RuntimeCompletion {
            choices: vec![choice; n],
            prompt_tokens,
            completion_tokens: Some(plan.pieces.len() * n),
        })
    }

    fn stream(
        &self,
        messages: &[Message],
        params: &GenerationConfig,
        cancel: CancelFlag,
    ) -> Result<ChunkIter> {
        self.prompt_tokens(messages)?;
        let plan = plan(messages, params);
        Ok(Box::new(EchoStream {
            pieces: plan.pieces.into(),
            finish: Some(plan.finish),
            cancel,
        }))
    }
}

struct EchoStream {
    pieces: VecDeque<String>,
    finish: Option<FinishReason>,
    cancel: CancelFlag,
}

impl Iterator for EchoStream {
    type Item = Result<RuntimeChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cancel.is_cancelled() {
            return None;
        }
        match self.pieces.pop_front() {
            Some(piece) => Some(Ok(RuntimeChunk::text(piece))),
            // Final chunk carries no text, only the finish reason
            None => self.finish.take().map(|r| Ok(RuntimeChunk::finished(r))),
        }
    }
}
