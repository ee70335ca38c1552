//! Request admission
//!
//! Turns a deserialized wire request into an immutable [`CompletionRequest`],
//! filling omitted parameters from the configured defaults. Rejections
//! happen here, before the model is touched. The defaults themselves are
//! checked against the same ranges once, when the admission is built.

use std::ops::RangeInclusive;

use super::types::ChatRequest;
use crate::config::GenerationConfig;
use crate::engine::CompletionRequest;
use crate::error::{Result, SoloError};

const ROLES: &[&str] = &["system", "user", "assistant", "tool"];
const MAX_STOP_SEQUENCES: usize = 4;
const MAX_CHOICES: i64 = 8;

/// Validates requests and applies server-side defaults
#[derive(Debug, Clone)]
pub struct Admission {
    defaults: GenerationConfig,
    model_name: String,
    context_size: usize,
}

impl Admission {
    pub fn new(
        defaults: GenerationConfig,
        model_name: String,
        context_size: usize,
    ) -> Result<Self> {
        check_defaults(&defaults, context_size)?;
        Ok(Self {
            defaults,
            model_name,
            context_size,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn admit(&self, request: ChatRequest) -> Result<CompletionRequest> {
        if request.messages.is_empty() {
            return Err(SoloError::validation("messages", "must not be empty"));
        }
        for (i, msg) in request.messages.iter().enumerate() {
            if !ROLES.contains(&msg.role.as_str()) {
                return Err(SoloError::validation(
                    format!("messages[{}].role", i),
                    format!("must be one of {}", ROLES.join(", ")),
                ));
            }
        }

        let stream = request.stream.unwrap_or(false);
        let mut params = self.defaults.clone();

        if let Some(t) = request.temperature {
            params.temperature = in_range("temperature", t, 0.0..=2.0)?;
        }
        if let Some(p) = request.top_p {
            params.top_p = in_range("top_p", p, 0.0..=1.0)?;
        }
        if let Some(p) = request.frequency_penalty {
            params.frequency_penalty = in_range("frequency_penalty", p, -2.0..=2.0)?;
        }
        if let Some(p) = request.presence_penalty {
            params.presence_penalty = in_range("presence_penalty", p, -2.0..=2.0)?;
        }

        if let Some(max_tokens) = request.max_tokens {
            if max_tokens <= 0 {
                return Err(SoloError::validation("max_tokens", "must be greater than 0"));
            }
            if (max_tokens as u64) > (self.context_size as u64) {
                return Err(SoloError::validation(
                    "max_tokens",
                    format!(
                        "must not exceed the context window of {} tokens",
                        self.context_size
                    ),
                ));
            }
            params.max_tokens = max_tokens as usize;
        }

        if let Some(n) = request.n {
            if !(1..=MAX_CHOICES).contains(&n) {
                return Err(SoloError::validation(
                    "n",
                    format!("must be between 1 and {}", MAX_CHOICES),
                ));
            }
            if stream && n != 1 {
                return Err(SoloError::validation("n", "must be 1 when streaming"));
            }
            params.n = n as usize;
        } else if stream {
            // Streamed chunks carry a single choice index
            params.n = 1;
        }

        if let Some(stop) = request.stop {
            let stop = stop.into_vec();
            check_stop("stop", &stop)?;
            params.stop_sequences = stop;
        }

        if request.seed.is_some() {
            params.seed = request.seed;
        }

        Ok(CompletionRequest {
            model: request.model.unwrap_or_else(|| self.model_name.clone()),
            messages: request.messages.into_iter().map(Into::into).collect(),
            params,
            stream,
        })
    }
}

fn check_defaults(defaults: &GenerationConfig, context_size: usize) -> Result<()> {
    in_range("generation.temperature", defaults.temperature, 0.0..=2.0)?;
    in_range("generation.top_p", defaults.top_p, 0.0..=1.0)?;
    in_range("generation.frequency_penalty", defaults.frequency_penalty, -2.0..=2.0)?;
    in_range("generation.presence_penalty", defaults.presence_penalty, -2.0..=2.0)?;

    if !(1..=context_size).contains(&defaults.max_tokens) {
        return Err(SoloError::validation(
            "generation.max_tokens",
            format!("must be between 1 and the context window of {} tokens", context_size),
        ));
    }
    if !(1..=MAX_CHOICES as usize).contains(&defaults.n) {
        return Err(SoloError::validation(
            "generation.n",
            format!("must be between 1 and {}", MAX_CHOICES),
        ));
    }
    check_stop("generation.stop_sequences", &defaults.stop_sequences)
}

fn check_stop(field: &str, stop: &[String]) -> Result<()> {
    if stop.len() > MAX_STOP_SEQUENCES {
        return Err(SoloError::validation(
            field,
            format!("at most {} sequences are allowed", MAX_STOP_SEQUENCES),
        ));
    }
    if stop.iter().any(|s| s.is_empty()) {
        return Err(SoloError::validation(field, "sequences must not be empty"));
    }
    Ok(())
}

fn in_range(field: &str, value: f32, range: RangeInclusive<f32>) -> Result<f32> {
    if value.is_finite() && range.contains(&value) {
        Ok(value)
    } else {
        Err(SoloError::validation(
            field,
            format!("must be between {} and {}", range.start(), range.end()),
        ))
    }
}
