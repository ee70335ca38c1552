//! One-shot generation command

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::config::{GenerationConfig, InferenceConfig};
use crate::engine::{Engine, StreamEvent};
use crate::runtime::EchoLoader;
use crate::server::types::{ChatMessage, ChatRequest};
use crate::server::Admission;

/// Stream one response to stdout
pub async fn run(
    model: PathBuf,
    prompt: String,
    max_tokens: i64,
    temperature: f32,
    top_p: f32,
    ctx_size: usize,
) -> Result<()> {
    let config = InferenceConfig {
        model_path: model,
        context_size: ctx_size,
        ..Default::default()
    };
    let defaults = GenerationConfig {
        max_tokens: GenerationConfig::default().max_tokens.min(ctx_size.max(1)),
        ..Default::default()
    };
    let admission = Admission::new(defaults, config.served_model_name(), config.context_size)?;
    let request = admission.admit(ChatRequest {
        model: None,
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: prompt,
        }],
        max_tokens: Some(max_tokens),
        temperature: Some(temperature),
        top_p: Some(top_p),
        stream: Some(true),
        stop: None,
        frequency_penalty: None,
        presence_penalty: None,
        n: None,
        seed: None,
    })?;

    let engine = Engine::new(Arc::new(EchoLoader), config);
    engine.manager().load().await?;
    tracing::info!("Model ready");

    println!();
    let start = std::time::Instant::now();
    let mut token_count = 0usize;

    let mut handle = engine.stream(request).await?;
    while let Some(event) = handle.events.recv().await {
        match event {
            StreamEvent::Chunk(chunk) => {
                if !chunk.delta_content.is_empty() {
                    print!("{}", chunk.delta_content);
                    io::stdout().flush()?;
                    token_count += 1;
                }
            }
            StreamEvent::Error(e) => eprintln!("\nError during generation: {}", e),
            StreamEvent::Done => break,
        }
    }
    let outcome = handle.task.await?;

    let elapsed = start.elapsed();
    let tok_per_sec = token_count as f64 / elapsed.as_secs_f64();

    println!();
    tracing::info!(
        "Generated {} tokens in {:.2}s ({:.1} tok/s), {:?}",
        token_count,
        elapsed.as_secs_f64(),
        tok_per_sec,
        outcome
    );
    Ok(())
}
