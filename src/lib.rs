//! Solo - a single-model, OpenAI-compatible chat completion gateway
//!
//! Solo sits in front of exactly one generative model runtime that must
//! not be called concurrently. It accepts chat completion requests over
//! HTTP, serializes all access to the model, and answers either with one
//! aggregated response or with an SSE stream.
//!
//! # Architecture
//!
//! - **runtime**: the model seam (`ModelRuntime`, `RuntimeLoader`) and the built-in echo runtime
//! - **engine**: model lifecycle, execution gate, streaming and non-streaming execution
//! - **server**: axum routes, request admission, SSE encoding
//! - **cli**: `solo serve` and `solo run`
//!
//! # Example
//!
//! ```bash
//! # Start server
//! solo serve --model ./models/model.gguf --port 8080
//!
//! # One-shot generation
//! solo run --model ./models/model.gguf --prompt "Hello"
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod runtime;
pub mod server;

// Re-export key types
pub use config::{GenerationConfig, InferenceConfig, ServerConfig, SoloConfig};
pub use engine::{Engine, ExecutionGate, ModelManager};
pub use error::SoloError;
pub use runtime::{ModelRuntime, RuntimeLoader};
