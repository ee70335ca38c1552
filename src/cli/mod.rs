//! CLI commands

mod run;
mod serve;

pub use run::run;
pub use serve::{serve, ServeOverrides};

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Solo - single-model, OpenAI-compatible chat completion gateway
#[derive(Parser)]
#[command(name = "solo")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the inference server
    Serve {
        /// Configuration file (YAML, or JSON by extension)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Model file to serve
        #[arg(long, short, env = "SOLO_MODEL_PATH")]
        model: Option<PathBuf>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Context window size in tokens
        #[arg(long)]
        ctx_size: Option<usize>,

        /// Load the model before accepting requests
        #[arg(long)]
        preload: bool,

        /// Seconds a request may wait for the model before getting a 503
        #[arg(long)]
        queue_timeout: Option<u64>,
    },

    /// Generate a single response and print it as it streams
    Run {
        /// Model file
        #[arg(long, short, env = "SOLO_MODEL_PATH")]
        model: PathBuf,

        /// Prompt text
        #[arg(long, short)]
        prompt: String,

        /// Maximum tokens to generate
        #[arg(long, default_value = "256")]
        max_tokens: i64,

        /// Sampling temperature (0 = greedy)
        #[arg(long, default_value = "0.7")]
        temperature: f32,

        /// Top-p nucleus sampling
        #[arg(long, default_value = "0.95")]
        top_p: f32,

        /// Context window size in tokens
        #[arg(long, default_value = "2048")]
        ctx_size: usize,
    },
}
