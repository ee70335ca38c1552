use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use solo::cli::{Cli, Commands, ServeOverrides};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "solo=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            model,
            port,
            host,
            ctx_size,
            preload,
            queue_timeout,
        } => {
            let overrides = ServeOverrides {
                model,
                host,
                port,
                ctx_size,
                preload,
                queue_timeout,
            };
            solo::cli::serve(config, overrides).await?;
        }
        Commands::Run {
            model,
            prompt,
            max_tokens,
            temperature,
            top_p,
            ctx_size,
        } => {
            solo::cli::run(model, prompt, max_tokens, temperature, top_p, ctx_size).await?;
        }
    }

    Ok(())
}
