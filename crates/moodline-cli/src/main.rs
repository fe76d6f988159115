mod config;
mod evaluate;
mod report;

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use moodline_server::{AppState, TokenAuthority};
use tracing_subscriber::EnvFilter;

use config::{EvaluateArgs, InferenceArgs, ServeArgs};

#[derive(Parser)]
#[command(name = "moodline", version, about = "Authenticated sentiment service with local fallback")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service.
    Serve(ServeArgs),
    /// Classify one text and print the result as JSON.
    Classify {
        #[command(flatten)]
        inference: InferenceArgs,
        text: String,
    },
    /// Replay a labelled CSV against a running service and print a report.
    Evaluate(EvaluateArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Classify { inference, text } => classify(&inference, &text).await,
        Command::Evaluate(args) => evaluate(&args).await,
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    tracing::info!("moodline v{}", env!("CARGO_PKG_VERSION"));
    if args.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET_KEY must not be empty");
    }

    let config = args.inference.to_config();
    let (resolver, local) = config::build_resolver(&config)?;
    if args.warm_up {
        match local.warm_up().await {
            Ok(()) => tracing::info!(model = %local.model_id(), "local model loaded"),
            Err(err) => tracing::warn!(error = %err, "local model warm-up failed; will retry on first fallback"),
        }
    }

    let state = Arc::new(AppState {
        resolver,
        tokens: TokenAuthority::new(args.jwt_secret.as_bytes()),
        credentials: args.credentials(),
    });
    moodline_server::serve(args.bind, state)
        .await
        .with_context(|| format!("serving on {}", args.bind))
}

async fn classify(inference: &InferenceArgs, text: &str) -> anyhow::Result<()> {
    let config = inference.to_config();
    let (resolver, _) = config::build_resolver(&config)?;
    let result = resolver.resolve(text).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn evaluate(args: &EvaluateArgs) -> anyhow::Result<()> {
    let stats = evaluate::run_evaluation(args).await?;
    eprintln!(
        "  Done: {} rows in {:.1}s ({} skipped)",
        stats.attempted, stats.elapsed_secs, stats.skipped
    );
    println!("{}", stats.report);
    Ok(())
}
