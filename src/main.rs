//! Server entry point for the autocomplete backend.
//!
//! Boot order: completion LLM key check, configuration load and
//! validation, embedder construction with probe validation, then the
//! loopback HTTP listener. All of these are fatal on failure.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use codefill::completion::CompletionService;
use codefill::config::Config;
use codefill::embedding::{CompletionClient, Embedder};
use codefill::indexing::WorkspaceWatcher;
use codefill::server;

/// Local retrieval-augmented code autocomplete backend.
#[derive(Debug, Parser)]
#[command(name = "codefill", version, about)]
struct Cli {
    /// Port for the loopback HTTP listener.
    #[arg(long, default_value_t = 2539)]
    port: u16,

    /// Watch a directory and keep its index in sync with edits.
    #[arg(long, value_name = "DIR")]
    watch: Option<PathBuf>,

    /// Debounce for file-watch events, in milliseconds.
    #[arg(long, default_value_t = 500)]
    debounce_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // The completion key is injected by the process supervisor; the
    // server refuses to start without it.
    let api_key = std::env::var("OPENAI_API_KEY_INJECTED")
        .ok()
        .filter(|key| !key.is_empty())
        .context(
            "OPENAI_API_KEY_INJECTED is not set; the completion key must be injected by the editor extension",
        )?;

    let config = Config::from_env().context("invalid configuration")?;

    let embedder = Embedder::from_config(&config.embedding)
        .await
        .context("failed to create embedder")?;
    embedder
        .validate_connection()
        .await
        .context("failed to validate embedder connection")?;
    info!(dimensions = embedder.dimensions(), "using embedding dimensions");

    let llm = CompletionClient::new(api_key, config.embedding.completion_model.clone());
    let service = Arc::new(CompletionService::new(embedder, llm, config)?);

    if let Some(root) = &cli.watch {
        let watcher = WorkspaceWatcher::new(service.clone(), root, cli.debounce_ms)?;
        tokio::spawn(async move {
            if let Err(e) = watcher.watch().await {
                error!("file watcher stopped: {e}");
            }
        });
    }

    server::serve(service, cli.port).await
}
