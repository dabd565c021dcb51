use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use swallow_core::QuestionAnswerer;
use swallow_core::bootstrap::{AppBuilder, IndexSource, resolve_config_path};
use swallow_gateway::GatewayServer;

#[derive(Parser, Debug)]
#[command(name = "swallow")]
#[command(about = "Answer questions about a codebase from its code-unit summaries", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Rebuild the vector index even if a persisted one exists
    #[arg(long)]
    rebuild: bool,

    /// Load or build the index, then exit without serving
    #[arg(long)]
    build_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber();

    let config_path = resolve_config_path(cli.config.as_deref());
    let app = AppBuilder::new(config_path.clone())
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    tracing::info!(path = %app.config_path().display(), "configuration loaded");

    let provider = app.build_provider().await;
    let chunks = app.build_chunks().await?;
    let (index, source) = app
        .load_or_build_index(&provider, &chunks, cli.rebuild)
        .await?;
    match source {
        IndexSource::Loaded => tracing::info!(entries = index.len(), "index loaded"),
        IndexSource::Built | IndexSource::Rebuilt => {
            tracing::info!(entries = index.len(), path = %app.config().index.path.display(), "index built and saved");
        }
    }

    if cli.build_only {
        return Ok(());
    }

    let qa: Arc<dyn QuestionAnswerer> = Arc::new(app.build_engine(Arc::new(provider), index, chunks));

    let (shutdown_tx, shutdown_rx) = AppBuilder::build_shutdown();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let gateway = &app.config().gateway;
    GatewayServer::new(&gateway.bind, gateway.port, qa, shutdown_rx)
        .with_auth(gateway.auth_token.clone())
        .with_rate_limit(gateway.rate_limit)
        .serve()
        .await
        .context("gateway failed")?;

    Ok(())
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
