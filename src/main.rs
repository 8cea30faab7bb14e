//! torrent-dl server binary
//!
//! Loads the configuration, restores persisted torrents, prepares the
//! client credentials and serves the REST API and websocket bridge until
//! SIGINT or SIGTERM.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use torrent_dl::{AuthGate, Config, InMemoryEngine, SessionManager};

#[derive(Debug, Parser)]
#[command(name = "torrent-dl", version, about)]
struct Cli {
    /// JSON configuration file (defaults are used when absent)
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Log filter, overriding RUST_LOG and the configured level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let (config, loaded) = if cli.config.exists() {
        (Config::from_file(&cli.config)?, true)
    } else {
        (Config::default(), false)
    };

    torrent_dl::logging::init_logging(&config.logging, cli.log_level.as_deref())?;

    if loaded {
        tracing::info!(path = %cli.config.display(), "configuration loaded");
    } else {
        tracing::warn!(path = %cli.config.display(), "config file not found, using defaults");
    }

    let engine = Arc::new(InMemoryEngine::new());
    tracing::warn!("no network engine linked in; torrents will not transfer data");

    let manager = SessionManager::new(config.clone(), engine).await?;

    let auth = Arc::new(AuthGate::load_or_init(manager.db.clone(), &config).await?);
    match auth.sync_client_config(&config).await {
        Ok(true) => tracing::info!(
            path = %config.client.config_file.display(),
            "client config written"
        ),
        Ok(false) => {}
        Err(e) => tracing::warn!(error = %e, "failed to write client config"),
    }

    let shutdown = CancellationToken::new();
    let server = tokio::spawn(torrent_dl::api::start_api_server(
        manager.clone(),
        auth,
        shutdown.clone(),
    ));

    torrent_dl::run_with_shutdown(manager).await?;
    shutdown.cancel();

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "API server exited with an error"),
        Err(e) => tracing::error!(error = %e, "API server task panicked"),
    }

    Ok(())
}
