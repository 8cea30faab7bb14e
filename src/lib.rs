//! # torrent-dl
//!
//! Torrent session manager with an authenticated websocket command bridge.
//!
//! The [`SessionManager`] owns every torrent session: adding magnet links,
//! starting and stopping them, keeping the active set under its limit,
//! persisting state to SQLite and replaying it after a restart. The bridge
//! exposes those operations to a web client over a websocket; clients prove
//! themselves with an HS256 token issued by the [`AuthGate`].
//!
//! The actual BitTorrent transfer is behind the [`DownloadEngine`] trait.
//! [`InMemoryEngine`] is a scripted implementation used by the tests and by
//! the binary when no network engine is linked in.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use torrent_dl::{AuthGate, Config, InMemoryEngine, SessionManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let manager = SessionManager::new(config.clone(), Arc::new(InMemoryEngine::new())).await?;
//!     let auth = AuthGate::load_or_init(manager.db.clone(), &config).await?;
//!
//!     let mut events = manager.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let session = manager
//!         .add_magnet("magnet:?xt=urn:btih:c12fe1c06bba254a9dc9f519b335aa7c1367a88a", None)
//!         .await?;
//!     println!("added {}", session.hash);
//!     println!("client token: {}", auth.first_token().await);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API and websocket endpoint
pub mod api;
/// Token issuing and verification
pub mod auth;
/// Websocket command/event bridge
pub mod bridge;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Torrent engine abstraction
pub mod engine;
/// Error types
pub mod error;
/// Tracing subscriber setup
pub mod logging;
/// Session manager (decomposed into focused submodules)
pub mod session;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use auth::AuthGate;
pub use bridge::BridgeContext;
pub use config::Config;
pub use db::Database;
pub use engine::{DownloadEngine, EngineTorrent, InMemoryEngine, MemoryTorrent, TorrentStats};
pub use error::{
    ApiError, AuthError, DatabaseError, Error, ErrorDetail, Result, SessionError, ToHttpStatus,
};
pub use session::{RecoveryReport, Session, SessionManager, TorrentList, TorrentView};
pub use types::{Event, InfoHash, PeerInfo, StateFilter, Status, TorrentSpec};

/// Helper function to run the session manager with graceful signal handling.
///
/// Waits for a termination signal and then calls the manager's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use torrent_dl::{Config, InMemoryEngine, SessionManager, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let manager = SessionManager::new(Config::default(), Arc::new(InMemoryEngine::new())).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(manager).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(manager: SessionManager) -> Result<()> {
    wait_for_signal().await;
    manager.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
