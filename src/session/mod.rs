//! Torrent session management split into focused submodules.
//!
//! The [`SessionManager`] struct and its methods are organized by domain:
//! - [`registry`] - Concurrency-safe index of sessions by content hash
//! - [`status`] - Pure status classification and filter predicates
//! - [`snapshot`] - Client-facing ordered view of all sessions
//! - [`recovery`] - Replaying persisted records at startup
//! - [`tasks`] - Cancellable metadata/completion task per torrent
//! - [`control`] - Add, start, stop, delete, force-upload
//! - [`queue`] - Active set capacity and demotion
//! - [`lifecycle`] - Shutdown coordination

mod control;
mod lifecycle;
mod queue;
mod recovery;
mod registry;
pub mod snapshot;
pub mod status;
mod tasks;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use recovery::RecoveryReport;
pub use registry::Registry;
pub use snapshot::{TorrentList, TorrentView, humanize_bytes};

use crate::config::Config;
use crate::db::{Database, QueueRecord, TorrentFlags};
use crate::engine::{DownloadEngine, EngineTorrent};
use crate::error::{Error, Result};
use crate::types::{Event, InfoHash, Status};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64};
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio_util::sync::CancellationToken;

/// Mutable per-session state
///
/// Every change is written through to the torrent record before it becomes
/// visible in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFlags {
    /// Whether the torrent is running
    pub active: bool,
    /// Whether the user paused the torrent
    pub paused: bool,
    /// Whether an engine or persistence failure was recorded
    pub errored: bool,
    /// Whether the torrent is still waiting for metadata
    pub fetching_metadata: bool,
    /// User label
    pub label: Option<String>,
    /// Established connection cap applied while running
    pub max_connections: u32,
    /// Whether the upload rate limit is lifted
    pub upload_unlimited: bool,
}

impl SessionFlags {
    fn persisted(&self) -> TorrentFlags {
        TorrentFlags {
            is_active: self.active,
            is_paused: self.paused,
            is_fetching_metadata: self.fetching_metadata,
            label: self.label.clone(),
            max_connections: self.max_connections,
            upload_unlimited: self.upload_unlimited,
        }
    }
}

/// In-memory handle for one torrent
pub struct Session {
    /// Content hash (registry key)
    pub hash: InfoHash,
    /// Engine handle
    pub torrent: Arc<dyn EngineTorrent>,
    /// When the torrent was first added (RFC 3339)
    pub date_added: String,
    flags: RwLock<SessionFlags>,
}

impl Session {
    pub(crate) fn new(
        hash: InfoHash,
        torrent: Arc<dyn EngineTorrent>,
        date_added: String,
        flags: SessionFlags,
    ) -> Self {
        Self {
            hash,
            torrent,
            date_added,
            flags: RwLock::new(flags),
        }
    }

    /// Copy of the current flags
    pub async fn flags(&self) -> SessionFlags {
        self.flags.read().await.clone()
    }

    /// Current display status
    pub async fn status(&self) -> Status {
        let flags = self.flags.read().await;
        status::classify(&flags, self.torrent.has_info(), &self.torrent.stats())
    }

    /// Apply `change` to the flags, persisting before committing in memory
    ///
    /// The write lock is held across the store call so concurrent updates to
    /// the same session are serialized. On a store failure the in-memory
    /// flags are left untouched.
    pub(crate) async fn update_flags<F>(&self, db: &Database, change: F) -> Result<SessionFlags>
    where
        F: FnOnce(&mut SessionFlags),
    {
        let mut guard = self.flags.write().await;
        let mut next = guard.clone();
        change(&mut next);

        if next != *guard {
            db.update_torrent_flags(&self.hash, &next.persisted())
                .await?;
            *guard = next;
        }

        Ok(guard.clone())
    }

    /// Set the errored flag in memory only
    pub(crate) async fn mark_errored(&self) {
        self.flags.write().await.errored = true;
    }
}

/// Main session manager (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct SessionManager {
    /// Database instance for persistence
    /// Public for integration tests to inspect stored records
    pub db: Arc<Database>,
    /// Download engine that runs the torrents
    pub(crate) engine: Arc<dyn DownloadEngine>,
    /// Configuration
    pub(crate) config: Arc<Config>,
    /// Sessions keyed by content hash
    pub(crate) registry: Arc<Registry>,
    /// Background task per hash: (generation, cancellation token)
    pub(crate) tasks: Arc<Mutex<HashMap<InfoHash, (u64, CancellationToken)>>>,
    /// Source of task generations
    pub(crate) task_generation: Arc<AtomicU64>,
    /// Active / queued / forced partition, written through on change
    pub(crate) queue: Arc<Mutex<QueueRecord>>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Cleared during shutdown
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl SessionManager {
    /// Create a session manager and replay persisted torrents
    ///
    /// Opens (or creates) the database at `config.persistence.database_path`,
    /// creates the download directory, then runs recovery so every stored
    /// torrent is back in the registry before the first client connects.
    pub async fn new(config: Config, engine: Arc<dyn DownloadEngine>) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.download.download_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create download directory '{}': {}",
                        config.download.download_dir.display(),
                        e
                    ),
                ))
            })?;

        let db = Database::new(&config.persistence.database_path).await?;
        let manager = Self::with_database(config, Arc::new(db), engine)?;

        let report = manager.recover().await?;
        tracing::info!(
            engine = manager.engine.name(),
            restored = report.restored,
            skipped = report.skipped,
            "Session manager ready"
        );

        Ok(manager)
    }

    /// Build a manager around an existing database without running recovery
    ///
    /// Rejects a config that fails [`Config::validate`].
    pub fn with_database(
        config: Config,
        db: Arc<Database>,
        engine: Arc<dyn DownloadEngine>,
    ) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = broadcast::channel(1000);

        Ok(Self {
            db,
            engine,
            config: Arc::new(config),
            registry: Arc::new(Registry::default()),
            tasks: Arc::new(Mutex::new(HashMap::new())),
            task_generation: Arc::new(AtomicU64::new(0)),
            queue: Arc::new(Mutex::new(QueueRecord::default())),
            event_tx,
            accepting_new: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Subscribe to lifecycle events
    ///
    /// Each subscriber receives all events independently. A subscriber that
    /// falls more than 1000 events behind receives `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// The session registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Copy of the active / queued / forced partition
    pub async fn queue_state(&self) -> QueueRecord {
        self.queue.lock().await.clone()
    }

    pub(crate) fn emit_event(&self, event: Event) {
        // send() fails only when nobody is subscribed
        self.event_tx.send(event).ok();
    }

    pub(crate) fn default_flags(&self) -> SessionFlags {
        SessionFlags {
            active: true,
            paused: false,
            errored: false,
            fetching_metadata: true,
            label: None,
            max_connections: self.config.download.default_max_connections,
            upload_unlimited: false,
        }
    }
}
