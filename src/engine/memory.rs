//! Network-less engine whose torrents are driven programmatically.

use super::{DownloadEngine, EngineTorrent, TorrentStats};
use crate::error::{Error, Result};
use crate::types::{InfoHash, PeerInfo, TorrentSpec};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone)]
struct Metadata {
    name: String,
    info_bytes: Vec<u8>,
}

/// Torrent handle owned by [`InMemoryEngine`]
pub struct MemoryTorrent {
    info_hash: InfoHash,
    display_name: Option<String>,
    metadata: watch::Sender<Option<Metadata>>,
    stats: watch::Sender<TorrentStats>,
    peers: Mutex<Vec<PeerInfo>>,
    max_conns: AtomicU32,
    download_requested: AtomicBool,
    upload_unlimited: AtomicBool,
    dropped: AtomicBool,
}

impl MemoryTorrent {
    fn new(spec: &TorrentSpec) -> Self {
        let (metadata, _) = watch::channel(None);
        let (stats, _) = watch::channel(TorrentStats::default());
        Self {
            info_hash: spec.info_hash,
            display_name: spec.display_name.clone(),
            metadata,
            stats,
            peers: Mutex::new(Vec::new()),
            max_conns: AtomicU32::new(0),
            download_requested: AtomicBool::new(false),
            upload_unlimited: AtomicBool::new(false),
            dropped: AtomicBool::new(false),
        }
    }

    /// Make metadata known, with `length` bytes all still missing
    pub fn deliver_info(&self, name: &str, info_bytes: Vec<u8>, length: u64) {
        self.stats.send_modify(|s| {
            s.length = Some(length);
            s.bytes_missing = length.saturating_sub(s.bytes_completed);
        });
        self.metadata.send_replace(Some(Metadata {
            name: name.to_string(),
            info_bytes,
        }));
    }

    /// Set verified bytes; completion fires when nothing is missing
    pub fn set_progress(&self, bytes_completed: u64) {
        self.stats.send_modify(|s| {
            let length = s.length.unwrap_or(bytes_completed);
            s.bytes_completed = bytes_completed.min(length);
            s.bytes_missing = length - s.bytes_completed;
        });
    }

    /// Set connected / known peer counts
    pub fn set_peers(&self, active: u32, total: u32) {
        self.stats.send_modify(|s| {
            s.active_peers = active;
            s.total_peers = total;
        });
    }

    /// Mark the torrent as serving pieces
    pub fn set_seeding(&self, seeding: bool) {
        self.stats.send_modify(|s| s.seeding = seeding);
    }

    /// Add a peer to the known swarm
    pub fn add_peer(&self, peer: PeerInfo) {
        lock(&self.peers).push(peer);
    }

    /// Current connection cap
    pub fn max_established_conns(&self) -> u32 {
        self.max_conns.load(Ordering::SeqCst)
    }

    /// Whether `download_all` has been called
    pub fn download_requested(&self) -> bool {
        self.download_requested.load(Ordering::SeqCst)
    }

    /// Whether the upload limit has been lifted
    pub fn upload_unlimited(&self) -> bool {
        self.upload_unlimited.load(Ordering::SeqCst)
    }

    /// Whether `drop_torrent` has been called
    pub fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineTorrent for MemoryTorrent {
    fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    fn name(&self) -> String {
        if let Some(meta) = self.metadata.borrow().as_ref() {
            return meta.name.clone();
        }
        self.display_name
            .clone()
            .unwrap_or_else(|| self.info_hash.to_hex())
    }

    fn has_info(&self) -> bool {
        self.metadata.borrow().is_some()
    }

    fn info_bytes(&self) -> Option<Vec<u8>> {
        self.metadata
            .borrow()
            .as_ref()
            .map(|meta| meta.info_bytes.clone())
    }

    async fn wait_for_info(&self) {
        let mut rx = self.metadata.subscribe();
        // The sender lives as long as self, so this only ends once info arrives
        let _ = rx.wait_for(|meta| meta.is_some()).await;
    }

    async fn wait_for_completion(&self) {
        let mut rx = self.stats.subscribe();
        let _ = rx
            .wait_for(|s| s.length.is_some() && s.bytes_missing == 0)
            .await;
    }

    fn stats(&self) -> TorrentStats {
        *self.stats.borrow()
    }

    fn download_all(&self) {
        self.download_requested.store(true, Ordering::SeqCst);
    }

    fn set_max_established_conns(&self, max: u32) {
        self.max_conns.store(max, Ordering::SeqCst);
    }

    fn set_upload_unlimited(&self, unlimited: bool) {
        self.upload_unlimited.store(unlimited, Ordering::SeqCst);
    }

    fn known_swarm(&self) -> Vec<PeerInfo> {
        lock(&self.peers).clone()
    }

    fn drop_torrent(&self) {
        self.dropped.store(true, Ordering::SeqCst);
        self.stats.send_modify(|s| {
            s.active_peers = 0;
            s.seeding = false;
        });
    }
}

/// Engine that keeps torrents in memory and never touches the network
#[derive(Default)]
pub struct InMemoryEngine {
    torrents: Mutex<HashMap<InfoHash, Arc<MemoryTorrent>>>,
    reject_next: Mutex<Option<String>>,
}

impl InMemoryEngine {
    /// Create an empty engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Concrete handle for a hash, for driving its state
    pub fn torrent(&self, hash: &InfoHash) -> Option<Arc<MemoryTorrent>> {
        lock(&self.torrents).get(hash).cloned()
    }

    /// Make the next `add_torrent` call fail with `reason`
    pub fn reject_next_add(&self, reason: impl Into<String>) {
        *lock(&self.reject_next) = Some(reason.into());
    }

    /// Number of torrents that have not been dropped
    pub fn live_count(&self) -> usize {
        lock(&self.torrents)
            .values()
            .filter(|t| !t.is_dropped())
            .count()
    }
}

#[async_trait]
impl DownloadEngine for InMemoryEngine {
    async fn add_torrent(&self, spec: &TorrentSpec) -> Result<Arc<dyn EngineTorrent>> {
        if let Some(reason) = lock(&self.reject_next).take() {
            return Err(Error::Engine(reason));
        }

        let mut torrents = lock(&self.torrents);
        if let Some(existing) = torrents.get(&spec.info_hash)
            && !existing.is_dropped()
        {
            return Ok(existing.clone());
        }

        let torrent = Arc::new(MemoryTorrent::new(spec));
        if let Some(info_bytes) = &spec.info_bytes {
            let name = spec
                .display_name
                .clone()
                .unwrap_or_else(|| spec.info_hash.to_hex());
            torrent.deliver_info(&name, info_bytes.clone(), 0);
        }
        torrents.insert(spec.info_hash, torrent.clone());
        tracing::debug!(hash = %spec.info_hash, "torrent added to in-memory engine");

        Ok(torrent)
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
