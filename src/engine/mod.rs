//! Download engine seam
//!
//! The session manager never talks to the peer wire, DHT, or trackers
//! directly. Everything it needs from a torrent engine is expressed by two
//! traits:
//!
//! - [`DownloadEngine`]: adds torrents, de-duplicating by content hash
//! - [`EngineTorrent`]: one running torrent (metadata, counters, limits)
//!
//! [`InMemoryEngine`] implements both without any networking. Its torrents
//! are driven programmatically (deliver metadata, advance progress, attach
//! peers), which is what the test suite and a network-less binary use.

mod memory;

pub use memory::{InMemoryEngine, MemoryTorrent};

use crate::error::Result;
use crate::types::{InfoHash, PeerInfo, TorrentSpec};
use async_trait::async_trait;
use std::sync::Arc;

/// Live counters for one torrent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TorrentStats {
    /// Peers with an established connection
    pub active_peers: u32,
    /// Peers known to the engine
    pub total_peers: u32,
    /// Bytes verified on disk
    pub bytes_completed: u64,
    /// Bytes still to fetch (0 before metadata as well as after completion)
    pub bytes_missing: u64,
    /// Total size, once metadata is known
    pub length: Option<u64>,
    /// Whether the engine is serving pieces to peers
    pub seeding: bool,
    /// Bytes sent to peers
    pub bytes_uploaded: u64,
}

/// A download engine capable of adding torrents
#[async_trait]
pub trait DownloadEngine: Send + Sync {
    /// Add a torrent, or return the handle already running for its hash
    async fn add_torrent(&self, spec: &TorrentSpec) -> Result<Arc<dyn EngineTorrent>>;

    /// Engine name for logs
    fn name(&self) -> &str;
}

/// One torrent running inside a [`DownloadEngine`]
#[async_trait]
pub trait EngineTorrent: Send + Sync {
    /// Content hash
    fn info_hash(&self) -> InfoHash;

    /// Name from metadata, or the display name / hash before metadata arrives
    fn name(&self) -> String;

    /// Whether metadata is known
    fn has_info(&self) -> bool;

    /// Raw info dictionary bytes, once known
    fn info_bytes(&self) -> Option<Vec<u8>>;

    /// Resolves once metadata is known
    async fn wait_for_info(&self);

    /// Resolves once every byte has been downloaded
    async fn wait_for_completion(&self);

    /// Current counters
    fn stats(&self) -> TorrentStats;

    /// Request every piece
    fn download_all(&self);

    /// Cap established connections (0 halts transfer)
    fn set_max_established_conns(&self, max: u32);

    /// Lift or restore the upload rate limit
    fn set_upload_unlimited(&self, unlimited: bool);

    /// Every peer the engine knows about
    fn known_swarm(&self) -> Vec<PeerInfo>;

    /// Stop the torrent and release engine resources
    fn drop_torrent(&self);
}
