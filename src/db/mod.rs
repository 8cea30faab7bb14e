//! Database layer for torrent-dl
//!
//! Handles SQLite persistence for torrent records and the singleton
//! records (issued tokens, config snapshot, active queue).
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`torrents`] - Torrent record CRUD, keyed by content hash
//! - [`singletons`] - Fixed-id JSON records

use crate::config::ClientConnectConfig;
use crate::types::InfoHash;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, sqlite::SqlitePool};

mod migrations;
mod singletons;
mod torrents;

pub use singletons::singleton_id;

/// Priority assigned to one file inside a torrent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePriority {
    /// Path of the file relative to the torrent root
    pub path: String,
    /// Priority name ("Normal", "High", "Cancel")
    pub priority: String,
}

/// Persisted mirror of a torrent session
#[derive(Debug, Clone, PartialEq)]
pub struct TorrentRecord {
    /// Content hash (primary key)
    pub hash: InfoHash,
    /// Raw info dictionary, once metadata has been received
    pub info_bytes: Option<Vec<u8>>,
    /// When the torrent was first added (RFC 3339)
    pub date_added: String,
    /// Final storage directory
    pub storage_path: String,
    /// Directory used while downloading
    pub temp_storage_path: String,
    /// Display name
    pub name: String,
    /// Tracker tiers
    pub trackers: Vec<Vec<String>>,
    /// User label
    pub label: Option<String>,
    /// Per-file priorities
    pub file_priorities: Vec<FilePriority>,
    /// Bytes uploaded so far
    pub uploaded_bytes: u64,
    /// Bytes downloaded so far
    pub downloaded_bytes: u64,
    /// Established connection cap
    pub max_connections: u32,
    /// Whether the upload rate limit is lifted
    pub upload_unlimited: bool,
    /// Whether the session is active
    pub is_active: bool,
    /// Whether the user paused the session
    pub is_paused: bool,
    /// Whether the session is still waiting for metadata
    pub is_fetching_metadata: bool,
}

/// Flag columns written through on every session flag change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentFlags {
    /// Whether the session is active
    pub is_active: bool,
    /// Whether the user paused the session
    pub is_paused: bool,
    /// Whether the session is still waiting for metadata
    pub is_fetching_metadata: bool,
    /// User label
    pub label: Option<String>,
    /// Established connection cap
    pub max_connections: u32,
    /// Whether the upload rate limit is lifted
    pub upload_unlimited: bool,
}

/// Torrent row as stored in SQLite (raw, before decoding)
#[derive(Debug, Clone, FromRow)]
pub struct TorrentRow {
    /// Content hash (hex)
    pub hash: String,
    /// Raw info dictionary
    pub info_bytes: Option<Vec<u8>>,
    /// When the torrent was first added
    pub date_added: String,
    /// Final storage directory
    pub storage_path: String,
    /// Directory used while downloading
    pub temp_storage_path: String,
    /// Display name
    pub name: String,
    /// Tracker tiers (JSON)
    pub trackers: String,
    /// User label
    pub label: Option<String>,
    /// Per-file priorities (JSON)
    pub file_priorities: String,
    /// Bytes uploaded so far
    pub uploaded_bytes: i64,
    /// Bytes downloaded so far
    pub downloaded_bytes: i64,
    /// Established connection cap
    pub max_connections: i64,
    /// Whether the upload rate limit is lifted (0/1)
    pub upload_unlimited: i32,
    /// Whether the session is active (0/1)
    pub is_active: i32,
    /// Whether the user paused the session (0/1)
    pub is_paused: i32,
    /// Whether the session is still waiting for metadata (0/1)
    pub is_fetching_metadata: i32,
}

impl TryFrom<TorrentRow> for TorrentRecord {
    type Error = crate::Error;

    fn try_from(row: TorrentRow) -> crate::Result<Self> {
        use crate::error::DatabaseError;

        let corrupt = |what: &str, e: &dyn std::fmt::Display| {
            crate::Error::Database(DatabaseError::CorruptRecord(format!(
                "torrent {}: bad {}: {}",
                row.hash, what, e
            )))
        };

        let hash: InfoHash = row.hash.parse().map_err(|e| corrupt("hash", &e))?;
        let trackers = serde_json::from_str(&row.trackers).map_err(|e| corrupt("trackers", &e))?;
        let file_priorities = serde_json::from_str(&row.file_priorities)
            .map_err(|e| corrupt("file priorities", &e))?;

        Ok(Self {
            hash,
            info_bytes: row.info_bytes,
            date_added: row.date_added,
            storage_path: row.storage_path,
            temp_storage_path: row.temp_storage_path,
            name: row.name,
            trackers,
            label: row.label,
            file_priorities,
            uploaded_bytes: row.uploaded_bytes.max(0) as u64,
            downloaded_bytes: row.downloaded_bytes.max(0) as u64,
            max_connections: row.max_connections.clamp(0, i64::from(u32::MAX)) as u32,
            upload_unlimited: row.upload_unlimited != 0,
            is_active: row.is_active != 0,
            is_paused: row.is_paused != 0,
            is_fetching_metadata: row.is_fetching_metadata != 0,
        })
    }
}

/// Active queue partition (singleton id 5)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRecord {
    /// Running torrents, most recently started first
    pub active: Vec<InfoHash>,
    /// Torrents waiting for a slot
    pub queued: Vec<InfoHash>,
    /// Torrents exempt from the active limit
    pub forced: Vec<InfoHash>,
}

/// Token signing state (singleton id 3)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// HMAC signing key
    pub signing_key: Vec<u8>,
    /// Every client name a token was issued for
    pub token_names: Vec<String>,
    /// Token minted for the default client at initialisation
    pub first_token: String,
}

/// Last applied client-connect settings (singleton id 4)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// Client credential file settings
    pub client: ClientConnectConfig,
    /// Websocket address written to the client config file
    pub websocket_address: String,
}

/// Database handle for torrent-dl
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
