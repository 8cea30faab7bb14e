//! Websocket message shapes.
//!
//! Every inbound frame is a JSON envelope `{"MessageType": .., "Payload": ..}`
//! whose payload shape depends on the message type. Outbound messages carry
//! their type in the same `MessageType` field.

use crate::session::{TorrentList, TorrentView};
use crate::types::PeerInfo;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound envelope
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Envelope {
    /// Command name
    pub message_type: String,
    /// Type-dependent payload
    #[serde(default)]
    pub payload: Option<Value>,
}

impl Envelope {
    /// Decode the payload into the shape `T` expects
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, String> {
        let payload = self
            .payload
            .clone()
            .ok_or_else(|| format!("{} requires a payload", self.message_type))?;
        serde_json::from_value(payload)
            .map_err(|e| format!("Malformed {} payload: {}", self.message_type, e))
    }
}

/// `authRequest`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthPayload {
    /// Token issued by this server
    pub client_auth_string: String,
}

/// `newAuthToken`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewTokenPayload {
    /// Name recorded for the new token
    pub client_name: String,
}

/// `torrentPeerListRequest`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PeerListPayload {
    /// Content hash (hex or base32)
    pub peer_list_hash: String,
}

/// `magnetLinkSubmit`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MagnetPayload {
    /// Magnet URIs, added in order
    pub magnet_links: Vec<String>,
    /// Label applied to every new torrent
    #[serde(default)]
    pub label: Option<String>,
}

/// `startTorrents`, `stopTorrents`, `forceUploadTorrents`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HashesPayload {
    /// Content hashes, handled in order
    pub torrent_hashes: Vec<String>,
}

/// `deleteTorrents`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeletePayload {
    /// Content hashes, handled in order
    pub torrent_hashes: Vec<String>,
    /// Also remove downloaded data
    #[serde(default)]
    pub with_data: bool,
}

/// Severity shown by the client for a push message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageLevel {
    /// Routine notice
    #[serde(rename = "info")]
    Info,
    /// A command failed
    #[serde(rename = "error")]
    Error,
    /// Connection lifecycle notice
    #[serde(rename = "Message")]
    Message,
}

/// Outbound message
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "MessageType")]
pub enum Outbound {
    /// Sent once when the socket opens
    #[serde(rename = "connectResponse")]
    ConnectResponse {
        /// Severity
        #[serde(rename = "MessageLevel")]
        level: MessageLevel,
        /// Notice text
        #[serde(rename = "Payload")]
        payload: String,
    },

    /// Outcome of an `authRequest`
    #[serde(rename = "authResponse")]
    AuthResponse {
        /// Notice text
        #[serde(rename = "Payload")]
        payload: String,
    },

    /// Snapshot of every session, newest first
    #[serde(rename = "torrentList")]
    TorrentList {
        /// Number of rows
        total: usize,
        /// Rows
        data: Vec<TorrentView>,
    },

    /// Known swarm of one torrent
    #[serde(rename = "torrentPeerList")]
    TorrentPeerList {
        /// Number of peers
        #[serde(rename = "TotalPeers")]
        total_peers: usize,
        /// Peers
        #[serde(rename = "PeerList")]
        peer_list: Vec<PeerInfo>,
    },

    /// Reply to `newAuthToken`
    #[serde(rename = "TokenReturn")]
    TokenReturn {
        /// The minted token
        #[serde(rename = "TokenReturn")]
        token: String,
    },

    /// Command acknowledgement, failure or forwarded event
    #[serde(rename = "serverPushMessage")]
    ServerPush {
        /// Severity
        #[serde(rename = "MessageLevel")]
        level: MessageLevel,
        /// Notice text
        #[serde(rename = "Payload")]
        payload: String,
    },
}

impl Outbound {
    /// Informational push message
    pub fn info(payload: impl Into<String>) -> Self {
        Outbound::ServerPush {
            level: MessageLevel::Info,
            payload: payload.into(),
        }
    }

    /// Error push message
    pub fn error(payload: impl Into<String>) -> Self {
        Outbound::ServerPush {
            level: MessageLevel::Error,
            payload: payload.into(),
        }
    }

    /// Authentication outcome
    pub fn auth(payload: impl Into<String>) -> Self {
        Outbound::AuthResponse {
            payload: payload.into(),
        }
    }
}

impl From<TorrentList> for Outbound {
    fn from(list: TorrentList) -> Self {
        Outbound::TorrentList {
            total: list.total,
            data: list.data,
        }
    }
}

impl From<Vec<PeerInfo>> for Outbound {
    fn from(peers: Vec<PeerInfo>) -> Self {
        Outbound::TorrentPeerList {
            total_peers: peers.len(),
            peer_list: peers,
        }
    }
}
