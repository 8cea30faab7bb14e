//! Core types for torrent-dl

use data_encoding::BASE32;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::Error;

/// 20-byte content hash identifying a torrent
///
/// Displays and serializes as 40 lowercase hex characters. Parses from either
/// 40-character hex or the 32-character base32 form found in magnet links.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InfoHash(pub [u8; 20]);

impl InfoHash {
    /// Raw hash bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase hex encoding
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InfoHash({})", self.to_hex())
    }
}

impl FromStr for InfoHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bytes = match s.len() {
            40 => hex::decode(s).map_err(|e| Error::InvalidHash(format!("{s}: {e}")))?,
            32 => BASE32
                .decode(s.to_ascii_uppercase().as_bytes())
                .map_err(|e| Error::InvalidHash(format!("{s}: {e}")))?,
            n => {
                return Err(Error::InvalidHash(format!(
                    "{s}: expected 40 hex or 32 base32 characters, got {n}"
                )));
            }
        };

        let mut out = [0u8; 20];
        if bytes.len() != out.len() {
            return Err(Error::InvalidHash(format!("{s}: decoded to {} bytes", bytes.len())));
        }
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}

impl Serialize for InfoHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for InfoHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Everything needed to hand a torrent to the download engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TorrentSpec {
    /// Content hash
    pub info_hash: InfoHash,
    /// Display name, if known before metadata arrives
    pub display_name: Option<String>,
    /// Tracker tiers
    pub trackers: Vec<Vec<String>>,
    /// Raw info dictionary bytes, when previously captured
    pub info_bytes: Option<Vec<u8>>,
}

impl TorrentSpec {
    /// Spec carrying only a hash
    #[cfg(test)]
    pub(crate) fn from_hash(info_hash: InfoHash) -> Self {
        Self {
            info_hash,
            display_name: None,
            trackers: Vec::new(),
            info_bytes: None,
        }
    }

    /// Parse a magnet URI (`magnet:?xt=urn:btih:<hash>&dn=<name>&tr=<url>...`)
    ///
    /// All `tr` parameters land in a single tier, in the order given.
    pub fn from_magnet(uri: &str) -> crate::Result<Self> {
        let url = url::Url::parse(uri.trim()).map_err(|e| Error::InvalidMagnet(e.to_string()))?;
        if url.scheme() != "magnet" {
            return Err(Error::InvalidMagnet(format!(
                "unexpected scheme {:?}",
                url.scheme()
            )));
        }

        let mut info_hash = None;
        let mut display_name = None;
        let mut tier = Vec::new();

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "xt" => {
                    if let Some(hash) = value.strip_prefix("urn:btih:") {
                        info_hash = Some(hash.parse::<InfoHash>()?);
                    }
                }
                "dn" => display_name = Some(value.into_owned()),
                "tr" => tier.push(value.into_owned()),
                _ => {}
            }
        }

        let info_hash =
            info_hash.ok_or_else(|| Error::InvalidMagnet("missing xt=urn:btih parameter".into()))?;

        Ok(Self {
            info_hash,
            display_name,
            trackers: if tier.is_empty() { Vec::new() } else { vec![tier] },
            info_bytes: None,
        })
    }
}

/// Display status of a torrent session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Status {
    /// Waiting for metadata from the swarm
    GetMetainfo,
    /// Paused by the user
    Stopped,
    /// Actively downloading from connected peers
    Downloading,
    /// Complete and serving data to connected peers
    Seeding,
    /// Complete with no connected peers
    Completed,
    /// None of the other states apply
    Unknown,
}

impl Status {
    /// Wire label shown to clients
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::GetMetainfo => "GetMetainfo",
            Status::Stopped => "Stopped",
            Status::Downloading => "Downloading",
            Status::Seeding => "Seeding",
            Status::Completed => "Completed",
            Status::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry filter classes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StateFilter {
    /// Active with connected peers and data missing
    Downloading,
    /// Seeding to connected peers with nothing missing
    Seeding,
    /// No connected peers and nothing missing
    Completed,
    /// Paused by the user
    Paused,
    /// Marked active
    Active,
    /// Active, no connected peers, data still missing
    Inactive,
    /// Marked errored
    Errored,
}

/// One peer known to the engine for a torrent
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct PeerInfo {
    /// Remote address (`ip:port`)
    pub addr: String,
    /// Where the peer was learned from (tracker, dht, pex, incoming)
    pub source: String,
}

/// Event emitted during the torrent lifecycle
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Torrent added to the registry
    Added {
        /// Content hash (hex)
        hash: String,
        /// Display name at the time of adding
        name: String,
    },

    /// Metadata arrived and the full download was requested
    MetadataReceived {
        /// Content hash (hex)
        hash: String,
        /// Name taken from the metadata
        name: String,
    },

    /// Every piece has been downloaded
    Completed {
        /// Content hash (hex)
        hash: String,
        /// Display name
        name: String,
    },

    /// Torrent started or resumed
    Started {
        /// Content hash (hex)
        hash: String,
    },

    /// Torrent paused
    Stopped {
        /// Content hash (hex)
        hash: String,
    },

    /// Torrent moved out of the active set to make room for another
    Demoted {
        /// Content hash (hex)
        hash: String,
    },

    /// Torrent removed from the registry
    Removed {
        /// Content hash (hex)
        hash: String,
    },

    /// Manager is shutting down
    Shutdown,
}
