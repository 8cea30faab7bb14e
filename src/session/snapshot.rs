//! Client-facing view of the registry.

use super::{Session, SessionManager};
use crate::error::{Result, SessionError};
use crate::types::{InfoHash, PeerInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// One row of the torrent list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct TorrentView {
    /// Content hash (hex)
    pub torrent_hash_string: String,
    /// Display name
    pub torrent_name: String,
    /// Humanized completed bytes
    pub downloaded_size: String,
    /// Humanized total size (empty before metadata)
    pub size: String,
    /// Percent complete with two decimals (empty when size is unknown)
    pub percent_done: String,
    /// `"<connected> / (<known>)"`
    pub active_peers: String,
    /// When the torrent was added
    pub date_added: String,
    /// Status label
    pub status: String,
    /// User label ("None" when unset)
    pub torrent_label: String,
    /// Completed bytes, unformatted
    pub bytes_completed: u64,
    /// Bytes sent to peers
    pub uploaded_bytes: u64,
    /// Whether the upload limit is lifted
    pub upload_unlimited: bool,
}

/// The full snapshot, newest first
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TorrentList {
    /// Number of rows
    pub total: usize,
    /// Rows ordered by date added, newest first
    pub data: Vec<TorrentView>,
}

/// Format a byte count the way the web client expects
///
/// Under 1,000,000 bytes the value is shown in KB; above that in MB, switching
/// to GB once the MB figure exceeds 1024. Single precision, two decimals.
pub fn humanize_bytes(bytes: u64) -> String {
    let bytes = bytes as f32;
    if bytes < 1_000_000.0 {
        return format!("{:.2} KB", bytes / 1024.0);
    }

    let megabytes = bytes / 1024.0 / 1024.0;
    if megabytes > 1024.0 {
        format!("{:.2} GB", megabytes / 1024.0)
    } else {
        format!("{:.2} MB", megabytes)
    }
}

fn percent_done(completed: u64, length: Option<u64>) -> String {
    match length {
        Some(length) if length > 0 => {
            format!("{:.2}", completed as f64 / length as f64 * 100.0)
        }
        _ => String::new(),
    }
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn display_date(raw: &str) -> String {
    match parse_date(raw) {
        Some(date) => date.format("%b %e %Y %H:%M:%S").to_string(),
        None => raw.to_string(),
    }
}

/// Build the view row for one session
pub async fn view_of(session: &Session) -> TorrentView {
    let flags = session.flags().await;
    let stats = session.torrent.stats();
    let has_info = session.torrent.has_info();
    let status = super::status::classify(&flags, has_info, &stats);

    TorrentView {
        torrent_hash_string: session.hash.to_hex(),
        torrent_name: session.torrent.name(),
        downloaded_size: humanize_bytes(stats.bytes_completed),
        size: match stats.length {
            Some(length) if has_info => humanize_bytes(length),
            _ => String::new(),
        },
        percent_done: percent_done(stats.bytes_completed, stats.length),
        active_peers: format!("{} / ({})", stats.active_peers, stats.total_peers),
        date_added: display_date(&session.date_added),
        status: status.as_str().to_string(),
        torrent_label: flags.label.unwrap_or_else(|| "None".to_string()),
        bytes_completed: stats.bytes_completed,
        uploaded_bytes: stats.bytes_uploaded,
        upload_unlimited: flags.upload_unlimited,
    }
}

/// Build views for `sessions`, newest first
///
/// Dates that do not parse sort after every parsable date.
pub async fn build(sessions: &[Arc<Session>]) -> Vec<TorrentView> {
    let mut rows = Vec::with_capacity(sessions.len());
    for session in sessions {
        rows.push((parse_date(&session.date_added), view_of(session).await));
    }

    // None < Some, so comparing b to a puts unparsable dates last
    rows.sort_by(|(a, _), (b, _)| b.cmp(a));
    rows.into_iter().map(|(_, view)| view).collect()
}

impl SessionManager {
    /// Ordered snapshot of every session
    pub async fn snapshot(&self) -> TorrentList {
        let sessions = self.registry.list().await;
        let data = build(&sessions).await;
        TorrentList {
            total: data.len(),
            data,
        }
    }

    /// Peers the engine knows for one torrent
    pub async fn peer_list(&self, hash: &InfoHash) -> Result<Vec<PeerInfo>> {
        let session = self
            .registry
            .lookup(hash)
            .await
            .ok_or_else(|| SessionError::NotFound {
                hash: hash.to_hex(),
            })?;
        Ok(session.torrent.known_swarm())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn humanize_below_one_million_is_kilobytes() {
        assert_eq!(humanize_bytes(0), "0.00 KB");
        assert_eq!(humanize_bytes(500), "0.49 KB");
        assert_eq!(humanize_bytes(999_999), "976.56 KB");
    }

    #[test]
    fn humanize_from_one_million_is_megabytes() {
        assert_eq!(humanize_bytes(1_000_000), "0.95 MB");
        assert_eq!(humanize_bytes(2_000_000), "1.91 MB");
        // Exactly 1024 MB is not above the threshold
        assert_eq!(humanize_bytes(1024 * 1024 * 1024), "1024.00 MB");
    }

    #[test]
    fn humanize_above_1024_megabytes_is_gigabytes() {
        assert_eq!(humanize_bytes(1_100_000_000), "1.02 GB");
        assert_eq!(humanize_bytes(2_000_000_000), "1.86 GB");
    }

    #[test]
    fn percent_is_empty_without_a_size() {
        assert_eq!(percent_done(10, None), "");
        assert_eq!(percent_done(0, Some(0)), "");
        assert_eq!(percent_done(50, Some(200)), "25.00");
        assert_eq!(percent_done(1, Some(3)), "33.33");
    }

    #[test]
    fn dates_display_in_short_month_form() {
        assert_eq!(display_date("2026-01-05T09:03:07Z"), "Jan  5 2026 09:03:07");
        assert_eq!(display_date("yesterday"), "yesterday");
    }
}
