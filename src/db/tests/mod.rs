mod close;

use crate::db::TorrentRecord;
use crate::types::InfoHash;

/// Record with sensible defaults for the given hash
pub(super) fn sample_record(hash: &str, date_added: &str) -> TorrentRecord {
    TorrentRecord {
        hash: hash.parse::<InfoHash>().unwrap(),
        info_bytes: None,
        date_added: date_added.to_string(),
        storage_path: "/downloads".to_string(),
        temp_storage_path: "/downloads".to_string(),
        name: format!("torrent-{}", &hash[..6]),
        trackers: vec![vec!["udp://tracker.example:80".to_string()]],
        label: None,
        file_priorities: vec![],
        uploaded_bytes: 0,
        downloaded_bytes: 0,
        max_connections: 80,
        upload_unlimited: false,
        is_active: true,
        is_paused: false,
        is_fetching_metadata: true,
    }
}
