use crate::db::*;
use crate::types::InfoHash;
use tempfile::NamedTempFile;

/// Querying after the pool is closed returns an error rather than hanging or panicking.
#[tokio::test]
async fn test_get_torrent_after_pool_close_returns_error() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let record = super::sample_record(
        "c9e15763f722f23e98a29decdfae341b98d53056",
        "2026-01-01T00:00:00Z",
    );
    db.insert_torrent_if_absent(&record).await.unwrap();
    assert!(db.get_torrent(&record.hash).await.unwrap().is_some());

    db.pool().close().await;

    let result = db.get_torrent(&record.hash).await;
    assert!(
        result.is_err(),
        "get_torrent after pool close should return an error, got: {:?}",
        result
    );
}

#[tokio::test]
async fn test_flag_update_after_pool_close_returns_error() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    db.pool().close().await;

    let hash: InfoHash = "c9e15763f722f23e98a29decdfae341b98d53056".parse().unwrap();
    let flags = TorrentFlags {
        is_active: false,
        is_paused: true,
        is_fetching_metadata: false,
        label: None,
        max_connections: 0,
        upload_unlimited: false,
    };

    assert!(db.update_torrent_flags(&hash, &flags).await.is_err());
    assert!(db.save_queues(&QueueRecord::default()).await.is_err());
}
