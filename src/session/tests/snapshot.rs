use super::*;
use crate::db::TorrentRecord;

async fn seed(manager: &SessionManager, n: u8, date_added: &str) {
    let record = TorrentRecord {
        hash: hash(n),
        info_bytes: None,
        date_added: date_added.to_string(),
        storage_path: "/downloads".to_string(),
        temp_storage_path: "/downloads".to_string(),
        name: format!("seeded-{}", n),
        trackers: vec![],
        label: None,
        file_priorities: vec![],
        uploaded_bytes: 0,
        downloaded_bytes: 0,
        max_connections: 80,
        upload_unlimited: false,
        is_active: true,
        is_paused: false,
        is_fetching_metadata: true,
    };
    manager.db.insert_torrent_if_absent(&record).await.unwrap();
}

#[tokio::test]
async fn snapshot_is_newest_first() {
    let (manager, _engine, _temp_dir) = create_test_manager().await;
    seed(&manager, 1, "2024-01-10T08:00:00+00:00").await;
    seed(&manager, 2, "2024-06-01T08:00:00+00:00").await;
    seed(&manager, 3, "not a date").await;
    seed(&manager, 4, "2024-03-15T08:00:00+00:00").await;
    manager.recover().await.unwrap();

    let list = manager.snapshot().await;
    let names: Vec<_> = list.data.iter().map(|v| v.torrent_name.as_str()).collect();
    assert_eq!(names, vec!["seeded-2", "seeded-4", "seeded-1", "seeded-3"]);
    assert_eq!(list.total, 4);
    assert_eq!(list.data[3].date_added, "not a date");
}

#[tokio::test]
async fn view_before_metadata() {
    let (manager, _engine, _temp_dir) = create_test_manager().await;
    manager.add_magnet(&magnet(1), None).await.unwrap();

    let list = manager.snapshot().await;
    let view = &list.data[0];
    assert_eq!(view.torrent_hash_string, hash(1).to_hex());
    assert_eq!(view.torrent_name, "torrent-1");
    assert_eq!(view.status, "GetMetainfo");
    assert_eq!(view.size, "");
    assert_eq!(view.percent_done, "");
    assert_eq!(view.torrent_label, "None");
    assert_eq!(view.active_peers, "0 / (0)");
}

#[tokio::test]
async fn view_while_downloading() {
    let (manager, engine, _temp_dir) = create_test_manager().await;
    let session = manager
        .add_magnet(&magnet(1), Some("movies".into()))
        .await
        .unwrap();
    let torrent = driver(&engine, 1);
    torrent.deliver_info("film.mkv", vec![], 2_000_000);

    eventually(|| {
        let session = session.clone();
        async move { !session.flags().await.fetching_metadata }
    })
    .await;

    torrent.set_progress(500_000);
    torrent.set_peers(4, 12);

    let view = manager.snapshot().await.data.remove(0);
    assert_eq!(view.torrent_name, "film.mkv");
    assert_eq!(view.status, "Downloading");
    assert_eq!(view.size, "1.91 MB");
    assert_eq!(view.downloaded_size, "488.28 KB");
    assert_eq!(view.percent_done, "25.00");
    assert_eq!(view.active_peers, "4 / (12)");
    assert_eq!(view.torrent_label, "movies");
    assert_eq!(view.bytes_completed, 500_000);
}

#[tokio::test]
async fn view_serializes_with_client_field_names() {
    let (manager, _engine, _temp_dir) = create_test_manager().await;
    manager.add_magnet(&magnet(1), None).await.unwrap();

    let json = serde_json::to_value(manager.snapshot().await).unwrap();
    let row = &json["data"][0];
    assert_eq!(json["total"], 1);
    assert!(row.get("TorrentHashString").is_some());
    assert!(row.get("PercentDone").is_some());
    assert_eq!(row["TorrentLabel"], "None");
}
