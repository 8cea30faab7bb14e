use super::*;
use crate::db::TorrentRecord;

fn record(n: u8, date_added: &str) -> TorrentRecord {
    TorrentRecord {
        hash: hash(n),
        info_bytes: None,
        date_added: date_added.to_string(),
        storage_path: "/downloads".to_string(),
        temp_storage_path: "/downloads".to_string(),
        name: format!("stored-{}", n),
        trackers: vec![vec!["udp://tracker.example:80".to_string()]],
        label: None,
        file_priorities: vec![],
        uploaded_bytes: 0,
        downloaded_bytes: 0,
        max_connections: 40,
        upload_unlimited: false,
        is_active: true,
        is_paused: false,
        is_fetching_metadata: true,
    }
}

#[tokio::test]
async fn every_stored_record_becomes_a_session() {
    let (manager, _engine, _temp_dir) = create_test_manager().await;
    for n in 1..=4 {
        let date_added = format!("2024-03-0{}T10:00:00+00:00", n);
        manager
            .db
            .insert_torrent_if_absent(&record(n, &date_added))
            .await
            .unwrap();
    }

    let report = manager.recover().await.unwrap();
    assert_eq!(report.restored, 4);
    assert_eq!(report.skipped, 0);
    assert_eq!(manager.registry().len().await, 4);

    let snapshot = manager.snapshot().await;
    assert_eq!(snapshot.total, 4);
    assert_eq!(snapshot.data[0].torrent_name, "stored-4");
}

#[tokio::test]
async fn recovering_twice_adds_nothing() {
    let (manager, engine, _temp_dir) = create_test_manager().await;
    manager
        .db
        .insert_torrent_if_absent(&record(1, "2024-03-01T10:00:00+00:00"))
        .await
        .unwrap();

    manager.recover().await.unwrap();
    let first = manager.registry().lookup(&hash(1)).await.unwrap();
    manager.recover().await.unwrap();
    let second = manager.registry().lookup(&hash(1)).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(manager.registry().len().await, 1);
    assert_eq!(engine.live_count(), 1);
    assert_eq!(manager.tasks.lock().await.len(), 1);
}

#[tokio::test]
async fn stored_state_is_restored() {
    let (manager, engine, _temp_dir) = create_test_manager().await;
    let mut paused = record(1, "2024-03-01T10:00:00+00:00");
    paused.is_paused = true;
    paused.is_active = false;
    paused.label = Some("music".into());
    paused.info_bytes = Some(b"d4:infoe".to_vec());
    paused.is_fetching_metadata = false;
    manager.db.insert_torrent_if_absent(&paused).await.unwrap();

    manager.recover().await.unwrap();

    let session = manager.registry().lookup(&hash(1)).await.unwrap();
    let flags = session.flags().await;
    assert!(flags.paused);
    assert!(!flags.fetching_metadata);
    assert_eq!(flags.label.as_deref(), Some("music"));
    assert_eq!(flags.max_connections, 40);
    assert_eq!(session.date_added, "2024-03-01T10:00:00+00:00");
    assert!(session.torrent.has_info());
    assert_eq!(driver(&engine, 1).max_established_conns(), 0);
}

#[tokio::test]
async fn record_without_metadata_resumes_fetching() {
    let (manager, engine, _temp_dir) = create_test_manager().await;
    manager
        .db
        .insert_torrent_if_absent(&record(2, "2024-03-01T10:00:00+00:00"))
        .await
        .unwrap();

    manager.recover().await.unwrap();
    let session = manager.registry().lookup(&hash(2)).await.unwrap();
    assert!(session.flags().await.fetching_metadata);

    driver(&engine, 2).deliver_info("arrived", b"d4:infoe".to_vec(), 10);
    eventually(|| {
        let session = session.clone();
        async move { !session.flags().await.fetching_metadata }
    })
    .await;

    let stored = manager.db.get_torrent(&hash(2)).await.unwrap().unwrap();
    assert_eq!(stored.info_bytes.as_deref(), Some(&b"d4:infoe"[..]));
}

#[tokio::test]
async fn corrupt_and_rejected_records_are_skipped() {
    let (manager, engine, _temp_dir) = create_test_manager().await;
    for n in 1..=3 {
        manager
            .db
            .insert_torrent_if_absent(&record(n, "2024-03-01T10:00:00+00:00"))
            .await
            .unwrap();
    }
    sqlx::query("UPDATE torrents SET trackers = 'not json' WHERE hash = ?")
        .bind(hash(1).to_hex())
        .execute(manager.db.pool())
        .await
        .unwrap();
    engine.reject_next_add("engine busy");

    let report = manager.recover().await.unwrap();
    assert_eq!(report.skipped, 2);
    assert_eq!(report.restored, 1);
    assert_eq!(manager.registry().len().await, 1);
}

#[tokio::test]
async fn queue_survives_recovery() {
    let (manager, _engine, _temp_dir) = create_test_manager().await;
    manager.add_magnet(&magnet(1), None).await.unwrap();
    manager.add_magnet(&magnet(2), None).await.unwrap();
    manager.stop(&hash(1)).await.unwrap();
    let before = manager.queue_state().await;

    let config = (*manager.get_config()).clone();
    let restarted = SessionManager::with_database(
        config,
        manager.db.clone(),
        Arc::new(crate::engine::InMemoryEngine::new()),
    )
    .unwrap();
    restarted.recover().await.unwrap();

    assert_eq!(restarted.queue_state().await, before);
    assert_eq!(restarted.registry().len().await, 2);
}
