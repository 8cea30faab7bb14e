//! Shared helpers for building session managers in tests.

use crate::config::Config;
use crate::db::Database;
use crate::engine::{InMemoryEngine, MemoryTorrent};
use crate::session::SessionManager;
use crate::types::InfoHash;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

/// Config rooted in a temp dir
pub(crate) fn test_config(root: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = root.join("test.db");
    config.download.download_dir = root.join("downloads");
    config.client.auth_file = root.join("clientAuth.txt");
    config.client.config_file = root.join("clientConfig.json");
    config
}

/// Manager over a fresh database and in-memory engine.
/// Returns the manager, the engine for driving torrents, and the tempdir
/// (which must be kept alive).
pub(crate) async fn create_test_manager()
-> (SessionManager, Arc<InMemoryEngine>, tempfile::TempDir) {
    create_test_manager_with(|_| {}).await
}

/// Same as [`create_test_manager`], with a config tweak applied first
pub(crate) async fn create_test_manager_with<F>(
    tweak: F,
) -> (SessionManager, Arc<InMemoryEngine>, tempfile::TempDir)
where
    F: FnOnce(&mut Config),
{
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    tweak(&mut config);
    std::fs::create_dir_all(&config.download.download_dir).unwrap();

    let db = Database::new(&config.persistence.database_path)
        .await
        .unwrap();
    let engine = Arc::new(InMemoryEngine::new());
    let manager = SessionManager::with_database(config, Arc::new(db), engine.clone()).unwrap();

    (manager, engine, temp_dir)
}

/// Deterministic hash for index `n`
pub(crate) fn hash(n: u8) -> InfoHash {
    let mut bytes = [0u8; 20];
    bytes[0] = n;
    bytes[19] = 0xAB;
    InfoHash(bytes)
}

/// Magnet link for [`hash`]`(n)`
pub(crate) fn magnet(n: u8) -> String {
    format!("magnet:?xt=urn:btih:{}&dn=torrent-{}", hash(n), n)
}

/// Driver handle for a torrent added through the manager
pub(crate) fn driver(engine: &InMemoryEngine, n: u8) -> Arc<MemoryTorrent> {
    engine.torrent(&hash(n)).unwrap()
}

/// Poll `check` until it holds or a second passes
pub(crate) async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 1s");
}
