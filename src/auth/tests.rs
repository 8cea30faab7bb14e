use super::*;
use crate::error::{AuthError, Error};
use crate::session::test_helpers::test_config;
use tempfile::tempdir;

async fn setup() -> (Arc<Database>, Config, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let db = Database::new(&config.persistence.database_path).await.unwrap();
    (Arc::new(db), config, dir)
}

#[tokio::test]
async fn first_run_writes_auth_file_with_valid_token() {
    let (db, config, _dir) = setup().await;

    let gate = AuthGate::load_or_init(db.clone(), &config).await.unwrap();

    let written = std::fs::read_to_string(&config.client.auth_file).unwrap();
    assert_eq!(written, gate.first_token().await);

    let claims = gate.verify(&written).await.unwrap();
    assert_eq!(claims.client_name, "goTorrentWebUI");
    assert_eq!(gate.issued_names().await, vec!["goTorrentWebUI".to_string()]);

    let stored = db.load_tokens().await.unwrap().unwrap();
    assert_eq!(stored.signing_key.len(), token::SIGNING_KEY_LEN);
}

#[tokio::test]
async fn second_start_reuses_signing_key() {
    let (db, config, _dir) = setup().await;

    let first = AuthGate::load_or_init(db.clone(), &config).await.unwrap();
    let token = first.issue_token("phone").await.unwrap();
    std::fs::remove_file(&config.client.auth_file).unwrap();

    let second = AuthGate::load_or_init(db, &config).await.unwrap();
    assert!(second.verify(&token).await.is_ok());
    assert_eq!(second.first_token().await, first.first_token().await);
    // Existing key: the auth file is not rewritten
    assert!(!config.client.auth_file.exists());
}

#[tokio::test]
async fn unwritable_auth_file_does_not_abort() {
    let (db, mut config, dir) = setup().await;
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"file").unwrap();
    config.client.auth_file = blocker.join("clientAuth.txt");

    let gate = AuthGate::load_or_init(db, &config).await.unwrap();
    assert!(!gate.first_token().await.is_empty());
}

#[tokio::test]
async fn issued_names_are_recorded() {
    let (db, config, _dir) = setup().await;
    let gate = AuthGate::load_or_init(db.clone(), &config).await.unwrap();

    let token = gate.issue_token("laptop").await.unwrap();
    assert_eq!(gate.verify(&token).await.unwrap().client_name, "laptop");

    let stored = db.load_tokens().await.unwrap().unwrap();
    assert_eq!(stored.token_names, vec!["goTorrentWebUI", "laptop"]);
}

#[tokio::test]
async fn empty_client_name_is_refused() {
    let (db, config, _dir) = setup().await;
    let gate = AuthGate::load_or_init(db, &config).await.unwrap();

    assert!(matches!(
        gate.issue_token("  ").await,
        Err(Error::Auth(AuthError::InvalidClaims(_)))
    ));
    assert_eq!(gate.issued_names().await.len(), 1);
}

#[tokio::test]
async fn rotation_invalidates_old_tokens() {
    let (db, config, _dir) = setup().await;
    let gate = AuthGate::load_or_init(db, &config).await.unwrap();
    let old = gate.issue_token("tablet").await.unwrap();

    let fresh = gate.rotate_signing_key(&config).await.unwrap();

    assert!(matches!(
        gate.verify(&old).await,
        Err(Error::Auth(AuthError::SignatureMismatch))
    ));
    assert!(gate.verify(&fresh).await.is_ok());
    assert_eq!(
        std::fs::read_to_string(&config.client.auth_file).unwrap(),
        fresh
    );
}

#[tokio::test]
async fn client_config_written_only_when_settings_change() {
    let (db, mut config, _dir) = setup().await;
    let gate = AuthGate::load_or_init(db, &config).await.unwrap();

    assert!(gate.sync_client_config(&config).await.unwrap());
    let contents: ClientConfigFile =
        serde_json::from_str(&std::fs::read_to_string(&config.client.config_file).unwrap())
            .unwrap();
    assert_eq!(contents.websocket_address, "ws://127.0.0.1:8000/websocket");
    assert_eq!(contents.client_auth_string, gate.first_token().await);

    assert!(!gate.sync_client_config(&config).await.unwrap());

    config.client.public_address = Some("wss://example.net/websocket".into());
    assert!(gate.sync_client_config(&config).await.unwrap());
    let contents: ClientConfigFile =
        serde_json::from_str(&std::fs::read_to_string(&config.client.config_file).unwrap())
            .unwrap();
    assert_eq!(contents.websocket_address, "wss://example.net/websocket");
}
