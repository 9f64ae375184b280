// coursedesk-client/tests/file_store.rs
// Session persistence on disk

mod common;

use std::sync::Arc;

use common::{FakeAuth, FakeRoles, cached_user, credentials, test_config};
use coursedesk_client::{
    FileStore, PersistedSession, SessionManager, SessionState, SessionStore, TokenPair,
};
use tempfile::TempDir;

#[test]
fn test_file_store_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("session.json");

    let store = Arc::new(FileStore::open(&path).unwrap());
    let session = PersistedSession::new(store);
    session
        .save_tokens(&TokenPair::new("access", "refresh"))
        .unwrap();
    session.save_user(&cached_user()).unwrap();
    assert!(path.exists());

    // Reopen as a fresh process would
    let reopened = PersistedSession::new(Arc::new(FileStore::open(&path).unwrap()));
    assert_eq!(reopened.access_token().unwrap().as_deref(), Some("access"));
    assert_eq!(reopened.refresh_token().unwrap().as_deref(), Some("refresh"));
    assert_eq!(reopened.user().unwrap(), Some(cached_user()));

    reopened.clear().unwrap();
    assert!(!path.exists());
    assert!(reopened.is_empty().unwrap());
}

#[test]
fn test_file_store_rejects_garbage() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("session.json");
    std::fs::write(&path, "{not json").unwrap();

    assert!(FileStore::open(&path).is_err());
}

#[test]
fn test_empty_file_is_empty_store() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("session.json");
    std::fs::write(&path, "").unwrap();

    let store = FileStore::open(&path).unwrap();
    assert_eq!(store.get("authToken").unwrap(), None);
}

#[tokio::test]
async fn test_session_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("session.json");
    let auth = FakeAuth::new();
    let roles = FakeRoles::new();

    let first = SessionManager::new(
        test_config(),
        auth.clone(),
        roles.clone(),
        Arc::new(FileStore::open(&path).unwrap()),
    );
    assert!(first.login(&credentials()).await.success);
    drop(first);

    let second = SessionManager::new(
        test_config(),
        auth.clone(),
        roles,
        Arc::new(FileStore::open(&path).unwrap()),
    );
    assert_eq!(second.initialize().await, SessionState::Authenticated);
    assert_eq!(second.snapshot().user.unwrap().email, "grace@example.com");
    assert_eq!(auth.logins(), 1);

    second.logout().await.unwrap();
    assert!(!path.exists());
}

#[tokio::test]
async fn test_connect_uses_configured_store() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config().with_store_path(temp_dir.path().join("session.json"));

    let session = SessionManager::connect(config).unwrap();

    assert_eq!(session.state(), SessionState::Uninitialized);
    assert_eq!(session.initialize().await, SessionState::Unauthenticated);
}
