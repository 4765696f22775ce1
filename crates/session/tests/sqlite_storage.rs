use chrono::{Duration, Utc};

use flockdesk_auth::{Role, UserProfile};
use flockdesk_core::UserId;
use flockdesk_session::storage::{CREDENTIAL_KEY, EXPIRY_KEY, SESSION_KEYS};
use flockdesk_session::{Session, SessionStorage, SqliteStorage, StorageError};

fn session(credential: &str) -> Session {
    Session {
        credential: credential.to_string(),
        refresh_credential: format!("refresh-{credential}"),
        expires_at: Utc::now() + Duration::minutes(30),
        user: UserProfile {
            id: UserId::new(12),
            username: "wanjiru".to_string(),
            display_name: "Wanjiru K.".to_string(),
            roles: vec![Role::ADMIN],
        },
        roles: [Role::ADMIN, Role::POULTRY_MANAGER].into_iter().collect(),
    }
}

#[tokio::test]
async fn empty_database_has_no_session() {
    let dir = tempfile::tempdir().unwrap();
    let storage = SqliteStorage::open(dir.path().join("session.db"));

    assert!(storage.load().await.unwrap().is_none());
}

#[tokio::test]
async fn saved_session_survives_reopening() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("session.db");

    let original = session("cred-a");
    SqliteStorage::open(&path).save(&original).await.unwrap();

    let reopened = SqliteStorage::open(&path);
    let loaded = reopened.load().await.unwrap().unwrap();
    assert_eq!(loaded.credential, "cred-a");
    assert_eq!(loaded.refresh_credential, "refresh-cred-a");
    assert_eq!(loaded.user.id, UserId::new(12));
    assert_eq!(loaded.roles, original.roles);
    assert_eq!(loaded.expires_at.timestamp(), original.expires_at.timestamp());

    let entries = reopened.read_entries().await.unwrap();
    assert_eq!(entries.len(), SESSION_KEYS.len());
}

#[tokio::test]
async fn save_overwrites_every_key() {
    let dir = tempfile::tempdir().unwrap();
    let storage = SqliteStorage::open(dir.path().join("session.db"));

    storage.save(&session("cred-a")).await.unwrap();
    storage.save(&session("cred-b")).await.unwrap();

    let entries = storage.read_entries().await.unwrap();
    assert_eq!(entries[CREDENTIAL_KEY], "cred-b");
    assert_eq!(storage.load().await.unwrap().unwrap().refresh_credential, "refresh-cred-b");
}

#[tokio::test]
async fn clear_removes_all_keys() {
    let dir = tempfile::tempdir().unwrap();
    let storage = SqliteStorage::open(dir.path().join("session.db"));

    storage.save(&session("cred-a")).await.unwrap();
    storage.clear().await.unwrap();

    assert!(storage.read_entries().await.unwrap().is_empty());
    assert!(storage.load().await.unwrap().is_none());
}

#[tokio::test]
async fn partial_state_is_reported_as_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let storage = SqliteStorage::open(dir.path().join("session.db"));

    storage.save(&session("cred-a")).await.unwrap();
    storage.remove_entries(&[EXPIRY_KEY]).await.unwrap();

    assert!(matches!(storage.load().await, Err(StorageError::Malformed(_))));
}
