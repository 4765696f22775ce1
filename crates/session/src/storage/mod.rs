//! Persisted session storage.
//!
//! The session is stored as five flat keys that other parts of the dashboard
//! read directly. All five are written together and removed together; a
//! backend must apply each batch atomically.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use flockdesk_auth::{RoleSet, UserProfile};

use crate::error::StorageError;
use crate::session::Session;

mod memory;
mod sqlite;

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

pub const CREDENTIAL_KEY: &str = "auth_token";
pub const REFRESH_CREDENTIAL_KEY: &str = "refresh_token";
pub const EXPIRY_KEY: &str = "token_expiry";
pub const USER_KEY: &str = "current_user";
pub const ROLES_KEY: &str = "user_roles";

pub const SESSION_KEYS: [&str; 5] = [
    CREDENTIAL_KEY,
    REFRESH_CREDENTIAL_KEY,
    EXPIRY_KEY,
    USER_KEY,
    ROLES_KEY,
];

/// Durable key/value backend for the session.
///
/// Implementors only provide atomic batch primitives; `load`/`save`/`clear`
/// handle the encoding.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Read whichever session keys are present.
    async fn read_entries(&self) -> Result<HashMap<String, String>, StorageError>;

    /// Upsert every entry in one atomic batch.
    async fn write_entries(&self, entries: &[(&'static str, String)]) -> Result<(), StorageError>;

    /// Remove every key in one atomic batch.
    async fn remove_entries(&self, keys: &[&'static str]) -> Result<(), StorageError>;

    /// `Ok(None)` when nothing is stored, `Err(Malformed)` for partial or
    /// unparsable state.
    async fn load(&self) -> Result<Option<Session>, StorageError> {
        let entries = self.read_entries().await?;
        decode(&entries)
    }

    async fn save(&self, session: &Session) -> Result<(), StorageError> {
        let entries = encode(session)?;
        self.write_entries(&entries).await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.remove_entries(&SESSION_KEYS).await
    }
}

pub fn encode(session: &Session) -> Result<Vec<(&'static str, String)>, StorageError> {
    let user = serde_json::to_string(&session.user)
        .map_err(|e| StorageError::Backend(format!("failed to serialize user: {e}")))?;
    let roles = serde_json::to_string(&session.roles)
        .map_err(|e| StorageError::Backend(format!("failed to serialize roles: {e}")))?;

    Ok(vec![
        (CREDENTIAL_KEY, session.credential.clone()),
        (REFRESH_CREDENTIAL_KEY, session.refresh_credential.clone()),
        (EXPIRY_KEY, session.expires_at.to_rfc3339()),
        (USER_KEY, user),
        (ROLES_KEY, roles),
    ])
}

pub fn decode(entries: &HashMap<String, String>) -> Result<Option<Session>, StorageError> {
    if SESSION_KEYS.iter().all(|k| !entries.contains_key(*k)) {
        return Ok(None);
    }

    let get = |key: &str| {
        entries
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| StorageError::Malformed(format!("missing key '{key}'")))
    };

    let credential = get(CREDENTIAL_KEY)?;
    if credential.trim().is_empty() {
        return Err(StorageError::Malformed("empty credential".to_string()));
    }
    let refresh_credential = get(REFRESH_CREDENTIAL_KEY)?;

    let expires_at = DateTime::parse_from_rfc3339(get(EXPIRY_KEY)?)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Malformed(format!("invalid expiry: {e}")))?;

    let user: UserProfile = serde_json::from_str(get(USER_KEY)?)
        .map_err(|e| StorageError::Malformed(format!("invalid user: {e}")))?;

    let roles: RoleSet = serde_json::from_str(get(ROLES_KEY)?)
        .map_err(|e| StorageError::Malformed(format!("invalid roles: {e}")))?;

    Ok(Some(Session {
        credential: credential.to_string(),
        refresh_credential: refresh_credential.to_string(),
        expires_at,
        user,
        roles,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flockdesk_auth::Role;
    use flockdesk_core::UserId;

    fn sample_session() -> Session {
        Session {
            credential: "cred-1".to_string(),
            refresh_credential: "refresh-1".to_string(),
            expires_at: Utc::now() + chrono::Duration::minutes(15),
            user: UserProfile {
                id: UserId::new(9),
                username: "amara".to_string(),
                display_name: "Amara N.".to_string(),
                roles: vec![Role::POULTRY_MANAGER],
            },
            roles: [Role::POULTRY_MANAGER].into_iter().collect(),
        }
    }

    fn as_map(entries: Vec<(&'static str, String)>) -> HashMap<String, String> {
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn encode_writes_all_five_keys() {
        let entries = encode(&sample_session()).unwrap();
        let keys: Vec<&str> = entries.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, SESSION_KEYS.to_vec());
    }

    #[test]
    fn decode_reads_back_encoded_session() {
        let session = sample_session();
        let decoded = decode(&as_map(encode(&session).unwrap())).unwrap().unwrap();
        assert_eq!(decoded.credential, session.credential);
        assert_eq!(decoded.expires_at.timestamp(), session.expires_at.timestamp());
        assert_eq!(decoded.roles, session.roles);
    }

    #[test]
    fn empty_storage_is_no_session() {
        assert!(decode(&HashMap::new()).unwrap().is_none());
    }

    #[test]
    fn partial_state_is_malformed() {
        let mut map = as_map(encode(&sample_session()).unwrap());
        map.remove(EXPIRY_KEY);
        assert!(matches!(decode(&map), Err(StorageError::Malformed(_))));
    }

    #[test]
    fn unparsable_expiry_is_malformed() {
        let mut map = as_map(encode(&sample_session()).unwrap());
        map.insert(EXPIRY_KEY.to_string(), "next tuesday".to_string());
        let err = decode(&map).unwrap_err();
        assert!(err.to_string().contains("invalid expiry"));
    }

    #[test]
    fn persisted_role_claims_are_normalized() {
        let mut map = as_map(encode(&sample_session()).unwrap());
        map.insert(ROLES_KEY.to_string(), r#"["role_admin"]"#.to_string());
        let decoded = decode(&map).unwrap().unwrap();
        assert!(decoded.roles.contains(&Role::ADMIN));
    }
}
