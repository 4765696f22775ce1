//! Compatibility facade for call sites written against the old auth service.
//!
//! Holds no state of its own; every query reads through to the
//! [`SessionStore`] so the two can never disagree.

use chrono::{DateTime, Utc};

use flockdesk_auth::{Role, UserProfile};

use crate::api::LoginRequest;
use crate::error::SessionError;
use crate::store::SessionStore;

#[derive(Debug, Clone)]
pub struct LegacyAuthService {
    store: SessionStore,
}

impl LegacyAuthService {
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }

    pub fn get_token(&self) -> Option<String> {
        self.store.credential()
    }

    pub fn is_logged_in(&self) -> bool {
        self.store.is_authenticated()
    }

    pub fn get_current_user(&self) -> Option<UserProfile> {
        self.store.current_user()
    }

    /// Normalized role names, sorted.
    pub fn get_user_roles(&self) -> Vec<String> {
        self.store
            .roles()
            .iter()
            .map(|role| role.as_str().to_string())
            .collect()
    }

    pub fn is_admin(&self) -> bool {
        self.store.has_role(&Role::ADMIN)
    }

    /// Accepts `"admin"`, `"ADMIN"` and `"ROLE_ADMIN"` alike.
    pub fn has_role(&self, role: &str) -> bool {
        self.store.has_role(&Role::new(role.to_string()))
    }

    pub fn token_expiry(&self) -> Option<DateTime<Utc>> {
        self.store.expires_at()
    }

    pub async fn login(
        &self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<UserProfile, SessionError> {
        self.store.login(&LoginRequest::new(username, password)).await
    }

    pub async fn logout(&self) {
        self.store.logout().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::api::AuthApi;
    use crate::scheduler::RefreshScheduler;
    use crate::session::Session;
    use crate::storage::{MemoryStorage, SessionStorage};
    use flockdesk_auth::TokenGrant;
    use flockdesk_core::UserId;

    struct OfflineApi;

    #[async_trait]
    impl AuthApi for OfflineApi {
        async fn login(&self, _request: &LoginRequest) -> Result<TokenGrant, SessionError> {
            Err(SessionError::Network("offline".to_string()))
        }

        async fn refresh(&self, _refresh_credential: &str) -> Result<TokenGrant, SessionError> {
            Err(SessionError::Network("offline".to_string()))
        }
    }

    async fn restored_service(username: &str, roles: &[&str]) -> LegacyAuthService {
        let storage = Arc::new(MemoryStorage::new());
        let session = Session {
            credential: "legacy-cred".to_string(),
            refresh_credential: "legacy-refresh".to_string(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
            user: UserProfile {
                id: UserId::new(1),
                username: username.to_string(),
                display_name: String::new(),
                roles: vec![],
            },
            roles: roles.iter().copied().collect(),
        };
        storage.save(&session).await.unwrap();

        let store = SessionStore::new(
            Arc::new(OfflineApi),
            storage,
            RefreshScheduler::new(Duration::from_secs(300)),
        );
        assert!(store.initialize().await);
        LegacyAuthService::new(store)
    }

    #[tokio::test]
    async fn reads_through_to_the_store() {
        let service = restored_service("odhiambo", &["ROLE_admin", "POULTRY_MANAGER"]).await;

        assert!(service.is_logged_in());
        assert_eq!(service.get_token().as_deref(), Some("legacy-cred"));
        assert_eq!(service.get_current_user().unwrap().username, "odhiambo");
        assert_eq!(service.get_user_roles(), vec!["ADMIN", "POULTRY_MANAGER"]);
        assert!(service.is_admin());
        assert!(service.has_role("poultry_manager"));
        assert!(service.token_expiry().is_some());
    }

    #[tokio::test]
    async fn admin_status_comes_from_roles_only() {
        let service = restored_service("admin", &["POULTRY_MANAGER"]).await;
        assert!(!service.is_admin());
    }

    #[tokio::test]
    async fn failed_login_and_logout_leave_facade_logged_out() {
        let service = restored_service("odhiambo", &["ADMIN"]).await;

        let err = service.login("odhiambo", "pw").await.unwrap_err();
        assert!(matches!(err, SessionError::Network(_)));
        assert!(!service.is_logged_in());

        service.logout().await;
        assert_eq!(service.get_token(), None);
        assert!(service.get_user_roles().is_empty());
    }
}
