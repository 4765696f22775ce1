//! Application state shared by every dashboard view.

use std::sync::Arc;

use anyhow::{Context, Result};

use flockdesk_auth::{GuardDecision, RouteGuard};
use flockdesk_session::{
    AuthApi, HttpAuthApi, LegacyAuthService, RefreshScheduler, RequestGate, SessionConfig,
    SessionError, SessionStorage, SessionStore, SqliteStorage,
};

use crate::api::DashboardApi;
use crate::routes;

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<SessionConfig>,
    pub store: SessionStore,
    pub gate: RequestGate,
    pub guard: Arc<RouteGuard>,
    pub api: DashboardApi,
    pub legacy: LegacyAuthService,
}

impl AppState {
    /// Build the state against the real backend and restore any persisted
    /// session.
    ///
    /// Storage is opened lazily; a missing or unreadable session file only
    /// means starting logged out.
    pub async fn bootstrap(config: SessionConfig) -> Result<Self> {
        let storage: Arc<dyn SessionStorage> = match &config.storage_path {
            Some(path) => Arc::new(SqliteStorage::open(path)),
            None => Arc::new(
                SqliteStorage::open_default().context("failed to locate session storage")?,
            ),
        };
        let api = Arc::new(HttpAuthApi::new(&config).context("failed to build auth client")?);

        let state = Self::with_parts(config, api, storage)?;
        let restored = state.store.initialize().await;
        tracing::info!(restored, "session store initialized");
        Ok(state)
    }

    pub fn with_parts(
        config: SessionConfig,
        api: Arc<dyn AuthApi>,
        storage: Arc<dyn SessionStorage>,
    ) -> Result<Self> {
        let store = SessionStore::new(api, storage, RefreshScheduler::new(config.safety_margin));
        let gate = RequestGate::new(&config, store.clone()).context("failed to build request gate")?;

        Ok(Self {
            api: DashboardApi::new(gate.clone()),
            legacy: LegacyAuthService::new(store.clone()),
            guard: Arc::new(RouteGuard::default()),
            config: Arc::new(config),
            store,
            gate,
        })
    }

    /// Guard decision for entering `requested`.
    pub fn navigate(&self, requested: &str) -> GuardDecision {
        let meta = routes::meta_for(requested);
        self.guard.check(&self.store, requested, &meta)
    }

    /// Navigation a view should perform after a failed call, if any.
    ///
    /// Only an expired session navigates; other errors stay on the view.
    pub fn handle_error(&self, current: &str, err: &SessionError) -> Option<GuardDecision> {
        if err.is_session_expired() {
            tracing::info!(view = current, "session expired; returning to login");
            Some(self.guard.session_expired_redirect(current))
        } else {
            None
        }
    }
}
