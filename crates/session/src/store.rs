//! The process-wide session store.
//!
//! All state lives behind one mutex and every mutation (login, renewal,
//! clear) replaces it as a unit and bumps `generation`. Side effects that must
//! stay ordered with the mutation (timer arm/cancel, subscriber notification)
//! happen while the lock is held; persistence happens afterwards and always
//! writes the latest state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::watch;
use tokio::task::AbortHandle;

use flockdesk_auth::{AuthView, Role, RoleSet, UserProfile, resolve_grant};

use crate::api::{AuthApi, LoginRequest};
use crate::error::{SessionError, StorageError};
use crate::scheduler::RefreshScheduler;
use crate::session::{AuthState, Session};
use crate::storage::SessionStorage;

type RenewalOutcome = Shared<BoxFuture<'static, Result<String, SessionError>>>;

struct PendingRenewal {
    id: u64,
    generation: u64,
    outcome: RenewalOutcome,
    task: AbortHandle,
}

#[derive(Default)]
struct State {
    session: Option<Session>,
    generation: u64,
    pending: Option<PendingRenewal>,
}

struct Inner {
    state: Mutex<State>,
    api: Arc<dyn AuthApi>,
    storage: Arc<dyn SessionStorage>,
    scheduler: RefreshScheduler,
    notifier: watch::Sender<AuthState>,
    persist_lock: tokio::sync::Mutex<()>,
    next_renewal_id: AtomicU64,
}

/// Single source of truth for the current session.
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    pub fn new(
        api: Arc<dyn AuthApi>,
        storage: Arc<dyn SessionStorage>,
        scheduler: RefreshScheduler,
    ) -> Self {
        let (notifier, _) = watch::channel(AuthState::logged_out(0));
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                api,
                storage,
                scheduler,
                notifier,
                persist_lock: tokio::sync::Mutex::new(()),
                next_renewal_id: AtomicU64::new(1),
            }),
        }
    }

    /// Restore the persisted session at process start.
    ///
    /// Missing, partial or unparsable state means "logged out"; this never
    /// fails. Returns whether a session was restored.
    pub async fn initialize(&self) -> bool {
        match self.inner.storage.load().await {
            Ok(Some(session)) => {
                let mut state = self.lock_state();
                self.replace_locked(&mut state, session);
                tracing::info!(generation = state.generation, "restored persisted session");
                true
            }
            Ok(None) => {
                tracing::debug!("no persisted session");
                false
            }
            Err(StorageError::Malformed(reason)) => {
                tracing::warn!(%reason, "discarding malformed persisted session");
                self.logout().await;
                false
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to read persisted session; starting logged out");
                false
            }
        }
    }

    /// Authenticate against the backend and replace the session.
    ///
    /// On failure any previous session is cleared and the error returned.
    pub async fn login(&self, request: &LoginRequest) -> Result<UserProfile, SessionError> {
        let result = self.inner.api.login(request).await.and_then(|grant| {
            resolve_grant(grant, Utc::now(), None).map_err(SessionError::from)
        });

        match result {
            Ok(resolved) => {
                let user = resolved.user.clone();
                {
                    let mut state = self.lock_state();
                    self.replace_locked(&mut state, Session::from(resolved));
                    tracing::info!(
                        generation = state.generation,
                        username = %user.username,
                        "logged in"
                    );
                }
                self.persist().await;
                Ok(user)
            }
            Err(err) => {
                tracing::warn!(username = %request.username, error = %err, "login failed");
                self.logout().await;
                Err(err)
            }
        }
    }

    /// Obtain a fresh credential.
    ///
    /// Concurrent callers share one in-flight renewal and observe the same
    /// outcome. A renewal that completes after the session was replaced or
    /// cleared is discarded; its callers get the current credential if one
    /// exists, otherwise `SessionExpired`.
    pub async fn renew(&self) -> Result<String, SessionError> {
        let outcome = {
            let mut state = self.lock_state();
            let in_flight = state
                .pending
                .as_ref()
                .map(|pending| (pending.id, pending.outcome.clone()));
            match in_flight {
                Some((id, outcome)) => {
                    tracing::debug!(renewal = id, "joining in-flight renewal");
                    outcome
                }
                None => {
                    let Some(refresh) = state.session.as_ref().map(|s| s.refresh_credential.clone())
                    else {
                        return Err(SessionError::SessionExpired);
                    };
                    let id = self.inner.next_renewal_id.fetch_add(1, Ordering::Relaxed);
                    let generation = state.generation;
                    let store = self.clone();
                    let task =
                        tokio::spawn(async move { store.run_renewal(id, generation, refresh).await });
                    let abort = task.abort_handle();
                    let weak = Arc::downgrade(&self.inner);
                    let outcome = async move {
                        match task.await {
                            Ok(result) => result,
                            Err(err) => abandon_renewal(weak, id, generation, err.to_string()).await,
                        }
                    }
                    .boxed()
                    .shared();

                    tracing::debug!(renewal = id, generation, "renewal started");
                    state.pending = Some(PendingRenewal {
                        id,
                        generation,
                        outcome: outcome.clone(),
                        task: abort,
                    });
                    outcome
                }
            }
        };

        outcome.await
    }

    /// Clear the session everywhere: memory, timer, subscribers, storage.
    pub async fn logout(&self) {
        self.clear_memory();
        self.persist().await;
    }

    /// Synchronously clear the in-memory session.
    ///
    /// Persisted keys are removed in the background when a runtime is
    /// available; use [`SessionStore::logout`] to wait for that.
    pub fn clear(&self) {
        self.clear_memory();

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let store = self.clone();
            handle.spawn(async move { store.persist().await });
        }
    }

    /// Clear the session only if `credential` is still the current one.
    ///
    /// Returns whether anything was cleared. A concurrent re-login is left
    /// untouched.
    pub async fn reject_credential(&self, credential: &str) -> bool {
        let cleared = {
            let mut state = self.lock_state();
            let current = state
                .session
                .as_ref()
                .is_some_and(|s| s.credential == credential);
            if current {
                self.clear_locked(&mut state);
            }
            current
        };

        if cleared {
            self.persist().await;
        }
        cleared
    }

    pub fn credential(&self) -> Option<String> {
        self.lock_state().session.as_ref().map(|s| s.credential.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock_state().session.is_some()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.lock_state().session.as_ref().map(|s| s.user.clone())
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.lock_state()
            .session
            .as_ref()
            .is_some_and(|s| s.roles.contains(role))
    }

    pub fn roles(&self) -> RoleSet {
        self.lock_state()
            .session
            .as_ref()
            .map(|s| s.roles.clone())
            .unwrap_or_default()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.lock_state().session.as_ref().map(|s| s.expires_at)
    }

    pub fn generation(&self) -> u64 {
        self.lock_state().generation
    }

    /// Receiver that observes every login, renewal and clear.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.notifier.subscribe()
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.inner.scheduler
    }

    async fn run_renewal(
        &self,
        id: u64,
        generation: u64,
        refresh: String,
    ) -> Result<String, SessionError> {
        let received = self.inner.api.refresh(&refresh).await.and_then(|grant| {
            resolve_grant(grant, Utc::now(), Some(&refresh)).map_err(SessionError::from)
        });

        let outcome = {
            let mut state = self.lock_state();
            if state.pending.as_ref().is_some_and(|p| p.id == id) {
                state.pending = None;
            }

            if state.generation != generation {
                tracing::info!(
                    renewal = id,
                    started_at = generation,
                    current = state.generation,
                    "discarding stale renewal result"
                );
                return current_or_expired(&state);
            }

            match received {
                Ok(resolved) => {
                    let session = Session::from(resolved);
                    let credential = session.credential.clone();
                    self.replace_locked(&mut state, session);
                    tracing::info!(renewal = id, generation = state.generation, "credential renewed");
                    Ok(credential)
                }
                Err(err) => {
                    tracing::warn!(renewal = id, error = %err, "renewal failed; ending session");
                    self.clear_locked(&mut state);
                    Err(match err {
                        SessionError::Network(msg) => SessionError::Network(msg),
                        _ => SessionError::SessionExpired,
                    })
                }
            }
        };

        self.persist().await;
        outcome
    }

    /// Settle a renewal whose task panicked or was aborted.
    ///
    /// A task that died while its session was still current ends that
    /// session; otherwise callers get whatever session exists now.
    async fn settle_failed_renewal(
        &self,
        id: u64,
        generation: u64,
        reason: String,
    ) -> Result<String, SessionError> {
        let outcome = {
            let mut state = self.lock_state();
            if state.pending.as_ref().is_some_and(|p| p.id == id) {
                state.pending = None;
            }

            if state.generation != generation {
                tracing::debug!(renewal = id, %reason, "renewal stopped after session changed");
                return current_or_expired(&state);
            }

            tracing::error!(renewal = id, %reason, "renewal task failed; ending session");
            self.clear_locked(&mut state);
            Err(SessionError::SessionExpired)
        };

        self.persist().await;
        outcome
    }

    fn clear_memory(&self) {
        let mut state = self.lock_state();
        self.clear_locked(&mut state);
    }

    fn replace_locked(&self, state: &mut State, session: Session) {
        state.generation += 1;
        stop_pending(state);
        let generation = state.generation;
        let expires_at = session.expires_at;
        let user = session.user.clone();
        state.session = Some(session);

        let weak = Arc::downgrade(&self.inner);
        self.inner
            .scheduler
            .arm(generation, expires_at, move || scheduled_renewal(weak, generation));

        self.inner.notifier.send_replace(AuthState {
            generation,
            user: Some(user),
        });
    }

    fn clear_locked(&self, state: &mut State) {
        state.generation += 1;
        stop_pending(state);
        state.session = None;
        self.inner.scheduler.cancel();
        self.inner
            .notifier
            .send_replace(AuthState::logged_out(state.generation));
        tracing::info!(generation = state.generation, "session cleared");
    }

    /// Write the latest in-memory state to storage.
    ///
    /// Writes are serialized and each one snapshots the state after taking
    /// the lock, so storage always converges on the newest state.
    async fn persist(&self) {
        let _guard = self.inner.persist_lock.lock().await;
        let snapshot = self.lock_state().session.clone();

        let result = match &snapshot {
            Some(session) => self.inner.storage.save(session).await,
            None => self.inner.storage.clear().await,
        };
        if let Err(err) = result {
            tracing::error!(error = %err, "failed to persist session");
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn current_or_expired(state: &State) -> Result<String, SessionError> {
    match &state.session {
        Some(session) => Ok(session.credential.clone()),
        None => Err(SessionError::SessionExpired),
    }
}

/// Abort a renewal whose session is being replaced or cleared.
fn stop_pending(state: &mut State) {
    if let Some(pending) = state.pending.take() {
        tracing::debug!(
            renewal = pending.id,
            started_at = pending.generation,
            "stopping renewal for replaced session"
        );
        pending.task.abort();
    }
}

async fn abandon_renewal(
    store: Weak<Inner>,
    id: u64,
    generation: u64,
    reason: String,
) -> Result<String, SessionError> {
    let Some(inner) = store.upgrade() else {
        return Err(SessionError::SessionExpired);
    };
    SessionStore { inner }
        .settle_failed_renewal(id, generation, reason)
        .await
}

async fn scheduled_renewal(store: Weak<Inner>, generation: u64) {
    let Some(inner) = store.upgrade() else {
        return;
    };
    let store = SessionStore { inner };

    if store.generation() != generation {
        tracing::debug!(generation, "skipping renewal for replaced session");
        return;
    }

    match store.renew().await {
        Ok(_) => tracing::debug!(generation, "scheduled renewal completed"),
        Err(err) => tracing::warn!(generation, error = %err, "scheduled renewal failed"),
    }
}

impl AuthView for SessionStore {
    fn is_authenticated(&self) -> bool {
        SessionStore::is_authenticated(self)
    }

    fn has_role(&self, role: &Role) -> bool {
        SessionStore::has_role(self, role)
    }
}

impl core::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("SessionStore")
            .field("generation", &state.generation)
            .field("authenticated", &state.session.is_some())
            .field("renewal_pending", &state.pending.is_some())
            .finish()
    }
}
