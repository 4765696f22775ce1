//! Proactive credential renewal.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

/// How long to wait before renewing a credential that expires at `expires_at`.
///
/// Zero when the credential is already inside the safety margin (or expired).
pub fn renewal_delay(expires_at: DateTime<Utc>, now: DateTime<Utc>, margin: Duration) -> Duration {
    chrono::Duration::from_std(margin)
        .ok()
        .and_then(|margin| (expires_at - now).checked_sub(&margin))
        .and_then(|delay| delay.to_std().ok())
        .unwrap_or(Duration::ZERO)
}

struct ArmedTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Single one-shot timer that fires a renewal shortly before expiry.
///
/// Arming replaces whatever timer was armed before, so at most one is ever
/// pending.
pub struct RefreshScheduler {
    margin: Duration,
    slot: Mutex<Option<ArmedTimer>>,
}

impl RefreshScheduler {
    pub fn new(margin: Duration) -> Self {
        Self {
            margin,
            slot: Mutex::new(None),
        }
    }

    /// Arm a timer for the session of `generation`, replacing any armed one.
    ///
    /// `fire` runs once the delay elapses; with a zero delay it runs as soon as
    /// the runtime schedules it. Must be called from within a tokio runtime.
    pub fn arm<F, Fut>(&self, generation: u64, expires_at: DateTime<Utc>, fire: F) -> Duration
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let delay = renewal_delay(expires_at, Utc::now(), self.margin);
        let handle = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            fire().await;
        });

        let previous = self
            .lock()
            .replace(ArmedTimer { generation, handle });
        if let Some(previous) = previous {
            previous.handle.abort();
        }

        tracing::debug!(generation, delay_secs = delay.as_secs(), "renewal timer armed");
        delay
    }

    /// Cancel the armed timer, if any.
    pub fn cancel(&self) {
        if let Some(previous) = self.lock().take() {
            previous.handle.abort();
            tracing::debug!(generation = previous.generation, "renewal timer cancelled");
        }
    }

    /// Generation the currently armed timer belongs to.
    pub fn armed_generation(&self) -> Option<u64> {
        self.lock()
            .as_ref()
            .filter(|t| !t.handle.is_finished())
            .map(|t| t.generation)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<ArmedTimer>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl core::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("margin", &self.margin)
            .field("armed_generation", &self.armed_generation())
            .finish()
    }
}
