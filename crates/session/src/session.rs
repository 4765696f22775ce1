//! Session record and the state broadcast to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use flockdesk_auth::{ResolvedGrant, RoleSet, UserProfile};

/// The authenticated-state record.
///
/// Always replaced as a whole: `credential` and `expires_at` never change
/// independently of each other.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub credential: String,
    pub refresh_credential: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
    pub roles: RoleSet,
}

impl From<ResolvedGrant> for Session {
    fn from(grant: ResolvedGrant) -> Self {
        Self {
            credential: grant.credential,
            refresh_credential: grant.refresh_credential,
            expires_at: grant.expires_at,
            user: grant.user,
            roles: grant.roles,
        }
    }
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("credential", &"<redacted>")
            .field("refresh_credential", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .field("roles", &self.roles)
            .finish()
    }
}

/// Snapshot published to subscribers on every login, renewal and clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub generation: u64,
    pub user: Option<UserProfile>,
}

impl AuthState {
    pub fn logged_out(generation: u64) -> Self {
        Self {
            generation,
            user: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}
