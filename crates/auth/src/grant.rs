use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{RoleSet, UserProfile};

/// Credential grant returned by the login and refresh endpoints.
///
/// The backend reports expiry either as a relative `expiresIn` (seconds) or an
/// absolute `expiresAt`; refresh responses may omit `refreshToken`, in which
/// case the previous refresh credential stays valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    #[serde(alias = "token")]
    pub access_token: String,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub expires_in: Option<i64>,

    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub roles: Vec<crate::Role>,

    pub user: UserProfile,
}

/// A grant that passed validation, with every session field resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGrant {
    pub credential: String,
    pub refresh_credential: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
    pub roles: RoleSet,
}

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantValidationError {
    #[error("grant carries an empty credential")]
    MissingCredential,

    #[error("grant carries no refresh credential")]
    MissingRefreshCredential,

    #[error("grant carries neither expiresIn nor expiresAt")]
    MissingExpiry,

    #[error("grant expiry is not after its issue time")]
    InvalidTimeWindow,
}

impl TokenGrant {
    /// Absolute expiry of the credential, given the moment it was received.
    ///
    /// `expiresAt` wins when both forms are present. An `expiresIn` that
    /// cannot be represented as a timestamp is an invalid window.
    pub fn expiry(&self, received_at: DateTime<Utc>) -> Result<DateTime<Utc>, GrantValidationError> {
        if let Some(at) = self.expires_at {
            return Ok(at);
        }
        let secs = self.expires_in.ok_or(GrantValidationError::MissingExpiry)?;
        Duration::try_seconds(secs)
            .and_then(|delta| received_at.checked_add_signed(delta))
            .ok_or(GrantValidationError::InvalidTimeWindow)
    }

    /// Effective roles: standalone claims merged with the user's own roles.
    pub fn role_set(&self) -> RoleSet {
        self.roles
            .iter()
            .chain(self.user.roles.iter())
            .cloned()
            .collect()
    }
}

/// Deterministically validate a grant and resolve it into session fields.
///
/// `previous_refresh` is reused when a renewal response does not rotate the
/// refresh credential. No IO.
pub fn resolve_grant(
    grant: TokenGrant,
    received_at: DateTime<Utc>,
    previous_refresh: Option<&str>,
) -> Result<ResolvedGrant, GrantValidationError> {
    if grant.access_token.trim().is_empty() {
        return Err(GrantValidationError::MissingCredential);
    }

    let refresh_credential = grant
        .refresh_token
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .or(previous_refresh.filter(|r| !r.trim().is_empty()))
        .map(str::to_string)
        .ok_or(GrantValidationError::MissingRefreshCredential)?;

    let expires_at = grant.expiry(received_at)?;
    if expires_at <= received_at {
        return Err(GrantValidationError::InvalidTimeWindow);
    }

    let roles = grant.role_set();
    Ok(ResolvedGrant {
        credential: grant.access_token,
        refresh_credential,
        expires_at,
        user: grant.user,
        roles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use flockdesk_core::UserId;

    fn grant(json: serde_json::Value) -> TokenGrant {
        serde_json::from_value(json).unwrap()
    }

    fn user_json() -> serde_json::Value {
        serde_json::json!({ "id": 1, "username": "admin", "displayName": "Farm Admin", "roles": ["ADMIN"] })
    }

    #[test]
    fn relative_expiry_is_anchored_at_receipt() {
        let now = Utc::now();
        let g = grant(serde_json::json!({
            "accessToken": "a1",
            "refreshToken": "r1",
            "expiresIn": 900,
            "user": user_json(),
        }));

        let resolved = resolve_grant(g, now, None).unwrap();
        assert_eq!(resolved.expires_at, now + Duration::seconds(900));
        assert_eq!(resolved.refresh_credential, "r1");
        assert_eq!(resolved.user.id, UserId::new(1));
    }

    #[test]
    fn absolute_expiry_takes_precedence() {
        let now = Utc::now();
        let at = now + Duration::hours(1);
        let g = grant(serde_json::json!({
            "token": "a1",
            "refreshToken": "r1",
            "expiresIn": 5,
            "expiresAt": at.to_rfc3339(),
            "user": user_json(),
        }));

        let resolved = resolve_grant(g, now, None).unwrap();
        assert_eq!(resolved.expires_at.timestamp(), at.timestamp());
    }

    #[test]
    fn renewal_without_rotation_keeps_previous_refresh() {
        let g = grant(serde_json::json!({
            "accessToken": "a2",
            "expiresIn": 60,
            "user": user_json(),
        }));

        let resolved = resolve_grant(g.clone(), Utc::now(), Some("r-old")).unwrap();
        assert_eq!(resolved.refresh_credential, "r-old");

        let err = resolve_grant(g, Utc::now(), None).unwrap_err();
        assert_eq!(err, GrantValidationError::MissingRefreshCredential);
    }

    #[test]
    fn roles_merge_standalone_and_user_claims() {
        let g = grant(serde_json::json!({
            "accessToken": "a1",
            "refreshToken": "r1",
            "expiresIn": 60,
            "roles": ["ROLE_POULTRY_MANAGER"],
            "user": user_json(),
        }));

        let roles = g.role_set();
        assert!(roles.contains(&Role::ADMIN));
        assert!(roles.contains(&Role::POULTRY_MANAGER));
    }

    #[test]
    fn rejects_empty_credential_and_bad_windows() {
        let now = Utc::now();
        let base = serde_json::json!({
            "accessToken": " ",
            "refreshToken": "r1",
            "expiresIn": 60,
            "user": user_json(),
        });
        assert_eq!(
            resolve_grant(grant(base), now, None).unwrap_err(),
            GrantValidationError::MissingCredential
        );

        let no_expiry = grant(serde_json::json!({
            "accessToken": "a1",
            "refreshToken": "r1",
            "user": user_json(),
        }));
        assert_eq!(
            resolve_grant(no_expiry, now, None).unwrap_err(),
            GrantValidationError::MissingExpiry
        );

        let expired = grant(serde_json::json!({
            "accessToken": "a1",
            "refreshToken": "r1",
            "expiresIn": 0,
            "user": user_json(),
        }));
        assert_eq!(
            resolve_grant(expired, now, None).unwrap_err(),
            GrantValidationError::InvalidTimeWindow
        );
    }

    #[test]
    fn out_of_range_expiry_is_an_invalid_window() {
        let now = Utc::now();
        for secs in [i64::MAX, i64::MIN, 10_i64.pow(13)] {
            let g = grant(serde_json::json!({
                "accessToken": "a1",
                "refreshToken": "r1",
                "expiresIn": secs,
                "user": user_json(),
            }));
            assert_eq!(
                resolve_grant(g, now, None).unwrap_err(),
                GrantValidationError::InvalidTimeWindow,
                "expiresIn = {secs}"
            );
        }
    }
}
