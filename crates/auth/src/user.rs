//! Profile of the signed-in dashboard user.

use serde::{Deserialize, Serialize};

use flockdesk_core::UserId;

use crate::{Role, RoleSet};

/// User record returned by the backend alongside every credential grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    #[serde(default, alias = "fullName")]
    pub display_name: String,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl UserProfile {
    /// Name to show in the dashboard header; falls back to the login name.
    pub fn label(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.username
        } else {
            &self.display_name
        }
    }

    pub fn role_set(&self) -> RoleSet {
        self.roles.iter().cloned().collect()
    }
}
