use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

/// Capability tag granted by the backend (e.g. `ADMIN`, `POULTRY_MANAGER`).
///
/// Roles are opaque strings at this layer. Comparison is exact; use
/// [`Role::normalized`] when ingesting server claims.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    /// Full administrative capability.
    pub const ADMIN: Role = Role(Cow::Borrowed("ADMIN"));

    /// Manages poultry batches and feeding plans.
    pub const POULTRY_MANAGER: Role = Role(Cow::Borrowed("POULTRY_MANAGER"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// Canonical form: trimmed, upper-cased, without a Spring-style `ROLE_` prefix.
    pub fn normalized(&self) -> Role {
        let upper = self.0.trim().to_ascii_uppercase();
        match upper.strip_prefix("ROLE_") {
            Some(rest) => Role::new(rest.to_string()),
            None => Role::new(upper),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Set of normalized roles held by a session.
///
/// Serializes as a plain list; deserialization normalizes every entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    pub fn insert(&mut self, role: Role) {
        let role = role.normalized();
        if !role.as_str().is_empty() {
            self.0.insert(role);
        }
    }

    pub fn contains(&self, role: &Role) -> bool {
        self.0.contains(&role.normalized())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.0.iter()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        let mut set = RoleSet::new();
        for role in iter {
            set.insert(role);
        }
        set
    }
}

impl<'de> Deserialize<'de> for RoleSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Role>::deserialize(deserializer).map(|roles| roles.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for RoleSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().map(|s| Role::new(s.to_string())).collect()
    }
}
