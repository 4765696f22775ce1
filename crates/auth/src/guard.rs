//! Route authorization guard.
//!
//! A synchronous decision taken before a protected view is entered. It reads
//! nothing but the session view it is handed: no storage, no IO.

use serde::Serialize;

use crate::{Role, RoleSet};

/// Read-only view of the session that authorization decisions consult.
pub trait AuthView {
    fn is_authenticated(&self) -> bool;

    fn has_role(&self, role: &Role) -> bool;

    fn has_any_role(&self, roles: &RoleSet) -> bool {
        roles.iter().any(|r| self.has_role(r))
    }
}

/// Access metadata declared by a view in the route configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMeta {
    pub required_roles: RoleSet,
    pub admin_only: bool,
    pub public: bool,
}

impl RouteMeta {
    /// Reachable without a session (e.g. the login view).
    pub fn public() -> Self {
        Self {
            public: true,
            ..Self::default()
        }
    }

    /// Any authenticated session.
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn admin_only() -> Self {
        Self {
            admin_only: true,
            ..Self::default()
        }
    }

    /// Authenticated session holding at least one of `roles`.
    pub fn requiring<I>(roles: I) -> Self
    where
        I: IntoIterator<Item = Role>,
    {
        Self {
            required_roles: roles.into_iter().collect(),
            ..Self::default()
        }
    }
}

/// Why navigation was redirected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    AlreadyAuthenticated,
    NotAuthenticated,
    NotAdmin,
    MissingRole,
    SessionExpired,
}

/// Navigation target produced by a denial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl Redirect {
    pub fn to(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Location string with URL-encoded query parameters.
    pub fn to_location(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        format!("{}?{}", self.path, query.join("&"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GuardDecision {
    Allow,
    Redirect { to: Redirect, reason: DenialKind },
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }

    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            GuardDecision::Allow => None,
            GuardDecision::Redirect { to, .. } => Some(to),
        }
    }
}

/// Query parameter carrying the originally requested path on login redirects.
pub const RETURN_URL_PARAM: &str = "returnUrl";

/// Query parameter flagging a role denial on the landing view.
pub const UNAUTHORIZED_PARAM: &str = "unauthorized";

/// Route guard configured with the two well-known views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuard {
    login_path: String,
    landing_path: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new("/login", "/dashboard")
    }
}

impl RouteGuard {
    pub fn new(login_path: impl Into<String>, landing_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
            landing_path: landing_path.into(),
        }
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn landing_path(&self) -> &str {
        &self.landing_path
    }

    /// Decide whether `requested` (path plus optional query) may be entered.
    ///
    /// Rules, first match wins:
    /// 1. public views are allowed, except the login view for an authenticated
    ///    session, which goes to the landing view;
    /// 2. `admin_only` views require `ADMIN`, else landing + unauthorized flag;
    /// 3. non-empty `required_roles` must intersect the session's roles, else landing;
    /// 4. any other view requires a session, else login with the requested
    ///    path as return target.
    ///
    /// Role checks come first, so an anonymous visitor to a role-restricted
    /// view lands on the landing view rather than on login.
    pub fn check<V: AuthView + ?Sized>(
        &self,
        session: &V,
        requested: &str,
        meta: &RouteMeta,
    ) -> GuardDecision {
        let authenticated = session.is_authenticated();

        if meta.public {
            if authenticated && self.is_login_view(requested) {
                return self.deny(Redirect::to(&self.landing_path), DenialKind::AlreadyAuthenticated);
            }
            return GuardDecision::Allow;
        }

        if meta.admin_only && !session.has_role(&Role::ADMIN) {
            return self.deny(
                Redirect::to(&self.landing_path).with_param(UNAUTHORIZED_PARAM, "true"),
                DenialKind::NotAdmin,
            );
        }

        if !meta.required_roles.is_empty() {
            if session.has_any_role(&meta.required_roles) {
                return GuardDecision::Allow;
            }
            return self.deny(Redirect::to(&self.landing_path), DenialKind::MissingRole);
        }

        if !authenticated {
            return self.deny(self.login_redirect(requested), DenialKind::NotAuthenticated);
        }

        GuardDecision::Allow
    }

    /// Redirect callers issue when a request surfaced an expired session.
    pub fn session_expired_redirect(&self, requested: &str) -> GuardDecision {
        self.deny(self.login_redirect(requested), DenialKind::SessionExpired)
    }

    fn login_redirect(&self, requested: &str) -> Redirect {
        let redirect = Redirect::to(&self.login_path);
        if requested.is_empty() || self.is_login_view(requested) {
            redirect
        } else {
            redirect.with_param(RETURN_URL_PARAM, requested)
        }
    }

    fn is_login_view(&self, requested: &str) -> bool {
        let path = requested.split(['?', '#']).next().unwrap_or_default();
        path.trim_end_matches('/') == self.login_path.trim_end_matches('/')
    }

    fn deny(&self, to: Redirect, reason: DenialKind) -> GuardDecision {
        tracing::debug!(location = %to.to_location(), ?reason, "navigation redirected");
        GuardDecision::Redirect { to, reason }
    }
}
