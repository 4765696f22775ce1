//! `flockdesk-auth`: pure authentication/authorization boundary.
//!
//! No HTTP, timers or storage here; everything is a plain function of its inputs.

pub mod grant;
pub mod guard;
pub mod roles;
pub mod user;

pub use grant::{GrantValidationError, ResolvedGrant, TokenGrant, resolve_grant};
pub use guard::{
    AuthView, DenialKind, GuardDecision, RETURN_URL_PARAM, Redirect, RouteGuard, RouteMeta,
    UNAUTHORIZED_PARAM,
};
pub use roles::{Role, RoleSet};
pub use user::UserProfile;
