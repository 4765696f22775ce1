//! Dashboard route table with access metadata.

use flockdesk_auth::{Role, RouteMeta};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardRoute {
    pub path: &'static str,
    pub title: &'static str,
    pub meta: RouteMeta,
}

impl DashboardRoute {
    fn new(path: &'static str, title: &'static str, meta: RouteMeta) -> Self {
        Self { path, title, meta }
    }

    /// Whether `path` is this route or one of its detail views.
    fn matches(&self, path: &str) -> bool {
        path == self.path
            || path
                .strip_prefix(self.path)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

pub fn route_table() -> Vec<DashboardRoute> {
    vec![
        DashboardRoute::new("/login", "Sign in", RouteMeta::public()),
        DashboardRoute::new("/dashboard", "Overview", RouteMeta::authenticated()),
        DashboardRoute::new("/batches", "Batches", RouteMeta::authenticated()),
        DashboardRoute::new("/feeding-plans", "Feeding plans", RouteMeta::authenticated()),
        DashboardRoute::new("/inventory", "Inventory", RouteMeta::authenticated()),
        DashboardRoute::new("/costs", "Costs", RouteMeta::authenticated()),
        DashboardRoute::new("/users", "Users", RouteMeta::admin_only()),
        DashboardRoute::new(
            "/poultry",
            "Poultry",
            RouteMeta::requiring([Role::POULTRY_MANAGER, Role::ADMIN]),
        ),
    ]
}

/// Access metadata for a requested location (path plus optional query).
///
/// Unknown views require an authenticated session.
pub fn meta_for(requested: &str) -> RouteMeta {
    let path = requested.split(['?', '#']).next().unwrap_or_default();
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    route_table()
        .into_iter()
        .find(|route| route.matches(path))
        .map(|route| route.meta)
        .unwrap_or_else(RouteMeta::authenticated)
}
