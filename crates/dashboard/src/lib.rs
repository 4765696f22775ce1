//! Shell for the farm admin dashboard.
//!
//! Wires configuration, persisted session storage, the session store and
//! the request gate together, and carries the thin API glue and route table
//! the views are built on.

pub mod api;
pub mod app;
pub mod routes;

pub use api::{DashboardApi, Resource};
pub use app::AppState;
pub use routes::{DashboardRoute, meta_for, route_table};
