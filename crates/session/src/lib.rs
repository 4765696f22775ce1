//! `flockdesk-session`
//!
//! **Responsibility:** session and authorization lifecycle for the dashboard.
//!
//! This crate provides:
//! - `SessionStore`: the single process-wide holder of the current credential
//! - `RefreshScheduler`: proactive renewal shortly before expiry
//! - `RequestGate`: credential attachment and one-shot recovery for outbound calls
//! - `LegacyAuthService`: read-through facade for older call sites
//!
//! Navigation decisions live in `flockdesk-auth`; `SessionStore` implements
//! its `AuthView` so the guard only ever consults this store.

pub mod api;
pub mod config;
pub mod error;
pub mod gate;
pub mod legacy;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod store;

pub use api::{AuthApi, HttpAuthApi, LoginRequest};
pub use config::SessionConfig;
pub use error::{SessionError, StorageError};
pub use gate::RequestGate;
pub use legacy::LegacyAuthService;
pub use scheduler::{RefreshScheduler, renewal_delay};
pub use session::{AuthState, Session};
pub use storage::{MemoryStorage, SessionStorage, SqliteStorage};
pub use store::SessionStore;
