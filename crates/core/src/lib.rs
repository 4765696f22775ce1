//! `flockdesk-core`: shared building blocks for the FlockDesk dashboard.
//!
//! This crate contains **pure** primitives (no IO, no runtime concerns).

pub mod error;
pub mod id;

pub use error::DomainError;
pub use id::{RequestId, UserId};
