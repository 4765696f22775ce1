//! Process-wide logging setup shared by the dashboard binaries.

/// Initialize logging from the environment.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    logging::init(&logging::LogConfig::from_env());
}

/// Subscriber configuration (filters, output format).
pub mod logging;

pub use logging::{LogConfig, LogFormat};
