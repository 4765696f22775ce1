//! Session subsystem configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Renew this long before the credential expires.
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(5 * 60);

const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Endpoint, timing and storage settings shared by the store, the gate and
/// the remote auth client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub api_url: String,
    pub login_path: String,
    pub refresh_path: String,
    /// Path prefixes forwarded without a credential.
    pub public_prefixes: Vec<String>,
    pub safety_margin: Duration,
    pub request_timeout: Duration,
    /// SQLite file for the persisted session; `None` means the OS data dir.
    pub storage_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            login_path: "/api/auth/login".to_string(),
            refresh_path: "/api/auth/refresh".to_string(),
            public_prefixes: vec![
                "/api/auth/login".to_string(),
                "/api/auth/register".to_string(),
                "/api/auth/refresh".to_string(),
                "/api/health".to_string(),
                "/api/public/".to_string(),
            ],
            safety_margin: DEFAULT_SAFETY_MARGIN,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            storage_path: None,
        }
    }
}

impl SessionConfig {
    /// Build from `FLOCKDESK_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("FLOCKDESK_API_URL") {
            config.api_url = url;
        }
        if let Ok(path) = std::env::var("FLOCKDESK_SESSION_DB") {
            config.storage_path = Some(PathBuf::from(path));
        }
        config.safety_margin = env_secs("FLOCKDESK_REFRESH_MARGIN_SECS", config.safety_margin);
        config.request_timeout = env_secs("FLOCKDESK_REQUEST_TIMEOUT_SECS", config.request_timeout);

        config
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        let base = self.api_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }

    /// Whether `path` falls under one of the public prefixes.
    ///
    /// A prefix ending in `/` matches anything below it; otherwise it matches
    /// the exact path or its sub-paths.
    pub fn is_public(&self, path: &str) -> bool {
        self.public_prefixes.iter().any(|prefix| {
            if prefix.ends_with('/') {
                path.starts_with(prefix.as_str())
            } else {
                path == prefix
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        })
    }
}

fn env_secs(name: &str, default: Duration) -> Duration {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                tracing::warn!(var = name, value = %raw, "ignoring malformed duration; using default");
                default
            }
        },
        Err(_) => default,
    }
}
