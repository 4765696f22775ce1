//! Remote login and renewal endpoints.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use flockdesk_auth::TokenGrant;

use crate::config::SessionConfig;
use crate::error::SessionError;

/// Credentials typed into the login form.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl core::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Backend calls the session store depends on.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<TokenGrant, SessionError>;

    async fn refresh(&self, refresh_credential: &str) -> Result<TokenGrant, SessionError>;
}

/// `AuthApi` over HTTP/JSON.
///
/// Uses its own client: these calls never pass through the request gate.
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    client: reqwest::Client,
    login_url: String,
    refresh_url: String,
}

impl HttpAuthApi {
    pub fn new(config: &SessionConfig) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SessionError::Unexpected(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: &SessionConfig) -> Self {
        Self {
            client,
            login_url: config.url(&config.login_path),
            refresh_url: config.url(&config.refresh_path),
        }
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, request: &LoginRequest) -> Result<TokenGrant, SessionError> {
        let resp = self.client.post(&self.login_url).json(request).send().await?;

        match resp.status() {
            status if status.is_success() => Ok(resp.json().await?),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::info!(username = %request.username, "login rejected");
                Err(SessionError::InvalidCredentials)
            }
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(SessionError::Api(status.as_u16(), body))
            }
        }
    }

    async fn refresh(&self, refresh_credential: &str) -> Result<TokenGrant, SessionError> {
        let resp = self
            .client
            .post(&self.refresh_url)
            .json(&RefreshRequest {
                refresh_token: refresh_credential,
            })
            .send()
            .await?;

        match resp.status() {
            status if status.is_success() => Ok(resp.json().await?),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(SessionError::SessionExpired)
            }
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(SessionError::Api(status.as_u16(), body))
            }
        }
    }
}
