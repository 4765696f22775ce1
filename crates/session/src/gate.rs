//! Outbound request gate.
//!
//! Every call to the backend goes through [`RequestGate`]. Non-public calls
//! carry the current credential; a `401` triggers exactly one renewal (shared
//! with any other rejected requests) and one retry.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use reqwest::{Method, Request, RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::Instrument;

use flockdesk_core::RequestId;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::store::SessionStore;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// HTTP client wrapper that attaches and recovers credentials.
#[derive(Debug, Clone)]
pub struct RequestGate {
    client: reqwest::Client,
    store: SessionStore,
    config: Arc<SessionConfig>,
    base_path: String,
}

impl RequestGate {
    pub fn new(config: &SessionConfig, store: SessionStore) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SessionError::Unexpected(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, config, store))
    }

    pub fn with_client(client: reqwest::Client, config: &SessionConfig, store: SessionStore) -> Self {
        let base_path = Url::parse(&config.api_url)
            .map(|url| url.path().trim_end_matches('/').to_string())
            .unwrap_or_default();
        Self {
            client,
            store,
            config: Arc::new(config.clone()),
            base_path,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Whether calls to `path` are forwarded without a credential.
    pub fn is_public(&self, path: &str) -> bool {
        self.config.is_public(path)
    }

    /// Start building a request to an API path. Send it with [`RequestGate::send`].
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.config.url(path))
    }

    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, SessionError> {
        let request = builder
            .build()
            .map_err(|e| SessionError::Unexpected(format!("invalid request: {e}")))?;
        self.execute(request).await
    }

    /// Send `request`, attaching the credential and a request id unless the
    /// path is public.
    ///
    /// Returns the backend response for any status other than a `401` that
    /// survives renewal. If the body cannot be replayed, the renewal still
    /// happens but the original `401` response is returned; the JSON helpers
    /// report it as [`SessionError::CredentialRejected`].
    pub async fn execute(&self, request: Request) -> Result<Response, SessionError> {
        let request_id = RequestId::new();
        let path = self.api_path(request.url()).to_string();
        let span = tracing::info_span!(
            "gated_request",
            %request_id,
            method = %request.method(),
            path = %path,
        );

        self.forward(request, request_id, &path)
            .instrument(span)
            .await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SessionError> {
        let response = self.send(self.request(Method::GET, path)).await?;
        read_json(response).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, SessionError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(self.request(Method::POST, path).json(body)).await?;
        read_json(response).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, SessionError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(self.request(Method::PUT, path).json(body)).await?;
        read_json(response).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), SessionError> {
        let response = self.send(self.request(Method::DELETE, path)).await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn forward(
        &self,
        mut request: Request,
        request_id: RequestId,
        path: &str,
    ) -> Result<Response, SessionError> {
        if self.is_public(path) {
            tracing::debug!("public endpoint; forwarding unmodified");
            return Ok(self.client.execute(request).await?);
        }

        request
            .headers_mut()
            .insert(REQUEST_ID_HEADER, header_value(&request_id.to_string())?);

        let credential = match self.store.credential() {
            Some(credential) => credential,
            None => self.renew_or_expire().await?,
        };

        let spare = request.try_clone();
        attach_credential(&mut request, &credential)?;
        let response = self.client.execute(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        // Someone else may already have replaced the rejected credential.
        let renewed = match self.store.credential() {
            Some(current) if current != credential => {
                tracing::debug!("credential changed while in flight; retrying with current");
                current
            }
            _ => {
                tracing::info!("credential rejected; renewing");
                self.renew_or_expire().await?
            }
        };

        let Some(mut retry) = spare else {
            tracing::warn!("request body cannot be replayed; returning original response");
            return Ok(response);
        };

        attach_credential(&mut retry, &renewed)?;
        let response = self.client.execute(retry).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("renewed credential rejected; ending session");
            self.store.reject_credential(&renewed).await;
            return Err(SessionError::SessionExpired);
        }
        Ok(response)
    }

    async fn renew_or_expire(&self) -> Result<String, SessionError> {
        self.store.renew().await.map_err(|err| {
            tracing::info!(error = %err, "renewal failed");
            SessionError::SessionExpired
        })
    }

    /// Path relative to the configured API base.
    fn api_path<'a>(&self, url: &'a Url) -> &'a str {
        let path = url.path();
        match path.strip_prefix(self.base_path.as_str()) {
            Some(rest) if rest.starts_with('/') => rest,
            _ => path,
        }
    }
}

fn header_value(value: &str) -> Result<HeaderValue, SessionError> {
    HeaderValue::from_str(value)
        .map_err(|_| SessionError::Unexpected("value is not a valid header".to_string()))
}

fn attach_credential(request: &mut Request, credential: &str) -> Result<(), SessionError> {
    let mut value = header_value(&format!("Bearer {credential}"))?;
    value.set_sensitive(true);
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

async fn ensure_success(response: Response) -> Result<Response, SessionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(SessionError::CredentialRejected);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SessionError::Api(status.as_u16(), body))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, SessionError> {
    let response = ensure_success(response).await?;
    Ok(response.json().await?)
}
