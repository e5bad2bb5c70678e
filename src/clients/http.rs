//! # Hostinger HTTP Client
//!
//! Authenticated request execution against the Hostinger API.
//!
//! [`HostingerClient::execute`] authenticates a request once, then sends it
//! up to `max_retries + 1` times:
//!
//! - transport failures are retried; exhausting retries yields [`ClientError::Transport`]
//! - `429` and `5xx` responses are retried; the final failing response is returned as-is
//! - every other status is returned immediately
//!
//! The wait before retry `n` (0-based) is `retry_wait * (n + 1)`. Waits and
//! in-flight requests are abandoned as soon as the cancellation token fires.
//!
//! [`ClientFactory`] turns a `ProviderConfig` into a ready client.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Method, Request, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::clients::auth::{
    create_authenticator, AuthError, Authenticator, CredentialsError, SecretError, SecretStore,
};
use crate::clients::errors::{classify_error, HostingerError};
use crate::constants::{
    DEFAULT_HTTP_MAX_RETRIES, DEFAULT_HTTP_RETRY_WAIT_MS, DEFAULT_HTTP_TIMEOUT_SECS,
    USER_AGENT as DEFAULT_USER_AGENT,
};
use crate::crd::ProviderConfig;
use crate::observability::metrics;

/// Immutable HTTP settings shared by every request of a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientConfig {
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base wait, multiplied by the attempt number
    pub retry_wait: Duration,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            max_retries: DEFAULT_HTTP_MAX_RETRIES,
            retry_wait: Duration::from_millis(DEFAULT_HTTP_RETRY_WAIT_MS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Errors from the HTTP client core
#[derive(Debug, Error)]
pub enum ClientError {
    /// The API answered with a non-success status
    #[error(transparent)]
    Api(#[from] HostingerError),
    #[error("failed to refresh authentication: {0}")]
    AuthRefresh(#[source] AuthError),
    #[error("failed to get authorization header: {0}")]
    AuthHeader(#[source] AuthError),
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("request failed after {retries} retries: {source}")]
    Transport {
        retries: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to build request: {0}")]
    Request(#[source] reqwest::Error),
    #[error("request body cannot be replayed for retries")]
    UnclonableBody,
    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),
    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to create authenticator: {0}")]
    Credentials(#[from] CredentialsError),
    #[error("failed to resolve secret: {0}")]
    Secret(#[from] SecretError),
    #[error("request cancelled")]
    Cancelled,
}

/// Authenticated Hostinger API client
///
/// Stateless apart from its configuration and authenticator; clone freely.
#[derive(Debug, Clone)]
pub struct HostingerClient {
    authenticator: Arc<dyn Authenticator>,
    http: reqwest::Client,
    config: HttpClientConfig,
}

impl HostingerClient {
    #[allow(clippy::missing_errors_doc, reason = "Fails only if the TLS backend cannot initialise")]
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        config: HttpClientConfig,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ClientError::Request)?;

        Ok(Self {
            authenticator,
            http,
            config,
        })
    }

    /// Base URL of the API, taken from the authenticator
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.authenticator.endpoint()
    }

    #[must_use]
    pub fn auth_type(&self) -> &'static str {
        self.authenticator.auth_type()
    }

    /// Start a request for `path` relative to the API endpoint
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!(
            "{}/{}",
            self.endpoint().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        self.http.request(method, url)
    }

    /// Attach `Authorization`, `User-Agent` and `Accept` headers
    ///
    /// Refreshes the authenticator first. Nothing is sent on failure.
    #[allow(clippy::missing_errors_doc, reason = "Error variants carry the failing stage")]
    pub async fn prepare_request(
        &self,
        cancel: &CancellationToken,
        request: &mut Request,
    ) -> Result<(), ClientError> {
        self.authenticator
            .refresh_if_needed(cancel)
            .await
            .map_err(ClientError::AuthRefresh)?;

        let auth_header = self
            .authenticator
            .auth_header(cancel)
            .await
            .map_err(ClientError::AuthHeader)?;

        let mut authorization = HeaderValue::from_str(&auth_header)?;
        authorization.set_sensitive(true);

        let headers = request.headers_mut();
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(USER_AGENT, HeaderValue::from_str(&self.config.user_agent)?);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(())
    }

    /// Authenticate and send `request` with bounded retries
    ///
    /// A response is returned for every status, including a `429`/`5xx`
    /// left over after the last retry; callers classify it themselves.
    #[allow(clippy::missing_errors_doc, reason = "Documented in the module header")]
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        mut request: Request,
    ) -> Result<Response, ClientError> {
        // Authentication happens once per call, not per attempt
        self.prepare_request(cancel, &mut request).await?;

        let max_retries = self.config.max_retries;
        let method = request.method().clone();
        let url = request.url().clone();
        let mut attempt: u32 = 0;

        loop {
            let attempt_request = request.try_clone().ok_or(ClientError::UnclonableBody)?;
            let last_attempt = attempt >= max_retries;

            debug!(%method, url = %url, attempt, "Sending Hostinger API request");
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ClientError::Cancelled),
                result = self.http.execute(attempt_request) => result,
            };

            match result {
                Err(source) => {
                    metrics::record_http_request(None);
                    if last_attempt {
                        return Err(ClientError::Transport {
                            retries: max_retries,
                            source,
                        });
                    }
                    warn!(%method, url = %url, attempt, error = %source, "Hostinger API request failed, retrying");
                }
                Ok(response) => {
                    let status = response.status();
                    metrics::record_http_request(Some(status.as_u16()));
                    if !is_retryable(status) || last_attempt {
                        return Ok(response);
                    }
                    warn!(%method, url = %url, attempt, status = status.as_u16(), "Hostinger API returned retryable status, retrying");
                    drop(response);
                }
            }

            metrics::increment_http_retries();
            self.wait_before_retry(cancel, attempt).await?;
            attempt += 1;
        }
    }

    async fn wait_before_retry(
        &self,
        cancel: &CancellationToken,
        attempt: u32,
    ) -> Result<(), ClientError> {
        let wait = self.config.retry_wait.saturating_mul(attempt.saturating_add(1));
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ClientError::Cancelled),
            () = tokio::time::sleep(wait) => Ok(()),
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Turn a non-2xx response into a classified [`ClientError::Api`]
///
/// The response body becomes the error message, or the canonical reason
/// phrase when the body is empty or unreadable. A body read failure is kept
/// as the error's source.
#[allow(clippy::missing_errors_doc, reason = "Errors are the point of this function")]
pub async fn error_for_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let (body, read_error) = match response.text().await {
        Ok(body) => (body, None),
        Err(e) => {
            warn!(status = status.as_u16(), "Failed to read error response body: {}", e);
            (String::new(), Some(e))
        }
    };
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        body.trim().to_string()
    };

    let err = classify_error(status.as_u16(), message);
    Err(match read_error {
        Some(e) => err.with_source(e),
        None => err,
    }
    .into())
}

/// Read a successful response as JSON
#[allow(clippy::missing_errors_doc, reason = "Body and decode errors are distinct variants")]
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let response = error_for_status(response).await?;
    let bytes = response.bytes().await.map_err(ClientError::Body)?;
    serde_json::from_slice(&bytes).map_err(ClientError::Decode)
}

/// Builds [`HostingerClient`]s from `ProviderConfig` resources
#[derive(Clone)]
pub struct ClientFactory {
    secrets: Arc<dyn SecretStore>,
    http_config: HttpClientConfig,
    secret_namespace: String,
}

impl ClientFactory {
    /// `secret_namespace` is used for secret references without a namespace
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        http_config: HttpClientConfig,
        secret_namespace: impl Into<String>,
    ) -> Self {
        Self {
            secrets,
            http_config,
            secret_namespace: secret_namespace.into(),
        }
    }

    #[must_use]
    pub fn secrets(&self) -> &Arc<dyn SecretStore> {
        &self.secrets
    }

    /// Resolve credentials and build a client for `provider_config`
    #[allow(clippy::missing_errors_doc, reason = "Credential errors surface as ClientError::Credentials")]
    pub async fn create_client(
        &self,
        cancel: &CancellationToken,
        provider_config: &ProviderConfig,
    ) -> Result<HostingerClient, ClientError> {
        let authenticator = create_authenticator(
            self.secrets.as_ref(),
            cancel,
            &self.secret_namespace,
            provider_config.spec.credentials.as_ref(),
        )
        .await?;

        HostingerClient::new(authenticator, self.http_config.clone())
    }
}

impl std::fmt::Debug for ClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientFactory")
            .field("http_config", &self.http_config)
            .field("secret_namespace", &self.secret_namespace)
            .finish_non_exhaustive()
    }
}
