//! # Authentication
//!
//! Credential providers for the Hostinger API.
//!
//! Two schemes exist and they are not interchangeable:
//!
//! - [`ApiKeyAuth`] - v1 API key + customer ID, sent as HTTP Basic credentials
//! - [`OAuthAuth`] - v2 OAuth client-credentials grant, sent as a cached bearer token
//!
//! The HTTP client only ever talks to the [`Authenticator`] trait. The
//! [`resolver`] module builds the right variant from a `ProviderConfig` and
//! the secrets it references.

mod api_key;
mod oauth;
pub mod resolver;

pub use api_key::ApiKeyAuth;
pub use oauth::{OAuthAuth, TokenResponse};
pub use resolver::{
    create_authenticator, get_secret_value, CredentialsError, KubeSecretStore, SecretError,
    SecretStore,
};

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors raised while obtaining credentials from the token endpoint
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to create token request: {0}")]
    Client(#[source] reqwest::Error),
    #[error("failed to request token: {0}")]
    Request(#[source] reqwest::Error),
    #[error("token request failed with status {0}")]
    Status(u16),
    #[error("failed to decode token response: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("token request cancelled")]
    Cancelled,
}

/// Authentication provider for Hostinger API requests
#[async_trait]
pub trait Authenticator: Send + Sync + std::fmt::Debug {
    /// Value for the `Authorization` header
    async fn auth_header(&self, cancel: &CancellationToken) -> Result<String, AuthError>;

    /// Bearer token, or an empty string for schemes without one
    async fn token(&self, cancel: &CancellationToken) -> Result<String, AuthError>;

    /// Base URL of the API these credentials are valid for
    fn endpoint(&self) -> &str;

    /// Refresh cached credentials if they are missing or close to expiry
    async fn refresh_if_needed(&self, cancel: &CancellationToken) -> Result<(), AuthError>;

    /// Authentication scheme name
    fn auth_type(&self) -> &'static str;
}
