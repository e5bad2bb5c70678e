//! # Credential Resolver
//!
//! Builds an [`Authenticator`] from `ProviderConfig` credentials.
//!
//! Every secret reference is resolved through a [`SecretStore`]; the first
//! missing secret or key aborts construction. Omitted endpoints fall back to
//! the public Hostinger defaults.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{ApiKeyAuth, Authenticator, OAuthAuth};
use crate::clients::errors::ErrorKind;
use crate::constants::{DEFAULT_TOKEN_ENDPOINT, DEFAULT_V1_ENDPOINT, DEFAULT_V2_ENDPOINT};
use crate::crd::{ApiKeyAuthSpec, OAuthAuthSpec, ProviderCredentials, SecretKeySelector};

/// Errors looking up a single secret value
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret reference is missing")]
    NilReference,
    #[error("secret {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },
    #[error("key {key:?} not found in secret {namespace}/{name}")]
    KeyNotFound {
        key: String,
        namespace: String,
        name: String,
    },
    #[error("key {key:?} in secret {namespace}/{name} is not valid UTF-8")]
    InvalidUtf8 {
        key: String,
        namespace: String,
        name: String,
    },
    #[error("failed to get secret {namespace}/{name}: {source}")]
    Backend {
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },
    #[error("secret lookup cancelled")]
    Cancelled,
}

/// Errors building an authenticator from `ProviderConfig` credentials
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("no authentication method configured in ProviderConfig")]
    NoAuthMethod,
    #[error("failed to get API key from secret: {0}")]
    ApiKey(#[source] SecretError),
    #[error("failed to get customer ID from secret: {0}")]
    CustomerId(#[source] SecretError),
    #[error("failed to get client ID from secret: {0}")]
    ClientId(#[source] SecretError),
    #[error("failed to get client secret from secret: {0}")]
    ClientSecret(#[source] SecretError),
}

impl CredentialsError {
    /// Credential failures are configuration problems
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidConfig
    }
}

/// Read access to Kubernetes-style secrets
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Data of the named secret; a missing secret is [`SecretError::NotFound`]
    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, SecretError>;
}

/// [`SecretStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl KubeSecretStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl std::fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, SecretError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api
            .get_opt(name)
            .await
            .map_err(|source| SecretError::Backend {
                namespace: namespace.to_string(),
                name: name.to_string(),
                source,
            })?
            .ok_or_else(|| SecretError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?;

        Ok(secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, value.0))
            .collect())
    }
}

/// Resolve one secret key to a string
///
/// `default_namespace` applies when the selector does not name a namespace.
pub async fn get_secret_value(
    store: &dyn SecretStore,
    cancel: &CancellationToken,
    default_namespace: &str,
    selector: Option<&SecretKeySelector>,
) -> Result<String, SecretError> {
    let selector = selector.ok_or(SecretError::NilReference)?;
    let namespace = selector.namespace.as_deref().unwrap_or(default_namespace);

    debug!(
        secret.namespace = namespace,
        secret.name = %selector.name,
        secret.key = %selector.key,
        "Resolving secret value"
    );

    let mut data = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(SecretError::Cancelled),
        result = store.get_secret(namespace, &selector.name) => result?,
    };

    let value = data
        .remove(&selector.key)
        .ok_or_else(|| SecretError::KeyNotFound {
            key: selector.key.clone(),
            namespace: namespace.to_string(),
            name: selector.name.clone(),
        })?;

    String::from_utf8(value).map_err(|_utf8| SecretError::InvalidUtf8 {
        key: selector.key.clone(),
        namespace: namespace.to_string(),
        name: selector.name.clone(),
    })
}

/// Build the authenticator for the configured credential method
pub async fn create_authenticator(
    store: &dyn SecretStore,
    cancel: &CancellationToken,
    default_namespace: &str,
    credentials: Option<&ProviderCredentials>,
) -> Result<Arc<dyn Authenticator>, CredentialsError> {
    if let Some(credentials) = credentials {
        debug!(method = credentials.method(), "Resolving Hostinger credentials");
    }

    let authenticator: Arc<dyn Authenticator> = match credentials {
        Some(ProviderCredentials::ApiKeyAuth(spec)) => {
            Arc::new(create_api_key_auth(store, cancel, default_namespace, spec).await?)
        }
        Some(ProviderCredentials::OAuthAuth(spec)) => {
            Arc::new(create_oauth_auth(store, cancel, default_namespace, spec).await?)
        }
        None => return Err(CredentialsError::NoAuthMethod),
    };

    info!(
        "auth.type" = authenticator.auth_type(),
        endpoint = authenticator.endpoint(),
        "🔐 Created Hostinger authenticator"
    );
    Ok(authenticator)
}

async fn create_api_key_auth(
    store: &dyn SecretStore,
    cancel: &CancellationToken,
    default_namespace: &str,
    spec: &ApiKeyAuthSpec,
) -> Result<ApiKeyAuth, CredentialsError> {
    let api_key = get_secret_value(store, cancel, default_namespace, Some(&spec.api_key_secret_ref))
        .await
        .map_err(CredentialsError::ApiKey)?;
    let customer_id = get_secret_value(
        store,
        cancel,
        default_namespace,
        Some(&spec.customer_id_secret_ref),
    )
    .await
    .map_err(CredentialsError::CustomerId)?;

    let endpoint = non_empty_or(&spec.endpoint, DEFAULT_V1_ENDPOINT);
    Ok(ApiKeyAuth::new(api_key, customer_id, endpoint))
}

async fn create_oauth_auth(
    store: &dyn SecretStore,
    cancel: &CancellationToken,
    default_namespace: &str,
    spec: &OAuthAuthSpec,
) -> Result<OAuthAuth, CredentialsError> {
    let client_id = get_secret_value(
        store,
        cancel,
        default_namespace,
        Some(&spec.client_id_secret_ref),
    )
    .await
    .map_err(CredentialsError::ClientId)?;
    let client_secret = get_secret_value(
        store,
        cancel,
        default_namespace,
        Some(&spec.client_secret_secret_ref),
    )
    .await
    .map_err(CredentialsError::ClientSecret)?;

    let endpoint = non_empty_or(&spec.endpoint, DEFAULT_V2_ENDPOINT);
    let token_endpoint = non_empty_or(&spec.token_endpoint, DEFAULT_TOKEN_ENDPOINT);
    Ok(OAuthAuth::new(client_id, client_secret, endpoint, token_endpoint))
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}
