//! API key authentication for the Hostinger v1 API.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use tokio_util::sync::CancellationToken;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{AuthError, Authenticator};

/// Static API key + customer ID credentials
///
/// Sent as `Basic base64(customer_id:api_key)`. Never expires, so refresh is
/// a no-op.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ApiKeyAuth {
    api_key: String,
    customer_id: String,
    #[zeroize(skip)]
    endpoint: String,
}

impl ApiKeyAuth {
    pub fn new(
        api_key: impl Into<String>,
        customer_id: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            customer_id: customer_id.into(),
            endpoint: endpoint.into(),
        }
    }

    /// Basic credentials header; deterministic and infallible
    #[must_use]
    pub fn basic_header(&self) -> String {
        let credentials = format!("{}:{}", self.customer_id, self.api_key);
        format!("Basic {}", general_purpose::STANDARD.encode(credentials))
    }
}

impl std::fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuth")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuth {
    async fn auth_header(&self, _cancel: &CancellationToken) -> Result<String, AuthError> {
        Ok(self.basic_header())
    }

    async fn token(&self, _cancel: &CancellationToken) -> Result<String, AuthError> {
        // Basic auth has no bearer token
        Ok(String::new())
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn refresh_if_needed(&self, _cancel: &CancellationToken) -> Result<(), AuthError> {
        Ok(())
    }

    fn auth_type(&self) -> &'static str {
        "APIKeyAuth"
    }
}
