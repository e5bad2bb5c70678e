//! OAuth client-credentials authentication for the Hostinger v2 API.
//!
//! Tokens are cached per authenticator instance behind an async `RwLock`:
//! concurrent readers share a valid token, and a refresh holds the write
//! lock for the duration of the token request. Waiters re-check the cache
//! after acquiring the lock, so a burst of callers against an empty cache
//! normally produces a single token request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{AuthError, Authenticator};
use crate::constants::{DEFAULT_TOKEN_ENDPOINT, TOKEN_EXPIRY_MARGIN_SECS, TOKEN_REQUEST_TIMEOUT_SECS};
use crate::observability::metrics;

/// Response body of the OAuth token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: u64,
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct CachedToken {
    token: String,
    #[zeroize(skip)]
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid_at(&self, now: Instant) -> bool {
        !self.token.is_empty() && now < self.expires_at
    }
}

/// OAuth client-credentials authenticator with token caching
#[derive(ZeroizeOnDrop)]
pub struct OAuthAuth {
    client_id: String,
    client_secret: String,
    #[zeroize(skip)]
    endpoint: String,
    #[zeroize(skip)]
    token_endpoint: String,
    #[zeroize(skip)]
    cache: RwLock<Option<CachedToken>>,
}

impl OAuthAuth {
    /// Create an authenticator; an empty `token_endpoint` selects the Hostinger default
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        endpoint: impl Into<String>,
        token_endpoint: impl Into<String>,
    ) -> Self {
        let mut token_endpoint = token_endpoint.into();
        if token_endpoint.is_empty() {
            token_endpoint = DEFAULT_TOKEN_ENDPOINT.to_string();
        }
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            endpoint: endpoint.into(),
            token_endpoint,
            cache: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    async fn cached_token(&self) -> Option<String> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|cached| cached.is_valid_at(Instant::now()))
            .map(|cached| cached.token.clone())
    }

    async fn get_token(&self, cancel: &CancellationToken) -> Result<String, AuthError> {
        if let Some(token) = self.cached_token().await {
            return Ok(token);
        }

        let mut cache = self.cache.write().await;
        if let Some(cached) = cache
            .as_ref()
            .filter(|cached| cached.is_valid_at(Instant::now()))
        {
            return Ok(cached.token.clone());
        }

        let fresh = self.request_token(cancel).await?;
        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }

    /// POST a client-credentials grant to the token endpoint
    ///
    /// Not retried: failures surface verbatim to the caller.
    async fn request_token(&self, cancel: &CancellationToken) -> Result<CachedToken, AuthError> {
        debug!(token_endpoint = %self.token_endpoint, "Requesting OAuth access token");

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(TOKEN_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(AuthError::Client)?;

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        let request = client
            .post(&self.token_endpoint)
            .header(ACCEPT, "application/json")
            .form(&form);

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(AuthError::Cancelled),
            result = request.send() => result.map_err(AuthError::Request)?,
        };

        if response.status() != StatusCode::OK {
            return Err(AuthError::Status(response.status().as_u16()));
        }

        let body: TokenResponse = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(AuthError::Cancelled),
            result = response.json::<TokenResponse>() => result.map_err(AuthError::Decode)?,
        };

        let lifetime = Duration::from_secs(body.expires_in.saturating_sub(TOKEN_EXPIRY_MARGIN_SECS));
        metrics::increment_token_refreshes();
        info!(
            expires_in = body.expires_in,
            cached_for_secs = lifetime.as_secs(),
            "Obtained OAuth access token"
        );

        Ok(CachedToken {
            token: body.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        })
    }
}

impl std::fmt::Debug for OAuthAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthAuth")
            .field("endpoint", &self.endpoint)
            .field("token_endpoint", &self.token_endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Authenticator for OAuthAuth {
    async fn auth_header(&self, cancel: &CancellationToken) -> Result<String, AuthError> {
        let token = self.get_token(cancel).await?;
        Ok(format!("Bearer {token}"))
    }

    async fn token(&self, cancel: &CancellationToken) -> Result<String, AuthError> {
        self.get_token(cancel).await
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn refresh_if_needed(&self, cancel: &CancellationToken) -> Result<(), AuthError> {
        let margin = Duration::from_secs(TOKEN_EXPIRY_MARGIN_SECS);
        let needs_refresh = |cache: &Option<CachedToken>| match cache {
            Some(cached) => !cached.is_valid_at(Instant::now() + margin),
            None => true,
        };

        if !needs_refresh(&*self.cache.read().await) {
            return Ok(());
        }

        let mut cache = self.cache.write().await;
        if !needs_refresh(&cache) {
            return Ok(());
        }
        *cache = Some(self.request_token(cancel).await?);
        Ok(())
    }

    fn auth_type(&self) -> &'static str {
        "OAuthAuth"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token_body(token: &str, expires_in: u64) -> serde_json::Value {
        json!({
            "access_token": token,
            "token_type": "Bearer",
            "expires_in": expires_in,
        })
    }

    fn auth_for(server: &MockServer) -> OAuthAuth {
        OAuthAuth::new(
            "client-id",
            "client-secret",
            "https://api.example.com/v2",
            format!("{}/oauth/token", server.uri()),
        )
    }

    #[test]
    fn test_new_applies_default_token_endpoint() {
        let auth = OAuthAuth::new("id", "secret", "https://api.example.com/v2", "");
        assert_eq!(auth.token_endpoint(), DEFAULT_TOKEN_ENDPOINT);
        assert_eq!(auth.endpoint(), "https://api.example.com/v2");
        assert_eq!(auth.auth_type(), "OAuthAuth");
    }

    #[tokio::test]
    async fn test_token_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(header("accept", "application/json"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=client-id"))
            .and(body_string_contains("client_secret=client-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("abc", 3600)))
            .expect(1)
            .mount(&server)
            .await;

        let auth = auth_for(&server);
        let header = auth
            .auth_header(&CancellationToken::new())
            .await
            .expect("token request should succeed");
        assert_eq!(header, "Bearer abc");
    }

    #[tokio::test]
    async fn test_token_is_cached_until_expiry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("cached", 3600)))
            .expect(1)
            .mount(&server)
            .await;

        let auth = auth_for(&server);
        let cancel = CancellationToken::new();
        assert_eq!(auth.token(&cancel).await.expect("first"), "cached");
        assert_eq!(auth.token(&cancel).await.expect("second"), "cached");
        assert_eq!(auth.auth_header(&cancel).await.expect("third"), "Bearer cached");

        let requests = server.received_requests().await.expect("recording enabled");
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed() {
        let server = MockServer::start().await;
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        Mock::given(method("POST"))
            .respond_with(move |_req: &wiremock::Request| -> ResponseTemplate {
                if hits_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(200).set_body_json(token_body("t1", 1))
                } else {
                    ResponseTemplate::new(200).set_body_json(token_body("t2", 3600))
                }
            })
            .mount(&server)
            .await;

        let auth = auth_for(&server);
        let cancel = CancellationToken::new();
        assert_eq!(auth.token(&cancel).await.expect("first token"), "t1");
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(auth.token(&cancel).await.expect("second token"), "t2");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_200_is_a_hard_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let auth = auth_for(&server);
        let err = auth
            .auth_header(&CancellationToken::new())
            .await
            .expect_err("500 must fail");
        assert!(matches!(err, AuthError::Status(500)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_a_hard_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let auth = auth_for(&server);
        let err = auth
            .token(&CancellationToken::new())
            .await
            .expect_err("bad JSON must fail");
        assert!(matches!(err, AuthError::Decode(_)));
    }

    #[tokio::test]
    async fn test_refresh_if_needed_warms_cache() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("warm", 3600)))
            .expect(1)
            .mount(&server)
            .await;

        let auth = auth_for(&server);
        let cancel = CancellationToken::new();
        auth.refresh_if_needed(&cancel).await.expect("refresh");
        // Fresh token: neither call reaches the token endpoint again
        auth.refresh_if_needed(&cancel).await.expect("no-op refresh");
        assert_eq!(auth.token(&cancel).await.expect("cached"), "warm");
    }

    #[tokio::test]
    async fn test_refresh_if_needed_refreshes_within_margin() {
        let server = MockServer::start().await;
        // 500s lifetime leaves 200s of cache, inside the 5 minute margin
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("short", 500)))
            .expect(2)
            .mount(&server)
            .await;

        let auth = auth_for(&server);
        let cancel = CancellationToken::new();
        auth.refresh_if_needed(&cancel).await.expect("first refresh");
        auth.refresh_if_needed(&cancel).await.expect("second refresh");
    }

    #[tokio::test]
    async fn test_cancelled_token_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(token_body("late", 3600))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let auth = auth_for(&server);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = auth.token(&cancel).await.expect_err("cancelled");
        assert!(matches!(err, AuthError::Cancelled));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(token_body("shared", 3600))
                    .set_delay(Duration::from_millis(50)),
            )
            .mount(&server)
            .await;

        let auth = Arc::new(auth_for(&server));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let auth = Arc::clone(&auth);
            handles.push(tokio::spawn(async move {
                auth.token(&CancellationToken::new()).await
            }));
        }
        for handle in handles {
            let token = handle.await.expect("task").expect("token");
            assert_eq!(token, "shared");
        }

        // Duplicate refreshes are tolerated, but never more than one per caller
        let hits = server.received_requests().await.expect("recording").len();
        assert!((1..=8).contains(&hits), "unexpected token requests: {hits}");
    }
}
