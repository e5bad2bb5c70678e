//! # ProviderConfig
//!
//! Cluster-scoped configuration telling the provider how to authenticate
//! against the Hostinger API.
//!
//! ```yaml
//! apiVersion: hostinger.crossplane.io/v1beta1
//! kind: ProviderConfig
//! metadata:
//!   name: default
//! spec:
//!   credentials:
//!     oauthAuth:
//!       clientIdSecretRef:
//!         name: hostinger-oauth
//!         key: client-id
//!       clientSecretSecretRef:
//!         name: hostinger-oauth
//!         key: client-secret
//! ```

use schemars::{json_schema, JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use super::{Condition, SecretKeySelector};

/// API v1 (API key) credentials
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyAuthSpec {
    /// API v1 endpoint URL; defaults to the public Hostinger v1 API
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub endpoint: String,
    /// Secret key holding the API key
    pub api_key_secret_ref: SecretKeySelector,
    /// Secret key holding the customer ID
    pub customer_id_secret_ref: SecretKeySelector,
}

/// API v2 (OAuth client-credentials) credentials
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OAuthAuthSpec {
    /// API v2 endpoint URL; defaults to the public Hostinger v2 API
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub endpoint: String,
    /// OAuth token endpoint URL; defaults to the Hostinger token endpoint
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token_endpoint: String,
    /// Secret key holding the OAuth client ID
    pub client_id_secret_ref: SecretKeySelector,
    /// Secret key holding the OAuth client secret
    pub client_secret_secret_ref: SecretKeySelector,
}

/// Authentication method; exactly one variant is set
///
/// Serialized externally tagged: `{"apiKeyAuth": {...}}` or `{"oauthAuth": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum ProviderCredentials {
    #[serde(rename = "apiKeyAuth")]
    ApiKeyAuth(ApiKeyAuthSpec),
    #[serde(rename = "oauthAuth")]
    OAuthAuth(OAuthAuthSpec),
}

impl ProviderCredentials {
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::ApiKeyAuth(_) => "apiKeyAuth",
            Self::OAuthAuth(_) => "oauthAuth",
        }
    }
}

impl JsonSchema for ProviderCredentials {
    fn schema_name() -> Cow<'static, str> {
        Cow::Borrowed("ProviderCredentials")
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        // Structural schema: both properties declared, oneOf only constrains presence
        let api_key = ApiKeyAuthSpec::json_schema(gen);
        let oauth = OAuthAuthSpec::json_schema(gen);

        json_schema!({
            "type": "object",
            "description": "Authentication method for the Hostinger API. Exactly one of apiKeyAuth or oauthAuth must be set.",
            "properties": {
                "apiKeyAuth": api_key,
                "oauthAuth": oauth
            },
            "oneOf": [
                {"required": ["apiKeyAuth"]},
                {"required": ["oauthAuth"]}
            ]
        })
    }
}

/// Spec of a `ProviderConfig`
#[derive(kube::CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "ProviderConfig",
    group = "hostinger.crossplane.io",
    version = "v1beta1",
    status = "ProviderConfigStatus",
    category = "crossplane",
    category = "provider",
    category = "hostinger",
    printcolumn = r#"{"name":"AGE", "type":"date", "jsonPath":".metadata.creationTimestamp"}, {"name":"READY", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigSpec {
    /// Credentials used to reach the Hostinger API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<ProviderCredentials>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}
