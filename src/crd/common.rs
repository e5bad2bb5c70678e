//! # Shared CRD Types
//!
//! Types shared by the `ProviderConfig` and managed resource definitions.

use serde::{Deserialize, Serialize};

/// Reference to a key within a Kubernetes `Secret`
///
/// When `namespace` is omitted the caller decides the namespace: the
/// provider's secret namespace for `ProviderConfig` credentials, the managed
/// resource's own namespace for per-resource references.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeySelector {
    /// Name of the secret
    pub name: String,
    /// Namespace of the secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Key within the secret's data
    pub key: String,
}

impl SecretKeySelector {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            key: key.into(),
        }
    }

    #[must_use]
    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// Reference to the cluster-scoped `ProviderConfig` a managed resource uses
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigReference {
    pub name: String,
}

/// What happens to the external resource when the managed resource is deleted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum DeletionPolicy {
    /// Delete the external resource
    #[default]
    Delete,
    /// Leave the external resource in place
    Orphan,
}

/// Status condition in the Kubernetes/Crossplane shape
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub r#type: String,
    pub status: String,
    #[serde(default)]
    pub last_transition_time: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
