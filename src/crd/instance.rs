//! # Instance
//!
//! Namespaced managed resource for a Hostinger VPS instance.

use serde::{Deserialize, Serialize};

use super::{Condition, DeletionPolicy, ProviderConfigReference, SecretKeySelector};

/// Configurable fields of a VPS instance
///
/// Zero/empty scalars and `None` options mean "not set": they are never
/// compared for drift and may be late-initialized from the remote instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstanceParameters {
    /// Hostname of the VPS
    #[schemars(length(min = 1))]
    pub hostname: String,
    /// Operating system template ID
    #[serde(default)]
    pub os_id: String,
    /// Number of CPU cores
    #[schemars(range(min = 1))]
    pub cpu_count: i32,
    /// RAM in MB
    #[schemars(range(min = 512))]
    pub ram: i32,
    /// Disk size in GB
    #[schemars(range(min = 10))]
    pub disk_size: i32,
    /// Bandwidth in GB/month
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inodes: Option<i32>,
    /// Secret key holding the root password; only read at creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_password_secret_ref: Option<SecretKeySelector>,
}

/// Observed state of a VPS instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstanceObservation {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Lifecycle status reported by Hostinger (active, pending, suspended, ...)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip_address: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ipv6_address: String,
    /// RFC3339 creation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    /// RFC3339 expiration timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_hostname: String,
    #[serde(default)]
    pub current_cpu_count: i32,
    #[serde(default)]
    pub current_ram: i32,
    #[serde(default)]
    pub current_disk_size: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_bandwidth: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_inodes: Option<i32>,
}

/// Instance Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: instance.hostinger.crossplane.io/v1beta1
/// kind: Instance
/// metadata:
///   name: web-1
///   namespace: default
/// spec:
///   forProvider:
///     hostname: web-1.example.com
///     osId: ubuntu-22.04
///     cpuCount: 2
///     ram: 4096
///     diskSize: 80
///   providerConfigRef:
///     name: default
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "Instance",
    group = "instance.hostinger.crossplane.io",
    version = "v1beta1",
    namespaced,
    status = "InstanceStatus",
    category = "crossplane",
    category = "managed",
    category = "hostinger",
    printcolumn = r#"{"name":"READY", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}, {"name":"SYNCED", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Synced\")].status"}, {"name":"EXTERNAL-NAME", "type":"string", "jsonPath":".metadata.annotations.crossplane\\.io/external-name"}, {"name":"AGE", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSpec {
    pub for_provider: InstanceParameters,
    /// ProviderConfig to authenticate with; `default` when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config_ref: Option<ProviderConfigReference>,
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStatus {
    #[serde(default)]
    pub at_provider: InstanceObservation,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Instance {
    /// Name of the referenced `ProviderConfig`
    #[must_use]
    pub fn provider_config_name(&self) -> &str {
        self.spec
            .provider_config_ref
            .as_ref()
            .map_or(crate::constants::DEFAULT_PROVIDER_CONFIG_NAME, |r| r.name.as_str())
    }
}
