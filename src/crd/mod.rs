//! # Custom Resource Definitions
//!
//! CRD types served by the Hostinger provider.
//!
//! ## Module Structure
//!
//! - `provider_config.rs` - Cluster-scoped `ProviderConfig` with API credentials
//! - `instance.rs` - Namespaced `Instance` managed resource (VPS)
//! - `common.rs` - Secret references, conditions and deletion policy

use kube::CustomResourceExt;

mod common;
mod instance;
mod provider_config;

pub use common::{Condition, DeletionPolicy, ProviderConfigReference, SecretKeySelector};
pub use instance::{Instance, InstanceObservation, InstanceParameters, InstanceSpec, InstanceStatus};
pub use provider_config::{
    ApiKeyAuthSpec, OAuthAuthSpec, ProviderConfig, ProviderConfigSpec, ProviderConfigStatus,
    ProviderCredentials,
};

/// Every CRD served by the provider as a multi-document YAML stream
///
/// # Errors
///
/// Fails only if a generated CRD cannot be serialized.
pub fn crd_manifests() -> Result<String, serde_yaml::Error> {
    let mut out = String::from("# Generated by `hostinger-provider crdgen`, do not edit\n");
    for crd in [ProviderConfig::crd(), Instance::crd()] {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(&crd)?);
    }
    Ok(out)
}
