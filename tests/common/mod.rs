//! Common test utilities for integration and Pact tests
//!
//! Provides rustls crypto provider setup and in-memory doubles for the
//! Kubernetes-backed seams.

#![allow(dead_code, reason = "Each test crate uses a different subset of helpers")]

use std::collections::BTreeMap;
use std::sync::{Mutex, Once};

use async_trait::async_trait;
use hostinger_provider::clients::auth::{SecretError, SecretStore};
use hostinger_provider::controller::managed::ManagedStore;
use hostinger_provider::crd::Instance;
use kube::ResourceExt;

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once across all tests.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        // A provider may already be installed by another test binary setup
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Secrets held in memory, keyed by (namespace, name)
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: BTreeMap<(String, String), BTreeMap<String, Vec<u8>>>,
}

impl MemorySecretStore {
    #[must_use]
    pub fn with(mut self, namespace: &str, name: &str, key: &str, value: &str) -> Self {
        self.secrets
            .entry((namespace.to_string(), name.to_string()))
            .or_default()
            .insert(key.to_string(), value.as_bytes().to_vec());
        self
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, SecretError> {
        self.secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| SecretError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }
}

/// Records what the state machine persisted instead of patching a cluster
#[derive(Debug, Default)]
pub struct MemoryInstanceStore {
    pub external_names: Mutex<Vec<String>>,
    pub spec_updates: Mutex<usize>,
    pub status_updates: Mutex<usize>,
}

#[async_trait]
impl ManagedStore<Instance> for MemoryInstanceStore {
    async fn record_external_name(&self, resource: &Instance, external_name: &str) -> anyhow::Result<()> {
        anyhow::ensure!(!resource.name_any().is_empty(), "resource has no name");
        self.external_names
            .lock()
            .expect("lock")
            .push(external_name.to_string());
        Ok(())
    }

    async fn update_spec(&self, _resource: &Instance) -> anyhow::Result<()> {
        *self.spec_updates.lock().expect("lock") += 1;
        Ok(())
    }

    async fn update_status(&self, _resource: &Instance) -> anyhow::Result<()> {
        *self.status_updates.lock().expect("lock") += 1;
        Ok(())
    }
}
