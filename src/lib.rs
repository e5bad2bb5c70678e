//! Hostinger Provider Library
//!
//! Kubernetes provider that reconciles Hostinger VPS instances declared as
//! `Instance` custom resources. Credentials come from a cluster-scoped
//! `ProviderConfig` that references Kubernetes secrets.
//!
//! The binary in `main.rs` only wires these modules together; everything is
//! testable without a cluster through the `SecretStore`, `InstanceClient`
//! and `ManagedStore` seams.

pub mod clients;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod server;
