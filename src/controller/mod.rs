//! # Controller
//!
//! Reconciliation of managed resources against the Hostinger API.
//!
//! - `managed`: generic Observe/Create/Update/Delete state machine
//! - `instance`: `Instance` binding and kube-runtime glue
//! - `status`: `Ready`/`Synced` conditions
//! - `error`: reconciliation errors

pub mod error;
pub mod instance;
pub mod managed;
pub mod status;

pub use error::ReconcileError;
pub use instance::{error_policy, reconcile, Context};
