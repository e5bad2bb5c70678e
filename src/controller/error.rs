//! # Reconcile Errors

use std::error::Error as StdError;
use std::time::Duration;

use thiserror::Error;

use crate::clients::http::ClientError;

/// Boxed error from an external client or persistence backend
pub type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("cannot get ProviderConfig {name}: {source}")]
    ProviderConfig {
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("cannot create Hostinger client: {0}")]
    Connect(#[source] ClientError),

    #[error("cannot observe external resource: {0}")]
    Observe(#[source] BoxError),

    #[error("cannot create external resource: {0}")]
    Create(#[source] BoxError),

    #[error("cannot update external resource: {0}")]
    Update(#[source] BoxError),

    #[error("cannot delete external resource: {0}")]
    Delete(#[source] BoxError),

    #[error("external name not set")]
    ExternalNameNotSet,

    #[error("cannot persist {what}: {source}")]
    Persist {
        what: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("resource has no {0}")]
    MissingMetadata(&'static str),

    #[error("reconciliation timed out after {0:?}")]
    Timeout(Duration),

    #[error("finalizer error: {0}")]
    Finalizer(#[source] Box<kube_runtime::finalizer::Error<ReconcileError>>),
}

impl ReconcileError {
    pub(crate) fn persist(what: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |err| Self::Persist {
            what,
            source: err.into(),
        }
    }
}
