//! # Managed Resource Reconciler
//!
//! Generic Observe/Create/Update/Delete state machine for managed resources.
//!
//! ## States
//!
//! - **Unobserved**: no external name recorded, or the external resource is gone
//! - **Exists, out of sync**: observed, but the spec differs from the remote state
//! - **Exists, in sync**: observed and up to date
//! - **Deleted**: the external resource was removed (or never existed)
//!
//! Each pass is level-triggered: the full state is re-evaluated from
//! scratch. A `NotFound` during Observe means "create it again", never an
//! error. After Create the external name is persisted before anything else
//! happens, otherwise a failure later in the pass would orphan the remote
//! resource.

use std::error::Error as StdError;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clients::errors::is_not_found;
use crate::controller::error::ReconcileError;
use crate::controller::status;
use crate::crd::{Condition, DeletionPolicy};

/// A Kubernetes resource mirroring one external resource
pub trait Managed: Send + Sync {
    /// External identity; `None` until the resource has been created
    fn external_name(&self) -> Option<&str>;

    fn set_external_name(&mut self, name: &str);

    fn deletion_policy(&self) -> DeletionPolicy;

    fn set_condition(&mut self, condition: Condition);
}

/// Result of observing the external resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExternalObservation {
    pub resource_exists: bool,
    pub resource_up_to_date: bool,
}

/// Result of creating the external resource
#[derive(Debug, Clone)]
pub struct ExternalCreation<T> {
    pub external_name: String,
    /// Remote state returned by the create call
    pub remote: T,
}

/// Operations against the external system for resources of type `R`
#[async_trait]
pub trait ExternalClient<R: Managed>: Send + Sync {
    type Remote: Send + Sync;
    type Error: StdError + Send + Sync + 'static;

    /// Observe the resource named `external_name`, recording the observation on `resource`
    async fn observe(
        &self,
        cancel: &CancellationToken,
        external_name: &str,
        resource: &mut R,
    ) -> Result<ExternalObservation, Self::Error>;

    async fn create(
        &self,
        cancel: &CancellationToken,
        resource: &R,
    ) -> Result<ExternalCreation<Self::Remote>, Self::Error>;

    async fn update(
        &self,
        cancel: &CancellationToken,
        external_name: &str,
        resource: &R,
    ) -> Result<(), Self::Error>;

    async fn delete(
        &self,
        cancel: &CancellationToken,
        external_name: &str,
        resource: &R,
    ) -> Result<(), Self::Error>;

    /// Fill unset spec fields from freshly created remote state
    fn late_initialize(&self, remote: &Self::Remote, resource: &mut R) -> bool;

    /// Record freshly created remote state as the observation
    fn record_observation(&self, remote: &Self::Remote, resource: &mut R);
}

/// Persistence of managed resource changes
#[async_trait]
pub trait ManagedStore<R>: Send + Sync {
    /// Durably record the external name of `resource`
    async fn record_external_name(&self, resource: &R, external_name: &str) -> anyhow::Result<()>;

    /// Persist late-initialized spec fields
    async fn update_spec(&self, resource: &R) -> anyhow::Result<()>;

    /// Persist the observation and conditions
    async fn update_status(&self, resource: &R) -> anyhow::Result<()>;
}

/// What a reconciliation pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created { late_initialized: bool },
    Updated,
    UpToDate,
    Deleted,
    Orphaned,
}

/// Run one Observe → Create/Update pass
#[allow(clippy::missing_errors_doc, reason = "Every stage maps to a ReconcileError variant")]
pub async fn reconcile_managed<R, C, S>(
    cancel: &CancellationToken,
    resource: &mut R,
    client: &C,
    store: &S,
) -> Result<ReconcileOutcome, ReconcileError>
where
    R: Managed,
    C: ExternalClient<R> + ?Sized,
    S: ManagedStore<R> + ?Sized,
{
    let observation = observe(cancel, resource, client).await?;

    let outcome = if !observation.resource_exists {
        create(cancel, resource, client, store).await?
    } else if observation.resource_up_to_date {
        debug!("External resource is up to date");
        resource.set_condition(status::available());
        ReconcileOutcome::UpToDate
    } else {
        let external_name = resource
            .external_name()
            .ok_or(ReconcileError::ExternalNameNotSet)?
            .to_string();
        info!(external_name = %external_name, "Updating external resource");
        client
            .update(cancel, &external_name, resource)
            .await
            .map_err(|e| ReconcileError::Update(Box::new(e)))?;
        resource.set_condition(status::available());
        ReconcileOutcome::Updated
    };

    resource.set_condition(status::reconcile_success());
    store
        .update_status(resource)
        .await
        .map_err(ReconcileError::persist("status"))?;

    Ok(outcome)
}

async fn observe<R, C>(
    cancel: &CancellationToken,
    resource: &mut R,
    client: &C,
) -> Result<ExternalObservation, ReconcileError>
where
    R: Managed,
    C: ExternalClient<R> + ?Sized,
{
    let Some(external_name) = resource.external_name().map(str::to_string) else {
        debug!("No external name recorded, resource is unobserved");
        return Ok(ExternalObservation::default());
    };

    match client.observe(cancel, &external_name, resource).await {
        Ok(observation) => Ok(observation),
        Err(e) if is_not_found(Some(&e)) => {
            warn!(external_name = %external_name, "External resource not found, it will be recreated");
            Ok(ExternalObservation::default())
        }
        Err(e) => Err(ReconcileError::Observe(Box::new(e))),
    }
}

async fn create<R, C, S>(
    cancel: &CancellationToken,
    resource: &mut R,
    client: &C,
    store: &S,
) -> Result<ReconcileOutcome, ReconcileError>
where
    R: Managed,
    C: ExternalClient<R> + ?Sized,
    S: ManagedStore<R> + ?Sized,
{
    resource.set_condition(status::creating());
    let creation = client
        .create(cancel, resource)
        .await
        .map_err(|e| ReconcileError::Create(Box::new(e)))?;

    store
        .record_external_name(resource, &creation.external_name)
        .await
        .map_err(ReconcileError::persist("external name"))?;
    resource.set_external_name(&creation.external_name);
    info!(external_name = %creation.external_name, "✅ Created external resource");

    let late_initialized = client.late_initialize(&creation.remote, resource);
    if late_initialized {
        debug!("Late-initialized spec from created resource");
        store
            .update_spec(resource)
            .await
            .map_err(ReconcileError::persist("late-initialized spec"))?;
    }
    client.record_observation(&creation.remote, resource);

    Ok(ReconcileOutcome::Created { late_initialized })
}

/// Delete the external resource, honouring the deletion policy
///
/// Idempotent: no external name, or a `NotFound` from the API, both count
/// as already deleted.
#[allow(clippy::missing_errors_doc, reason = "Failures map to ReconcileError::Delete")]
pub async fn delete_managed<R, C>(
    cancel: &CancellationToken,
    resource: &mut R,
    client: &C,
) -> Result<ReconcileOutcome, ReconcileError>
where
    R: Managed,
    C: ExternalClient<R> + ?Sized,
{
    if resource.deletion_policy() == DeletionPolicy::Orphan {
        info!("Deletion policy is Orphan, leaving external resource in place");
        return Ok(ReconcileOutcome::Orphaned);
    }

    let Some(external_name) = resource.external_name().map(str::to_string) else {
        debug!("No external name recorded, nothing to delete");
        return Ok(ReconcileOutcome::Deleted);
    };

    resource.set_condition(status::deleting());
    match client.delete(cancel, &external_name, resource).await {
        Ok(()) => {
            info!(external_name = %external_name, "🗑️ Deleted external resource");
            Ok(ReconcileOutcome::Deleted)
        }
        Err(e) if is_not_found(Some(&e)) => {
            debug!(external_name = %external_name, "External resource already gone");
            Ok(ReconcileOutcome::Deleted)
        }
        Err(e) => Err(ReconcileError::Delete(Box::new(e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::errors::{classify_error, HostingerError};
    use crate::controller::status::{get_condition, TYPE_READY, TYPE_SYNCED};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Widget {
        external_name: Option<String>,
        size: i32,
        observed_size: i32,
        policy: DeletionPolicy,
        conditions: Vec<Condition>,
    }

    impl Managed for Widget {
        fn external_name(&self) -> Option<&str> {
            self.external_name.as_deref()
        }

        fn set_external_name(&mut self, name: &str) {
            self.external_name = Some(name.to_string());
        }

        fn deletion_policy(&self) -> DeletionPolicy {
            self.policy
        }

        fn set_condition(&mut self, condition: Condition) {
            status::set_condition(&mut self.conditions, condition);
        }
    }

    /// Scripted external system; records every call in order
    #[derive(Default)]
    struct FakeExternal {
        remote_size: Mutex<Option<i32>>,
        observe_error: Option<u16>,
        create_error: Option<u16>,
        delete_error: Option<u16>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeExternal {
        fn with_remote(size: i32) -> Self {
            Self {
                remote_size: Mutex::new(Some(size)),
                ..Self::default()
            }
        }

        fn log(&self, call: &str) {
            self.calls.lock().expect("lock").push(call.to_string());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl ExternalClient<Widget> for FakeExternal {
        type Remote = i32;
        type Error = HostingerError;

        async fn observe(
            &self,
            _cancel: &CancellationToken,
            _external_name: &str,
            resource: &mut Widget,
        ) -> Result<ExternalObservation, HostingerError> {
            self.log("observe");
            if let Some(status) = self.observe_error {
                return Err(classify_error(status, "observe failed"));
            }
            let Some(size) = *self.remote_size.lock().expect("lock") else {
                return Err(classify_error(404, "gone"));
            };
            resource.observed_size = size;
            Ok(ExternalObservation {
                resource_exists: true,
                resource_up_to_date: resource.size == 0 || resource.size == size,
            })
        }

        async fn create(
            &self,
            _cancel: &CancellationToken,
            resource: &Widget,
        ) -> Result<ExternalCreation<i32>, HostingerError> {
            self.log("create");
            if let Some(status) = self.create_error {
                return Err(classify_error(status, "create failed"));
            }
            let size = if resource.size == 0 { 7 } else { resource.size };
            *self.remote_size.lock().expect("lock") = Some(size);
            Ok(ExternalCreation {
                external_name: "ext-1".to_string(),
                remote: size,
            })
        }

        async fn update(
            &self,
            _cancel: &CancellationToken,
            _external_name: &str,
            resource: &Widget,
        ) -> Result<(), HostingerError> {
            self.log("update");
            *self.remote_size.lock().expect("lock") = Some(resource.size);
            Ok(())
        }

        async fn delete(
            &self,
            _cancel: &CancellationToken,
            _external_name: &str,
            _resource: &Widget,
        ) -> Result<(), HostingerError> {
            self.log("delete");
            match self.delete_error {
                Some(status) => Err(classify_error(status, "delete failed")),
                None => Ok(()),
            }
        }

        fn late_initialize(&self, remote: &i32, resource: &mut Widget) -> bool {
            self.log("late_initialize");
            if resource.size == 0 {
                resource.size = *remote;
                true
            } else {
                false
            }
        }

        fn record_observation(&self, remote: &i32, resource: &mut Widget) {
            resource.observed_size = *remote;
        }
    }

    /// Store that logs into the external client's call log for ordering checks
    struct RecordingStore<'a> {
        external: &'a FakeExternal,
        fail_external_name: bool,
    }

    #[async_trait]
    impl ManagedStore<Widget> for RecordingStore<'_> {
        async fn record_external_name(&self, _resource: &Widget, name: &str) -> anyhow::Result<()> {
            self.external.log(&format!("record_external_name:{name}"));
            if self.fail_external_name {
                anyhow::bail!("apiserver unavailable");
            }
            Ok(())
        }

        async fn update_spec(&self, _resource: &Widget) -> anyhow::Result<()> {
            self.external.log("update_spec");
            Ok(())
        }

        async fn update_status(&self, _resource: &Widget) -> anyhow::Result<()> {
            self.external.log("update_status");
            Ok(())
        }
    }

    fn store(external: &FakeExternal) -> RecordingStore<'_> {
        RecordingStore {
            external,
            fail_external_name: false,
        }
    }

    #[tokio::test]
    async fn test_unobserved_resource_is_created_and_identity_recorded_first() {
        let external = FakeExternal::default();
        let mut widget = Widget::default();

        let outcome = reconcile_managed(&CancellationToken::new(), &mut widget, &external, &store(&external))
            .await
            .expect("reconcile");

        assert_eq!(outcome, ReconcileOutcome::Created { late_initialized: true });
        assert_eq!(widget.external_name.as_deref(), Some("ext-1"));
        assert_eq!(widget.size, 7);
        assert_eq!(
            external.calls(),
            [
                "create",
                "record_external_name:ext-1",
                "late_initialize",
                "update_spec",
                "update_status"
            ]
        );
        let ready = get_condition(&widget.conditions, TYPE_READY).expect("ready");
        assert_eq!(ready.reason.as_deref(), Some(status::REASON_CREATING));
        let synced = get_condition(&widget.conditions, TYPE_SYNCED).expect("synced");
        assert_eq!(synced.status, "True");
    }

    #[tokio::test]
    async fn test_failed_identity_persist_stops_the_pass() {
        let external = FakeExternal::default();
        let store = RecordingStore {
            external: &external,
            fail_external_name: true,
        };
        let mut widget = Widget::default();

        let err = reconcile_managed(&CancellationToken::new(), &mut widget, &external, &store)
            .await
            .expect_err("persist fails");

        assert!(matches!(err, ReconcileError::Persist { what: "external name", .. }));
        assert!(!external.calls().contains(&"late_initialize".to_string()));
    }

    #[tokio::test]
    async fn test_in_sync_resource_is_not_updated() {
        let external = FakeExternal::with_remote(4);
        let mut widget = Widget {
            external_name: Some("ext-1".to_string()),
            size: 4,
            ..Widget::default()
        };

        let outcome = reconcile_managed(&CancellationToken::new(), &mut widget, &external, &store(&external))
            .await
            .expect("reconcile");

        assert_eq!(outcome, ReconcileOutcome::UpToDate);
        assert_eq!(external.calls(), ["observe", "update_status"]);
        assert_eq!(widget.observed_size, 4);
    }

    #[tokio::test]
    async fn test_out_of_sync_resource_is_updated() {
        let external = FakeExternal::with_remote(4);
        let mut widget = Widget {
            external_name: Some("ext-1".to_string()),
            size: 8,
            ..Widget::default()
        };

        let outcome = reconcile_managed(&CancellationToken::new(), &mut widget, &external, &store(&external))
            .await
            .expect("reconcile");

        assert_eq!(outcome, ReconcileOutcome::Updated);
        assert_eq!(external.calls(), ["observe", "update", "update_status"]);
    }

    #[tokio::test]
    async fn test_not_found_during_observe_recreates() {
        let external = FakeExternal::default();
        let mut widget = Widget {
            external_name: Some("stale".to_string()),
            size: 3,
            ..Widget::default()
        };

        let outcome = reconcile_managed(&CancellationToken::new(), &mut widget, &external, &store(&external))
            .await
            .expect("not found is not an error");

        assert_eq!(outcome, ReconcileOutcome::Created { late_initialized: false });
        assert_eq!(widget.external_name.as_deref(), Some("ext-1"));
        assert_eq!(
            external.calls(),
            [
                "observe",
                "create",
                "record_external_name:ext-1",
                "late_initialize",
                "update_status"
            ]
        );
    }

    #[tokio::test]
    async fn test_other_observe_errors_surface() {
        let external = FakeExternal {
            observe_error: Some(401),
            ..FakeExternal::with_remote(1)
        };
        let mut widget = Widget {
            external_name: Some("ext-1".to_string()),
            ..Widget::default()
        };

        let err = reconcile_managed(&CancellationToken::new(), &mut widget, &external, &store(&external))
            .await
            .expect_err("unauthorized");

        assert!(matches!(err, ReconcileError::Observe(_)));
        assert!(crate::clients::errors::is_unauthorized(Some(&err)));
        assert_eq!(external.calls(), ["observe"]);
    }

    #[tokio::test]
    async fn test_create_failure_records_nothing() {
        let external = FakeExternal {
            create_error: Some(409),
            ..FakeExternal::default()
        };
        let mut widget = Widget::default();

        let err = reconcile_managed(&CancellationToken::new(), &mut widget, &external, &store(&external))
            .await
            .expect_err("conflict");

        assert!(matches!(err, ReconcileError::Create(_)));
        assert!(widget.external_name.is_none());
        assert_eq!(external.calls(), ["create"]);
    }

    #[tokio::test]
    async fn test_delete_without_identity_is_a_no_op() {
        let external = FakeExternal::default();
        let mut widget = Widget::default();

        let outcome = delete_managed(&CancellationToken::new(), &mut widget, &external)
            .await
            .expect("delete");

        assert_eq!(outcome, ReconcileOutcome::Deleted);
        assert!(external.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_treats_not_found_as_success() {
        let external = FakeExternal {
            delete_error: Some(404),
            ..FakeExternal::default()
        };
        let mut widget = Widget {
            external_name: Some("ext-1".to_string()),
            ..Widget::default()
        };

        let outcome = delete_managed(&CancellationToken::new(), &mut widget, &external)
            .await
            .expect("already gone");
        assert_eq!(outcome, ReconcileOutcome::Deleted);
    }

    #[tokio::test]
    async fn test_delete_failure_surfaces() {
        let external = FakeExternal {
            delete_error: Some(503),
            ..FakeExternal::default()
        };
        let mut widget = Widget {
            external_name: Some("ext-1".to_string()),
            ..Widget::default()
        };

        let err = delete_managed(&CancellationToken::new(), &mut widget, &external)
            .await
            .expect_err("server error");
        assert!(matches!(err, ReconcileError::Delete(_)));
    }

    #[tokio::test]
    async fn test_orphan_policy_skips_delete() {
        let external = FakeExternal::default();
        let mut widget = Widget {
            external_name: Some("ext-1".to_string()),
            policy: DeletionPolicy::Orphan,
            ..Widget::default()
        };

        let outcome = delete_managed(&CancellationToken::new(), &mut widget, &external)
            .await
            .expect("orphaned");

        assert_eq!(outcome, ReconcileOutcome::Orphaned);
        assert!(external.calls().is_empty());
    }
}
