//! # Instance Controller
//!
//! Binds the `Instance` custom resource to the generic managed-resource
//! state machine.
//!
//! Each pass:
//!
//! 1. Adds the managed finalizer (or runs cleanup when the resource is being deleted)
//! 2. Connects: fetches the referenced `ProviderConfig` and builds a Hostinger client
//! 3. Runs Observe → Create/Update through [`reconcile_managed`]
//! 4. Requeues after the poll interval
//!
//! The whole pass is bounded by the reconcile timeout. Its cancellation
//! token is a child of the process shutdown token, so in-flight HTTP calls
//! are aborted on shutdown as well as on timeout.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use anyhow::Context as _;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, ResourceExt};
use kube_runtime::controller::Action;
use kube_runtime::finalizer::{finalizer, Event as Finalizer};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use zeroize::Zeroizing;

use crate::clients::auth::{get_secret_value, SecretStore};
use crate::clients::http::{ClientError, ClientFactory};
use crate::clients::instance::{
    get_observation, late_initialize, up_to_date, HostingerInstanceClient, Instance as RemoteInstance,
    InstanceClient,
};
use crate::constants::{EXTERNAL_NAME_ANNOTATION, FIELD_MANAGER, MANAGED_FINALIZER};
use crate::controller::error::ReconcileError;
use crate::controller::managed::{
    delete_managed, reconcile_managed, ExternalClient, ExternalCreation, ExternalObservation, Managed,
    ManagedStore,
};
use crate::controller::status;
use crate::crd::{Condition, DeletionPolicy, Instance, ProviderConfig};
use crate::observability::metrics;

/// Shared state handed to every reconciliation
#[derive(Clone)]
pub struct Context {
    pub client: Client,
    pub factory: ClientFactory,
    pub poll_interval: Duration,
    pub reconcile_timeout: Duration,
    /// Cancelled on process shutdown
    pub shutdown: CancellationToken,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("factory", &self.factory)
            .field("poll_interval", &self.poll_interval)
            .field("reconcile_timeout", &self.reconcile_timeout)
            .finish_non_exhaustive()
    }
}

impl Managed for Instance {
    fn external_name(&self) -> Option<&str> {
        self.annotations()
            .get(EXTERNAL_NAME_ANNOTATION)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    fn set_external_name(&mut self, name: &str) {
        self.annotations_mut()
            .insert(EXTERNAL_NAME_ANNOTATION.to_string(), name.to_string());
    }

    fn deletion_policy(&self) -> DeletionPolicy {
        self.spec.deletion_policy
    }

    fn set_condition(&mut self, condition: Condition) {
        let status = self.status.get_or_insert_with(Default::default);
        status::set_condition(&mut status.conditions, condition);
    }
}

/// [`ExternalClient`] for `Instance` resources
pub struct InstanceExternal {
    client: Arc<dyn InstanceClient>,
    secrets: Arc<dyn SecretStore>,
}

impl InstanceExternal {
    pub fn new(client: Arc<dyn InstanceClient>, secrets: Arc<dyn SecretStore>) -> Self {
        Self { client, secrets }
    }

    /// Resolve the root password, if one is referenced
    ///
    /// A reference without a namespace resolves in the resource's namespace.
    async fn root_password(
        &self,
        cancel: &CancellationToken,
        resource: &Instance,
    ) -> Result<Option<Zeroizing<String>>, ClientError> {
        let Some(selector) = resource.spec.for_provider.root_password_secret_ref.as_ref() else {
            return Ok(None);
        };
        let namespace = resource.namespace().unwrap_or_default();
        let password = get_secret_value(self.secrets.as_ref(), cancel, &namespace, Some(selector)).await?;
        Ok(Some(Zeroizing::new(password)))
    }
}

impl std::fmt::Debug for InstanceExternal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceExternal").finish_non_exhaustive()
    }
}

#[async_trait]
impl ExternalClient<Instance> for InstanceExternal {
    type Remote = RemoteInstance;
    type Error = ClientError;

    async fn observe(
        &self,
        cancel: &CancellationToken,
        external_name: &str,
        resource: &mut Instance,
    ) -> Result<ExternalObservation, ClientError> {
        let remote = self.client.get(cancel, external_name).await?;
        self.record_observation(&remote, resource);

        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: up_to_date(Some(&remote), &resource.spec.for_provider),
        })
    }

    async fn create(
        &self,
        cancel: &CancellationToken,
        resource: &Instance,
    ) -> Result<ExternalCreation<RemoteInstance>, ClientError> {
        let password = self.root_password(cancel, resource).await?;
        let remote = self
            .client
            .create(
                cancel,
                &resource.spec.for_provider,
                password.as_ref().map(|p| p.as_str()),
            )
            .await?;

        Ok(ExternalCreation {
            external_name: remote.id.clone(),
            remote,
        })
    }

    async fn update(
        &self,
        cancel: &CancellationToken,
        external_name: &str,
        resource: &Instance,
    ) -> Result<(), ClientError> {
        self.client
            .update(cancel, external_name, &resource.spec.for_provider)
            .await
    }

    async fn delete(
        &self,
        cancel: &CancellationToken,
        external_name: &str,
        _resource: &Instance,
    ) -> Result<(), ClientError> {
        self.client.delete(cancel, external_name).await
    }

    fn late_initialize(&self, remote: &RemoteInstance, resource: &mut Instance) -> bool {
        late_initialize(Some(remote), &mut resource.spec.for_provider)
    }

    fn record_observation(&self, remote: &RemoteInstance, resource: &mut Instance) {
        resource.status.get_or_insert_with(Default::default).at_provider = get_observation(Some(remote));
    }
}

/// Persists `Instance` changes through the Kubernetes API
#[derive(Clone)]
pub struct KubeInstanceStore {
    api: Api<Instance>,
}

impl std::fmt::Debug for KubeInstanceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeInstanceStore").finish_non_exhaustive()
    }
}

impl KubeInstanceStore {
    pub fn new(api: Api<Instance>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ManagedStore<Instance> for KubeInstanceStore {
    async fn record_external_name(&self, resource: &Instance, external_name: &str) -> anyhow::Result<()> {
        let name = resource.name_any();
        let patch = json!({
            "metadata": {
                "annotations": {
                    EXTERNAL_NAME_ANNOTATION: external_name
                }
            }
        });

        self.api
            .patch(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
            .with_context(|| format!("Failed to record external name for Instance {name}"))?;

        debug!(external_name = %external_name, "Recorded external name for Instance {}", name);
        Ok(())
    }

    async fn update_spec(&self, resource: &Instance) -> anyhow::Result<()> {
        let name = resource.name_any();
        let patch = json!({
            "spec": {
                "forProvider": resource.spec.for_provider
            }
        });

        self.api
            .patch(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
            .with_context(|| format!("Failed to update spec for Instance {name}"))?;
        Ok(())
    }

    async fn update_status(&self, resource: &Instance) -> anyhow::Result<()> {
        let name = resource.name_any();
        let patch = json!({
            "status": resource.status
        });

        self.api
            .patch_status(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
            .with_context(|| format!("Failed to update status for Instance {name}"))?;
        Ok(())
    }
}

/// Build the external client for `resource` from its `ProviderConfig`
async fn connect(
    ctx: &Context,
    cancel: &CancellationToken,
    resource: &Instance,
) -> Result<InstanceExternal, ReconcileError> {
    let name = resource.provider_config_name();
    let provider_configs: Api<ProviderConfig> = Api::all(ctx.client.clone());
    let provider_config = provider_configs
        .get(name)
        .await
        .map_err(|source| ReconcileError::ProviderConfig {
            name: name.to_string(),
            source,
        })?;

    let client = ctx
        .factory
        .create_client(cancel, &provider_config)
        .await
        .map_err(ReconcileError::Connect)?;
    debug!(provider_config = %name, "auth.type" = client.auth_type(), "Connected to Hostinger API");

    Ok(InstanceExternal::new(
        Arc::new(HostingerInstanceClient::new(client)),
        Arc::clone(ctx.factory.secrets()),
    ))
}

async fn apply(
    ctx: &Context,
    cancel: &CancellationToken,
    api: &Api<Instance>,
    instance: Arc<Instance>,
) -> Result<Action, ReconcileError> {
    let mut resource = (*instance).clone();
    let external = connect(ctx, cancel, &resource).await?;
    let store = KubeInstanceStore::new(api.clone());

    let outcome = reconcile_managed(cancel, &mut resource, &external, &store).await?;
    info!(outcome = ?outcome, "Reconciled Instance");

    Ok(Action::requeue(ctx.poll_interval))
}

async fn cleanup(
    ctx: &Context,
    cancel: &CancellationToken,
    instance: Arc<Instance>,
) -> Result<Action, ReconcileError> {
    let mut resource = (*instance).clone();

    // Nothing to reach out to; avoid failing on a missing ProviderConfig
    if resource.deletion_policy() == DeletionPolicy::Orphan || resource.external_name().is_none() {
        info!(
            deletion_policy = ?resource.deletion_policy(),
            "Removing finalizer without deleting external resource"
        );
        return Ok(Action::await_change());
    }

    let external = connect(ctx, cancel, &resource).await?;
    let outcome = delete_managed(cancel, &mut resource, &external).await?;
    info!(outcome = ?outcome, "Finalized Instance");

    Ok(Action::await_change())
}

/// Record `Synced=False` with the error message, best effort
async fn record_failure(api: &Api<Instance>, instance: &Instance, err: &ReconcileError) {
    let mut conditions = instance
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();
    status::set_condition(&mut conditions, status::reconcile_error(err.to_string()));

    let patch = json!({
        "status": {
            "conditions": conditions
        }
    });
    if let Err(e) = api
        .patch_status(&instance.name_any(), &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
        .await
    {
        warn!("Failed to record reconcile error on Instance {}: {}", instance.name_any(), e);
    }
}

/// Reconcile one `Instance`
///
/// # Errors
///
/// Returns the first failure of the pass; it has already been recorded as a
/// `Synced=False` condition on the resource.
pub async fn reconcile(instance: Arc<Instance>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let name = instance.name_any();
    let namespace = instance
        .namespace()
        .ok_or(ReconcileError::MissingMetadata("namespace"))?;
    let span = info_span!(
        "reconcile",
        resource.kind = "Instance",
        resource.name = %name,
        resource.namespace = %namespace
    );

    async move {
        metrics::increment_reconciliations();
        let started = Instant::now();
        let api: Api<Instance> = Api::namespaced(ctx.client.clone(), &namespace);
        let cancel = ctx.shutdown.child_token();

        let pass = finalizer(&api, MANAGED_FINALIZER, Arc::clone(&instance), |event| async {
            match event {
                Finalizer::Apply(instance) => apply(&ctx, &cancel, &api, instance).await,
                Finalizer::Cleanup(instance) => cleanup(&ctx, &cancel, instance).await,
            }
        });

        let result = match tokio::time::timeout(ctx.reconcile_timeout, pass).await {
            Ok(result) => result.map_err(|e| ReconcileError::Finalizer(Box::new(e))),
            Err(_) => {
                cancel.cancel();
                Err(ReconcileError::Timeout(ctx.reconcile_timeout))
            }
        };
        metrics::observe_reconciliation_duration(started.elapsed().as_secs_f64());

        if let Err(err) = &result {
            record_failure(&api, &instance, err).await;
        }
        result
    }
    .instrument(span)
    .await
}

/// Requeue failed passes after the poll interval; errors are never fatal
#[allow(clippy::needless_pass_by_value, reason = "Signature required by kube_runtime::Controller")]
pub fn error_policy(instance: Arc<Instance>, error: &ReconcileError, ctx: Arc<Context>) -> Action {
    error!(
        resource.name = %instance.name_any(),
        resource.namespace = %instance.namespace().unwrap_or_default(),
        "Reconciliation error: {}",
        error
    );
    metrics::increment_reconciliation_errors();
    Action::requeue(ctx.poll_interval)
}
