//! # Instance Client
//!
//! Typed CRUD access to Hostinger VPS instances plus the pure helpers the
//! reconciler needs: [`get_observation`], [`late_initialize`] and [`up_to_date`].
//!
//! Drift detection is deliberately asymmetric. Only parameters the user set
//! are compared, so fields left empty in the spec never cause an update.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, Instrument};

use crate::clients::http::{error_for_status, read_json, ClientError, HostingerClient};
use crate::crd::{InstanceObservation, InstanceParameters};

const INSTANCES_PATH: &str = "vps/instances";

/// A VPS instance as reported by the Hostinger API
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Instance {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub hostname: String,
    pub status: String,
    pub ip_address: String,
    pub ipv6_address: String,
    pub os_id: String,
    pub cpu_count: i32,
    pub ram: i32,
    pub disk_size: i32,
    pub bandwidth: Option<i32>,
    pub creation_date: Option<String>,
    pub expiration_date: Option<String>,
    pub ipv6_enabled: bool,
    pub inodes: Option<i32>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Items(Vec<Instance>),
    Wrapped { data: Vec<Instance> },
}

/// Body of `POST /vps/instances`
#[derive(Serialize)]
struct CreateRequest<'a> {
    hostname: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    os_id: &'a str,
    cpu_count: i32,
    ram: i32,
    disk_size: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    bandwidth: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ipv6_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inodes: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    root_password: Option<&'a str>,
}

/// Body of `PUT /vps/instances/{id}`
#[derive(Serialize)]
struct UpdateRequest<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    hostname: &'a str,
    #[serde(skip_serializing_if = "is_unset")]
    cpu_count: i32,
    #[serde(skip_serializing_if = "is_unset")]
    ram: i32,
    #[serde(skip_serializing_if = "is_unset")]
    disk_size: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    bandwidth: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ipv6_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inodes: Option<i32>,
}

#[allow(clippy::trivially_copy_pass_by_ref, reason = "Signature required by serde")]
fn is_unset(value: &i32) -> bool {
    *value <= 0
}

/// Remote operations on VPS instances
///
/// Failures are returned as classified [`ClientError`]s; a missing instance
/// is `ClientError::Api` with kind `NotFound`.
#[async_trait]
pub trait InstanceClient: Send + Sync {
    /// Create an instance; `root_password` is only ever sent here
    async fn create(
        &self,
        cancel: &CancellationToken,
        params: &InstanceParameters,
        root_password: Option<&str>,
    ) -> Result<Instance, ClientError>;

    async fn get(&self, cancel: &CancellationToken, id: &str) -> Result<Instance, ClientError>;

    async fn update(
        &self,
        cancel: &CancellationToken,
        id: &str,
        params: &InstanceParameters,
    ) -> Result<(), ClientError>;

    async fn delete(&self, cancel: &CancellationToken, id: &str) -> Result<(), ClientError>;

    async fn list(&self, cancel: &CancellationToken) -> Result<Vec<Instance>, ClientError>;
}

/// [`InstanceClient`] over the Hostinger REST API
#[derive(Debug, Clone)]
pub struct HostingerInstanceClient {
    client: HostingerClient,
}

impl HostingerInstanceClient {
    #[must_use]
    pub fn new(client: HostingerClient) -> Self {
        Self { client }
    }

    fn instance_path(id: &str) -> String {
        format!("{INSTANCES_PATH}/{id}")
    }
}

#[async_trait]
impl InstanceClient for HostingerInstanceClient {
    async fn create(
        &self,
        cancel: &CancellationToken,
        params: &InstanceParameters,
        root_password: Option<&str>,
    ) -> Result<Instance, ClientError> {
        let body = CreateRequest {
            hostname: &params.hostname,
            os_id: &params.os_id,
            cpu_count: params.cpu_count,
            ram: params.ram,
            disk_size: params.disk_size,
            bandwidth: params.bandwidth,
            ipv6_enabled: params.ipv6_enabled,
            inodes: params.inodes,
            root_password,
        };

        async {
            let request = self
                .client
                .request(Method::POST, INSTANCES_PATH)
                .json(&body)
                .build()
                .map_err(ClientError::Request)?;
            let response = self.client.execute(cancel, request).await?;
            let instance: Instance = read_json(response).await?;
            debug!(instance.id = %instance.id, "Created VPS instance");
            Ok(instance)
        }
        .instrument(debug_span!("instance.create", hostname = %params.hostname))
        .await
    }

    async fn get(&self, cancel: &CancellationToken, id: &str) -> Result<Instance, ClientError> {
        async {
            let request = self
                .client
                .request(Method::GET, &Self::instance_path(id))
                .build()
                .map_err(ClientError::Request)?;
            let response = self.client.execute(cancel, request).await?;
            read_json(response).await
        }
        .instrument(debug_span!("instance.get", instance.id = id))
        .await
    }

    async fn update(
        &self,
        cancel: &CancellationToken,
        id: &str,
        params: &InstanceParameters,
    ) -> Result<(), ClientError> {
        let body = UpdateRequest {
            hostname: &params.hostname,
            cpu_count: params.cpu_count,
            ram: params.ram,
            disk_size: params.disk_size,
            bandwidth: params.bandwidth,
            ipv6_enabled: params.ipv6_enabled,
            inodes: params.inodes,
        };

        async {
            let request = self
                .client
                .request(Method::PUT, &Self::instance_path(id))
                .json(&body)
                .build()
                .map_err(ClientError::Request)?;
            let response = self.client.execute(cancel, request).await?;
            error_for_status(response).await?;
            Ok(())
        }
        .instrument(debug_span!("instance.update", instance.id = id))
        .await
    }

    async fn delete(&self, cancel: &CancellationToken, id: &str) -> Result<(), ClientError> {
        async {
            let request = self
                .client
                .request(Method::DELETE, &Self::instance_path(id))
                .build()
                .map_err(ClientError::Request)?;
            let response = self.client.execute(cancel, request).await?;
            error_for_status(response).await?;
            Ok(())
        }
        .instrument(debug_span!("instance.delete", instance.id = id))
        .await
    }

    async fn list(&self, cancel: &CancellationToken) -> Result<Vec<Instance>, ClientError> {
        async {
            let request = self
                .client
                .request(Method::GET, INSTANCES_PATH)
                .build()
                .map_err(ClientError::Request)?;
            let response = self.client.execute(cancel, request).await?;
            Ok(match read_json::<ListResponse>(response).await? {
                ListResponse::Items(items) | ListResponse::Wrapped { data: items } => items,
            })
        }
        .instrument(debug_span!("instance.list"))
        .await
    }
}

/// Project a remote instance onto the persisted observation
///
/// `None` yields an empty observation. Unparseable timestamps are dropped.
#[must_use]
pub fn get_observation(instance: Option<&Instance>) -> InstanceObservation {
    let Some(instance) = instance else {
        return InstanceObservation::default();
    };

    InstanceObservation {
        id: instance.id.clone(),
        status: instance.status.clone(),
        ip_address: instance.ip_address.clone(),
        ipv6_address: instance.ipv6_address.clone(),
        creation_date: parse_time(instance.creation_date.as_deref()),
        expiration_date: parse_time(instance.expiration_date.as_deref()),
        current_hostname: instance.hostname.clone(),
        current_cpu_count: instance.cpu_count,
        current_ram: instance.ram,
        current_disk_size: instance.disk_size,
        current_bandwidth: instance.bandwidth,
        current_inodes: instance.inodes,
    }
}

fn parse_time(value: Option<&str>) -> Option<String> {
    let value = value.filter(|v| !v.is_empty())?;
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Fill unset optional parameters from the remote instance
///
/// Returns whether anything was copied. A second call with the same inputs
/// always returns `false`.
pub fn late_initialize(instance: Option<&Instance>, params: &mut InstanceParameters) -> bool {
    let Some(instance) = instance else {
        return false;
    };

    let mut changed = false;

    if params.os_id.is_empty() && !instance.os_id.is_empty() {
        params.os_id.clone_from(&instance.os_id);
        changed = true;
    }
    if params.bandwidth.is_none() && instance.bandwidth.is_some() {
        params.bandwidth = instance.bandwidth;
        changed = true;
    }
    if params.ipv6_enabled.is_none() && instance.ipv6_enabled {
        params.ipv6_enabled = Some(true);
        changed = true;
    }
    if params.inodes.is_none() && instance.inodes.is_some() {
        params.inodes = instance.inodes;
        changed = true;
    }

    changed
}

/// Whether every parameter the user set matches the remote instance
///
/// Unset parameters are ignored; `None` (no remote instance) is never up to date.
/// `os_id` is only sent on create, so it is not compared.
#[must_use]
pub fn up_to_date(instance: Option<&Instance>, params: &InstanceParameters) -> bool {
    let Some(instance) = instance else {
        return false;
    };

    if !params.hostname.is_empty() && params.hostname != instance.hostname {
        return false;
    }
    if params.cpu_count > 0 && params.cpu_count != instance.cpu_count {
        return false;
    }
    if params.ram > 0 && params.ram != instance.ram {
        return false;
    }
    if params.disk_size > 0 && params.disk_size != instance.disk_size {
        return false;
    }
    if params.bandwidth.is_some() && params.bandwidth != instance.bandwidth {
        return false;
    }
    if params
        .ipv6_enabled
        .is_some_and(|enabled| enabled != instance.ipv6_enabled)
    {
        return false;
    }
    if params.inodes.is_some() && params.inodes != instance.inodes {
        return false;
    }

    true
}
