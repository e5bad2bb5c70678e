//! # Constants
//!
//! Shared constants used throughout the provider.
//!
//! These values represent the defaults of the upstream Hostinger API and of the
//! controller runtime. Most can be overridden via `ProviderConfig` fields,
//! environment variables or command-line flags.

/// Default API endpoint for API-key (v1) authentication
pub const DEFAULT_V1_ENDPOINT: &str = "https://api.hostinger.com/v1";

/// Default API endpoint for OAuth (v2) authentication
pub const DEFAULT_V2_ENDPOINT: &str = "https://api.hostinger.com/v2";

/// Default OAuth token endpoint for client-credentials grants
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://auth.hostinger.com/oauth/token";

/// User agent sent with every API request
pub const USER_AGENT: &str = concat!("provider-hostinger/v", env!("CARGO_PKG_VERSION"));

/// Default HTTP request timeout (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Default number of retries after the first attempt
pub const DEFAULT_HTTP_MAX_RETRIES: u32 = 3;

/// Default base wait between retries (milliseconds); scaled linearly by attempt
pub const DEFAULT_HTTP_RETRY_WAIT_MS: u64 = 1000;

/// Timeout for a single OAuth token request (seconds)
pub const TOKEN_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Safety margin subtracted from the server-provided token lifetime (seconds)
pub const TOKEN_EXPIRY_MARGIN_SECS: u64 = 300;

/// Annotation carrying the external identity of a managed resource
pub const EXTERNAL_NAME_ANNOTATION: &str = "crossplane.io/external-name";

/// Finalizer held on managed resources until the external resource is gone
pub const MANAGED_FINALIZER: &str = "finalizer.managedresource.crossplane.io";

/// Field manager used for server-side patches
pub const FIELD_MANAGER: &str = "provider-hostinger";

/// Name of the `ProviderConfig` used when a resource does not reference one
pub const DEFAULT_PROVIDER_CONFIG_NAME: &str = "default";

/// Default namespace for secret references that omit one
pub const DEFAULT_SECRET_NAMESPACE: &str = "crossplane-system";

/// Default poll interval between reconciliation passes (seconds)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default deadline for a single reconciliation pass (seconds)
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 120;

/// Default number of resources reconciled in parallel
pub const DEFAULT_MAX_CONCURRENT_RECONCILES: u16 = 4;

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;
