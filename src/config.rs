//! # Controller Configuration
//!
//! Process-wide settings for the provider binary. Every flag can also be set
//! through the environment variable of the same name, so the provider can be
//! configured from a Deployment manifest without changing its arguments.
//!
//! ```bash
//! hostinger-provider --poll-interval-secs 30 --max-concurrent-reconciles 8
//! POLL_INTERVAL_SECS=30 LOG_FORMAT=json hostinger-provider
//! hostinger-provider crdgen > crds.yaml
//! ```

use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use crate::clients::http::HttpClientConfig;
use crate::constants::{
    DEFAULT_HTTP_MAX_RETRIES, DEFAULT_HTTP_RETRY_WAIT_MS, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_MAX_CONCURRENT_RECONCILES,
    DEFAULT_METRICS_PORT, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_RECONCILE_TIMEOUT_SECS, DEFAULT_SECRET_NAMESPACE,
};

/// Hostinger provider for Kubernetes
#[derive(Debug, Clone, Parser)]
#[command(name = "hostinger-provider", version, about, long_about = None)]
pub struct ControllerConfig {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Seconds between reconciliations of the same resource
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    pub poll_interval_secs: u64,

    /// Upper bound for a single reconciliation pass, in seconds
    #[arg(long, env = "RECONCILE_TIMEOUT_SECS", default_value_t = DEFAULT_RECONCILE_TIMEOUT_SECS)]
    pub reconcile_timeout_secs: u64,

    /// Number of resources reconciled in parallel
    #[arg(long, env = "MAX_CONCURRENT_RECONCILES", default_value_t = DEFAULT_MAX_CONCURRENT_RECONCILES)]
    pub max_concurrent_reconciles: u16,

    /// Port serving /metrics, /healthz and /readyz
    #[arg(long, env = "METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Namespace for ProviderConfig secret references that omit one
    #[arg(long, env = "SECRET_NAMESPACE", default_value = DEFAULT_SECRET_NAMESPACE)]
    pub secret_namespace: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Enable debug logging
    #[arg(long, env = "DEBUG")]
    pub debug: bool,

    /// Per-attempt HTTP timeout for Hostinger API calls, in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = DEFAULT_HTTP_TIMEOUT_SECS)]
    pub http_timeout_secs: u64,

    /// Retries after the first attempt for transport errors, 429 and 5xx
    #[arg(long, env = "HTTP_MAX_RETRIES", default_value_t = DEFAULT_HTTP_MAX_RETRIES)]
    pub http_max_retries: u32,

    /// Base wait between retries, in milliseconds (multiplied by the attempt number)
    #[arg(long, env = "HTTP_RETRY_WAIT_MS", default_value_t = DEFAULT_HTTP_RETRY_WAIT_MS)]
    pub http_retry_wait_ms: u64,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the CustomResourceDefinitions and exit
    Crdgen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl ControllerConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    #[must_use]
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    /// Effective HTTP client settings
    #[must_use]
    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: Duration::from_secs(self.http_timeout_secs),
            max_retries: self.http_max_retries,
            retry_wait: Duration::from_millis(self.http_retry_wait_ms),
            ..HttpClientConfig::default()
        }
    }

    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    #[must_use]
    pub fn default_log_filter(&self) -> &'static str {
        if self.debug {
            "hostinger_provider=debug"
        } else {
            "hostinger_provider=info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::parse_from(["hostinger-provider"]);

        assert!(config.command.is_none());
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.reconcile_timeout(), Duration::from_secs(120));
        assert_eq!(config.max_concurrent_reconciles, 4);
        assert_eq!(config.metrics_port, 8080);
        assert_eq!(config.secret_namespace, "crossplane-system");
        assert_eq!(config.log_format, LogFormat::Text);

        let http = config.http_client_config();
        let defaults = HttpClientConfig::default();
        assert_eq!(http.timeout, defaults.timeout);
        assert_eq!(http.max_retries, defaults.max_retries);
        assert_eq!(http.retry_wait, defaults.retry_wait);
        assert!(http.user_agent.starts_with("provider-hostinger/v"));
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = ControllerConfig::parse_from([
            "hostinger-provider",
            "--poll-interval-secs",
            "15",
            "--http-max-retries",
            "0",
            "--http-retry-wait-ms",
            "250",
            "--log-format",
            "json",
            "--debug",
        ]);

        assert_eq!(config.poll_interval(), Duration::from_secs(15));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.default_log_filter(), "hostinger_provider=debug");
        let http = config.http_client_config();
        assert_eq!(http.max_retries, 0);
        assert_eq!(http.retry_wait, Duration::from_millis(250));
    }

    #[test]
    fn test_crdgen_subcommand() {
        let config = ControllerConfig::parse_from(["hostinger-provider", "crdgen"]);
        assert!(matches!(config.command, Some(Command::Crdgen)));
    }
}
