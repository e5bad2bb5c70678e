//! # Hostinger Provider
//!
//! A Kubernetes controller that manages Hostinger VPS instances declared as
//! `Instance` custom resources.
//!
//! ## Overview
//!
//! 1. **Watching Instances** - Reconciles every `Instance` in the cluster
//! 2. **Resolving credentials** - Reads API keys or OAuth client credentials through the referenced `ProviderConfig`
//! 3. **Driving the Hostinger API** - Creates, updates and deletes VPS instances until they match the spec
//! 4. **Reporting status** - Writes `status.atProvider` and `Ready`/`Synced` conditions back
//!
//! ## Usage
//!
//! ```bash
//! hostinger-provider crdgen | kubectl apply -f -
//! hostinger-provider --max-concurrent-reconciles 8
//! ```

use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use futures::StreamExt;
use kube::{Api, Client};
use kube_runtime::{controller, watcher, Controller};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use hostinger_provider::clients::auth::KubeSecretStore;
use hostinger_provider::clients::http::ClientFactory;
use hostinger_provider::config::{Command, ControllerConfig, LogFormat};
use hostinger_provider::controller::{error_policy, reconcile, Context};
use hostinger_provider::crd::{crd_manifests, Instance};
use hostinger_provider::observability::metrics;
use hostinger_provider::server::{start_server, ServerState};

fn init_tracing(config: &ControllerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| config.default_log_filter().into());

    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

/// Cancel `shutdown` on SIGTERM or Ctrl-C
async fn watch_signals(shutdown: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        () = terminate => {}
    }
    info!("Shutdown signal received");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ControllerConfig::parse();

    if let Some(Command::Crdgen) = config.command {
        print!("{}", crd_manifests().context("Failed to serialize CRDs")?);
        return Ok(());
    }

    // Must happen before any TLS connection is made
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("Failed to install rustls crypto provider");
    }

    init_tracing(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git = env!("BUILD_GIT_HASH"),
        built = env!("BUILD_DATETIME"),
        "🚀 Starting Hostinger provider"
    );

    metrics::register_metrics()?;

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    // Metrics and probes
    let server_state = Arc::new(ServerState::default());
    let server_handle = {
        let state = Arc::clone(&server_state);
        let shutdown = shutdown.clone();
        let port = config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = start_server(port, state, shutdown).await {
                error!("HTTP server error: {}", e);
            }
        })
    };

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let factory = ClientFactory::new(
        Arc::new(KubeSecretStore::new(client.clone())),
        config.http_client_config(),
        config.secret_namespace.clone(),
    );
    let ctx = Arc::new(Context {
        client: client.clone(),
        factory,
        poll_interval: config.poll_interval(),
        reconcile_timeout: config.reconcile_timeout(),
        shutdown: shutdown.clone(),
    });

    let instances: Api<Instance> = Api::all(client);

    server_state.is_ready.store(true, Ordering::Relaxed);
    info!(
        concurrency = config.max_concurrent_reconciles,
        poll_interval = ?config.poll_interval(),
        "Watching Instance resources"
    );

    // In-flight passes observe the cancelled token and finish promptly
    Controller::new(instances, watcher::Config::default())
        .with_config(controller::Config::default().concurrency(config.max_concurrent_reconciles))
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| {
            match result {
                Ok((obj, _)) => debug!("Reconciled {}", obj.name),
                Err(e) => debug!("Reconcile failed: {}", e),
            }
            std::future::ready(())
        })
        .await;

    server_state.is_ready.store(false, Ordering::Relaxed);
    shutdown.cancel();
    if let Err(e) = server_handle.await {
        warn!("HTTP server task failed: {}", e);
    }

    info!("Controller stopped");
    Ok(())
}
