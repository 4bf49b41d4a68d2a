//! # Initialization
//!
//! Controller startup: rustls setup, tracing, metrics, HTTP server,
//! Kubernetes client and reconciler context.

use crate::config::ControllerConfig;
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::crd::OpenSearchCluster;
use crate::observability;
use anyhow::{Context, Result};
use k8s_openapi::api::batch::v1::Job;
use kube::api::{Api, ListParams};
use kube::Client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    /// Clusters in all namespaces
    pub clusters: Api<OpenSearchCluster>,
    /// Update jobs in all namespaces
    pub jobs: Api<Job>,
    pub reconciler: Arc<Reconciler>,
    pub server_state: Arc<ServerState>,
    pub config: ControllerConfig,
    /// Cancelled on shutdown
    pub shutdown: CancellationToken,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field(
                "server_ready",
                &self
                    .server_state
                    .is_ready
                    .load(std::sync::atomic::Ordering::Relaxed),
            )
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// # Errors
///
/// Fails when tracing cannot be installed, metrics cannot be registered,
/// no Kubernetes client can be built or the `OpenSearchCluster` CRD is not
/// queryable.
pub async fn initialize() -> Result<InitializationResult> {
    // Must happen before any TLS connection is made
    let provider_installed = rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok();

    let config = ControllerConfig::from_env();
    observability::init_tracing(&config).context("Failed to initialize tracing")?;
    if !provider_installed {
        warn!("A rustls crypto provider was already installed, keeping it");
    }

    info!("Starting OpenSearch operator");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics().context("Failed to register metrics")?;

    let shutdown = CancellationToken::new();
    let server_state = Arc::new(ServerState::default());

    let server_port = config.metrics_port;
    let server_state_clone = Arc::clone(&server_state);
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone, server_shutdown).await {
            error!("HTTP server error: {}", e);
        }
    });

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let clusters: Api<OpenSearchCluster> = Api::all(client.clone());
    let jobs: Api<Job> = Api::all(client.clone());

    check_crd_queryable(&clusters).await?;

    let reconciler = Arc::new(Reconciler::new(
        client.clone(),
        config.clone(),
        shutdown.clone(),
    ));

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        clusters,
        jobs,
        reconciler,
        server_state,
        config,
        shutdown,
    })
}

async fn check_crd_queryable(clusters: &Api<OpenSearchCluster>) -> Result<()> {
    let list = clusters
        .list(&ListParams::default().limit(1))
        .await
        .context("OpenSearchCluster CRD is not installed or not readable")?;
    info!(
        "CRD is queryable, {} OpenSearchCluster resources visible in the first page",
        list.items.len()
    );
    Ok(())
}
