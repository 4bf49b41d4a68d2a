//! # Watch Loop
//!
//! Runs the controller over `OpenSearchCluster` resources and the update
//! jobs they own until a shutdown signal arrives.

use crate::constants::MANAGED_BY_LABEL;
use crate::controller::reconciler::reconcile;
use crate::controller::server::ServerState;
use crate::runtime::error_policy::{handle_controller_error, handle_reconciliation_error};
use crate::runtime::initialization::InitializationResult;
use futures::StreamExt;
use kube_runtime::{controller::Config as RuntimeConfig, watcher, Controller};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

/// Run the controller until SIGINT or SIGTERM
///
/// # Errors
///
/// Currently only returns `Ok`; stream errors are logged and the controller
/// keeps running.
pub async fn run_watch_loop(init: InitializationResult) -> Result<(), anyhow::Error> {
    let InitializationResult {
        clusters,
        jobs,
        reconciler,
        server_state,
        config,
        shutdown,
        ..
    } = init;

    spawn_signal_handler(Arc::clone(&server_state), shutdown.clone());

    let job_selector = format!("{MANAGED_BY_LABEL}={}", config.controller_name);
    let runtime_config = RuntimeConfig::default().concurrency(config.max_concurrent_reconciliations);

    let watch_span = tracing::info_span!("controller.watch", operation = "watch_loop");

    info!(
        "Watching OpenSearchCluster resources (concurrency {})",
        config.max_concurrent_reconciliations
    );
    server_state.set_ready(true);
    let stream_ctx = Arc::clone(&reconciler);

    Controller::new(clusters, watcher::Config::default().any_semantic())
        .owns(jobs, watcher::Config::default().labels(&job_selector))
        .with_config(runtime_config)
        .shutdown_on_signal()
        .run(reconcile, handle_reconciliation_error, reconciler)
        .for_each(|result| {
            match result {
                Ok((obj, _action)) => debug!(object = %obj, "reconciled"),
                Err(e) => handle_controller_error(&e, &stream_ctx.backoff),
            }
            futures::future::ready(())
        })
        .instrument(watch_span)
        .await;

    server_state.set_ready(false);
    shutdown.cancel();
    info!("Controller stopped");
    Ok(())
}

/// Cancel in-flight store requests and fail readiness on SIGINT/SIGTERM
fn spawn_signal_handler(server_state: Arc<ServerState>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal, initiating graceful shutdown...");
        server_state.set_ready(false);
        shutdown.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
