//! # Error Policy
//!
//! Retry scheduling for failed reconciliations and handling of controller
//! stream errors.

use crate::controller::backoff::BackoffTracker;
use crate::controller::reconciler::{backoff_key, resource_key, Reconciler, ReconcilerError};
use crate::crd::OpenSearchCluster;
use crate::observability::metrics;
use kube::ResourceExt;
use kube_runtime::controller::{Action, Error as ControllerError};
use kube_runtime::watcher;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Requeue a failed cluster with per-cluster Fibonacci backoff
///
/// Cancelled passes are not retried; the controller is shutting down.
pub fn handle_reconciliation_error(
    cluster: Arc<OpenSearchCluster>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = cluster.name_any();
    let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = %name,
        resource.namespace = %namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    if matches!(error, ReconcilerError::Cancelled) {
        info!("Reconciliation of {}/{} cancelled", namespace, name);
        return Action::await_change();
    }

    error!("Reconciliation error for {}/{}: {:?}", namespace, name, error);
    metrics::increment_reconciliation_errors();

    let (delay, failures) = ctx.backoff.record_failure(&resource_key(&cluster));
    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
    info!(
        "Retrying {}/{} in {}s at {} (consecutive failures: {}, reason: {})",
        namespace,
        name,
        delay.as_secs(),
        next_trigger_time.to_rfc3339(),
        failures,
        error.reason()
    );

    metrics::increment_requeues_total(error.reason());
    Action::requeue(delay)
}

/// Log an error surfaced by the controller stream
///
/// A cluster that no longer exists loses its backoff state.
pub fn handle_controller_error(
    error: &ControllerError<ReconcilerError, watcher::Error>,
    backoff: &BackoffTracker,
) {
    match error {
        // Already handled by the error policy
        ControllerError::ReconcilerFailed(e, obj) => {
            debug!(object = %obj, error = %e, "reconcile failed");
        }
        ControllerError::ObjectNotFound(obj) => {
            debug!(object = %obj, "object deleted before reconcile");
            backoff.reset(&backoff_key(obj.namespace.as_deref(), &obj.name));
        }
        other => {
            warn!(error = %other, "controller stream error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::controller::events::NoopEventPublisher;
    use crate::controller::reconciler::{AccessorError, InMemoryAccessor};
    use crate::crd::ClusterSpec;
    use kube_runtime::reflector::ObjectRef;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn reconciler() -> Arc<Reconciler> {
        let config = ControllerConfig {
            backoff_min_secs: 5,
            backoff_max_secs: 60,
            ..Default::default()
        };
        Arc::new(Reconciler::with_parts(
            Arc::new(InMemoryAccessor::new()),
            Arc::new(NoopEventPublisher),
            config,
            CancellationToken::new(),
        ))
    }

    fn cluster() -> Arc<OpenSearchCluster> {
        let mut c = OpenSearchCluster::new("logs", ClusterSpec::default());
        c.metadata.namespace = Some("search".to_string());
        Arc::new(c)
    }

    #[test]
    fn test_errors_back_off_per_cluster() {
        let ctx = reconciler();
        let error = ReconcilerError::from(AccessorError::Store("timeout".to_string()));

        let first = handle_reconciliation_error(cluster(), &error, Arc::clone(&ctx));
        let second = handle_reconciliation_error(cluster(), &error, Arc::clone(&ctx));
        let third = handle_reconciliation_error(cluster(), &error, Arc::clone(&ctx));
        assert_eq!(first, Action::requeue(Duration::from_secs(5)));
        assert_eq!(second, Action::requeue(Duration::from_secs(5)));
        assert_eq!(third, Action::requeue(Duration::from_secs(10)));
        assert_eq!(ctx.backoff.failures("search/logs"), 3);
    }

    #[test]
    fn test_deleted_cluster_drops_backoff_state() {
        let ctx = reconciler();
        let error = ReconcilerError::from(AccessorError::Store("timeout".to_string()));
        handle_reconciliation_error(cluster(), &error, Arc::clone(&ctx));
        handle_reconciliation_error(cluster(), &error, Arc::clone(&ctx));
        assert_eq!(ctx.backoff.failures("search/logs"), 2);

        let deleted: ControllerError<ReconcilerError, watcher::Error> =
            ControllerError::ObjectNotFound(
                ObjectRef::<OpenSearchCluster>::new("logs")
                    .within("search")
                    .erase(),
            );
        handle_controller_error(&deleted, &ctx.backoff);

        assert_eq!(ctx.backoff.failures("search/logs"), 0);
    }

    #[test]
    fn test_cancelled_is_not_retried() {
        let ctx = reconciler();
        let action =
            handle_reconciliation_error(cluster(), &ReconcilerError::Cancelled, Arc::clone(&ctx));
        assert_eq!(action, Action::await_change());
        assert_eq!(ctx.backoff.failures("search/logs"), 0);
    }
}
