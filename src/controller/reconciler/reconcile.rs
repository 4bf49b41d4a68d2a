//! # Reconciliation Logic
//!
//! Entry point called by the controller for every `OpenSearchCluster` pass.
//! Builds a fresh [`ReconcilerContext`], runs the facets and turns their
//! combined result into a controller [`Action`].

use crate::config::ControllerConfig;
use crate::controller::backoff::BackoffTracker;
use crate::controller::events::{EventPublisher, KubeEventPublisher};
use crate::controller::reconciler::accessor::{KubeAccessor, ResourceAccessor};
use crate::controller::reconciler::context::ReconcilerContext;
use crate::controller::reconciler::job::UpdateJobSettings;
use crate::controller::reconciler::securityconfig::SecurityconfigReconciler;
use crate::controller::reconciler::types::{ReconcileResult, ReconcilerError};
use crate::crd::OpenSearchCluster;
use crate::observability::metrics;
use kube::{Client, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Instrument};

/// Shared state of all reconciliation passes
pub struct Reconciler {
    pub accessor: Arc<dyn ResourceAccessor>,
    pub events: Arc<dyn EventPublisher>,
    pub config: ControllerConfig,
    /// Per-cluster error backoff, used by the error policy
    pub backoff: BackoffTracker,
    /// Cancelled on shutdown; aborts in-flight store requests
    pub cancel: CancellationToken,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Reconciler talking to the Kubernetes API
    pub fn new(client: Client, config: ControllerConfig, cancel: CancellationToken) -> Self {
        let events = KubeEventPublisher::new(client.clone(), &config.controller_name);
        Self::with_parts(
            Arc::new(KubeAccessor::new(client)),
            Arc::new(events),
            config,
            cancel,
        )
    }

    pub fn with_parts(
        accessor: Arc<dyn ResourceAccessor>,
        events: Arc<dyn EventPublisher>,
        config: ControllerConfig,
        cancel: CancellationToken,
    ) -> Self {
        let backoff = BackoffTracker::new(config.backoff_min_secs, config.backoff_max_secs);
        Self {
            accessor,
            events,
            config,
            backoff,
            cancel,
        }
    }
}

/// Backoff key of a cluster
#[must_use]
pub fn resource_key(cluster: &OpenSearchCluster) -> String {
    backoff_key(cluster.namespace().as_deref(), &cluster.name_any())
}

/// Backoff key for a namespace and name
#[must_use]
pub fn backoff_key(namespace: Option<&str>, name: &str) -> String {
    format!("{}/{}", namespace.unwrap_or("default"), name)
}

/// Run one pass for `cluster`
///
/// # Errors
///
/// Returns the first facet error; the error policy decides the retry delay.
pub async fn reconcile(
    cluster: Arc<OpenSearchCluster>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let span = tracing::info_span!(
        "reconcile",
        resource.name = %cluster.name_any(),
        resource.namespace = %cluster.namespace().unwrap_or_default(),
        resource.kind = "OpenSearchCluster",
    );
    reconcile_internal(cluster, ctx).instrument(span).await
}

async fn reconcile_internal(
    cluster: Arc<OpenSearchCluster>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let start = Instant::now();
    info!("Reconciling OpenSearchCluster {}", cluster.name_any());
    metrics::increment_reconciliations();

    let mut context = ReconcilerContext::new(&cluster.spec.node_pools);

    let securityconfig_span = tracing::info_span!(
        "reconcile.securityconfig",
        cluster.name = %cluster.name_any(),
        cluster.namespace = %cluster.namespace().unwrap_or_default(),
    );
    let outcome = SecurityconfigReconciler::new(
        ctx.accessor.as_ref(),
        ctx.cancel.clone(),
        ctx.events.as_ref(),
        &mut context,
        &cluster,
    )
    .with_job_settings(UpdateJobSettings::from(&ctx.config))
    .reconcile()
    .instrument(securityconfig_span)
    .await;

    metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
    let result = ReconcileResult::done().merge(outcome?);

    ctx.backoff.reset(&resource_key(&cluster));
    debug!(
        node_pools = context.node_pools().len(),
        volumes = context.volumes().len(),
        settings = context.opensearch_config().len(),
        "Collected node pool fragments"
    );

    let action = result.into_action(ctx.config.secret_wait_requeue(), ctx.config.resync_interval());
    if result.is_zero() {
        debug!(
            "Cluster {} converged, next resync in {}s",
            cluster.name_any(),
            ctx.config.resync_interval_secs
        );
    } else {
        info!(
            "Cluster {} waiting on dependencies, requeueing",
            cluster.name_any()
        );
    }
    Ok(action)
}
