//! # Security-Config Reconciler
//!
//! Converges a cluster's security plugin configuration.
//!
//! Every pass re-reads the referenced secrets and decides from scratch:
//!
//! 1. No `security.config` on the cluster: nothing to do.
//! 2. The securityconfig secret is missing: wait for it (requeue, no error).
//! 3. No admin secret named: nothing can be applied, so stop.
//! 4. The admin secret is missing: wait for it (requeue, no error).
//! 5. Both present: make sure the update job for their content exists.
//!
//! Store failures other than "not found" are returned as errors so the
//! controller's error policy can back off.

use crate::constants::{SECURITYCONFIG_MOUNT_PATH, SECURITYCONFIG_VOLUME};
use crate::controller::events::{actions, reasons, EventPublisher};
use crate::controller::reconciler::accessor::{cancellable, ResourceAccessor};
use crate::controller::reconciler::context::ReconcilerContext;
use crate::controller::reconciler::job::{ensure_update_job, JobAction, UpdateJobSettings};
use crate::controller::reconciler::types::{ReconcileResult, ReconcilerError};
use crate::crd::{OpenSearchCluster, SecurityConfig};
use crate::observability::metrics;
use k8s_openapi::api::core::v1::{Secret, SecretVolumeSource, Volume, VolumeMount};
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Setting that lets the security plugin initialise its index from the
/// mounted configuration on first start
pub const ALLOW_DEFAULT_INIT_SETTING: &str = "plugins.security.allow_default_init_securityindex";

/// Reconciles the security configuration of one cluster for one pass
pub struct SecurityconfigReconciler<'a> {
    accessor: &'a dyn ResourceAccessor,
    cancel: CancellationToken,
    events: &'a dyn EventPublisher,
    context: &'a mut ReconcilerContext,
    cluster: &'a OpenSearchCluster,
    job_settings: UpdateJobSettings,
}

impl std::fmt::Debug for SecurityconfigReconciler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityconfigReconciler")
            .field("cluster", &self.cluster.name_any())
            .field("job_settings", &self.job_settings)
            .finish_non_exhaustive()
    }
}

impl<'a> SecurityconfigReconciler<'a> {
    pub fn new(
        accessor: &'a dyn ResourceAccessor,
        cancel: CancellationToken,
        events: &'a dyn EventPublisher,
        context: &'a mut ReconcilerContext,
        cluster: &'a OpenSearchCluster,
    ) -> Self {
        Self {
            accessor,
            cancel,
            events,
            context,
            cluster,
            job_settings: UpdateJobSettings::default(),
        }
    }

    #[must_use]
    pub fn with_job_settings(mut self, settings: UpdateJobSettings) -> Self {
        self.job_settings = settings;
        self
    }

    /// Run one pass
    ///
    /// # Errors
    ///
    /// Returns an error for store failures other than a missing secret,
    /// for cancellation, and for job construction or replacement problems.
    /// Every error implies a requeue.
    pub async fn reconcile(&mut self) -> Result<ReconcileResult, ReconcilerError> {
        let Some(config) = self
            .cluster
            .spec
            .security
            .as_ref()
            .and_then(|s| s.config.clone())
        else {
            debug!("Security config not set, nothing to reconcile");
            return Ok(ReconcileResult::done());
        };

        if !config.securityconfig_secret.is_set() {
            warn!("security.config is present but securityconfigSecret has no name");
            return Ok(ReconcileResult::done());
        }

        self.register_securityconfig(&config);

        let Some(config_secret) = self.fetch_secret(&config.securityconfig_secret.name).await?
        else {
            info!(
                secret = %config.securityconfig_secret.name,
                "Securityconfig secret not found, waiting for it"
            );
            self.publish_warning(
                reasons::SECURITYCONFIG_SECRET_MISSING,
                format!("secret {} not found", config.securityconfig_secret.name),
            )
            .await;
            metrics::increment_requeues_total("securityconfig-secret-missing");
            return Ok(ReconcileResult::requeue_now());
        };

        if !config.admin_secret.is_set() {
            info!("No admin secret set, securityconfig will not be applied");
            return Ok(ReconcileResult::done());
        }

        let Some(admin_secret) = self.fetch_secret(&config.admin_secret.name).await? else {
            info!(
                secret = %config.admin_secret.name,
                "Admin secret not found, waiting for it"
            );
            self.publish_warning(
                reasons::ADMIN_SECRET_MISSING,
                format!("secret {} not found", config.admin_secret.name),
            )
            .await;
            metrics::increment_requeues_total("admin-secret-missing");
            return Ok(ReconcileResult::requeue_now());
        };

        let action = ensure_update_job(
            self.accessor,
            &self.cancel,
            self.cluster,
            &config_secret,
            &admin_secret,
            &self.job_settings,
        )
        .await?;
        metrics::increment_securityconfig_jobs(action.as_str());

        let reason = match action {
            JobAction::Created => Some(reasons::SECURITYCONFIG_JOB_CREATED),
            JobAction::Replaced => Some(reasons::SECURITYCONFIG_JOB_REPLACED),
            JobAction::Unchanged => None,
        };
        if let Some(reason) = reason {
            self.events
                .publish(
                    &self.cluster.object_ref(&()),
                    EventType::Normal,
                    reason,
                    actions::APPLY_SECURITYCONFIG,
                    Some(format!("securityconfig update job {}", action.as_str())),
                )
                .await;
        }

        Ok(ReconcileResult::done())
    }

    /// Mount the securityconfig secret into the node pods and let the plugin
    /// initialise from it
    fn register_securityconfig(&mut self, config: &SecurityConfig) {
        let volume = Volume {
            name: SECURITYCONFIG_VOLUME.to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(config.securityconfig_secret.name.clone()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mount = VolumeMount {
            name: SECURITYCONFIG_VOLUME.to_string(),
            mount_path: SECURITYCONFIG_MOUNT_PATH.to_string(),
            read_only: Some(true),
            ..Default::default()
        };
        self.context.add_volume(volume, mount);
        self.context.add_config(ALLOW_DEFAULT_INIT_SETTING, "true");
    }

    /// `Ok(None)` when the secret does not exist
    async fn fetch_secret(&self, name: &str) -> Result<Option<Secret>, ReconcilerError> {
        let namespace = self.cluster.namespace().unwrap_or_default();
        match cancellable(&self.cancel, self.accessor.get_secret(&namespace, name)).await {
            Ok(secret) => Ok(Some(secret)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => {
                warn!(secret = %name, error = %e, "Failed to read secret");
                Err(e.into())
            }
        }
    }

    async fn publish_warning(&self, reason: &str, note: String) {
        self.events
            .publish(
                &self.cluster.object_ref(&()),
                EventType::Warning,
                reason,
                actions::RECONCILE,
                Some(note),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::events::{NoopEventPublisher, RecordingEventPublisher};
    use crate::controller::reconciler::accessor::{InMemoryAccessor, Operation};
    use crate::crd::{ClusterSpec, SecretRef, Security};

    fn cluster(security: Option<Security>) -> OpenSearchCluster {
        let mut c = OpenSearchCluster::new(
            "logs",
            ClusterSpec {
                security,
                ..Default::default()
            },
        );
        c.metadata.namespace = Some("search".to_string());
        c.metadata.uid = Some("uid-1".to_string());
        c
    }

    fn security(config: &str, admin: &str) -> Option<Security> {
        Some(Security {
            config: Some(SecurityConfig {
                securityconfig_secret: SecretRef::new(config),
                admin_secret: SecretRef::new(admin),
            }),
        })
    }

    #[tokio::test]
    async fn test_disabled_touches_nothing() {
        let store = InMemoryAccessor::new();
        let c = cluster(None);
        let mut ctx = ReconcilerContext::new(&[]);
        let result = SecurityconfigReconciler::new(
            &store,
            CancellationToken::new(),
            &NoopEventPublisher,
            &mut ctx,
            &c,
        )
        .reconcile()
        .await
        .expect("no error");

        assert!(result.is_zero());
        assert_eq!(store.calls(Operation::GetSecret), 0);
        assert!(ctx.volumes().is_empty());
        assert!(ctx.opensearch_config().is_empty());
    }

    #[tokio::test]
    async fn test_missing_config_secret_requeues_without_error() {
        let store = InMemoryAccessor::new();
        store.put_secret("search", "admin", &[("tls.crt", "x")]);
        let c = cluster(security("sc", "admin"));
        let events = RecordingEventPublisher::new();
        let mut ctx = ReconcilerContext::new(&[]);

        let result = SecurityconfigReconciler::new(
            &store,
            CancellationToken::new(),
            &events,
            &mut ctx,
            &c,
        )
        .reconcile()
        .await
        .expect("no error");

        assert!(result.requeue);
        // Config secret is resolved first, the admin secret is never read
        assert_eq!(store.calls(Operation::GetSecret), 1);
        assert!(store.jobs("search").is_empty());
        assert_eq!(events.reasons(), vec![reasons::SECURITYCONFIG_SECRET_MISSING]);
        // Volume is registered even while waiting
        assert_eq!(ctx.volumes().len(), 1);
    }

    #[tokio::test]
    async fn test_registers_volume_and_setting_once() {
        let store = InMemoryAccessor::new();
        store.put_secret("search", "sc", &[("config.yml", "a")]);
        let c = cluster(security("sc", ""));
        let mut ctx = ReconcilerContext::new(&[]);

        for _ in 0..2 {
            SecurityconfigReconciler::new(
                &store,
                CancellationToken::new(),
                &NoopEventPublisher,
                &mut ctx,
                &c,
            )
            .reconcile()
            .await
            .expect("no error");
        }

        assert_eq!(ctx.volumes().len(), 1);
        assert_eq!(ctx.volume_mounts()[0].mount_path, SECURITYCONFIG_MOUNT_PATH);
        assert_eq!(
            ctx.opensearch_config().get(ALLOW_DEFAULT_INIT_SETTING).map(String::as_str),
            Some("true")
        );
    }

    #[tokio::test]
    async fn test_job_settings_are_applied() {
        let store = InMemoryAccessor::new();
        store.put_secret("search", "sc", &[("config.yml", "a")]);
        store.put_secret("search", "admin", &[("tls.crt", "x")]);
        let c = cluster(security("sc", "admin"));
        let mut ctx = ReconcilerContext::new(&[]);
        let settings = UpdateJobSettings {
            backoff_limit: 3,
            ..Default::default()
        };

        SecurityconfigReconciler::new(
            &store,
            CancellationToken::new(),
            &NoopEventPublisher,
            &mut ctx,
            &c,
        )
        .with_job_settings(settings)
        .reconcile()
        .await
        .expect("no error");

        let job = store.job("search", "logs-securityconfig-update").expect("job");
        assert_eq!(job.spec.and_then(|s| s.backoff_limit), Some(3));
    }
}
