//! # Security-Config Update Job
//!
//! Builds and idempotently applies the one-shot job that runs the security
//! plugin's admin tool against a cluster.
//!
//! The job is named `<cluster>-securityconfig-update` and carries a SHA-256
//! fingerprint of the two secrets it mounts. An existing job with the same
//! fingerprint is left alone; a job with a different fingerprint is deleted
//! and recreated, since jobs cannot be re-run in place.

use crate::config::ControllerConfig;
use crate::constants::{
    ADMIN_CERT_MOUNT_PATH, ADMIN_CERT_VOLUME, CLUSTER_LABEL, DEFAULT_SECURITYCONFIG_JOB_BACKOFF_LIMIT,
    DEFAULT_SECURITYCONFIG_JOB_TTL_SECS, MANAGED_BY_LABEL, SECURITYADMIN_SCRIPT,
    SECURITYCONFIG_CHECKSUM_ANNOTATION, SECURITYCONFIG_JOB_SUFFIX, SECURITYCONFIG_MOUNT_PATH,
    SECURITYCONFIG_VOLUME, TRANSPORT_PORT,
};
use crate::controller::reconciler::accessor::{cancellable, ResourceAccessor};
use crate::controller::reconciler::types::ReconcilerError;
use crate::crd::OpenSearchCluster;
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, PodSpec, PodTemplateSpec, Secret, SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What [`ensure_update_job`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobAction {
    Created,
    Replaced,
    Unchanged,
}

impl JobAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            JobAction::Created => "created",
            JobAction::Replaced => "replaced",
            JobAction::Unchanged => "unchanged",
        }
    }
}

/// Tunables of the update job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateJobSettings {
    /// Image override; the cluster's own image is used when unset
    pub image: Option<String>,
    pub backoff_limit: i32,
    pub ttl_seconds_after_finished: i32,
    /// Field manager / managed-by label value
    pub managed_by: String,
}

impl Default for UpdateJobSettings {
    fn default() -> Self {
        Self {
            image: None,
            backoff_limit: DEFAULT_SECURITYCONFIG_JOB_BACKOFF_LIMIT,
            ttl_seconds_after_finished: DEFAULT_SECURITYCONFIG_JOB_TTL_SECS,
            managed_by: crate::constants::DEFAULT_CONTROLLER_NAME.to_string(),
        }
    }
}

impl From<&ControllerConfig> for UpdateJobSettings {
    fn from(config: &ControllerConfig) -> Self {
        Self {
            image: config.securityconfig_job_image.clone(),
            backoff_limit: config.securityconfig_job_backoff_limit,
            ttl_seconds_after_finished: config.securityconfig_job_ttl_secs,
            managed_by: config.controller_name.clone(),
        }
    }
}

/// Deterministic name of a cluster's update job
#[must_use]
pub fn update_job_name(cluster_name: &str) -> String {
    format!("{cluster_name}-{SECURITYCONFIG_JOB_SUFFIX}")
}

/// Fingerprint of the content the update job applies
///
/// Covers both secrets' names and every data entry. Entries are length
/// prefixed so that moving bytes between keys changes the digest.
#[must_use]
pub fn content_fingerprint(config_secret: &Secret, admin_secret: &Secret) -> String {
    let mut hasher = Sha256::new();
    for secret in [config_secret, admin_secret] {
        hash_field(&mut hasher, b"name", secret.name_any().as_bytes());
        if let Some(data) = &secret.data {
            for (key, value) in data {
                hash_field(&mut hasher, key.as_bytes(), &value.0);
            }
        }
        if let Some(string_data) = &secret.string_data {
            for (key, value) in string_data {
                hash_field(&mut hasher, key.as_bytes(), value.as_bytes());
            }
        }
    }
    format!("{:x}", hasher.finalize())
}

fn hash_field(hasher: &mut Sha256, key: &[u8], value: &[u8]) {
    hasher.update((key.len() as u64).to_be_bytes());
    hasher.update(key);
    hasher.update((value.len() as u64).to_be_bytes());
    hasher.update(value);
}

/// Fingerprint recorded on an existing job, if any
#[must_use]
pub fn job_fingerprint(job: &Job) -> Option<&str> {
    job.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(SECURITYCONFIG_CHECKSUM_ANNOTATION))
        .map(String::as_str)
}

/// Shell script run by the update job
///
/// Waits for the HTTP endpoint, then retries `securityadmin.sh` against the
/// transport port until it succeeds or 20 attempts have failed.
fn apply_script(cluster: &OpenSearchCluster) -> String {
    let host = cluster.service_dns_name();
    let http_port = cluster.spec.general.http_port;
    format!(
        "ADMIN={SECURITYADMIN_SCRIPT};\
         chmod +x $ADMIN;\
         until curl -k --silent https://{host}:{http_port}; do echo 'Waiting to connect to the cluster'; sleep 20; done;\
         count=0;\
         until $ADMIN -cacert {ADMIN_CERT_MOUNT_PATH}/ca.crt -cert {ADMIN_CERT_MOUNT_PATH}/tls.crt -key {ADMIN_CERT_MOUNT_PATH}/tls.key \
         -cd {SECURITYCONFIG_MOUNT_PATH} -icl -nhnv -h {host} -p {TRANSPORT_PORT} || (( count++ >= 20 )); do sleep 20; done"
    )
}

fn secret_volume(volume_name: &str, secret_name: &str) -> Volume {
    Volume {
        name: volume_name.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(secret_name.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build the update job for `cluster`
///
/// # Errors
///
/// Returns [`ReconcilerError::JobConstruction`] when the cluster has no
/// namespace or UID (the job could not be owned by it).
pub fn build_update_job(
    cluster: &OpenSearchCluster,
    config_secret_name: &str,
    admin_secret_name: &str,
    fingerprint: &str,
    settings: &UpdateJobSettings,
) -> Result<Job, ReconcilerError> {
    let cluster_name = cluster.name_any();
    let namespace = cluster.namespace().ok_or_else(|| {
        ReconcilerError::JobConstruction(format!("cluster {cluster_name} has no namespace"))
    })?;
    let owner = cluster.controller_owner_ref(&()).ok_or_else(|| {
        ReconcilerError::JobConstruction(format!("cluster {cluster_name} has no uid"))
    })?;

    let labels = BTreeMap::from([
        (CLUSTER_LABEL.to_string(), cluster_name.clone()),
        (MANAGED_BY_LABEL.to_string(), settings.managed_by.clone()),
    ]);
    let annotations = BTreeMap::from([(
        SECURITYCONFIG_CHECKSUM_ANNOTATION.to_string(),
        fingerprint.to_string(),
    )]);

    let container = Container {
        name: "updater".to_string(),
        image: Some(settings.image.clone().unwrap_or_else(|| cluster.image())),
        command: Some(vec!["/bin/bash".to_string(), "-c".to_string()]),
        args: Some(vec![apply_script(cluster)]),
        volume_mounts: Some(vec![
            VolumeMount {
                name: ADMIN_CERT_VOLUME.to_string(),
                mount_path: ADMIN_CERT_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            },
            VolumeMount {
                name: SECURITYCONFIG_VOLUME.to_string(),
                mount_path: SECURITYCONFIG_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            },
        ]),
        ..Default::default()
    };

    Ok(Job {
        metadata: ObjectMeta {
            name: Some(update_job_name(&cluster_name)),
            namespace: Some(namespace),
            labels: Some(labels.clone()),
            annotations: Some(annotations),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(settings.backoff_limit),
            ttl_seconds_after_finished: Some(settings.ttl_seconds_after_finished),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    volumes: Some(vec![
                        secret_volume(ADMIN_CERT_VOLUME, admin_secret_name),
                        secret_volume(SECURITYCONFIG_VOLUME, config_secret_name),
                    ]),
                    restart_policy: Some("Never".to_string()),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Make sure an update job for the current secret content exists
///
/// # Errors
///
/// Store failures are returned unmodified (wrapped in [`ReconcilerError`]);
/// no retries happen here.
pub async fn ensure_update_job(
    accessor: &dyn ResourceAccessor,
    cancel: &CancellationToken,
    cluster: &OpenSearchCluster,
    config_secret: &Secret,
    admin_secret: &Secret,
    settings: &UpdateJobSettings,
) -> Result<JobAction, ReconcilerError> {
    let fingerprint = content_fingerprint(config_secret, admin_secret);
    let desired = build_update_job(
        cluster,
        &config_secret.name_any(),
        &admin_secret.name_any(),
        &fingerprint,
        settings,
    )?;
    let name = desired.name_any();
    let namespace = desired.namespace().unwrap_or_default();

    match cancellable(cancel, accessor.get_job(&namespace, &name)).await {
        Ok(existing) => {
            if job_fingerprint(&existing) == Some(fingerprint.as_str()) {
                debug!("Job {}/{} is up to date", namespace, name);
                return Ok(JobAction::Unchanged);
            }
            info!(
                "Job {}/{} was created for different secret content, replacing it",
                namespace, name
            );
            match cancellable(cancel, accessor.delete_job(&namespace, &name)).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
            create_job(accessor, cancel, &desired, &fingerprint).await?;
            Ok(JobAction::Replaced)
        }
        Err(e) if e.is_not_found() => {
            create_job(accessor, cancel, &desired, &fingerprint).await?;
            Ok(JobAction::Created)
        }
        Err(e) => Err(e.into()),
    }
}

/// Create `job`, treating a concurrent create of the same content as success
async fn create_job(
    accessor: &dyn ResourceAccessor,
    cancel: &CancellationToken,
    job: &Job,
    fingerprint: &str,
) -> Result<(), ReconcilerError> {
    let name = job.name_any();
    let namespace = job.namespace().unwrap_or_default();
    match cancellable(cancel, accessor.create_job(job)).await {
        Ok(_) => {
            info!("Created securityconfig update job {}/{}", namespace, name);
            Ok(())
        }
        Err(e) if e.is_already_exists() => {
            // Either a concurrent pass created the same job, or the replaced job
            // is still terminating.
            match cancellable(cancel, accessor.get_job(&namespace, &name)).await {
                Ok(current) if job_fingerprint(&current) == Some(fingerprint) => {
                    debug!("Job {}/{} was created concurrently", namespace, name);
                    Ok(())
                }
                Ok(_) => {
                    warn!("Stale job {}/{} has not been removed yet", namespace, name);
                    Err(ReconcilerError::JobReplacementPending(name))
                }
                Err(e) if e.is_not_found() => Err(ReconcilerError::JobReplacementPending(name)),
                Err(e) => Err(e.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}
