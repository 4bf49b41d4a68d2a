//! `kube::Api` backed accessor used by the running operator.

use super::{AccessorError, ResourceAccessor};
use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams, PostParams};
use kube::{Client, ResourceExt};
use tracing::debug;

#[derive(Clone)]
pub struct KubeAccessor {
    client: Client,
}

impl std::fmt::Debug for KubeAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeAccessor").finish_non_exhaustive()
    }
}

impl KubeAccessor {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Map API status codes onto accessor error kinds
///
/// A 409 is only an `AlreadyExists` when the API server says so; other 409s
/// are write conflicts.
fn classify(error: kube::Error, kind: &'static str, namespace: &str, name: &str) -> AccessorError {
    match error {
        kube::Error::Api(ref status) if status.code == 404 => AccessorError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(ref status) if status.code == 409 && status.reason == "AlreadyExists" => {
            AccessorError::AlreadyExists {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
            }
        }
        kube::Error::Api(ref status) if status.code == 409 => AccessorError::Conflict {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        other => AccessorError::Api(other),
    }
}

#[async_trait]
impl ResourceAccessor for KubeAccessor {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, AccessorError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name)
            .await
            .map_err(|e| classify(e, "Secret", namespace, name))?
            .ok_or_else(|| AccessorError::NotFound {
                kind: "Secret",
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Job, AccessorError> {
        let api: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name)
            .await
            .map_err(|e| classify(e, "Job", namespace, name))?
            .ok_or_else(|| AccessorError::NotFound {
                kind: "Job",
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn create_job(&self, job: &Job) -> Result<Job, AccessorError> {
        let namespace = job.namespace().unwrap_or_else(|| "default".to_string());
        let name = job.name_any();
        let api: Api<Job> = Api::namespaced(self.client.clone(), &namespace);
        let created = api
            .create(&PostParams::default(), job)
            .await
            .map_err(|e| classify(e, "Job", &namespace, &name))?;
        debug!("Created Job {}/{}", namespace, name);
        Ok(created)
    }

    async fn delete_job(&self, namespace: &str, name: &str) -> Result<(), AccessorError> {
        let api: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        // Background propagation removes the job's pods as well
        api.delete(name, &DeleteParams::background())
            .await
            .map_err(|e| classify(e, "Job", namespace, name))?;
        debug!("Deleted Job {}/{}", namespace, name);
        Ok(())
    }
}
