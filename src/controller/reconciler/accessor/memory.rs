//! In-process object store
//!
//! Behaves like the API server for the handful of operations the reconcilers
//! use: atomic create, NotFound on missing objects, resource versions and UIDs
//! assigned on write. Used by tests and dry runs.

use super::{AccessorError, ResourceAccessor};
use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::ResourceExt;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Accessor operations, used for failure injection and call accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetSecret,
    GetJob,
    CreateJob,
    DeleteJob,
}

type Key = (String, String);

#[derive(Debug, Default)]
struct Store {
    secrets: BTreeMap<Key, Secret>,
    jobs: BTreeMap<Key, Job>,
    failures: HashMap<Operation, VecDeque<String>>,
    calls: HashMap<Operation, usize>,
    latency: Option<Duration>,
    revision: u64,
}

impl Store {
    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    /// Record a call and pop an injected failure, if any
    fn enter(&mut self, operation: Operation) -> Result<(), AccessorError> {
        *self.calls.entry(operation).or_default() += 1;
        match self
            .failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            Some(message) => Err(AccessorError::Store(message)),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryAccessor {
    store: Arc<Mutex<Store>>,
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn not_found(kind: &'static str, namespace: &str, name: &str) -> AccessorError {
    AccessorError::NotFound {
        kind,
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

impl InMemoryAccessor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a secret with the given string data
    pub fn put_secret(&self, namespace: &str, name: &str, data: &[(&str, &str)]) {
        let data: BTreeMap<String, ByteString> = data
            .iter()
            .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
            .collect();
        self.insert_secret(Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            data: Some(data),
            ..Default::default()
        });
    }

    /// Insert or replace a secret
    pub fn insert_secret(&self, mut secret: Secret) {
        let namespace = secret.namespace().unwrap_or_else(|| "default".to_string());
        let name = secret.name_any();
        let mut store = self.store();
        let revision = store.next_revision();
        secret.metadata.resource_version = Some(revision.to_string());
        store.secrets.insert(key(&namespace, &name), secret);
    }

    pub fn remove_secret(&self, namespace: &str, name: &str) {
        self.store().secrets.remove(&key(namespace, name));
    }

    /// Seed a job directly, bypassing call accounting
    pub fn insert_job(&self, mut job: Job) {
        let namespace = job.namespace().unwrap_or_else(|| "default".to_string());
        let name = job.name_any();
        let mut store = self.store();
        let revision = store.next_revision();
        job.metadata.resource_version = Some(revision.to_string());
        job.metadata.uid.get_or_insert_with(|| format!("job-uid-{revision}"));
        store.jobs.insert(key(&namespace, &name), job);
    }

    #[must_use]
    pub fn job(&self, namespace: &str, name: &str) -> Option<Job> {
        self.store().jobs.get(&key(namespace, name)).cloned()
    }

    /// All jobs stored in `namespace`
    #[must_use]
    pub fn jobs(&self, namespace: &str) -> Vec<Job> {
        self.store()
            .jobs
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, job)| job.clone())
            .collect()
    }

    /// Make the next call of `operation` fail with a store error
    pub fn fail_next(&self, operation: Operation, message: &str) {
        self.store()
            .failures
            .entry(operation)
            .or_default()
            .push_back(message.to_string());
    }

    /// Number of calls made for `operation`, including failed ones
    #[must_use]
    pub fn calls(&self, operation: Operation) -> usize {
        self.store().calls.get(&operation).copied().unwrap_or(0)
    }

    /// Delay every request by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.store().latency = Some(latency);
    }

    async fn simulate_latency(&self) {
        let latency = self.store().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ResourceAccessor for InMemoryAccessor {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, AccessorError> {
        self.simulate_latency().await;
        let mut store = self.store();
        store.enter(Operation::GetSecret)?;
        store
            .secrets
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| not_found("Secret", namespace, name))
    }

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Job, AccessorError> {
        self.simulate_latency().await;
        let mut store = self.store();
        store.enter(Operation::GetJob)?;
        store
            .jobs
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| not_found("Job", namespace, name))
    }

    async fn create_job(&self, job: &Job) -> Result<Job, AccessorError> {
        self.simulate_latency().await;
        let namespace = job.namespace().unwrap_or_else(|| "default".to_string());
        let name = job.name_any();
        let mut store = self.store();
        store.enter(Operation::CreateJob)?;
        let job_key = key(&namespace, &name);
        if store.jobs.contains_key(&job_key) {
            return Err(AccessorError::AlreadyExists {
                kind: "Job",
                namespace,
                name,
            });
        }
        let revision = store.next_revision();
        let mut created = job.clone();
        created.metadata.namespace = Some(namespace);
        created.metadata.resource_version = Some(revision.to_string());
        created.metadata.uid = Some(format!("job-uid-{revision}"));
        store.jobs.insert(job_key, created.clone());
        Ok(created)
    }

    async fn delete_job(&self, namespace: &str, name: &str) -> Result<(), AccessorError> {
        self.simulate_latency().await;
        let mut store = self.store();
        store.enter(Operation::DeleteJob)?;
        store
            .jobs
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| not_found("Job", namespace, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(namespace: &str, name: &str) -> Job {
        Job {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_secret_is_not_found() {
        let store = InMemoryAccessor::new();
        let err = store.get_secret("ns", "missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.calls(Operation::GetSecret), 1);
    }

    #[tokio::test]
    async fn test_put_secret_round_trips_data() {
        let store = InMemoryAccessor::new();
        store.put_secret("ns", "sc", &[("config.yml", "foobar")]);
        let secret = store.get_secret("ns", "sc").await.expect("secret exists");
        let data = secret.data.expect("data");
        assert_eq!(data["config.yml"].0, b"foobar".to_vec());
        assert!(store.get_secret("other", "sc").await.is_err());
    }

    #[tokio::test]
    async fn test_create_is_already_exists_safe() {
        let store = InMemoryAccessor::new();
        let created = store.create_job(&job("ns", "j")).await.expect("created");
        assert!(created.metadata.uid.is_some());
        let err = store.create_job(&job("ns", "j")).await.unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(store.jobs("ns").len(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_job() {
        let store = InMemoryAccessor::new();
        store.insert_job(job("ns", "j"));
        store.delete_job("ns", "j").await.expect("deleted");
        assert!(store.job("ns", "j").is_none());
        assert!(store.delete_job("ns", "j").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once() {
        let store = InMemoryAccessor::new();
        store.put_secret("ns", "sc", &[]);
        store.fail_next(Operation::GetSecret, "etcd unavailable");
        let err = store.get_secret("ns", "sc").await.unwrap_err();
        assert!(matches!(err, AccessorError::Store(ref m) if m == "etcd unavailable"));
        assert!(store.get_secret("ns", "sc").await.is_ok());
    }
}
