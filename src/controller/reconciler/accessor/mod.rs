//! # Resource Accessor
//!
//! Thin capability over the Kubernetes object store used by the facet
//! reconcilers: get secrets, get/create/delete jobs.
//!
//! Implementations never retry internally. Absence is reported through the
//! explicit [`AccessorError::NotFound`] variant so callers never have to
//! inspect error messages.

mod kube_api;
mod memory;

pub use kube_api::KubeAccessor;
pub use memory::{InMemoryAccessor, Operation};

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Secret;
use std::future::Future;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum AccessorError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("{kind} {namespace}/{name} was modified concurrently")]
    Conflict {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("request cancelled")]
    Cancelled,

    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    #[error("{0}")]
    Store(String),
}

impl AccessorError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, AccessorError::NotFound { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, AccessorError::AlreadyExists { .. })
    }
}

/// Object store operations consumed by the reconcilers
#[async_trait]
pub trait ResourceAccessor: Send + Sync {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret, AccessorError>;

    async fn get_job(&self, namespace: &str, name: &str) -> Result<Job, AccessorError>;

    /// Create a job. Creation is atomic: a concurrent create of the same name
    /// yields [`AccessorError::AlreadyExists`].
    async fn create_job(&self, job: &Job) -> Result<Job, AccessorError>;

    /// Delete a job together with its pods
    async fn delete_job(&self, namespace: &str, name: &str) -> Result<(), AccessorError>;
}

/// Run an accessor request unless `token` is cancelled first
///
/// Cancellation wins ties so a cancelled pass never starts new requests.
pub async fn cancellable<T, F>(token: &CancellationToken, request: F) -> Result<T, AccessorError>
where
    F: Future<Output = Result<T, AccessorError>>,
{
    tokio::select! {
        biased;
        () = token.cancelled() => Err(AccessorError::Cancelled),
        result = request => result,
    }
}
