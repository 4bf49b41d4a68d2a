//! # Reconciler
//!
//! Reconciliation of `OpenSearchCluster` resources.
//!
//! A pass runs each facet against a fresh [`context::ReconcilerContext`]:
//!
//! 1. **Security config**: waits for the securityconfig and admin secrets and
//!    keeps a `securityadmin.sh` job in sync with their content.
//!
//! Facets talk to Kubernetes only through [`accessor::ResourceAccessor`].

pub mod accessor;
pub mod context;
pub mod job;
pub mod reconcile;
pub mod securityconfig;
pub mod types;

pub use accessor::{AccessorError, InMemoryAccessor, KubeAccessor, ResourceAccessor};
pub use context::ReconcilerContext;
pub use job::{JobAction, UpdateJobSettings};
pub use reconcile::{backoff_key, reconcile, resource_key, Reconciler};
pub use securityconfig::SecurityconfigReconciler;
pub use types::{ReconcileResult, ReconcilerError};
