//! # Types
//!
//! Outcome and error types shared by the facet reconcilers.

use crate::controller::reconciler::accessor::AccessorError;
use kube_runtime::controller::Action;
use std::time::Duration;
use thiserror::Error;

/// Scheduling instruction produced by one facet reconciler
///
/// The zero value means "converged, nothing more to do this pass".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileResult {
    /// Re-run reconciliation as soon as the orchestrator allows
    pub requeue: bool,
    /// Re-run reconciliation after this delay (zero = not requested)
    pub requeue_after: Duration,
}

impl ReconcileResult {
    /// Converged result
    #[must_use]
    pub fn done() -> Self {
        Self::default()
    }

    /// Ask to be requeued immediately, typically while waiting for a dependency
    #[must_use]
    pub fn requeue_now() -> Self {
        Self {
            requeue: true,
            requeue_after: Duration::ZERO,
        }
    }

    /// Ask to be requeued after `delay`
    #[must_use]
    pub fn requeue_after(delay: Duration) -> Self {
        Self {
            requeue: false,
            requeue_after: delay,
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        !self.requeue && self.requeue_after.is_zero()
    }

    /// Combine the results of two facets of the same pass
    ///
    /// Requeue flags are OR-ed and the shortest non-zero delay wins.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        let requeue_after = match (self.requeue_after.is_zero(), other.requeue_after.is_zero()) {
            (true, _) => other.requeue_after,
            (_, true) => self.requeue_after,
            _ => self.requeue_after.min(other.requeue_after),
        };
        Self {
            requeue: self.requeue || other.requeue,
            requeue_after,
        }
    }

    /// Convert into a controller action
    ///
    /// `immediate` is the delay used for `requeue`, `resync` the delay used once converged.
    #[must_use]
    pub fn into_action(self, immediate: Duration, resync: Duration) -> Action {
        if self.requeue {
            let delay = if self.requeue_after.is_zero() {
                immediate
            } else {
                self.requeue_after.min(immediate)
            };
            Action::requeue(delay)
        } else if !self.requeue_after.is_zero() {
            Action::requeue(self.requeue_after)
        } else {
            Action::requeue(resync)
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// The resource store failed for a reason other than the expected absence of a secret
    #[error("resource store request failed: {0}")]
    Accessor(#[source] AccessorError),

    /// The pass was cancelled (shutdown or superseded) before it finished
    #[error("reconciliation cancelled")]
    Cancelled,

    /// The update job could not be built from the cluster spec
    #[error("failed to construct securityconfig update job: {0}")]
    JobConstruction(String),

    /// A stale update job exists and is still being removed
    #[error("securityconfig update job {0} is still being replaced")]
    JobReplacementPending(String),
}

impl From<AccessorError> for ReconcilerError {
    fn from(error: AccessorError) -> Self {
        match error {
            AccessorError::Cancelled => ReconcilerError::Cancelled,
            other => ReconcilerError::Accessor(other),
        }
    }
}

impl ReconcilerError {
    /// Every error of this facet is transient: the pass is retried
    #[must_use]
    pub fn requeue_result(&self) -> ReconcileResult {
        ReconcileResult::requeue_now()
    }

    /// Short label used for metrics
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            ReconcilerError::Accessor(_) => "store-error",
            ReconcilerError::Cancelled => "cancelled",
            ReconcilerError::JobConstruction(_) => "job-construction",
            ReconcilerError::JobReplacementPending(_) => "job-replacement-pending",
        }
    }
}
