//! # Prelude
//!
//! Re-exports commonly used types and traits.
//!
//! ```rust
//! use opensearch_operator::prelude::*;
//! ```
//!
//! Brings into scope the CRD types, the reconciler and its outcome types,
//! the resource accessor and event publisher seams, and [`ControllerConfig`].

pub use crate::crd::*;

pub use crate::controller::reconciler::{
    reconcile, AccessorError, InMemoryAccessor, JobAction, KubeAccessor, ReconcileResult,
    Reconciler, ReconcilerContext, ReconcilerError, ResourceAccessor, SecurityconfigReconciler,
    UpdateJobSettings,
};

pub use crate::controller::events::{
    EventPublisher, KubeEventPublisher, NoopEventPublisher, RecordingEventPublisher,
};

pub use crate::config::ControllerConfig;
