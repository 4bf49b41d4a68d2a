//! # Custom Resource Definitions
//!
//! CRD types for the OpenSearch operator.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `OpenSearchCluster` specification, general settings and node pools
//! - `security.rs` - Security block and secret references
//! - `status.rs` - Status types written by the orchestrator

mod security;
mod spec;
mod status;

// Re-export all public types
pub use security::{SecretRef, Security, SecurityConfig};
pub use spec::{
    default_http_port, default_version, ClusterSpec, GeneralConfig, NodePool, OpenSearchCluster,
};
pub use status::{ClusterCondition, OpenSearchClusterStatus};
