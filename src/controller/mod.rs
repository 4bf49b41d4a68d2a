//! # Controller
//!
//! Core controller modules of the OpenSearch operator.
//!
//! - `backoff`: Fibonacci backoff for failing clusters
//! - `events`: Kubernetes Event publishing
//! - `reconciler`: Core reconciliation logic
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod events;
pub mod reconciler;
pub mod server;
