//! OpenSearch Operator Library
//!
//! Reconciliation logic of the OpenSearch Kubernetes operator.
//! Tests live beside the code and in `tests/`.
//!
//! ## Quick Start
//!
//! ```rust
//! use opensearch_operator::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
