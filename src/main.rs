//! # OpenSearch Operator
//!
//! Kubernetes operator converging `OpenSearchCluster` resources.
//!
//! For every cluster that sets `spec.security.config`, the operator waits for
//! the referenced securityconfig and admin certificate secrets and keeps a
//! one-shot `securityadmin.sh` job in sync with their content.
//!
//! Configuration is read from environment variables, see
//! [`opensearch_operator::config::ControllerConfig`].

use anyhow::Result;
use opensearch_operator::runtime::{initialize, run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    run_watch_loop(init).await
}
