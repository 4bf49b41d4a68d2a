//! # CRD Generator
//!
//! Prints the `OpenSearchCluster` CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/opensearchcluster.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use anyhow::{Context, Result};
use kube::core::CustomResourceExt;
use opensearch_operator::crd::OpenSearchCluster;

fn main() -> Result<()> {
    let yaml = serde_yaml::to_string(&OpenSearchCluster::crd())
        .context("Failed to serialize OpenSearchCluster CRD")?;
    print!("{yaml}");
    Ok(())
}
