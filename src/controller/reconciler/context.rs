//! # Reconciler Context
//!
//! Per-pass state shared by the facet reconcilers of one cluster.
//!
//! The orchestrator creates a fresh context for every pass and hands it to
//! each facet by `&mut`. Facets read the node-pool topology and contribute
//! fragments (opensearch.yml settings, extra pod volumes) that later facets
//! render into node pods. Nothing is retained across passes.

use crate::crd::NodePool;
use k8s_openapi::api::core::v1::{Volume, VolumeMount};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct ReconcilerContext {
    node_pools: Vec<NodePool>,
    opensearch_config: BTreeMap<String, String>,
    volumes: Vec<Volume>,
    volume_mounts: Vec<VolumeMount>,
}

impl ReconcilerContext {
    #[must_use]
    pub fn new(node_pools: &[NodePool]) -> Self {
        Self {
            node_pools: node_pools.to_vec(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn node_pools(&self) -> &[NodePool] {
        &self.node_pools
    }

    /// Add an opensearch.yml setting; later writes to the same key win
    pub fn add_config(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.opensearch_config.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn opensearch_config(&self) -> &BTreeMap<String, String> {
        &self.opensearch_config
    }

    /// Register a pod volume and its mount for the node pods
    ///
    /// Registering a volume name twice keeps the first registration.
    pub fn add_volume(&mut self, volume: Volume, mount: VolumeMount) {
        if self.volumes.iter().any(|v| v.name == volume.name) {
            return;
        }
        self.volumes.push(volume);
        self.volume_mounts.push(mount);
    }

    #[must_use]
    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    #[must_use]
    pub fn volume_mounts(&self) -> &[VolumeMount] {
        &self.volume_mounts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume(name: &str) -> (Volume, VolumeMount) {
        (
            Volume {
                name: name.to_string(),
                ..Default::default()
            },
            VolumeMount {
                name: name.to_string(),
                mount_path: format!("/mnt/{name}"),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_new_captures_node_pools() {
        let pools = vec![NodePool {
            component: "masters".to_string(),
            replicas: 3,
            roles: vec!["cluster_manager".to_string()],
        }];
        let ctx = ReconcilerContext::new(&pools);
        assert_eq!(ctx.node_pools(), pools.as_slice());
        assert!(ctx.volumes().is_empty());
        assert!(ctx.opensearch_config().is_empty());
    }

    #[test]
    fn test_add_volume_ignores_duplicates() {
        let mut ctx = ReconcilerContext::default();
        let (v, m) = volume("securityconfig");
        ctx.add_volume(v.clone(), m.clone());
        ctx.add_volume(v, m);
        assert_eq!(ctx.volumes().len(), 1);
        assert_eq!(ctx.volume_mounts().len(), 1);
    }

    #[test]
    fn test_add_config_overwrites() {
        let mut ctx = ReconcilerContext::default();
        ctx.add_config("plugins.security.ssl.http.enabled", "false");
        ctx.add_config("plugins.security.ssl.http.enabled", "true");
        assert_eq!(
            ctx.opensearch_config()
                .get("plugins.security.ssl.http.enabled")
                .map(String::as_str),
            Some("true")
        );
    }
}
