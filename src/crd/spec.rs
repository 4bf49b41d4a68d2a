//! # OpenSearchCluster Spec
//!
//! Desired state of a single OpenSearch cluster.

use crate::constants::{DEFAULT_HTTP_PORT, DEFAULT_OPENSEARCH_IMAGE_REPOSITORY};
use crate::crd::{OpenSearchClusterStatus, Security};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// OpenSearchCluster Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: opensearch.opster.io/v1
/// kind: OpenSearchCluster
/// metadata:
///   name: logs
///   namespace: search
/// spec:
///   general:
///     serviceName: logs
///     version: 2.11.0
///   security:
///     config:
///       securityconfigSecret:
///         name: logs-securityconfig
///       adminSecret:
///         name: logs-admin-cert
///   nodePools:
///     - component: masters
///       replicas: 3
///       roles: ["cluster_manager", "data"]
/// ```
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "OpenSearchCluster",
    group = "opensearch.opster.io",
    version = "v1",
    namespaced,
    status = "OpenSearchClusterStatus",
    shortname = "os",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Cluster-wide settings
    #[serde(default)]
    pub general: GeneralConfig,
    /// Security plugin settings. Absent means the security facet is disabled.
    #[serde(default)]
    pub security: Option<Security>,
    /// Node pools making up the cluster
    #[serde(default)]
    pub node_pools: Vec<NodePool>,
}

/// Cluster-wide settings
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneralConfig {
    /// Name of the cluster service. Defaults to the cluster name when empty.
    #[serde(default)]
    pub service_name: String,
    /// HTTP port exposed by the cluster service
    #[serde(default = "default_http_port")]
    pub http_port: i32,
    /// OpenSearch version, used as image tag when `image` is not set
    #[serde(default = "default_version")]
    pub version: String,
    /// Full image reference overriding `version`
    #[serde(default)]
    pub image: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            service_name: String::new(),
            http_port: default_http_port(),
            version: default_version(),
            image: None,
        }
    }
}

/// A group of identically configured OpenSearch nodes
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodePool {
    pub component: String,
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[must_use]
pub fn default_http_port() -> i32 {
    DEFAULT_HTTP_PORT
}

#[must_use]
pub fn default_version() -> String {
    "latest".to_string()
}

impl OpenSearchCluster {
    /// Name of the Kubernetes service fronting the cluster
    #[must_use]
    pub fn service_name(&self) -> String {
        if self.spec.general.service_name.is_empty() {
            self.name_any()
        } else {
            self.spec.general.service_name.clone()
        }
    }

    /// In-cluster DNS name of the cluster service
    #[must_use]
    pub fn service_dns_name(&self) -> String {
        format!(
            "{}.{}.svc.cluster.local",
            self.service_name(),
            self.namespace().unwrap_or_else(|| "default".to_string())
        )
    }

    /// OpenSearch image the cluster runs
    #[must_use]
    pub fn image(&self) -> String {
        self.spec.general.image.clone().unwrap_or_else(|| {
            format!(
                "{}:{}",
                DEFAULT_OPENSEARCH_IMAGE_REPOSITORY, self.spec.general.version
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(yaml: &str) -> OpenSearchCluster {
        serde_yaml::from_str(yaml).expect("valid cluster manifest")
    }

    #[test]
    fn test_defaults_when_general_is_omitted() {
        let c = cluster(
            r"
apiVersion: opensearch.opster.io/v1
kind: OpenSearchCluster
metadata:
  name: logs
  namespace: search
spec: {}
",
        );
        assert!(c.spec.security.is_none());
        assert_eq!(c.spec.general.http_port, 9200);
        assert_eq!(c.service_name(), "logs");
        assert_eq!(c.service_dns_name(), "logs.search.svc.cluster.local");
        assert_eq!(c.image(), "docker.io/opensearchproject/opensearch:latest");
    }

    #[test]
    fn test_security_config_deserializes_camel_case() {
        let c = cluster(
            r"
apiVersion: opensearch.opster.io/v1
kind: OpenSearchCluster
metadata:
  name: logs
  namespace: search
spec:
  general:
    serviceName: logs-svc
    version: 2.11.0
  security:
    config:
      securityconfigSecret:
        name: sc
      adminSecret:
        name: admin
",
        );
        let config = c
            .spec
            .security
            .as_ref()
            .and_then(|s| s.config.as_ref())
            .expect("security config present");
        assert_eq!(config.securityconfig_secret.name, "sc");
        assert_eq!(config.admin_secret.name, "admin");
        assert_eq!(c.service_name(), "logs-svc");
        assert_eq!(c.image(), "docker.io/opensearchproject/opensearch:2.11.0");
    }

    #[test]
    fn test_missing_admin_secret_field_is_empty_name() {
        let c = cluster(
            r"
apiVersion: opensearch.opster.io/v1
kind: OpenSearchCluster
metadata:
  name: logs
spec:
  security:
    config:
      securityconfigSecret:
        name: sc
",
        );
        let config = c.spec.security.and_then(|s| s.config).expect("config");
        assert!(!config.admin_secret.is_set());
    }

    #[test]
    fn test_image_override_wins() {
        let mut c = OpenSearchCluster::new("logs", ClusterSpec::default());
        c.spec.general.image = Some("registry.local/opensearch:custom".to_string());
        assert_eq!(c.image(), "registry.local/opensearch:custom");
    }
}
