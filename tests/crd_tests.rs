//! Generated CRD and manifest parsing

use kube::core::CustomResourceExt;
use opensearch_operator::crd::OpenSearchCluster;

#[test]
fn crd_metadata() {
    let crd = OpenSearchCluster::crd();
    assert_eq!(
        crd.metadata.name.as_deref(),
        Some("opensearchclusters.opensearch.opster.io")
    );
    assert_eq!(crd.spec.group, "opensearch.opster.io");
    assert_eq!(crd.spec.scope, "Namespaced");
    assert_eq!(crd.spec.names.kind, "OpenSearchCluster");
    assert_eq!(
        crd.spec.names.short_names,
        Some(vec!["os".to_string()])
    );
    let version = &crd.spec.versions[0];
    assert_eq!(version.name, "v1");
    assert!(version
        .subresources
        .as_ref()
        .and_then(|s| s.status.as_ref())
        .is_some());
}

#[test]
fn crd_serializes_to_yaml() {
    let yaml = serde_yaml::to_string(&OpenSearchCluster::crd()).expect("yaml");
    assert!(yaml.contains("securityconfigSecret"));
    assert!(yaml.contains("adminSecret"));
    assert!(yaml.contains("nodePools"));
}

#[test]
fn manifest_with_security_config_parses() {
    let manifest = r"
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
        name: logs-securityconfig
      adminSecret:
        name: logs-admin-cert
  nodePools:
    - component: masters
      replicas: 3
      roles: [cluster_manager, data]
";
    let cluster: OpenSearchCluster = serde_yaml::from_str(manifest).expect("parses");
    let config = cluster
        .spec
        .security
        .as_ref()
        .and_then(|s| s.config.as_ref())
        .expect("security config");
    assert_eq!(config.securityconfig_secret.name, "logs-securityconfig");
    assert_eq!(config.admin_secret.name, "logs-admin-cert");
    assert_eq!(cluster.service_dns_name(), "logs-svc.search.svc.cluster.local");
    assert_eq!(cluster.image(), "docker.io/opensearchproject/opensearch:2.11.0");
    assert_eq!(cluster.spec.node_pools[0].replicas, 3);
}
