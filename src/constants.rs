//! # Constants
//!
//! Shared constants used throughout the operator.
//!
//! Values marked as defaults can be overridden via environment variables
//! (see [`crate::config::ControllerConfig`]).

/// API group of the `OpenSearchCluster` custom resource
pub const API_GROUP: &str = "opensearch.opster.io";

/// Default controller name, reported on Kubernetes events and as field manager
pub const DEFAULT_CONTROLLER_NAME: &str = "opensearch-operator";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default interval between converged reconciliations (seconds)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 300;

/// Default delay used by the orchestrator when a facet asks to be requeued
/// immediately while waiting for a secret (seconds)
pub const DEFAULT_SECRET_WAIT_REQUEUE_SECS: u64 = 10;

/// Fibonacci backoff bounds for failed reconciliations (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Maximum number of clusters reconciled concurrently
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Image used by the securityconfig update job when the cluster does not pin one
pub const DEFAULT_OPENSEARCH_IMAGE_REPOSITORY: &str = "docker.io/opensearchproject/opensearch";

/// Retries the update job performs before Kubernetes marks it failed
pub const DEFAULT_SECURITYCONFIG_JOB_BACKOFF_LIMIT: i32 = 0;

/// How long a finished update job lingers before garbage collection (seconds)
pub const DEFAULT_SECURITYCONFIG_JOB_TTL_SECS: i32 = 3600;

/// Suffix of the deterministic update job name (`<cluster>-securityconfig-update`)
pub const SECURITYCONFIG_JOB_SUFFIX: &str = "securityconfig-update";

/// Annotation carrying the content fingerprint of the secrets a job applied
pub const SECURITYCONFIG_CHECKSUM_ANNOTATION: &str = "opensearch.opster.io/securityconfig-checksum";

/// Label identifying the cluster a resource belongs to
pub const CLUSTER_LABEL: &str = "opster.io/opensearch-cluster";

/// Standard managed-by label
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Directory the security plugin reads its configuration from
pub const SECURITYCONFIG_MOUNT_PATH: &str = "/usr/share/opensearch/config/opensearch-security";

/// Directory the admin TLS material is mounted at inside the update job
pub const ADMIN_CERT_MOUNT_PATH: &str = "/certs";

/// Location of the security plugin admin tool inside the OpenSearch image
pub const SECURITYADMIN_SCRIPT: &str =
    "/usr/share/opensearch/plugins/opensearch-security/tools/securityadmin.sh";

/// Transport port the admin tool connects to
pub const TRANSPORT_PORT: i32 = 9300;

/// Default HTTP port of the cluster
pub const DEFAULT_HTTP_PORT: i32 = 9200;

/// Volume name used for the securityconfig secret (job and node pods)
pub const SECURITYCONFIG_VOLUME: &str = "securityconfig";

/// Volume name used for the admin certificate secret in the update job
pub const ADMIN_CERT_VOLUME: &str = "admin-cert";
