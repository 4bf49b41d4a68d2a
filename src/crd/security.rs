//! # Security Configuration
//!
//! Secret references consumed by the security-config facet.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Security plugin settings
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Security {
    /// Security configuration to apply. Absent disables the facet.
    #[serde(default)]
    pub config: Option<SecurityConfig>,
}

/// Secrets needed to apply the security plugin configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecurityConfig {
    /// Secret holding the security plugin configuration files (config.yml, internal_users.yml, ...)
    pub securityconfig_secret: SecretRef,
    /// Secret holding admin TLS credentials (ca.crt, tls.crt, tls.key).
    /// Without it the configuration is never applied.
    #[serde(default)]
    pub admin_secret: SecretRef,
}

/// Reference to a secret in the cluster's namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    #[serde(default)]
    pub name: String,
}

impl SecretRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// An empty name means the reference was not provided
    #[must_use]
    pub fn is_set(&self) -> bool {
        !self.name.is_empty()
    }
}
