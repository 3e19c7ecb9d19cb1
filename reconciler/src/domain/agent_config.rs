//! Workspaces agent configuration

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::keys::DEFAULT_WORKSPACES_PROXY_NAMESPACE;

/// A single egress allow rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPolicyEgressRule {
    /// CIDR that is allowed
    pub allow: String,

    /// CIDRs carved out of `allow`
    #[serde(default)]
    pub except: Vec<String>,
}

/// Image pull secret reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePullSecret {
    pub name: String,
    pub namespace: String,
}

/// Per-agent policy applied to every workspace the agent manages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspacesAgentConfig {
    pub dns_zone: String,

    #[serde(default = "default_true")]
    pub network_policy_enabled: bool,

    #[serde(default)]
    pub network_policy_egress: Vec<NetworkPolicyEgressRule>,

    /// `{requests: {cpu, memory}, limits: {cpu, memory}}`; key order is kept as stored
    #[serde(default)]
    pub default_resources_per_workspace_container: Map<String, Value>,

    /// Same shape as the per-container default; empty means "no quota".
    /// Key order is kept as stored since the digest depends on it.
    #[serde(default)]
    pub max_resources_per_workspace: Map<String, Value>,

    #[serde(default)]
    pub image_pull_secrets: Vec<ImagePullSecret>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    #[serde(default)]
    pub allow_privilege_escalation: bool,

    #[serde(default)]
    pub use_kubernetes_user_namespaces: bool,

    #[serde(default)]
    pub default_runtime_class: String,

    /// Empty string means each workspace gets its own namespace
    #[serde(default)]
    pub shared_namespace: String,

    #[serde(default = "default_proxy_namespace")]
    pub gitlab_workspaces_proxy_namespace: String,
}

fn default_true() -> bool {
    true
}

fn default_proxy_namespace() -> String {
    DEFAULT_WORKSPACES_PROXY_NAMESPACE.to_string()
}

impl WorkspacesAgentConfig {
    pub fn shared_namespace_enabled(&self) -> bool {
        !self.shared_namespace.is_empty()
    }
}
