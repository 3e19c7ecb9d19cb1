//! Derives the flat parameter set used to render a workspace's manifests

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::domain::agent_config::{ImagePullSecret, NetworkPolicyEgressRule};
use crate::domain::keys::{
    ANNOTATION_HOST_TEMPLATE, ANNOTATION_MAX_RESOURCES_SHA256, ANNOTATION_OWNING_INVENTORY,
    ANNOTATION_WORKSPACE_ID, LABEL_AGENT_ID, LABEL_WORKSPACE_ID,
};
use crate::domain::workspace::Workspace;
use crate::infra::canonical::{ruby_inspect, shallow_sort};

/// Parameters extracted from a workspace and its agent config
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValues {
    pub common_annotations: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub env_secret_name: String,
    pub file_secret_name: String,
    pub default_resources_per_workspace_container: Map<String, Value>,
    pub max_resources_per_workspace: Map<String, Value>,
    pub network_policy_enabled: bool,
    pub network_policy_egress: Vec<NetworkPolicyEgressRule>,
    pub image_pull_secrets: Vec<ImagePullSecret>,
    pub processed_devfile_yaml: String,
    pub replicas: i64,
    pub scripts_configmap_name: String,
    pub secrets_inventory_name: String,
    pub secrets_inventory_annotations: BTreeMap<String, String>,
    pub workspace_inventory_name: String,
    pub workspace_inventory_annotations: BTreeMap<String, String>,
    pub shared_namespace: String,
    pub allow_privilege_escalation: bool,
    pub use_kubernetes_user_namespaces: bool,
    pub default_runtime_class: String,
    pub domain_template: String,
    pub gitlab_workspaces_proxy_namespace: String,
}

/// Extract the manifest parameters for a workspace
pub fn extract(workspace: &Workspace) -> ConfigValues {
    let agent_config = &workspace.workspaces_agent_config;

    let domain_template = format!("{{{{.port}}}}-{}.{}", workspace.name, agent_config.dns_zone);
    let max_resources_per_workspace = agent_config.max_resources_per_workspace.clone();

    let mut common_annotations = agent_config.annotations.clone();
    common_annotations.insert(ANNOTATION_HOST_TEMPLATE.to_string(), domain_template.clone());
    common_annotations.insert(ANNOTATION_WORKSPACE_ID.to_string(), workspace.id.to_string());
    common_annotations.insert(
        ANNOTATION_MAX_RESOURCES_SHA256.to_string(),
        max_resources_digest(&max_resources_per_workspace),
    );

    let mut labels = agent_config.labels.clone();
    labels.insert(LABEL_AGENT_ID.to_string(), workspace.agent_id.to_string());
    if agent_config.shared_namespace_enabled() {
        labels.insert(LABEL_WORKSPACE_ID.to_string(), workspace.id.to_string());
    }

    let secrets_inventory_name = workspace.secrets_inventory_name();
    let mut secrets_inventory_annotations = common_annotations.clone();
    secrets_inventory_annotations.insert(
        ANNOTATION_OWNING_INVENTORY.to_string(),
        secrets_inventory_name.clone(),
    );

    ConfigValues {
        workspace_inventory_annotations: common_annotations.clone(),
        common_annotations,
        labels,
        env_secret_name: workspace.env_secret_name(),
        file_secret_name: workspace.file_secret_name(),
        default_resources_per_workspace_container: agent_config
            .default_resources_per_workspace_container
            .clone(),
        max_resources_per_workspace,
        network_policy_enabled: agent_config.network_policy_enabled,
        network_policy_egress: agent_config.network_policy_egress.clone(),
        image_pull_secrets: agent_config.image_pull_secrets.clone(),
        processed_devfile_yaml: workspace.processed_devfile.clone(),
        replicas: workspace.replicas(),
        scripts_configmap_name: workspace.scripts_configmap_name(),
        secrets_inventory_name,
        secrets_inventory_annotations,
        workspace_inventory_name: workspace.workspace_inventory_name(),
        shared_namespace: agent_config.shared_namespace.clone(),
        allow_privilege_escalation: agent_config.allow_privilege_escalation,
        use_kubernetes_user_namespaces: agent_config.use_kubernetes_user_namespaces,
        default_runtime_class: agent_config.default_runtime_class.clone(),
        domain_template,
        gitlab_workspaces_proxy_namespace: agent_config.gitlab_workspaces_proxy_namespace.clone(),
    }
}

/// SHA-256 of the max-resources mapping, top-level keys sorted only.
///
/// The agent compares this value across reconciliations, so nested keys
/// must keep their stored order.
pub fn max_resources_digest(max_resources_per_workspace: &Map<String, Value>) -> String {
    let rendered = ruby_inspect(&Value::Object(shallow_sort(max_resources_per_workspace)));
    hex::encode(Sha256::digest(rendered.as_bytes()))
}
