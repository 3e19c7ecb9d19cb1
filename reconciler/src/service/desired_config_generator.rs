//! Desired config generation
//!
//! Holds the legacy generator, which assembles the full resource set from
//! the devfile plus the synthesized ConfigMaps, Secrets, NetworkPolicy and
//! ResourceQuota, and the [`DesiredConfigGenerator`] seam the fetcher uses.

use base64::prelude::*;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::domain::desired_config::Resource;
use crate::domain::keys::{
    ANNOTATION_INCLUDE_IN_PARTIAL_RECONCILIATION, ANNOTATION_OWNING_INVENTORY, LABEL_INVENTORY_ID,
    LABEL_WORKSPACE_ID, RECONCILED_ACTUAL_STATE_FILE,
};
use crate::domain::workspace::{VariableType, Workspace};
use crate::error::Result;
use crate::infra::logger::ReconcileLogger;
use crate::service::config_values_extractor::{self, ConfigValues};
use crate::service::devfile_parser::{self, DevfileParserParams};

const PROXY_POD_NAME: &str = "gitlab-workspaces-proxy";
const KUBE_SYSTEM_NAMESPACE: &str = "kube-system";
const NAMESPACE_NAME_LABEL: &str = "kubernetes.io/metadata.name";

/// Produces the desired config for a workspace
#[cfg_attr(test, mockall::automock)]
pub trait DesiredConfigGenerator {
    fn generate(&self, workspace: &Workspace) -> Result<Vec<Resource>>;
}

/// Adapter exposing the legacy generator through [`DesiredConfigGenerator`].
///
/// Always generates the full resource set; trimming is the config-to-apply
/// builder's job.
pub struct LegacyDesiredConfigGenerator<'a> {
    logger: &'a dyn ReconcileLogger,
}

impl<'a> LegacyDesiredConfigGenerator<'a> {
    pub fn new(logger: &'a dyn ReconcileLogger) -> Self {
        Self { logger }
    }
}

impl DesiredConfigGenerator for LegacyDesiredConfigGenerator<'_> {
    fn generate(&self, workspace: &Workspace) -> Result<Vec<Resource>> {
        Ok(generate_desired_config(workspace, true, self.logger))
    }
}

/// Generate the desired config the legacy way.
///
/// Returns an empty list when the devfile cannot be rendered.
pub fn generate_desired_config(
    workspace: &Workspace,
    include_all_resources: bool,
    logger: &dyn ReconcileLogger,
) -> Vec<Resource> {
    let values = config_values_extractor::extract(workspace);
    let namespace = workspace.namespace.as_str();

    if workspace.desired_state_terminated() {
        return vec![
            workspace_inventory_config_map(&values, namespace),
            secrets_inventory_config_map(&values, namespace),
        ];
    }

    let params = devfile_parser_params(&values, &workspace.name, namespace);
    let devfile_resources = devfile_parser::get_all(&values.processed_devfile_yaml, &params, logger);
    if devfile_resources.is_empty() {
        return Vec::new();
    }

    let mut resources = vec![workspace_inventory_config_map(&values, namespace)];
    resources.extend(devfile_resources);

    if values.network_policy_enabled {
        resources.push(network_policy(&values, workspace, namespace));
    }

    // Already validated by get_all above
    let scripts = devfile_parser::scripts_from_devfile(&values.processed_devfile_yaml)
        .unwrap_or_default();
    if !scripts.is_empty() {
        let data: Map<String, Value> = scripts
            .into_iter()
            .map(|s| (s.command_id, Value::String(s.body)))
            .collect();
        resources.push(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": metadata(
                &values.scripts_configmap_name,
                namespace,
                &values.labels,
                &workspace_resource_annotations(&values),
            ),
            "data": data,
        }));
    }

    if !values.max_resources_per_workspace.is_empty() && values.shared_namespace.is_empty() {
        resources.push(resource_quota(&values, &workspace.name, namespace));
    }

    if include_all_resources {
        resources.push(secrets_inventory_config_map(&values, namespace));
        let env_data = env_secret_data(workspace);
        if !env_data.is_empty() {
            resources.push(secret(&values.env_secret_name, namespace, &values, env_data));
        }
        resources.push(secret(
            &values.file_secret_name,
            namespace,
            &values,
            file_secret_data(workspace),
        ));
    }

    resources
}

pub(crate) fn devfile_parser_params(
    values: &ConfigValues,
    name: &str,
    namespace: &str,
) -> DevfileParserParams {
    DevfileParserParams {
        name: name.to_string(),
        namespace: namespace.to_string(),
        replicas: values.replicas,
        domain_template: values.domain_template.clone(),
        labels: values.labels.clone(),
        annotations: workspace_resource_annotations(values),
        env_secret_names: vec![values.env_secret_name.clone()],
        file_secret_names: vec![values.file_secret_name.clone()],
        default_resources_per_workspace_container: values
            .default_resources_per_workspace_container
            .clone(),
        allow_privilege_escalation: values.allow_privilege_escalation,
        use_kubernetes_user_namespaces: values.use_kubernetes_user_namespaces,
        default_runtime_class: values.default_runtime_class.clone(),
        service_account_name: name.to_string(),
        image_pull_secrets: values.image_pull_secrets.clone(),
        scripts_configmap_name: values.scripts_configmap_name.clone(),
    }
}

/// `{KEY: base64(value)}` for every environment variable.
///
/// Empty when the workspace has none, in which case no env Secret is shipped.
pub(crate) fn env_secret_data(workspace: &Workspace) -> Map<String, Value> {
    workspace
        .variables_of_type(VariableType::Environment)
        .map(|v| (v.key.clone(), Value::String(BASE64_STANDARD.encode(&v.value))))
        .collect()
}

/// File variables plus the last recorded actual state
pub(crate) fn file_secret_data(workspace: &Workspace) -> Map<String, Value> {
    let mut data: Map<String, Value> = workspace
        .variables_of_type(VariableType::File)
        .map(|v| (v.key.clone(), Value::String(BASE64_STANDARD.encode(&v.value))))
        .collect();
    data.insert(
        RECONCILED_ACTUAL_STATE_FILE.to_string(),
        Value::String(BASE64_STANDARD.encode(workspace.actual_state.as_str())),
    );
    data
}

pub(crate) fn workspace_inventory_config_map(values: &ConfigValues, namespace: &str) -> Resource {
    inventory_config_map(
        &values.workspace_inventory_name,
        namespace,
        values,
        &with_annotation(
            &values.workspace_inventory_annotations,
            ANNOTATION_INCLUDE_IN_PARTIAL_RECONCILIATION,
            "true",
        ),
    )
}

pub(crate) fn secrets_inventory_config_map(values: &ConfigValues, namespace: &str) -> Resource {
    inventory_config_map(
        &values.secrets_inventory_name,
        namespace,
        values,
        // Only shipped alongside the Secrets it tracks, which are full-round only
        &with_annotation(
            &values.common_annotations,
            ANNOTATION_INCLUDE_IN_PARTIAL_RECONCILIATION,
            "false",
        ),
    )
}

fn inventory_config_map(
    name: &str,
    namespace: &str,
    values: &ConfigValues,
    annotations: &BTreeMap<String, String>,
) -> Resource {
    let mut labels = values.labels.clone();
    labels.insert(LABEL_INVENTORY_ID.to_string(), name.to_string());
    json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": metadata(name, namespace, &labels, annotations),
    })
}

fn secret(
    name: &str,
    namespace: &str,
    values: &ConfigValues,
    data: Map<String, Value>,
) -> Resource {
    let annotations = with_annotation(
        &values.secrets_inventory_annotations,
        ANNOTATION_INCLUDE_IN_PARTIAL_RECONCILIATION,
        "false",
    );
    json!({
        "apiVersion": "v1",
        "kind": "Secret",
        "metadata": metadata(name, namespace, &values.labels, &annotations),
        "data": data,
    })
}

fn network_policy(values: &ConfigValues, workspace: &Workspace, namespace: &str) -> Resource {
    let mut egress = vec![json!({
        "ports": [
            { "port": 53, "protocol": "TCP" },
            { "port": 53, "protocol": "UDP" },
        ],
        "to": [{
            "namespaceSelector": {
                "matchLabels": { NAMESPACE_NAME_LABEL: KUBE_SYSTEM_NAMESPACE },
            },
        }],
    })];
    for rule in &values.network_policy_egress {
        let mut ip_block = json!({ "cidr": rule.allow });
        if !rule.except.is_empty() {
            ip_block["except"] = json!(rule.except);
        }
        egress.push(json!({ "to": [{ "ipBlock": ip_block }] }));
    }

    let pod_selector = if values.shared_namespace.is_empty() {
        json!({})
    } else {
        json!({ "matchLabels": { LABEL_WORKSPACE_ID: workspace.id.to_string() } })
    };

    json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "NetworkPolicy",
        "metadata": metadata(
            &workspace.name,
            namespace,
            &values.labels,
            &workspace_resource_annotations(values),
        ),
        "spec": {
            "egress": egress,
            "ingress": [{
                "from": [{
                    "namespaceSelector": {
                        "matchLabels": {
                            NAMESPACE_NAME_LABEL: values.gitlab_workspaces_proxy_namespace,
                        },
                    },
                    "podSelector": {
                        "matchLabels": { "app.kubernetes.io/name": PROXY_POD_NAME },
                    },
                }],
            }],
            "podSelector": pod_selector,
            "policyTypes": ["Ingress", "Egress"],
        },
    })
}

fn resource_quota(values: &ConfigValues, name: &str, namespace: &str) -> Resource {
    let mut hard = Map::new();
    for section in ["limits", "requests"] {
        for resource in ["cpu", "memory"] {
            if let Some(quantity) = values
                .max_resources_per_workspace
                .get(section)
                .and_then(|s| s.get(resource))
            {
                hard.insert(format!("{}.{}", section, resource), quantity.clone());
            }
        }
    }
    json!({
        "apiVersion": "v1",
        "kind": "ResourceQuota",
        "metadata": metadata(
            name,
            namespace,
            &values.labels,
            &workspace_resource_annotations(values),
        ),
        "spec": { "hard": hard },
    })
}

/// Annotations for resources owned by the workspace inventory
fn workspace_resource_annotations(values: &ConfigValues) -> BTreeMap<String, String> {
    let mut annotations = with_annotation(
        &values.workspace_inventory_annotations,
        ANNOTATION_OWNING_INVENTORY,
        &values.workspace_inventory_name,
    );
    annotations.insert(
        ANNOTATION_INCLUDE_IN_PARTIAL_RECONCILIATION.to_string(),
        "true".to_string(),
    );
    annotations
}

fn with_annotation(
    base: &BTreeMap<String, String>,
    key: &str,
    value: &str,
) -> BTreeMap<String, String> {
    let mut annotations = base.clone();
    annotations.insert(key.to_string(), value.to_string());
    annotations
}

fn metadata(
    name: &str,
    namespace: &str,
    labels: &BTreeMap<String, String>,
    annotations: &BTreeMap<String, String>,
) -> Value {
    json!({
        "annotations": annotations,
        "labels": labels,
        "name": name,
        "namespace": namespace,
    })
}
