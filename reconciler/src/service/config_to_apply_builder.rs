//! Derives the resources actually sent to the agent from a desired config

use serde_json::{json, Value};

use crate::domain::desired_config::{resource_annotation, resource_kind, resource_name, DesiredConfig, Resource};
use crate::domain::keys::ANNOTATION_INCLUDE_IN_PARTIAL_RECONCILIATION;
use crate::domain::workspace::Workspace;
use crate::service::config_values_extractor;
use crate::service::desired_config_generator::{
    env_secret_data, file_secret_data, secrets_inventory_config_map, workspace_inventory_config_map,
};

/// Build the config to apply.
///
/// A terminated workspace only gets its two inventory ConfigMaps, rendered
/// fresh whatever the desired config holds. Otherwise the desired config is
/// trimmed to partial-reconciliation resources unless `include_all_resources`,
/// the Deployment's replicas are recomputed and the variable Secrets are
/// populated. An env Secret left without entries is dropped.
pub fn build(
    workspace: &Workspace,
    include_all_resources: bool,
    desired_config: &DesiredConfig,
) -> Vec<Resource> {
    if workspace.desired_state_terminated() {
        let values = config_values_extractor::extract(workspace);
        return vec![
            workspace_inventory_config_map(&values, &workspace.namespace),
            secrets_inventory_config_map(&values, &workspace.namespace),
        ];
    }

    let env_secret_name = workspace.env_secret_name();
    let file_secret_name = workspace.file_secret_name();

    desired_config
        .desired_config_array()
        .iter()
        .filter(|r| include_all_resources || included_in_partial_reconciliation(r))
        .cloned()
        .filter_map(|mut resource| {
            match (resource_kind(&resource), resource_name(&resource)) {
                (Some("Deployment"), _) => {
                    if let Some(spec) = resource.get_mut("spec").and_then(Value::as_object_mut) {
                        spec.insert("replicas".to_string(), json!(workspace.replicas()));
                    }
                }
                (Some("Secret"), Some(name)) if name == env_secret_name => {
                    let data = env_secret_data(workspace);
                    if data.is_empty() {
                        return None;
                    }
                    resource["data"] = Value::Object(data);
                }
                (Some("Secret"), Some(name)) if name == file_secret_name => {
                    resource["data"] = Value::Object(file_secret_data(workspace));
                }
                _ => {}
            }
            Some(resource)
        })
        .collect()
}

fn included_in_partial_reconciliation(resource: &Resource) -> bool {
    resource_annotation(resource, ANNOTATION_INCLUDE_IN_PARTIAL_RECONCILIATION) == Some("true")
}
