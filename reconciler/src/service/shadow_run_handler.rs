//! Compares a freshly built config to apply against the legacy generator

use serde_json::{json, Value};

use crate::domain::desired_config::Resource;
use crate::domain::workspace::Workspace;
use crate::infra::diff::structural_diff;
use crate::infra::logger::ReconcileLogger;
use crate::service::desired_config_generator::generate_desired_config;

/// Run the legacy generator alongside the new output and report divergence.
///
/// The legacy array is always returned, whatever the comparison finds.
pub fn handle(
    workspace: &Workspace,
    new_config_to_apply_array: Vec<Resource>,
    logger: &dyn ReconcileLogger,
    include_all_resources: bool,
) -> Vec<Resource> {
    let old_config_to_apply_array = generate_desired_config(workspace, include_all_resources, logger);

    let diff = structural_diff(
        &Value::Array(old_config_to_apply_array.clone()),
        &Value::Array(new_config_to_apply_array),
    );
    if !diff.is_empty() {
        logger.warn(
            "The generated config_to_apply differs from the legacy one",
            json!({
                "error_type": "workspaces_reconcile_desired_configs_differ",
                "workspace_id": workspace.id,
                "diff": diff,
            }),
        );
    }

    old_config_to_apply_array
}
