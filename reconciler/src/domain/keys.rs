//! Well-known annotation and label keys shared with the agent's apply tooling.
//!
//! Names and casing are part of the contract with the cluster-side agent.

pub const ANNOTATION_HOST_TEMPLATE: &str = "workspaces.gitlab.com/host-template";
pub const ANNOTATION_WORKSPACE_ID: &str = "workspaces.gitlab.com/id";
pub const ANNOTATION_MAX_RESOURCES_SHA256: &str =
    "workspaces.gitlab.com/max-resources-per-workspace-sha256";
pub const ANNOTATION_OWNING_INVENTORY: &str = "config.k8s.io/owning-inventory";
pub const ANNOTATION_INCLUDE_IN_PARTIAL_RECONCILIATION: &str =
    "workspaces.gitlab.com/include-in-partial-reconciliation";

pub const LABEL_AGENT_ID: &str = "agent.gitlab.com/id";
pub const LABEL_WORKSPACE_ID: &str = "workspaces.gitlab.com/id";
pub const LABEL_INVENTORY_ID: &str = "cli-utils.sigs.k8s.io/inventory-id";

/// Synthetic file-secret entry exposing the last recorded actual state
pub const RECONCILED_ACTUAL_STATE_FILE: &str = "gl_workspace_reconciled_actual_state.txt";

/// Mount path of the file-variables secret inside workspace containers
pub const VARIABLES_FILE_MOUNT_PATH: &str = "/.workspace-data/variables/file";

/// Mount path of the postStart scripts ConfigMap
pub const WORKSPACE_SCRIPTS_MOUNT_PATH: &str = "/workspace-scripts";

/// Devfile component attribute marking the main (editor-injected) component
pub const MAIN_COMPONENT_ATTRIBUTE: &str = "gl/inject-editor";

pub const DEFAULT_WORKSPACES_PROXY_NAMESPACE: &str = "gitlab-workspaces";

/// Unprivileged uid workspace containers run as
pub const RUN_AS_USER: i64 = 5001;
