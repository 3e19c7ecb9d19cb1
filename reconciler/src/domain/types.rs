//! Reconciliation request/response types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::agent_config::ImagePullSecret;
use super::workspace::{Workspace, WorkspaceState};

/// Kind of reconciliation round requested by the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    Full,
    Partial,
}

impl UpdateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateType::Full => "full",
            UpdateType::Partial => "partial",
        }
    }
}

/// How much of a workspace's config was shipped in a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourcesIncluded {
    NoResourcesIncluded,
    PartialResourcesIncluded,
    AllResourcesIncluded,
}

/// Settings returned to the agent with every response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub full_reconciliation_interval_seconds: u64,
    pub partial_reconciliation_interval_seconds: u64,
}

/// Per-workspace entry of the response payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceRailsInfo {
    pub name: String,
    pub namespace: String,
    pub deployment_resource_version: Option<String>,
    pub desired_state: WorkspaceState,
    pub actual_state: WorkspaceState,
    pub image_pull_secrets: Vec<ImagePullSecret>,

    /// Multi-document YAML stream; absent when nothing needs to be applied
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub config_to_apply: Option<String>,
}

/// Payload sent back to the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePayload {
    pub workspace_rails_infos: Vec<WorkspaceRailsInfo>,
    pub settings: Settings,
}

/// Observability entry for one workspace rails info
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RailsInfoObservability {
    pub config_to_apply_resources_included: ResourcesIncluded,
}

/// Request accepted by the command-line driver
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileRequest {
    pub agent_id: i64,
    pub update_type: UpdateType,
    #[serde(default)]
    pub workspaces: Vec<Workspace>,
}

/// State threaded through the response stages of one reconciliation
#[derive(Debug, Clone)]
pub struct ReconcileContext {
    pub agent_id: i64,
    pub update_type: UpdateType,
    pub workspaces_to_be_returned: Vec<Workspace>,
    pub settings: Settings,

    /// Include rendered config_to_apply in observer logs
    pub observe_config_to_apply: bool,

    pub response_payload: Option<ResponsePayload>,

    /// Keyed by workspace name
    pub observability_for_rails_infos: BTreeMap<String, RailsInfoObservability>,
}

impl ReconcileContext {
    pub fn new(
        agent_id: i64,
        update_type: UpdateType,
        workspaces_to_be_returned: Vec<Workspace>,
        settings: Settings,
    ) -> Self {
        Self {
            agent_id,
            update_type,
            workspaces_to_be_returned,
            settings,
            observe_config_to_apply: false,
            response_payload: None,
            observability_for_rails_infos: BTreeMap::new(),
        }
    }

    pub fn with_observe_config_to_apply(mut self, observe: bool) -> Self {
        self.observe_config_to_apply = observe;
        self
    }
}
