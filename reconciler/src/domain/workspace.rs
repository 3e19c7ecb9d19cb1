//! Workspace domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::agent_config::WorkspacesAgentConfig;

/// Workspace lifecycle state
///
/// Used for both the desired state (set by the user) and the actual state
/// (last reported by the agent). The two are tracked independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkspaceState {
    CreationRequested,
    Starting,
    Running,
    Stopping,
    Stopped,
    Terminating,
    Terminated,
    Failed,
    Error,
    Unknown,
    RestartRequested,
}

impl WorkspaceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceState::CreationRequested => "CreationRequested",
            WorkspaceState::Starting => "Starting",
            WorkspaceState::Running => "Running",
            WorkspaceState::Stopping => "Stopping",
            WorkspaceState::Stopped => "Stopped",
            WorkspaceState::Terminating => "Terminating",
            WorkspaceState::Terminated => "Terminated",
            WorkspaceState::Failed => "Failed",
            WorkspaceState::Error => "Error",
            WorkspaceState::Unknown => "Unknown",
            WorkspaceState::RestartRequested => "RestartRequested",
        }
    }

    /// States in which the workspace pod should be scheduled
    pub fn is_running_class(&self) -> bool {
        matches!(self, WorkspaceState::Running)
    }
}

impl std::fmt::Display for WorkspaceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workspace variable type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    Environment,
    File,
}

/// A user-defined key/value injected into the workspace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceVariable {
    pub key: String,
    pub value: String,
    pub variable_type: VariableType,
}

/// Desired config precomputed and persisted outside of this pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceAgentkState {
    /// Expected to be an array of resources; validated before use
    pub desired_config: serde_json::Value,
}

/// Workspace entity
///
/// Projection of the persisted workspace row plus the associations the
/// reconciliation output pipeline reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: i64,
    pub name: String,
    pub namespace: String,
    pub desired_state: WorkspaceState,
    pub actual_state: WorkspaceState,
    pub agent_id: i64,
    pub user_id: i64,

    /// Forces a full resource set on the next response
    #[serde(default)]
    pub force_include_all_resources: bool,

    /// Devfile after server-side processing (YAML)
    pub processed_devfile: String,

    /// Opaque version token carried across reconciliations
    #[serde(default)]
    pub deployment_resource_version: Option<String>,

    #[serde(default)]
    pub workspace_variables: Vec<WorkspaceVariable>,

    pub workspaces_agent_config: WorkspacesAgentConfig,

    #[serde(default)]
    pub workspace_agentk_state: Option<WorkspaceAgentkState>,

    pub desired_state_updated_at: DateTime<Utc>,
    pub actual_state_updated_at: DateTime<Utc>,

    /// Absent if the agent has never been sent this workspace
    #[serde(default)]
    pub responded_to_agent_at: Option<DateTime<Utc>>,
}

impl Workspace {
    pub fn desired_state_running(&self) -> bool {
        self.desired_state.is_running_class()
    }

    pub fn desired_state_terminated(&self) -> bool {
        self.desired_state == WorkspaceState::Terminated
    }

    pub fn actual_state_terminated(&self) -> bool {
        self.actual_state == WorkspaceState::Terminated
    }

    pub fn desired_state_terminated_and_actual_state_not_terminated(&self) -> bool {
        self.desired_state_terminated() && !self.actual_state_terminated()
    }

    pub fn desired_state_updated_more_recently_than_last_response_to_agent(&self) -> bool {
        match self.responded_to_agent_at {
            None => true,
            Some(responded_at) => self.desired_state_updated_at > responded_at,
        }
    }

    pub fn actual_state_updated_more_recently_than_last_response_to_agent(&self) -> bool {
        match self.responded_to_agent_at {
            None => true,
            Some(responded_at) => self.actual_state_updated_at > responded_at,
        }
    }

    /// Replica count derived from the current desired state
    pub fn replicas(&self) -> i64 {
        if self.desired_state_running() {
            1
        } else {
            0
        }
    }

    pub fn workspace_inventory_name(&self) -> String {
        format!("{}-workspace-inventory", self.name)
    }

    pub fn secrets_inventory_name(&self) -> String {
        format!("{}-secrets-inventory", self.name)
    }

    pub fn env_secret_name(&self) -> String {
        format!("{}-env-var", self.name)
    }

    pub fn file_secret_name(&self) -> String {
        format!("{}-file", self.name)
    }

    pub fn scripts_configmap_name(&self) -> String {
        format!("{}-scripts-configmap", self.name)
    }

    /// Variables of the given type, in declaration order
    pub fn variables_of_type(
        &self,
        variable_type: VariableType,
    ) -> impl Iterator<Item = &WorkspaceVariable> {
        self.workspace_variables
            .iter()
            .filter(move |v| v.variable_type == variable_type)
    }
}
