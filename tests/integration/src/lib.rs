//! Test helpers for the reconciler integration tests

use std::cell::RefCell;

use base64::prelude::*;
use serde_json::{json, Value};

pub use workspace_reconciler::domain::desired_config::{
    resource_annotation, resource_kind, resource_name, Resource,
};
pub use workspace_reconciler::domain::types::{
    ReconcileContext, ReconcileRequest, ResourcesIncluded, Settings, UpdateType,
};
pub use workspace_reconciler::domain::workspace::{Workspace, WorkspaceState};
pub use workspace_reconciler::infra::logger::ReconcileLogger;
use workspace_reconciler::infra::yaml_stream::from_yaml_stream;

pub const EXAMPLE_DEVFILE: &str = include_str!("../../../reconciler/fixtures/example-devfile.yaml");

pub const AGENT_ID: i64 = 991;

pub const SETTINGS: Settings = Settings {
    full_reconciliation_interval_seconds: 3600,
    partial_reconciliation_interval_seconds: 10,
};

// ============================================================================
// Fixtures
// ============================================================================

/// Workspace as the caller would send it, before any timestamps are adjusted.
///
/// Both state changes happened before the last response to the agent.
pub fn workspace_json(name: &str) -> Value {
    json!({
        "id": 993,
        "name": name,
        "namespace": format!("gl-rd-ns-{}", name.trim_start_matches("workspace-")),
        "desired_state": "Running",
        "actual_state": "Running",
        "agent_id": AGENT_ID,
        "user_id": 990,
        "force_include_all_resources": false,
        "processed_devfile": EXAMPLE_DEVFILE,
        "deployment_resource_version": "1",
        "workspace_variables": [
            { "key": "ENV_VAR1", "value": "env-var-value1", "variable_type": "environment" },
            { "key": "ENV_VAR2", "value": "with spaces & symbols=1", "variable_type": "environment" },
            { "key": "FILE_VAR1", "value": "file-var-value1", "variable_type": "file" }
        ],
        "workspaces_agent_config": {
            "dns_zone": "workspaces.localdev.me",
            "network_policy_enabled": true,
            "network_policy_egress": [
                { "allow": "0.0.0.0/0", "except": ["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16"] }
            ],
            "default_resources_per_workspace_container": {
                "requests": { "cpu": "0.5", "memory": "512Mi" },
                "limits": { "cpu": "1.5", "memory": "2Gi" }
            },
            "max_resources_per_workspace": {
                "requests": { "memory": "1Gi", "cpu": "1" },
                "limits": { "memory": "4Gi", "cpu": "2" }
            },
            "image_pull_secrets": [{ "name": "registry-secret", "namespace": "default" }],
            "labels": { "my-label": "value" },
            "annotations": { "my-annotation": "value" },
            "shared_namespace": ""
        },
        "desired_state_updated_at": "2026-01-01T00:00:00Z",
        "actual_state_updated_at": "2026-01-01T00:00:00Z",
        "responded_to_agent_at": "2026-01-01T00:00:10Z"
    })
}

pub fn workspace(name: &str) -> Workspace {
    serde_json::from_value(workspace_json(name)).expect("Workspace fixture must deserialize")
}

pub fn context(update_type: UpdateType, workspaces: Vec<Workspace>) -> ReconcileContext {
    ReconcileContext::new(AGENT_ID, update_type, workspaces, SETTINGS)
}

// ============================================================================
// Recording logger
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Warn,
}

#[derive(Debug, Clone)]
pub struct LogLine {
    pub level: Level,
    pub message: String,
    pub fields: Value,
}

/// Logger that keeps every line for later assertions
#[derive(Debug, Default)]
pub struct RecordingLogger {
    lines: RefCell<Vec<LogLine>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.borrow().clone()
    }

    pub fn warnings(&self) -> Vec<LogLine> {
        self.lines()
            .into_iter()
            .filter(|l| l.level == Level::Warn)
            .collect()
    }

    fn record(&self, level: Level, message: &str, fields: Value) {
        self.lines.borrow_mut().push(LogLine {
            level,
            message: message.to_string(),
            fields,
        });
    }
}

impl ReconcileLogger for RecordingLogger {
    fn debug(&self, message: &str, fields: Value) {
        self.record(Level::Debug, message, fields);
    }

    fn warn(&self, message: &str, fields: Value) {
        self.record(Level::Warn, message, fields);
    }
}

// ============================================================================
// Resource helpers
// ============================================================================

pub fn find_resource<'a>(resources: &'a [Resource], kind: &str, name: &str) -> Option<&'a Resource> {
    resources
        .iter()
        .find(|r| resource_kind(r) == Some(kind) && resource_name(r) == Some(name))
}

/// Decode one entry of a Secret's `data`
pub fn decode_secret_entry(secret: &Resource, key: &str) -> anyhow::Result<String> {
    let encoded = secret["data"][key]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Secret has no data entry {}", key))?;
    Ok(String::from_utf8(BASE64_STANDARD.decode(encoded)?)?)
}

/// Parse a config_to_apply YAML stream
pub fn parse_config_to_apply(stream: &str) -> anyhow::Result<Vec<Resource>> {
    Ok(from_yaml_stream(stream)?)
}
