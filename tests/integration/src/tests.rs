//! End-to-end tests for the reconciliation output pipeline
//!
//! Each test drives the public pipeline entry points with a workspace
//! deserialized from the same JSON shape the binary accepts.

use chrono::Duration;
use integration_tests::*;
use serde_json::json;
use workspace_reconciler::domain::keys::{
    ANNOTATION_INCLUDE_IN_PARTIAL_RECONCILIATION, ANNOTATION_MAX_RESOURCES_SHA256,
    RECONCILED_ACTUAL_STATE_FILE,
};
use workspace_reconciler::domain::workspace::{VariableType, WorkspaceAgentkState};
use workspace_reconciler::service::desired_config_generator::{
    generate_desired_config, LegacyDesiredConfigGenerator,
};
use workspace_reconciler::service::{response_payload_builder, response_payload_observer};

const WORKSPACE_NAME: &str = "workspace-991-990-fedcba";

fn run(context: ReconcileContext, logger: &RecordingLogger) -> ReconcileContext {
    let generator = LegacyDesiredConfigGenerator::new(logger);
    response_payload_builder::build(context, &generator, logger).expect("Reconciliation failed")
}

fn config_to_apply_of(context: &ReconcileContext, index: usize) -> Option<String> {
    context
        .response_payload
        .as_ref()
        .expect("Response payload missing")
        .workspace_rails_infos[index]
        .config_to_apply
        .clone()
}

// ============================================================================
// Golden master
// ============================================================================

#[test]
fn test_generates_full_config_for_running_workspace() {
    let workspace = workspace(WORKSPACE_NAME);
    let logger = RecordingLogger::new();

    let resources = generate_desired_config(&workspace, true, &logger);

    let inventory = find_resource(&resources, "ConfigMap", "workspace-991-990-fedcba-workspace-inventory");
    assert!(inventory.is_some(), "Workspace inventory missing");

    let deployment = find_resource(&resources, "Deployment", WORKSPACE_NAME).expect("Deployment missing");
    assert_eq!(deployment["spec"]["replicas"], 1);
    assert_eq!(
        deployment["metadata"]["annotations"][ANNOTATION_MAX_RESOURCES_SHA256],
        "24aefc317e11db538ede450d1773e273966b9801b988d49e1219f2a9bf8e7f66"
    );
    assert_eq!(deployment["metadata"]["annotations"]["my-annotation"], "value");
    assert_eq!(deployment["metadata"]["labels"]["my-label"], "value");
    assert_eq!(deployment["metadata"]["labels"]["agent.gitlab.com/id"], "991");

    let env_secret = find_resource(&resources, "Secret", "workspace-991-990-fedcba-env-var")
        .expect("Env secret missing");
    assert_eq!(decode_secret_entry(env_secret, "ENV_VAR1").unwrap(), "env-var-value1");
    assert_eq!(
        decode_secret_entry(env_secret, "ENV_VAR2").unwrap(),
        "with spaces & symbols=1"
    );

    let file_secret = find_resource(&resources, "Secret", "workspace-991-990-fedcba-file")
        .expect("File secret missing");
    assert_eq!(decode_secret_entry(file_secret, "FILE_VAR1").unwrap(), "file-var-value1");
    assert_eq!(
        decode_secret_entry(file_secret, RECONCILED_ACTUAL_STATE_FILE).unwrap(),
        "Running"
    );

    assert!(logger.warnings().is_empty());
}

#[test]
fn test_full_round_payload_matches_legacy_generator() {
    let workspace = workspace(WORKSPACE_NAME);
    let logger = RecordingLogger::new();

    let context = run(context(UpdateType::Full, vec![workspace.clone()]), &logger);

    let payload = context.response_payload.as_ref().unwrap();
    assert_eq!(payload.settings, SETTINGS);
    let info = &payload.workspace_rails_infos[0];
    assert_eq!(info.name, WORKSPACE_NAME);
    assert_eq!(info.namespace, "gl-rd-ns-991-990-fedcba");
    assert_eq!(info.deployment_resource_version.as_deref(), Some("1"));
    assert_eq!(info.image_pull_secrets[0].name, "registry-secret");

    let shipped = parse_config_to_apply(info.config_to_apply.as_deref().unwrap()).unwrap();
    let expected = generate_desired_config(&workspace, true, &RecordingLogger::new());
    assert_eq!(shipped, expected);

    // the shadow run agreed with the new path
    assert!(logger.warnings().is_empty());
}

#[test]
fn test_payload_is_deterministic() {
    let first = run(
        context(UpdateType::Full, vec![workspace(WORKSPACE_NAME)]),
        &RecordingLogger::new(),
    );
    let second = run(
        context(UpdateType::Full, vec![workspace(WORKSPACE_NAME)]),
        &RecordingLogger::new(),
    );
    assert_eq!(config_to_apply_of(&first, 0), config_to_apply_of(&second, 0));
    assert!(config_to_apply_of(&first, 0).unwrap().starts_with("---\napiVersion: v1\n"));
}

// ============================================================================
// Partial reconciliation
// ============================================================================

#[test]
fn test_partial_round_ships_only_flagged_resources() {
    let mut workspace = workspace(WORKSPACE_NAME);
    workspace.desired_state = WorkspaceState::Stopped;
    workspace.desired_state_updated_at = workspace.responded_to_agent_at.unwrap() + Duration::seconds(1);
    let logger = RecordingLogger::new();

    let context = run(context(UpdateType::Partial, vec![workspace]), &logger);

    let resources = parse_config_to_apply(&config_to_apply_of(&context, 0).unwrap()).unwrap();
    assert!(!resources.is_empty());
    for resource in &resources {
        assert_eq!(
            resource_annotation(resource, ANNOTATION_INCLUDE_IN_PARTIAL_RECONCILIATION),
            Some("true"),
            "{:?} should not be in a partial round",
            resource_name(resource)
        );
    }
    let deployment = find_resource(&resources, "Deployment", WORKSPACE_NAME).unwrap();
    assert_eq!(deployment["spec"]["replicas"], 0);

    assert_eq!(
        context.observability_for_rails_infos[WORKSPACE_NAME].config_to_apply_resources_included,
        ResourcesIncluded::PartialResourcesIncluded
    );
    assert!(logger.warnings().is_empty());
}

#[test]
fn test_unchanged_workspace_gets_no_config() {
    let logger = RecordingLogger::new();
    let context = run(
        context(UpdateType::Partial, vec![workspace(WORKSPACE_NAME)]),
        &logger,
    );

    assert!(config_to_apply_of(&context, 0).is_none());
    assert_eq!(
        context.observability_for_rails_infos[WORKSPACE_NAME].config_to_apply_resources_included,
        ResourcesIncluded::NoResourcesIncluded
    );
    assert!(logger.lines().is_empty());
}

#[test]
fn test_batch_classifies_each_workspace() {
    let unchanged = workspace("workspace-991-990-aaaaaa");

    let mut forced = workspace("workspace-991-990-bbbbbb");
    forced.force_include_all_resources = true;

    let mut actual_changed = workspace("workspace-991-990-cccccc");
    actual_changed.actual_state = WorkspaceState::Stopped;
    actual_changed.actual_state_updated_at =
        actual_changed.responded_to_agent_at.unwrap() + Duration::seconds(1);

    let mut terminating = workspace("workspace-991-990-dddddd");
    terminating.desired_state = WorkspaceState::Terminated;

    let context = run(
        context(
            UpdateType::Partial,
            vec![unchanged, forced, actual_changed, terminating],
        ),
        &RecordingLogger::new(),
    );

    let classification = |name: &str| {
        context.observability_for_rails_infos[name].config_to_apply_resources_included
    };
    assert_eq!(classification("workspace-991-990-aaaaaa"), ResourcesIncluded::NoResourcesIncluded);
    assert_eq!(classification("workspace-991-990-bbbbbb"), ResourcesIncluded::AllResourcesIncluded);
    assert_eq!(classification("workspace-991-990-cccccc"), ResourcesIncluded::AllResourcesIncluded);
    assert_eq!(
        classification("workspace-991-990-dddddd"),
        ResourcesIncluded::PartialResourcesIncluded
    );

    let names: Vec<&str> = context
        .response_payload
        .as_ref()
        .unwrap()
        .workspace_rails_infos
        .iter()
        .map(|i| i.name.as_str())
        .collect();
    assert_eq!(
        names,
        [
            "workspace-991-990-aaaaaa",
            "workspace-991-990-bbbbbb",
            "workspace-991-990-cccccc",
            "workspace-991-990-dddddd"
        ]
    );

    // the actual state change ships the secrets too
    let shipped = parse_config_to_apply(&config_to_apply_of(&context, 2).unwrap()).unwrap();
    let file_secret = find_resource(&shipped, "Secret", "workspace-991-990-cccccc-file").unwrap();
    assert_eq!(
        decode_secret_entry(file_secret, RECONCILED_ACTUAL_STATE_FILE).unwrap(),
        "Stopped"
    );
}

#[test]
fn test_workspace_without_environment_variables_ships_no_empty_secret() {
    let mut workspace = workspace(WORKSPACE_NAME);
    workspace
        .workspace_variables
        .retain(|v| v.variable_type != VariableType::Environment);
    let logger = RecordingLogger::new();

    let context = run(context(UpdateType::Full, vec![workspace]), &logger);

    let shipped = parse_config_to_apply(&config_to_apply_of(&context, 0).unwrap()).unwrap();
    assert!(find_resource(&shipped, "Secret", "workspace-991-990-fedcba-env-var").is_none());
    let file_secret = find_resource(&shipped, "Secret", "workspace-991-990-fedcba-file")
        .expect("File secret missing");
    assert_eq!(decode_secret_entry(file_secret, "FILE_VAR1").unwrap(), "file-var-value1");

    // pods still start without the env Secret
    let deployment = find_resource(&shipped, "Deployment", WORKSPACE_NAME).expect("Deployment missing");
    let container = &deployment["spec"]["template"]["spec"]["containers"][0];
    assert_eq!(container["envFrom"][0]["secretRef"]["optional"], true);

    assert!(logger.warnings().is_empty());
}

// ============================================================================
// Termination
// ============================================================================

#[test]
fn test_terminated_workspace_ships_only_inventories() {
    let mut workspace = workspace(WORKSPACE_NAME);
    workspace.desired_state = WorkspaceState::Terminated;
    workspace.desired_state_updated_at = workspace.responded_to_agent_at.unwrap() + Duration::seconds(1);

    for update_type in [UpdateType::Full, UpdateType::Partial] {
        let logger = RecordingLogger::new();
        let context = run(context(update_type, vec![workspace.clone()]), &logger);

        let resources = parse_config_to_apply(&config_to_apply_of(&context, 0).unwrap()).unwrap();
        let names: Vec<&str> = resources.iter().filter_map(resource_name).collect();
        assert_eq!(
            names,
            [
                "workspace-991-990-fedcba-workspace-inventory",
                "workspace-991-990-fedcba-secrets-inventory"
            ]
        );
        assert!(resources.iter().all(|r| r.get("data").is_none()));
        assert!(logger.warnings().is_empty());
    }
}

#[test]
fn test_terminated_workspace_ignores_persisted_desired_config() {
    let mut workspace = workspace(WORKSPACE_NAME);
    let persisted: Vec<Resource> = generate_desired_config(&workspace, true, &RecordingLogger::new())
        .into_iter()
        .filter(|r| resource_kind(r) == Some("Deployment"))
        .collect();
    workspace.workspace_agentk_state = Some(WorkspaceAgentkState {
        desired_config: json!(persisted),
    });
    workspace.desired_state = WorkspaceState::Terminated;
    workspace.desired_state_updated_at = workspace.responded_to_agent_at.unwrap() + Duration::seconds(1);
    let logger = RecordingLogger::new();

    let context = run(context(UpdateType::Partial, vec![workspace]), &logger);

    let resources = parse_config_to_apply(&config_to_apply_of(&context, 0).unwrap()).unwrap();
    assert_eq!(resources.len(), 2);
    assert!(resources.iter().all(|r| resource_kind(r) == Some("ConfigMap")));
    assert!(logger.warnings().is_empty());
}

// ============================================================================
// Persisted desired config and shadow run
// ============================================================================

#[test]
fn test_divergent_agentk_state_is_reported_but_legacy_wins() {
    let mut workspace = workspace(WORKSPACE_NAME);
    let persisted: Vec<Resource> = generate_desired_config(&workspace, true, &RecordingLogger::new())
        .into_iter()
        .filter(|r| resource_kind(r) != Some("NetworkPolicy"))
        .collect();
    workspace.workspace_agentk_state = Some(WorkspaceAgentkState {
        desired_config: json!(persisted),
    });
    let logger = RecordingLogger::new();

    let context = run(context(UpdateType::Full, vec![workspace.clone()]), &logger);

    let warnings = logger.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        warnings[0].fields["error_type"],
        "workspaces_reconcile_desired_configs_differ"
    );
    assert_eq!(warnings[0].fields["workspace_id"], 993);
    assert!(!warnings[0].fields["diff"].as_array().unwrap().is_empty());

    let shipped = parse_config_to_apply(&config_to_apply_of(&context, 0).unwrap()).unwrap();
    assert!(find_resource(&shipped, "NetworkPolicy", WORKSPACE_NAME).is_some());

    assert!(logger
        .lines()
        .iter()
        .any(|l| l.message == "Using desired config from workspace agentk state"));
}

#[test]
fn test_invalid_agentk_state_fails_the_batch() {
    let mut workspace = workspace(WORKSPACE_NAME);
    workspace.workspace_agentk_state = Some(WorkspaceAgentkState {
        desired_config: json!({ "kind": "ConfigMap" }),
    });
    let logger = RecordingLogger::new();
    let generator = LegacyDesiredConfigGenerator::new(&logger);

    let err = response_payload_builder::build(context(UpdateType::Full, vec![workspace]), &generator, &logger)
        .unwrap_err();
    assert_eq!(err.code(), 1001);
}

// ============================================================================
// Devfile failures
// ============================================================================

#[test]
fn test_broken_devfile_degrades_to_empty_config() {
    let mut broken = workspace("workspace-991-990-broken");
    broken.processed_devfile = "schemaVersion: 2.2.0\ncomponents: {".to_string();
    let healthy = workspace(WORKSPACE_NAME);
    let logger = RecordingLogger::new();

    let context = run(context(UpdateType::Full, vec![broken, healthy]), &logger);

    assert_eq!(config_to_apply_of(&context, 0).as_deref(), Some(""));
    assert!(!config_to_apply_of(&context, 1).unwrap().is_empty());

    let parser_errors: Vec<LogLine> = logger
        .warnings()
        .into_iter()
        .filter(|l| l.fields["error_type"] == "reconcile_devfile_parser_error")
        .collect();
    assert!(!parser_errors.is_empty());
    assert_eq!(parser_errors[0].fields["workspace_name"], "workspace-991-990-broken");
    assert_eq!(parser_errors[0].fields["workspace_namespace"], "gl-rd-ns-991-990-broken");
}

// ============================================================================
// Observer and request handling
// ============================================================================

#[test]
fn test_observer_redacts_config_to_apply() {
    let logger = RecordingLogger::new();
    let context = run(
        context(UpdateType::Full, vec![workspace(WORKSPACE_NAME)]),
        &logger,
    );

    let observer_logger = RecordingLogger::new();
    response_payload_observer::observe(&context, &observer_logger);
    let lines = observer_logger.lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].message, "Returning verified response_payload");
    let infos = &lines[0].fields["response_payload"]["workspace_rails_infos"];
    assert_eq!(infos[0]["config_to_apply"], "<redacted>");

    let observed = context.with_observe_config_to_apply(true);
    let observer_logger = RecordingLogger::new();
    response_payload_observer::observe(&observed, &observer_logger);
    let fields = &observer_logger.lines()[0].fields;
    assert!(fields["response_payload"]["workspace_rails_infos"][0]["config_to_apply"]
        .as_str()
        .unwrap()
        .starts_with("---\n"));
}

#[test]
fn test_request_document_deserializes() {
    let request: ReconcileRequest = serde_json::from_value(json!({
        "agent_id": AGENT_ID,
        "update_type": "partial",
        "workspaces": [workspace_json(WORKSPACE_NAME)]
    }))
    .unwrap();

    assert_eq!(request.update_type, UpdateType::Partial);
    assert_eq!(request.workspaces.len(), 1);
    assert_eq!(request.workspaces[0].desired_state, WorkspaceState::Running);
    assert!(request.workspaces[0].workspace_agentk_state.is_none());
    assert_eq!(
        request.workspaces[0]
            .workspaces_agent_config
            .gitlab_workspaces_proxy_namespace,
        "gitlab-workspaces"
    );
}
