//! Renders a processed devfile into the workspace's core Kubernetes resources

use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

use crate::domain::agent_config::ImagePullSecret;
use crate::domain::desired_config::Resource;
use crate::domain::devfile::{ContainerComponent, Devfile};
use crate::domain::keys::{RUN_AS_USER, VARIABLES_FILE_MOUNT_PATH, WORKSPACE_SCRIPTS_MOUNT_PATH};
use crate::infra::logger::ReconcileLogger;

const SCRIPTS_VOLUME_NAME: &str = "gl-workspace-scripts";
const DEFAULT_VOLUME_SIZE: &str = "15Gi";

/// Devfile errors. These never escape [`get_all`].
#[derive(Debug, Error)]
pub enum DevfileError {
    #[error("Devfile YAML could not be parsed: {0}")]
    Syntax(#[from] serde_yaml::Error),

    #[error("Devfile is invalid: {0}")]
    Invalid(String),
}

/// Inputs for rendering a devfile
#[derive(Debug, Clone)]
pub struct DevfileParserParams {
    pub name: String,
    pub namespace: String,
    pub replicas: i64,
    pub domain_template: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub env_secret_names: Vec<String>,
    pub file_secret_names: Vec<String>,
    pub default_resources_per_workspace_container: Map<String, Value>,
    pub allow_privilege_escalation: bool,
    pub use_kubernetes_user_namespaces: bool,
    pub default_runtime_class: String,
    pub service_account_name: String,
    pub image_pull_secrets: Vec<ImagePullSecret>,
    pub scripts_configmap_name: String,
}

/// A postStart command rendered as a script file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostStartScript {
    pub command_id: String,
    pub component: String,
    pub body: String,
}

/// Init container derived from a preStart apply command
#[derive(Debug, Clone)]
struct InitContainer<'a> {
    name: String,
    container: &'a ContainerComponent,
}

/// Render Deployment, Service, PVCs and ServiceAccount for a devfile.
///
/// Any failure is logged and yields an empty list so one broken devfile
/// cannot fail the reconciliation of other workspaces.
pub fn get_all(
    processed_devfile_yaml: &str,
    params: &DevfileParserParams,
    logger: &dyn ReconcileLogger,
) -> Vec<Resource> {
    match try_get_all(processed_devfile_yaml, params) {
        Ok(resources) => resources,
        Err(e) => {
            logger.warn(
                "Error parsing devfile",
                json!({
                    "error_type": "reconcile_devfile_parser_error",
                    "workspace_name": params.name,
                    "workspace_namespace": params.namespace,
                    "devfile_parser_error": e.to_string(),
                }),
            );
            Vec::new()
        }
    }
}

/// PostStart scripts in event order
pub fn scripts_from_devfile(
    processed_devfile_yaml: &str,
) -> Result<Vec<PostStartScript>, DevfileError> {
    let devfile = parse(processed_devfile_yaml)?;
    post_start_scripts(&devfile)
}

fn parse(processed_devfile_yaml: &str) -> Result<Devfile, DevfileError> {
    let devfile: Devfile = serde_yaml::from_str(processed_devfile_yaml)?;
    if !devfile.schema_version.starts_with("2.") {
        return Err(DevfileError::Invalid(format!(
            "unsupported schemaVersion '{}'",
            devfile.schema_version
        )));
    }
    Ok(devfile)
}

fn try_get_all(
    processed_devfile_yaml: &str,
    params: &DevfileParserParams,
) -> Result<Vec<Resource>, DevfileError> {
    let devfile = parse(processed_devfile_yaml)?;

    let init_containers = pre_start_init_containers(&devfile)?;
    let init_component_names: HashSet<&str> = devfile
        .events
        .pre_start
        .iter()
        .filter_map(|id| devfile.command(id))
        .filter_map(|c| c.apply.as_ref())
        .map(|a| a.component.as_str())
        .collect();

    let containers: Vec<(&str, &ContainerComponent)> = devfile
        .container_components()
        .filter(|(c, _)| !init_component_names.contains(c.name.as_str()))
        .map(|(c, container)| (c.name.as_str(), container))
        .collect();
    if containers.is_empty() {
        return Err(DevfileError::Invalid(
            "at least one container component is required".to_string(),
        ));
    }

    let volume_names: HashSet<&str> = devfile
        .volume_components()
        .map(|(c, _)| c.name.as_str())
        .collect();
    let init_mounts = init_containers
        .iter()
        .map(|init| (init.name.as_str(), init.container));
    for (name, container) in containers.iter().copied().chain(init_mounts) {
        for mount in &container.volume_mounts {
            if !volume_names.contains(mount.name.as_str()) {
                return Err(DevfileError::Invalid(format!(
                    "container '{}' mounts unknown volume '{}'",
                    name, mount.name
                )));
            }
        }
    }

    let scripts = post_start_scripts(&devfile)?;

    let mut resources = vec![deployment(
        &devfile,
        params,
        &containers,
        &init_containers,
        &scripts,
    )];

    let service_ports: Vec<Value> = containers
        .iter()
        .flat_map(|(_, container)| container.endpoints.iter())
        .map(|endpoint| {
            json!({
                "name": endpoint.name,
                "port": endpoint.target_port,
                "protocol": k8s_protocol(endpoint.protocol.as_deref()),
                "targetPort": endpoint.target_port,
            })
        })
        .collect();
    if !service_ports.is_empty() {
        resources.push(json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": object_metadata(&params.name, params),
            "spec": {
                "ports": service_ports,
                "selector": params.labels,
                "type": "ClusterIP",
            },
        }));
    }

    for (component, volume) in devfile.volume_components() {
        if volume.ephemeral {
            continue;
        }
        let claim_name = pvc_name(&params.name, &component.name);
        resources.push(json!({
            "apiVersion": "v1",
            "kind": "PersistentVolumeClaim",
            "metadata": object_metadata(&claim_name, params),
            "spec": {
                "accessModes": ["ReadWriteOnce"],
                "resources": {
                    "requests": {
                        "storage": volume.size.as_deref().unwrap_or(DEFAULT_VOLUME_SIZE),
                    },
                },
            },
        }));
    }

    let image_pull_secrets: Vec<Value> = params
        .image_pull_secrets
        .iter()
        .map(|s| json!({ "name": s.name }))
        .collect();
    resources.push(json!({
        "apiVersion": "v1",
        "kind": "ServiceAccount",
        "metadata": object_metadata(&params.service_account_name, params),
        "automountServiceAccountToken": false,
        "imagePullSecrets": image_pull_secrets,
    }));

    Ok(resources)
}

fn pre_start_init_containers(devfile: &Devfile) -> Result<Vec<InitContainer<'_>>, DevfileError> {
    devfile
        .events
        .pre_start
        .iter()
        .map(|command_id| {
            let command = devfile.command(command_id).ok_or_else(|| {
                DevfileError::Invalid(format!("preStart event references unknown command '{}'", command_id))
            })?;
            let apply = command.apply.as_ref().ok_or_else(|| {
                DevfileError::Invalid(format!("preStart command '{}' must be an apply command", command_id))
            })?;
            let container = devfile.container(&apply.component).ok_or_else(|| {
                DevfileError::Invalid(format!(
                    "command '{}' references unknown container component '{}'",
                    command_id, apply.component
                ))
            })?;
            Ok(InitContainer {
                name: format!("{}-{}-init", apply.component, command_id),
                container,
            })
        })
        .collect()
}

fn post_start_scripts(devfile: &Devfile) -> Result<Vec<PostStartScript>, DevfileError> {
    devfile
        .events
        .post_start
        .iter()
        .map(|command_id| {
            let command = devfile.command(command_id).ok_or_else(|| {
                DevfileError::Invalid(format!("postStart event references unknown command '{}'", command_id))
            })?;
            let exec = command.exec.as_ref().ok_or_else(|| {
                DevfileError::Invalid(format!("postStart command '{}' must be an exec command", command_id))
            })?;
            let component = match &exec.component {
                Some(component) => component.clone(),
                None => devfile
                    .main_component_name()
                    .ok_or_else(|| {
                        DevfileError::Invalid(format!(
                            "command '{}' has no component and the devfile has no main component",
                            command_id
                        ))
                    })?
                    .to_string(),
            };
            if devfile.container(&component).is_none() {
                return Err(DevfileError::Invalid(format!(
                    "command '{}' references unknown container component '{}'",
                    command_id, component
                )));
            }

            let mut body = String::new();
            if let Some(working_dir) = &exec.working_dir {
                body.push_str(&format!("cd \"{}\" || exit 1\n", working_dir));
            }
            body.push_str(&exec.command_line);
            body.push('\n');

            Ok(PostStartScript {
                command_id: command_id.clone(),
                component,
                body,
            })
        })
        .collect()
}

fn deployment(
    devfile: &Devfile,
    params: &DevfileParserParams,
    containers: &[(&str, &ContainerComponent)],
    init_containers: &[InitContainer<'_>],
    scripts: &[PostStartScript],
) -> Resource {
    let rendered_containers: Vec<Value> = containers
        .iter()
        .map(|(name, container)| {
            let own_scripts: Vec<&PostStartScript> =
                scripts.iter().filter(|s| s.component == *name).collect();
            let mut rendered = container_spec(name, container, params, true);
            if !own_scripts.is_empty() {
                append_scripts_mount(&mut rendered);
                rendered["lifecycle"] = post_start_hook(&own_scripts);
            }
            rendered
        })
        .collect();

    let rendered_init_containers: Vec<Value> = init_containers
        .iter()
        .map(|init| container_spec(&init.name, init.container, params, false))
        .collect();

    let mut volumes: Vec<Value> = devfile
        .volume_components()
        .map(|(component, volume)| {
            if volume.ephemeral {
                let mut empty_dir = json!({});
                if let Some(size) = &volume.size {
                    empty_dir["sizeLimit"] = json!(size);
                }
                json!({ "name": component.name, "emptyDir": empty_dir })
            } else {
                json!({
                    "name": component.name,
                    "persistentVolumeClaim": { "claimName": pvc_name(&params.name, &component.name) },
                })
            }
        })
        .collect();
    for secret_name in &params.file_secret_names {
        volumes.push(json!({
            "name": secret_name,
            "secret": { "defaultMode": 0o774, "secretName": secret_name },
        }));
    }
    if !scripts.is_empty() {
        volumes.push(json!({
            "name": SCRIPTS_VOLUME_NAME,
            "configMap": { "defaultMode": 0o555, "name": params.scripts_configmap_name },
        }));
    }

    let mut pod_spec = json!({
        "automountServiceAccountToken": false,
        "containers": rendered_containers,
        "enableServiceLinks": false,
        "securityContext": {
            "fsGroup": 0,
            "fsGroupChangePolicy": "OnRootMismatch",
            "runAsNonRoot": true,
            "runAsUser": RUN_AS_USER,
        },
        "serviceAccountName": params.service_account_name,
        "volumes": volumes,
    });
    if !rendered_init_containers.is_empty() {
        pod_spec["initContainers"] = Value::Array(rendered_init_containers);
    }
    if params.use_kubernetes_user_namespaces {
        pod_spec["hostUsers"] = json!(false);
    }
    if !params.default_runtime_class.is_empty() {
        pod_spec["runtimeClassName"] = json!(params.default_runtime_class);
    }

    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": object_metadata(&params.name, params),
        "spec": {
            "replicas": params.replicas,
            "selector": { "matchLabels": params.labels },
            "strategy": { "type": "Recreate" },
            "template": {
                "metadata": object_metadata(&params.name, params),
                "spec": pod_spec,
            },
        },
    })
}

fn container_spec(
    name: &str,
    container: &ContainerComponent,
    params: &DevfileParserParams,
    with_ports: bool,
) -> Value {
    let mut env: Vec<Value> = container
        .env
        .iter()
        .map(|e| json!({ "name": e.name, "value": e.value }))
        .collect();
    env.push(json!({
        "name": "GL_WORKSPACE_DOMAIN_TEMPLATE",
        "value": params.domain_template.replace("{{.port}}", "${PORT}"),
    }));

    let env_from: Vec<Value> = params
        .env_secret_names
        .iter()
        .map(|s| json!({ "secretRef": { "name": s, "optional": true } }))
        .collect();

    let mut volume_mounts: Vec<Value> = container
        .volume_mounts
        .iter()
        .map(|m| json!({ "mountPath": m.path, "name": m.name }))
        .collect();
    for secret_name in &params.file_secret_names {
        volume_mounts.push(json!({ "mountPath": VARIABLES_FILE_MOUNT_PATH, "name": secret_name }));
    }

    let mut spec = json!({
        "env": env,
        "envFrom": env_from,
        "image": container.image,
        "imagePullPolicy": "IfNotPresent",
        "name": name,
        "securityContext": {
            "allowPrivilegeEscalation": params.allow_privilege_escalation,
            "privileged": false,
            "runAsNonRoot": true,
            "runAsUser": RUN_AS_USER,
        },
        "volumeMounts": volume_mounts,
    });
    if !container.command.is_empty() {
        spec["command"] = json!(container.command);
    }
    if !container.args.is_empty() {
        spec["args"] = json!(container.args);
    }
    if with_ports && !container.endpoints.is_empty() {
        let ports: Vec<Value> = container
            .endpoints
            .iter()
            .map(|e| {
                json!({
                    "containerPort": e.target_port,
                    "name": e.name,
                    "protocol": k8s_protocol(e.protocol.as_deref()),
                })
            })
            .collect();
        spec["ports"] = Value::Array(ports);
    }
    let resources = container_resources(container, &params.default_resources_per_workspace_container);
    if !resources.is_empty() {
        spec["resources"] = Value::Object(resources);
    }
    spec
}

/// Agent defaults overridden by the devfile's explicit requests/limits
fn container_resources(
    container: &ContainerComponent,
    defaults: &Map<String, Value>,
) -> Map<String, Value> {
    let mut resources = defaults.clone();
    let overrides = [
        ("limits", "cpu", &container.cpu_limit),
        ("limits", "memory", &container.memory_limit),
        ("requests", "cpu", &container.cpu_request),
        ("requests", "memory", &container.memory_request),
    ];
    for (section, key, value) in overrides {
        if let Some(value) = value {
            let entry = resources
                .entry(section.to_string())
                .or_insert_with(|| json!({}));
            if !entry.is_object() {
                *entry = json!({});
            }
            entry[key] = json!(value);
        }
    }
    resources
}

fn append_scripts_mount(container: &mut Value) {
    if let Some(mounts) = container["volumeMounts"].as_array_mut() {
        mounts.push(json!({ "mountPath": WORKSPACE_SCRIPTS_MOUNT_PATH, "name": SCRIPTS_VOLUME_NAME }));
    }
}

fn post_start_hook(scripts: &[&PostStartScript]) -> Value {
    let runner = scripts
        .iter()
        .map(|s| format!("/bin/sh {}/{} || true", WORKSPACE_SCRIPTS_MOUNT_PATH, s.command_id))
        .collect::<Vec<_>>()
        .join("\n");
    json!({
        "postStart": {
            "exec": { "command": ["/bin/sh", "-c", runner] },
        },
    })
}

fn object_metadata(name: &str, params: &DevfileParserParams) -> Value {
    json!({
        "annotations": params.annotations,
        "labels": params.labels,
        "name": name,
        "namespace": params.namespace,
    })
}

fn pvc_name(workspace_name: &str, volume_name: &str) -> String {
    format!("{}-{}", workspace_name, volume_name)
}

fn k8s_protocol(devfile_protocol: Option<&str>) -> &'static str {
    match devfile_protocol {
        Some("udp") => "UDP",
        _ => "TCP",
    }
}
