//! Devfile model
//!
//! Only the subset of the devfile 2.x schema that the processed devfile can
//! contain is modelled. Unknown keys are ignored.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::keys::MAIN_COMPONENT_ATTRIBUTE;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Devfile {
    pub schema_version: String,

    #[serde(default)]
    pub components: Vec<Component>,

    #[serde(default)]
    pub commands: Vec<Command>,

    #[serde(default)]
    pub events: Events,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,

    #[serde(default)]
    pub attributes: Map<String, Value>,

    #[serde(default)]
    pub container: Option<ContainerComponent>,

    #[serde(default)]
    pub volume: Option<VolumeComponent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerComponent {
    pub image: String,

    #[serde(default)]
    pub command: Vec<String>,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: Vec<EnvVar>,

    #[serde(default)]
    pub endpoints: Vec<Endpoint>,

    #[serde(default)]
    pub volume_mounts: Vec<VolumeMount>,

    pub memory_limit: Option<String>,
    pub memory_request: Option<String>,
    pub cpu_limit: Option<String>,
    pub cpu_request: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub name: String,
    pub target_port: u16,

    #[serde(default)]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolumeMount {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VolumeComponent {
    pub size: Option<String>,

    #[serde(default)]
    pub ephemeral: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Command {
    pub id: String,

    #[serde(default)]
    pub exec: Option<ExecCommand>,

    #[serde(default)]
    pub apply: Option<ApplyCommand>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecCommand {
    pub command_line: String,

    /// Older processed devfiles omit the component; the command then runs in
    /// the main component.
    #[serde(default)]
    pub component: Option<String>,

    #[serde(default)]
    pub working_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplyCommand {
    pub component: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Events {
    #[serde(default)]
    pub pre_start: Vec<String>,

    #[serde(default)]
    pub post_start: Vec<String>,
}

impl Component {
    pub fn is_main(&self) -> bool {
        self.attributes
            .get(MAIN_COMPONENT_ATTRIBUTE)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

impl Devfile {
    /// Container components in declaration order
    pub fn container_components(&self) -> impl Iterator<Item = (&Component, &ContainerComponent)> {
        self.components
            .iter()
            .filter_map(|c| c.container.as_ref().map(|container| (c, container)))
    }

    /// Volume components in declaration order
    pub fn volume_components(&self) -> impl Iterator<Item = (&Component, &VolumeComponent)> {
        self.components
            .iter()
            .filter_map(|c| c.volume.as_ref().map(|volume| (c, volume)))
    }

    pub fn command(&self, id: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.id == id)
    }

    pub fn container(&self, name: &str) -> Option<&ContainerComponent> {
        self.components
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| c.container.as_ref())
    }

    /// Component flagged as main, falling back to the first container component
    pub fn main_component_name(&self) -> Option<&str> {
        self.container_components()
            .find(|(c, _)| c.is_main())
            .or_else(|| self.container_components().next())
            .map(|(c, _)| c.name.as_str())
    }
}
