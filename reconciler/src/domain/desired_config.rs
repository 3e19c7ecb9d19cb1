//! Desired config value object

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// A Kubernetes-resource-shaped JSON object (kind, metadata, spec, data, ...)
pub type Resource = Value;

pub fn resource_kind(resource: &Resource) -> Option<&str> {
    resource.get("kind").and_then(Value::as_str)
}

pub fn resource_name(resource: &Resource) -> Option<&str> {
    resource
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
}

pub fn resource_annotation<'a>(resource: &'a Resource, key: &str) -> Option<&'a str> {
    resource
        .get("metadata")
        .and_then(|m| m.get("annotations"))
        .and_then(|a| a.get(key))
        .and_then(Value::as_str)
}

/// Ordered set of resources describing what a workspace should look like
/// in the cluster.
///
/// Construction does not validate; call [`DesiredConfig::validate`] before
/// handing the resources to anything that renders them for the agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesiredConfig {
    desired_config_array: Vec<Resource>,
}

impl DesiredConfig {
    pub fn new(desired_config_array: Vec<Resource>) -> Self {
        Self {
            desired_config_array,
        }
    }

    /// Wrap a persisted value, which must be a JSON array
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => Ok(Self::new(items)),
            other => Err(Error::InvalidDesiredConfig(format!(
                "expected an array of resources, got {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn desired_config_array(&self) -> &[Resource] {
        &self.desired_config_array
    }

    pub fn into_array(self) -> Vec<Resource> {
        self.desired_config_array
    }

    /// Check every resource against the minimal manifest contract
    pub fn validate(&self) -> Result<()> {
        for (index, resource) in self.desired_config_array.iter().enumerate() {
            validate_resource(resource).map_err(|reason| {
                Error::InvalidDesiredConfig(format!("resource at index {}: {}", index, reason))
            })?;
        }
        Ok(())
    }
}

fn validate_resource(resource: &Resource) -> std::result::Result<(), String> {
    let object = resource
        .as_object()
        .ok_or_else(|| format!("expected an object, got {}", json_type_name(resource)))?;

    let kind = object
        .get("kind")
        .and_then(Value::as_str)
        .ok_or("missing string field 'kind'")?;
    if kind.trim().is_empty() {
        return Err("'kind' cannot be empty".to_string());
    }

    let metadata = object
        .get("metadata")
        .and_then(Value::as_object)
        .ok_or("missing object field 'metadata'")?;

    let name = metadata
        .get("name")
        .and_then(Value::as_str)
        .ok_or("missing string field 'metadata.name'")?;
    if name.trim().is_empty() {
        return Err("'metadata.name' cannot be empty".to_string());
    }

    for field in ["labels", "annotations"] {
        if let Some(value) = metadata.get(field) {
            ensure_string_map(value).map_err(|e| format!("metadata.{}: {}", field, e))?;
        }
    }

    if matches!(kind, "ConfigMap" | "Secret") {
        if let Some(data) = object.get("data") {
            ensure_string_map(data).map_err(|e| format!("data: {}", e))?;
        }
    }

    Ok(())
}

fn ensure_string_map(value: &Value) -> std::result::Result<(), String> {
    let map = value
        .as_object()
        .ok_or_else(|| format!("expected a map, got {}", json_type_name(value)))?;
    match map.iter().find(|(_, v)| !v.is_string()) {
        Some((key, v)) => Err(format!(
            "value for '{}' must be a string, got {}",
            key,
            json_type_name(v)
        )),
        None => Ok(()),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
