//! Multi-document YAML rendering

use crate::domain::desired_config::Resource;
use crate::error::Result;
use crate::infra::canonical::deep_sort;

/// Render resources as one YAML stream, one `---`-prefixed document per
/// resource, with every map's keys sorted.
pub fn to_yaml_stream(resources: &[Resource]) -> Result<String> {
    let mut stream = String::new();
    for resource in resources {
        stream.push_str("---\n");
        stream.push_str(&serde_yaml::to_string(&deep_sort(resource))?);
    }
    Ok(stream)
}

/// Parse a YAML stream back into resources
pub fn from_yaml_stream(stream: &str) -> Result<Vec<Resource>> {
    let mut resources = Vec::new();
    for document in serde_yaml::Deserializer::from_str(stream) {
        let value: serde_json::Value = serde::Deserialize::deserialize(document)?;
        if !value.is_null() {
            resources.push(value);
        }
    }
    Ok(resources)
}
