//! Structural diff between two JSON documents

use serde::Serialize;
use serde_json::Value;

/// Kind of difference found at a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiffOp {
    #[serde(rename = "+")]
    Added,
    #[serde(rename = "-")]
    Removed,
    #[serde(rename = "~")]
    Changed,
}

/// One difference, addressed by a path like `[0].spec.replicas`.
///
/// Values are not carried: both sides may contain secret data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffEntry {
    pub op: DiffOp,
    pub path: String,
}

/// Compute the differences going from `old` to `new`.
///
/// Objects are compared key by key, arrays index by index.
pub fn structural_diff(old: &Value, new: &Value) -> Vec<DiffEntry> {
    let mut entries = Vec::new();
    diff_at("", old, new, &mut entries);
    entries
}

fn diff_at(path: &str, old: &Value, new: &Value, out: &mut Vec<DiffEntry>) {
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            for (key, old_value) in old_map {
                let child = key_path(path, key);
                match new_map.get(key) {
                    Some(new_value) => diff_at(&child, old_value, new_value, out),
                    None => out.push(DiffEntry {
                        op: DiffOp::Removed,
                        path: child,
                    }),
                }
            }
            for key in new_map.keys().filter(|k| !old_map.contains_key(*k)) {
                out.push(DiffEntry {
                    op: DiffOp::Added,
                    path: key_path(path, key),
                });
            }
        }
        (Value::Array(old_items), Value::Array(new_items)) => {
            for index in 0..old_items.len().max(new_items.len()) {
                let child = format!("{}[{}]", path, index);
                match (old_items.get(index), new_items.get(index)) {
                    (Some(o), Some(n)) => diff_at(&child, o, n, out),
                    (Some(_), None) => out.push(DiffEntry {
                        op: DiffOp::Removed,
                        path: child,
                    }),
                    (None, Some(_)) => out.push(DiffEntry {
                        op: DiffOp::Added,
                        path: child,
                    }),
                    (None, None) => {}
                }
            }
        }
        _ => {
            if old != new {
                out.push(DiffEntry {
                    op: DiffOp::Changed,
                    path: path.to_string(),
                });
            }
        }
    }
}

fn key_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}
