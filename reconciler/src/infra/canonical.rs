//! Canonical renderings of JSON values

use serde_json::{Map, Value};

/// Recursively sort every object's keys.
///
/// Used for comparison and YAML rendering. Array order is kept.
pub fn deep_sort(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), deep_sort(&map[key.as_str()]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(deep_sort).collect()),
        other => other.clone(),
    }
}

/// Sort only the top-level keys of a map, leaving nested maps untouched
pub fn shallow_sort(map: &Map<String, Value>) -> Map<String, Value> {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
        .into_iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Render a value the way Ruby's `Hash#inspect` renders a symbol-keyed hash,
/// e.g. `{:limits=>{:cpu=>"2"}}`.
///
/// The resource digest annotation is computed over this text, so the output
/// must stay byte-for-byte stable.
pub fn ruby_inspect(value: &Value) -> String {
    let mut out = String::new();
    write_ruby_inspect(value, &mut out);
    out
}

fn write_ruby_inspect(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("nil"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            if let Some(f) = n.as_f64().filter(|_| n.is_f64()) {
                // Ruby always prints a fractional part for floats
                if f.fract() == 0.0 && f.is_finite() {
                    out.push_str(&format!("{:.1}", f));
                } else {
                    out.push_str(&f.to_string());
                }
            } else {
                out.push_str(&n.to_string());
            }
        }
        Value::String(s) => write_ruby_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_ruby_inspect(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_ruby_symbol(key, out);
                out.push_str("=>");
                write_ruby_inspect(item, out);
            }
            out.push('}');
        }
    }
}

fn write_ruby_symbol(key: &str, out: &mut String) {
    out.push(':');
    if is_plain_symbol(key) {
        out.push_str(key);
    } else {
        write_ruby_string(key, out);
    }
}

fn is_plain_symbol(key: &str) -> bool {
    let mut chars = key.chars();
    let starts_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    if !starts_ok {
        return false;
    }
    let body = key.trim_end_matches(['?', '!']);
    // At most one trailing ? or !
    if key.len() - body.len() > 1 {
        return false;
    }
    body.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn write_ruby_string(s: &str, out: &mut String) {
    out.push('"');
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '#' if matches!(chars.peek(), Some('{' | '$' | '@')) => out.push_str("\\#"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{0c}' => out.push_str("\\f"),
            '\u{0b}' => out.push_str("\\v"),
            '\u{08}' => out.push_str("\\b"),
            '\u{07}' => out.push_str("\\a"),
            '\u{1b}' => out.push_str("\\e"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                out.push_str(&format!("\\u{:04X}", c as u32))
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
