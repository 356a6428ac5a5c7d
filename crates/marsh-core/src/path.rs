//! Dotted-path helpers over `serde_json::Value` trees.
//!
//! Attribute names such as `"author.name"` address nested mappings. Reads
//! return `None` as soon as a segment is absent; writes create intermediate
//! mappings on demand.

use serde_json::{Map, Value};

use crate::error::MarshError;

/// Read the value at a dotted path.
///
/// Numeric segments index into arrays.
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(direct) = value.as_object().and_then(|obj| obj.get(path)) {
        return Some(direct);
    }
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(obj) => obj.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write `value` at a dotted path inside `target`.
///
/// # Errors
///
/// Returns [`MarshError::AttributePath`] if an intermediate segment already
/// holds a non-mapping value.
pub fn set_path(
    target: &mut Map<String, Value>,
    path: &str,
    value: Value,
) -> Result<(), MarshError> {
    let mut segments = path.split('.').peekable();
    let mut current = target;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return Ok(());
        }
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        current = match slot {
            Value::Object(inner) => inner,
            _ => {
                return Err(MarshError::AttributePath {
                    path: path.to_string(),
                    segment: segment.to_string(),
                })
            }
        };
    }
    Ok(())
}

/// Remove and return the value at a dotted path.
pub fn remove_path(target: &mut Value, path: &str) -> Option<Value> {
    let obj = target.as_object_mut()?;
    if obj.contains_key(path) {
        return obj.remove(path);
    }
    let (parent, last) = path.rsplit_once('.')?;
    let mut current = obj;
    for segment in parent.split('.') {
        current = current.get_mut(segment)?.as_object_mut()?;
    }
    current.remove(last)
}

/// Short name of a value's JSON type, for diagnostics.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
