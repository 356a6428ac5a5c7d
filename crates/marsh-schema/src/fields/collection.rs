//! Container field kinds: [`List`] and [`Dict`].
//!
//! Item failures never abort the container. Errors are keyed by item index
//! (lists) or by mapping key and side (dicts), and the failing error carries
//! the successfully converted items as its valid data.

use serde_json::{Map, Value};

use marsh_core::{ErrorKey, ErrorNode, ErrorStore, MarshError, ValidationError};

use crate::field::{Field, FieldKind, FieldScope};

// ─── List ────────────────────────────────────────────────────────────

/// Homogeneous list; every item goes through the inner field.
#[derive(Debug, Clone)]
pub struct List {
    inner: Field,
}

impl List {
    /// A list of `inner` items.
    pub fn new(inner: Field) -> Self {
        Self { inner }
    }

    /// The item field.
    pub fn inner(&self) -> &Field {
        &self.inner
    }
}

impl FieldKind for List {
    fn type_name(&self) -> &'static str {
        "list"
    }

    fn default_error_messages(&self) -> &'static [(&'static str, &'static str)] {
        &[("invalid", "Not a valid list.")]
    }

    fn serialize(
        &self,
        field: &Field,
        value: &Value,
        obj: &Value,
        scope: &FieldScope<'_>,
    ) -> Result<Value, MarshError> {
        let items = match value {
            Value::Null => return Ok(Value::Null),
            Value::Array(items) => items,
            _ => return Err(field.make_error("invalid")),
        };
        let mut out = Vec::with_capacity(items.len());
        let mut errors = ErrorStore::new();
        for (i, item) in items.iter().enumerate() {
            match self.inner.serialize_value(item, obj, scope) {
                Ok(v) => out.push(v),
                Err(MarshError::Validation(err)) => {
                    errors.insert(ErrorKey::Index(i), err.into_messages())
                }
                Err(other) => return Err(other),
            }
        }
        finish(Value::Array(out), errors)
    }

    fn deserialize(
        &self,
        field: &Field,
        value: &Value,
        data: &Value,
        scope: &FieldScope<'_>,
    ) -> Result<Value, MarshError> {
        let Value::Array(items) = value else {
            return Err(field.make_error("invalid"));
        };
        let mut out = Vec::with_capacity(items.len());
        let mut errors = ErrorStore::new();
        for (i, item) in items.iter().enumerate() {
            match self.inner.deserialize(Some(item), data, scope) {
                Ok(Some(v)) => out.push(v),
                Ok(None) => {}
                Err(MarshError::Validation(err)) => {
                    if let Some(valid) = err.valid_data() {
                        out.push(valid.clone());
                    }
                    errors.insert(ErrorKey::Index(i), err.into_messages());
                }
                Err(other) => return Err(other),
            }
        }
        finish(Value::Array(out), errors)
    }
}

// ─── Dict ────────────────────────────────────────────────────────────

/// Mapping with optional key and value fields.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    keys: Option<Field>,
    values: Option<Field>,
}

impl Dict {
    /// Convert keys through `field`. Converted keys must be strings.
    pub fn keys(mut self, field: Field) -> Self {
        self.keys = Some(field);
        self
    }

    /// Convert values through `field`.
    pub fn values(mut self, field: Field) -> Self {
        self.values = Some(field);
        self
    }

    fn convert(
        &self,
        map: &Map<String, Value>,
        mut key_fn: impl FnMut(&Field, &Value) -> Result<Value, MarshError>,
        mut value_fn: impl FnMut(&Field, &Value) -> Result<Value, MarshError>,
    ) -> Result<Value, MarshError> {
        let mut out = Map::new();
        let mut errors = ErrorStore::new();
        for (k, v) in map {
            let mut failed = false;
            let key = match &self.keys {
                None => k.clone(),
                Some(field) => match key_fn(field, &Value::String(k.clone())) {
                    Ok(Value::String(s)) => s,
                    Ok(other) => other.to_string(),
                    Err(MarshError::Validation(err)) => {
                        let nested = ErrorStore::single("key", err.into_messages());
                        errors.insert(k.as_str(), ErrorNode::Nested(nested));
                        failed = true;
                        k.clone()
                    }
                    Err(other) => return Err(other),
                },
            };
            let value = match &self.values {
                None => v.clone(),
                Some(field) => match value_fn(field, v) {
                    Ok(converted) => converted,
                    Err(MarshError::Validation(err)) => {
                        let nested = ErrorStore::single("value", err.into_messages());
                        errors.insert(k.as_str(), ErrorNode::Nested(nested));
                        continue;
                    }
                    Err(other) => return Err(other),
                },
            };
            if !failed {
                out.insert(key, value);
            }
        }
        finish(Value::Object(out), errors)
    }
}

impl FieldKind for Dict {
    fn type_name(&self) -> &'static str {
        "dict"
    }

    fn default_error_messages(&self) -> &'static [(&'static str, &'static str)] {
        &[("invalid", "Not a valid mapping type.")]
    }

    fn serialize(
        &self,
        field: &Field,
        value: &Value,
        obj: &Value,
        scope: &FieldScope<'_>,
    ) -> Result<Value, MarshError> {
        let map = match value {
            Value::Null => return Ok(Value::Null),
            Value::Object(map) => map,
            _ => return Err(field.make_error("invalid")),
        };
        self.convert(
            map,
            |f, k| f.serialize_value(k, obj, scope),
            |f, v| f.serialize_value(v, obj, scope),
        )
    }

    fn deserialize(
        &self,
        field: &Field,
        value: &Value,
        data: &Value,
        scope: &FieldScope<'_>,
    ) -> Result<Value, MarshError> {
        let Value::Object(map) = value else {
            return Err(field.make_error("invalid"));
        };
        let load = |f: &Field, v: &Value| {
            f.deserialize(Some(v), data, scope)
                .map(Option::unwrap_or_default)
        };
        self.convert(map, load, load)
    }
}

/// Failed containers carry their converted entries as `valid_data`. Only
/// direct [`Field::deserialize`] callers see it; a schema leaves the whole
/// field out of its output.
fn finish(output: Value, errors: ErrorStore) -> Result<Value, MarshError> {
    if errors.is_empty() {
        Ok(output)
    } else {
        Err(ValidationError::from_store(errors).with_valid_data(output).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::SchemaDeclaration;
    use crate::options::SchemaOptions;
    use crate::schema::Schema;
    use crate::validate::Range;
    use serde_json::json;

    fn schema() -> Schema {
        let decl = SchemaDeclaration::builder("CollectionFieldTests")
            .options(SchemaOptions {
                register: false,
                ..SchemaOptions::default()
            })
            .build()
            .unwrap();
        Schema::new(&decl)
    }

    // ── List ─────────────────────────────────────────────────────────

    #[test]
    fn test_list_errors_keyed_by_index() {
        let schema = schema();
        let scope = FieldScope::new(&schema, "scores", None);
        let field = Field::list(Field::integer().validate(Range::min(0.0)));
        let err = field
            .deserialize(Some(&json!([1, "x", -2, 3])), &json!({}), &scope)
            .unwrap_err()
            .into_validation()
            .unwrap();
        let store = err.normalized_messages();
        assert_eq!(
            store.index(1).unwrap().as_messages().unwrap(),
            ["Not a valid integer."]
        );
        assert!(store.index(2).is_some());
        assert!(store.index(0).is_none());
        assert_eq!(err.valid_data(), Some(&json!([1, 3])));
    }

    #[test]
    fn test_list_rejects_non_arrays() {
        let schema = schema();
        let scope = FieldScope::new(&schema, "tags", None);
        let err = Field::list(Field::str())
            .deserialize(Some(&json!("a,b")), &json!({}), &scope)
            .unwrap_err();
        assert_eq!(
            err.as_validation().unwrap().messages().to_json(),
            json!(["Not a valid list."])
        );
    }

    #[test]
    fn test_list_null_items_need_nullable_inner() {
        let schema = schema();
        let scope = FieldScope::new(&schema, "tags", None);
        let loaded = Field::list(Field::str().allow_none(true))
            .deserialize(Some(&json!(["a", null])), &json!({}), &scope)
            .unwrap();
        assert_eq!(loaded, Some(json!(["a", null])));
    }

    // ── Dict ─────────────────────────────────────────────────────────

    #[test]
    fn test_dict_value_errors_nest_under_key() {
        let schema = schema();
        let scope = FieldScope::new(&schema, "counts", None);
        let field = Field::new(Dict::default().values(Field::integer()));
        let err = field
            .deserialize(Some(&json!({"a": 1, "b": "x"})), &json!({}), &scope)
            .unwrap_err()
            .into_validation()
            .unwrap();
        assert_eq!(
            err.to_json(),
            json!({"b": {"value": ["Not a valid integer."]}})
        );
        assert_eq!(err.valid_data(), Some(&json!({"a": 1})));
    }

    #[test]
    fn test_dict_rejects_non_mappings() {
        let schema = schema();
        let scope = FieldScope::new(&schema, "counts", None);
        let err = Field::dict()
            .deserialize(Some(&json!([1])), &json!({}), &scope)
            .unwrap_err();
        assert_eq!(
            err.as_validation().unwrap().messages().to_json(),
            json!(["Not a valid mapping type."])
        );
    }
}
