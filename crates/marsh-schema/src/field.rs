//! # Field Contract
//!
//! A [`Field`] pairs a [`FieldKind`] (the type-specific conversion) with the
//! metadata every field shares: target attribute, data key, required and
//! nullable flags, direction mode, defaults, validators, and error-message
//! overrides.
//!
//! ## Missing vs Null
//!
//! ```text
//!            dump                         load
//! missing    dump default or omit         load default, "required", or omit
//! null       kind decides (usually null)  null if nullable, else "null" error
//! value      kind.serialize               kind.deserialize, then validators
//! ```
//!
//! Validators run only on load and only when coercion succeeded. Every
//! validator runs; their messages are collected in registration order.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use marsh_core::{ErrorNode, MarshError, ValidationError};

use crate::context::Context;
use crate::options::Partial;
use crate::schema::Schema;
use crate::validate::{FnValidator, Validator};

/// Messages every field understands.
const BASE_ERROR_MESSAGES: &[(&str, &str)] = &[
    ("required", "Missing data for required field."),
    ("null", "Field may not be null."),
    ("validator_failed", "Invalid value."),
];

// ─── Field kind contract ─────────────────────────────────────────────

/// Type-specific conversion behind a [`Field`].
///
/// Implementations receive values that are present and, on load, non-null
/// (unless the kind opts out of attribute extraction). Failures are
/// reported as [`MarshError::Validation`], usually built with
/// [`Field::make_error`] so that per-field overrides apply.
pub trait FieldKind: Send + Sync + fmt::Debug {
    /// Short name used in diagnostics.
    fn type_name(&self) -> &'static str;

    /// Messages keyed by error code, consulted after the field's overrides.
    fn default_error_messages(&self) -> &'static [(&'static str, &'static str)] {
        &[]
    }

    /// Whether `dump` extracts the field's attribute from the source
    /// object. Kinds that compute their output from the whole object
    /// return `false` and receive `Value::Null` as the value.
    fn checks_attribute(&self) -> bool {
        true
    }

    /// Direction mode a field of this kind starts with.
    fn default_mode(&self) -> FieldMode {
        FieldMode::Normal
    }

    /// Convert an attribute value for output.
    fn serialize(
        &self,
        field: &Field,
        value: &Value,
        obj: &Value,
        scope: &FieldScope<'_>,
    ) -> Result<Value, MarshError>;

    /// Convert and check an input value.
    fn deserialize(
        &self,
        field: &Field,
        value: &Value,
        data: &Value,
        scope: &FieldScope<'_>,
    ) -> Result<Value, MarshError>;
}

/// Where a field takes part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FieldMode {
    /// Both load and dump.
    #[default]
    Normal,
    /// Load only; invisible to dump.
    LoadOnly,
    /// Dump only; invisible to load.
    DumpOnly,
}

/// A static default or a zero-argument producer.
#[derive(Clone)]
pub enum DefaultValue {
    /// Cloned on every use.
    Static(Value),
    /// Invoked on every use.
    Producer(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    /// The value to substitute.
    pub fn produce(&self) -> Value {
        match self {
            Self::Static(v) => v.clone(),
            Self::Producer(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(v) => f.debug_tuple("Static").field(v).finish(),
            Self::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// The schema-side state a field sees during one call.
pub struct FieldScope<'a> {
    schema: &'a Schema,
    name: &'a str,
    partial: Option<Partial>,
}

impl<'a> FieldScope<'a> {
    pub(crate) fn new(schema: &'a Schema, name: &'a str, partial: Option<Partial>) -> Self {
        Self {
            schema,
            name,
            partial,
        }
    }

    /// The schema instance that owns the field.
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// Declared field name.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Partial set scoped to this field, on load.
    pub fn partial(&self) -> Option<&Partial> {
        self.partial.as_ref()
    }

    /// Shared context of the schema tree.
    pub fn context(&self) -> &'a Context {
        self.schema.context()
    }
}

// ─── Field ───────────────────────────────────────────────────────────

/// A field descriptor.
#[derive(Clone)]
pub struct Field {
    kind: Arc<dyn FieldKind>,
    attribute: Option<String>,
    data_key: Option<String>,
    required: bool,
    allow_none: Option<bool>,
    mode: FieldMode,
    dump_default: Option<DefaultValue>,
    load_default: Option<DefaultValue>,
    validators: Vec<Arc<dyn Validator>>,
    error_messages: BTreeMap<String, String>,
    metadata: Map<String, Value>,
}

impl Field {
    /// A field backed by `kind`.
    pub fn new(kind: impl FieldKind + 'static) -> Self {
        let mode = kind.default_mode();
        Self {
            kind: Arc::new(kind),
            attribute: None,
            data_key: None,
            required: false,
            allow_none: None,
            mode,
            dump_default: None,
            load_default: None,
            validators: Vec::new(),
            error_messages: BTreeMap::new(),
            metadata: Map::new(),
        }
    }

    // ── Builder ──────────────────────────────────────────────────────

    /// Fail load when the key is missing.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Accept or reject explicit nulls on load.
    pub fn allow_none(mut self, allow: bool) -> Self {
        self.allow_none = Some(allow);
        self
    }

    /// Take part in load only.
    pub fn load_only(mut self) -> Self {
        self.mode = FieldMode::LoadOnly;
        self
    }

    /// Take part in dump only.
    pub fn dump_only(mut self) -> Self {
        self.mode = FieldMode::DumpOnly;
        self
    }

    /// Read from / write to this (possibly dotted) attribute instead of the
    /// declared name.
    pub fn attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Use this key in serialized data instead of the declared name.
    pub fn data_key(mut self, key: impl Into<String>) -> Self {
        self.data_key = Some(key.into());
        self
    }

    /// Value used when the attribute is missing on dump.
    pub fn dump_default(mut self, value: impl Into<Value>) -> Self {
        self.dump_default = Some(DefaultValue::Static(value.into()));
        self
    }

    /// Producer invoked when the attribute is missing on dump.
    pub fn dump_default_with(mut self, f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.dump_default = Some(DefaultValue::Producer(Arc::new(f)));
        self
    }

    /// Value used when the key is missing on load.
    pub fn load_default(mut self, value: impl Into<Value>) -> Self {
        self.load_default = Some(DefaultValue::Static(value.into()));
        self
    }

    /// Producer invoked when the key is missing on load.
    pub fn load_default_with(mut self, f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.load_default = Some(DefaultValue::Producer(Arc::new(f)));
        self
    }

    /// Append a validator.
    pub fn validate(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Append a closure validator.
    pub fn validate_with<F>(self, f: F) -> Self
    where
        F: Fn(&Value) -> Result<bool, ValidationError> + Send + Sync + 'static,
    {
        self.validate(FnValidator(f))
    }

    /// Override the message for an error code.
    pub fn error_message(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.error_messages.insert(code.into(), message.into());
        self
    }

    /// Attach free-form metadata.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// The kind behind this field.
    pub fn kind(&self) -> &dyn FieldKind {
        self.kind.as_ref()
    }

    /// Explicit target attribute.
    pub fn attribute_name(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    /// Explicit data key.
    pub fn data_key_name(&self) -> Option<&str> {
        self.data_key.as_deref()
    }

    /// Whether the field is required on load.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Whether explicit null is accepted on load. Defaults to true only
    /// when the load default is null.
    pub fn allows_none(&self) -> bool {
        self.allow_none
            .unwrap_or(matches!(self.load_default, Some(DefaultValue::Static(Value::Null))))
    }

    /// Direction mode.
    pub fn mode(&self) -> FieldMode {
        self.mode
    }

    /// Whether a load default is declared.
    pub fn has_load_default(&self) -> bool {
        self.load_default.is_some()
    }

    /// Free-form metadata.
    pub fn metadata_map(&self) -> &Map<String, Value> {
        &self.metadata
    }

    // ── Errors ───────────────────────────────────────────────────────

    /// Message for `code`: field override, then kind default, then base
    /// default.
    pub fn error_message_for(&self, code: &str) -> String {
        if let Some(msg) = self.error_messages.get(code) {
            return msg.clone();
        }
        let lookup = |table: &[(&str, &str)]| {
            table
                .iter()
                .find(|(c, _)| *c == code)
                .map(|(_, m)| m.to_string())
        };
        lookup(self.kind.default_error_messages())
            .or_else(|| lookup(BASE_ERROR_MESSAGES))
            .unwrap_or_else(|| {
                tracing::warn!(
                    code,
                    field_type = self.kind.type_name(),
                    "no message registered for error code"
                );
                "Invalid value.".to_string()
            })
    }

    /// A validation error carrying the message for `code`.
    pub fn make_error(&self, code: &str) -> MarshError {
        ValidationError::new(self.error_message_for(code))
            .with_code(code)
            .into()
    }

    // ── Conversion ───────────────────────────────────────────────────

    /// Dump this field from `obj`. `Ok(None)` means the key is omitted.
    pub fn serialize(
        &self,
        name: &str,
        obj: &Value,
        scope: &FieldScope<'_>,
    ) -> Result<Option<Value>, MarshError> {
        let value = if self.kind.checks_attribute() {
            let attr = self.attribute.as_deref().unwrap_or(name);
            match scope.schema().accessor().get_value(obj, attr) {
                Some(v) => v,
                None => match &self.dump_default {
                    Some(default) => default.produce(),
                    None => return Ok(None),
                },
            }
        } else {
            Value::Null
        };
        self.kind.serialize(self, &value, obj, scope).map(Some)
    }

    /// Convert an already-extracted value for output.
    pub fn serialize_value(
        &self,
        value: &Value,
        obj: &Value,
        scope: &FieldScope<'_>,
    ) -> Result<Value, MarshError> {
        self.kind.serialize(self, value, obj, scope)
    }

    /// Load this field from the raw input value. `raw` is `None` when the
    /// key is missing; `Ok(None)` means the attribute is left unset.
    pub fn deserialize(
        &self,
        raw: Option<&Value>,
        data: &Value,
        scope: &FieldScope<'_>,
    ) -> Result<Option<Value>, MarshError> {
        let value = match raw {
            None => {
                if self.required {
                    return Err(self.make_error("required"));
                }
                return Ok(self.load_default.as_ref().map(DefaultValue::produce));
            }
            Some(Value::Null) => {
                if self.allows_none() {
                    return Ok(Some(Value::Null));
                }
                return Err(self.make_error("null"));
            }
            Some(value) => value,
        };
        let output = self.kind.deserialize(self, value, data, scope)?;
        self.run_validators(&output)?;
        Ok(Some(output))
    }

    fn run_validators(&self, value: &Value) -> Result<(), ValidationError> {
        let mut collected: Option<ErrorNode> = None;
        for validator in &self.validators {
            let node = match validator.validate(value) {
                Ok(true) => continue,
                Ok(false) => ErrorNode::message(self.error_message_for("validator_failed")),
                Err(err) => match err.code().and_then(|code| self.error_messages.get(code)) {
                    Some(message) => ErrorNode::message(message.clone()),
                    None => err.into_messages(),
                },
            };
            collected = Some(match collected {
                Some(acc) => acc.merge(node),
                None => node,
            });
        }
        match collected {
            Some(node) => Err(ValidationError::from_node(node).with_code("validator_failed")),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("kind", &self.kind)
            .field("attribute", &self.attribute)
            .field("data_key", &self.data_key)
            .field("required", &self.required)
            .field("mode", &self.mode)
            .field("validators", &self.validators.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    use serde_json::json;

    use crate::declaration::SchemaDeclaration;
    use crate::options::SchemaOptions;
    use crate::validate::Range;

    fn scratch_schema() -> Schema {
        let decl = SchemaDeclaration::builder("FieldContractTests")
            .options(SchemaOptions {
                register: false,
                ..SchemaOptions::default()
            })
            .build()
            .unwrap();
        Schema::new(&decl)
    }

    fn messages(err: MarshError) -> Vec<String> {
        err.into_validation()
            .and_then(|e| e.into_messages().as_messages().map(<[String]>::to_vec))
            .unwrap_or_default()
    }

    // ── Missing and null ─────────────────────────────────────────────

    #[test]
    fn test_missing_key_is_omitted_or_required() {
        let schema = scratch_schema();
        let scope = FieldScope::new(&schema, "f", None);
        assert_eq!(
            Field::str().deserialize(None, &json!({}), &scope).unwrap(),
            None
        );

        let required = Field::str().required();
        let err = required.deserialize(None, &json!({}), &scope).unwrap_err();
        assert_eq!(messages(err), ["Missing data for required field."]);
    }

    #[test]
    fn test_explicit_null_rejected_when_disallowed() {
        let schema = scratch_schema();
        let scope = FieldScope::new(&schema, "f", None);
        let null = Value::Null;

        // A null load default makes null acceptable unless turned off.
        let f = Field::str().load_default(Value::Null);
        assert!(f.allows_none());
        assert_eq!(
            f.deserialize(Some(&null), &json!({}), &scope).unwrap(),
            Some(null.clone())
        );

        let f = Field::str().load_default(Value::Null).allow_none(false);
        let err = f.deserialize(Some(&null), &json!({}), &scope).unwrap_err();
        assert_eq!(messages(err), ["Field may not be null."]);

        let f = Field::str().allow_none(true);
        assert_eq!(
            f.deserialize(Some(&null), &json!({}), &scope).unwrap(),
            Some(null)
        );
    }

    // ── Defaults ─────────────────────────────────────────────────────

    #[test]
    fn test_static_dump_default() {
        let schema = scratch_schema();
        let scope = FieldScope::new(&schema, "f", None);
        let f = Field::integer().dump_default(5);
        assert_eq!(
            f.serialize("f", &json!({}), &scope).unwrap(),
            Some(json!(5))
        );
        assert_eq!(
            Field::integer().serialize("f", &json!({}), &scope).unwrap(),
            None
        );
    }

    #[test]
    fn test_dump_default_producer_runs_per_use() {
        let schema = scratch_schema();
        let scope = FieldScope::new(&schema, "f", None);
        let counter = Arc::new(AtomicI64::new(0));
        let calls = Arc::clone(&counter);
        let f = Field::integer()
            .dump_default_with(move || json!(calls.fetch_add(1, Ordering::SeqCst) + 10));

        assert_eq!(
            f.serialize("f", &json!({}), &scope).unwrap(),
            Some(json!(10))
        );
        assert_eq!(
            f.serialize("f", &json!({}), &scope).unwrap(),
            Some(json!(11))
        );
        // Present attributes never reach the producer.
        assert_eq!(
            f.serialize("f", &json!({"f": 3}), &scope).unwrap(),
            Some(json!(3))
        );
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_load_default_producer_fills_missing_key() {
        let schema = scratch_schema();
        let scope = FieldScope::new(&schema, "f", None);
        let f = Field::list(Field::str()).load_default_with(|| json!(["draft"]));
        assert!(f.has_load_default());
        assert!(!f.allows_none());
        let loaded = f.deserialize(None, &json!({}), &scope).unwrap();
        assert_eq!(loaded, Some(json!(["draft"])));
    }

    // ── Validators and messages ──────────────────────────────────────

    #[test]
    fn test_every_validator_runs_in_order() {
        let schema = scratch_schema();
        let scope = FieldScope::new(&schema, "f", None);
        let f = Field::integer()
            .validate(Range::new(Some(10.0), None))
            .validate_with(|v| Ok(v.as_i64().is_some_and(|n| n % 2 == 0)))
            .error_message("validator_failed", "Must be even.");

        let err = f.deserialize(Some(&json!(3)), &json!({}), &scope).unwrap_err();
        assert_eq!(
            messages(err),
            ["Must be greater than or equal to 10.", "Must be even."]
        );
        assert_eq!(
            f.deserialize(Some(&json!(12)), &json!({}), &scope).unwrap(),
            Some(json!(12))
        );
    }

    #[test]
    fn test_validators_skip_failed_coercion() {
        let schema = scratch_schema();
        let scope = FieldScope::new(&schema, "f", None);
        let f = Field::integer().validate_with(|_| Ok(false));
        let err = f.deserialize(Some(&json!("x")), &json!({}), &scope).unwrap_err();
        assert_eq!(messages(err), ["Not a valid integer."]);
    }

    #[test]
    fn test_unknown_code_falls_back() {
        let f = Field::str();
        assert_eq!(f.error_message_for("no_such_code"), "Invalid value.");
        assert_eq!(f.error_message_for("null"), "Field may not be null.");
    }

    #[test]
    fn test_builder_records_metadata_and_mode() {
        let f = Field::str()
            .metadata("description", "Display name")
            .data_key("displayName")
            .dump_only();
        assert_eq!(
            f.metadata_map().get("description"),
            Some(&json!("Display name"))
        );
        assert_eq!(f.data_key_name(), Some("displayName"));
        assert_eq!(f.mode(), FieldMode::DumpOnly);
    }
}
