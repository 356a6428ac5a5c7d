//! # Nested Schemas
//!
//! A [`Nested`] field delegates to a child schema built fresh for every
//! call. The child is resolved from one of four targets:
//!
//! - a declaration handle,
//! - a pre-configured [`Schema`] used as a template,
//! - a registered name (looked up once, then cached on the field),
//! - [`SELF_REFERENCE`], the declaration of the schema that owns the field.
//!
//! ## What the child inherits
//!
//! The child shares the parent's [`Context`](crate::context::Context) and
//! attribute accessor. Its field selection is the intersection of the
//! field's own `only` with any dotted `only` names the parent received for
//! this field, and the union of all `exclude` sets. Partial sets are scoped
//! to the field's data key by the caller.

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use serde_json::{Map, Value};

use marsh_core::{get_path, MarshError};

use crate::declaration::SchemaDeclaration;
use crate::field::{Field, FieldKind, FieldScope};
use crate::options::{LoadOptions, UnknownPolicy};
use crate::registry;
use crate::schema::Schema;

/// Target name that resolves to the enclosing schema's declaration.
pub const SELF_REFERENCE: &str = "self";

/// How a nested field finds its schema.
#[derive(Debug, Clone)]
pub enum NestedTarget {
    /// A declaration handle.
    Declaration(Arc<SchemaDeclaration>),
    /// A configured instance whose selection and flags seed the child.
    Schema(Box<Schema>),
    /// A name resolved through the global registry.
    Named(String),
    /// The owning schema's own declaration.
    SelfRef,
}

impl From<Arc<SchemaDeclaration>> for NestedTarget {
    fn from(decl: Arc<SchemaDeclaration>) -> Self {
        Self::Declaration(decl)
    }
}

impl From<&Arc<SchemaDeclaration>> for NestedTarget {
    fn from(decl: &Arc<SchemaDeclaration>) -> Self {
        Self::Declaration(Arc::clone(decl))
    }
}

impl From<Schema> for NestedTarget {
    fn from(schema: Schema) -> Self {
        Self::Schema(Box::new(schema))
    }
}

impl From<&str> for NestedTarget {
    fn from(name: &str) -> Self {
        if name == SELF_REFERENCE {
            Self::SelfRef
        } else {
            Self::Named(name.to_string())
        }
    }
}

impl From<String> for NestedTarget {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

// ─── Nested ──────────────────────────────────────────────────────────

/// A field holding one nested object or a list of them.
#[derive(Debug)]
pub struct Nested {
    target: NestedTarget,
    many: bool,
    only: Option<BTreeSet<String>>,
    exclude: BTreeSet<String>,
    unknown: Option<UnknownPolicy>,
    resolved: OnceLock<Arc<SchemaDeclaration>>,
}

impl Nested {
    /// Nest the schema behind `target`.
    pub fn new(target: impl Into<NestedTarget>) -> Self {
        Self {
            target: target.into(),
            many: false,
            only: None,
            exclude: BTreeSet::new(),
            unknown: None,
            resolved: OnceLock::new(),
        }
    }

    /// Hold a list of nested objects.
    pub fn many(mut self) -> Self {
        self.many = true;
        self
    }

    /// Restrict the child to these fields (dotted names reach deeper).
    pub fn only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Drop these fields from the child (dotted names reach deeper).
    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(names.into_iter().map(Into::into));
        self
    }

    /// Unknown-key policy for the child on load.
    pub fn unknown(mut self, policy: UnknownPolicy) -> Self {
        self.unknown = Some(policy);
        self
    }

    /// Whether the field holds a list.
    pub fn is_many(&self) -> bool {
        self.many
    }

    /// The nested declaration, resolving names on first use.
    pub fn resolve(&self, parent: &Schema) -> Result<Arc<SchemaDeclaration>, MarshError> {
        match &self.target {
            NestedTarget::Declaration(decl) => Ok(Arc::clone(decl)),
            NestedTarget::Schema(schema) => Ok(Arc::clone(schema.declaration())),
            NestedTarget::SelfRef => Ok(Arc::clone(parent.declaration())),
            NestedTarget::Named(name) => {
                if let Some(decl) = self.resolved.get() {
                    return Ok(Arc::clone(decl));
                }
                let decl = registry::lookup(name)?;
                tracing::debug!(
                    target_name = %name,
                    resolved = %decl.full_name(),
                    "resolved nested schema"
                );
                Ok(Arc::clone(self.resolved.get_or_init(|| decl)))
            }
        }
    }

    /// Build the child schema for one call.
    pub fn child_schema(&self, scope: &FieldScope<'_>) -> Result<Schema, MarshError> {
        let parent = scope.schema();
        let decl = self.resolve(parent)?;

        let (mut only, mut exclude, mut many, mut unknown) = match &self.target {
            NestedTarget::Schema(template) => (
                template.requested_only().cloned(),
                template.requested_exclude().clone(),
                template.many(),
                Some(template.unknown()),
            ),
            _ => (None, BTreeSet::new(), false, None),
        };
        many |= self.many;
        if self.unknown.is_some() {
            unknown = self.unknown;
        }
        only = intersect(only, self.only.as_ref());
        only = intersect(only, parent.nested_only(scope.name()));
        exclude.extend(self.exclude.iter().cloned());
        if let Some(extra) = parent.nested_exclude(scope.name()) {
            exclude.extend(extra.iter().cloned());
        }

        let mut builder = Schema::builder(&decl)
            .many(many)
            .exclude(exclude)
            .context(parent.context().clone())
            .accessor_arc(parent.accessor_arc());
        if let Some(only) = only {
            builder = builder.only(only);
        }
        if let Some(unknown) = unknown {
            builder = builder.unknown(unknown);
        }
        Ok(builder.build()?)
    }
}

fn intersect(
    current: Option<BTreeSet<String>>,
    other: Option<&BTreeSet<String>>,
) -> Option<BTreeSet<String>> {
    match (current, other) {
        (None, None) => None,
        (Some(set), None) => Some(set),
        (None, Some(set)) => Some(set.clone()),
        (Some(a), Some(b)) => Some(a.intersection(b).cloned().collect()),
    }
}

impl FieldKind for Nested {
    fn type_name(&self) -> &'static str {
        "nested"
    }

    fn default_error_messages(&self) -> &'static [(&'static str, &'static str)] {
        &[("type", "Invalid type.")]
    }

    fn serialize(
        &self,
        _: &Field,
        value: &Value,
        _: &Value,
        scope: &FieldScope<'_>,
    ) -> Result<Value, MarshError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        self.child_schema(scope)?.dump_value(value)
    }

    fn deserialize(
        &self,
        field: &Field,
        value: &Value,
        _: &Value,
        scope: &FieldScope<'_>,
    ) -> Result<Value, MarshError> {
        if self.many && !value.is_array() {
            return Err(field.make_error("type"));
        }
        let child = self.child_schema(scope)?;
        let opts = LoadOptions {
            partial: scope.partial().cloned(),
            ..LoadOptions::default()
        };
        child.load_with(value, opts)
    }
}

// ─── Pluck ───────────────────────────────────────────────────────────

/// One field of a nested schema, flattened: dump yields the bare value (or
/// list of values) and load accepts the same shape.
#[derive(Debug)]
pub struct Pluck {
    nested: Nested,
    field_name: String,
}

impl Pluck {
    /// Pluck `field_name` out of the schema behind `target`.
    pub fn new(target: impl Into<NestedTarget>, field_name: impl Into<String>) -> Self {
        let field_name = field_name.into();
        Self {
            nested: Nested::new(target).only([field_name.clone()]),
            field_name,
        }
    }

    /// Pluck from a list of nested objects.
    pub fn many(mut self) -> Self {
        self.nested = self.nested.many();
        self
    }

    fn data_key(&self, scope: &FieldScope<'_>) -> Result<String, MarshError> {
        let decl = self.nested.resolve(scope.schema())?;
        Ok(decl
            .field(&self.field_name)
            .and_then(Field::data_key_name)
            .unwrap_or(&self.field_name)
            .to_string())
    }
}

impl FieldKind for Pluck {
    fn type_name(&self) -> &'static str {
        "pluck"
    }

    fn default_error_messages(&self) -> &'static [(&'static str, &'static str)] {
        self.nested.default_error_messages()
    }

    fn serialize(
        &self,
        field: &Field,
        value: &Value,
        obj: &Value,
        scope: &FieldScope<'_>,
    ) -> Result<Value, MarshError> {
        let key = self.data_key(scope)?;
        let dumped = self.nested.serialize(field, value, obj, scope)?;
        let pick = |item: &Value| get_path(item, &key).cloned().unwrap_or(Value::Null);
        Ok(match dumped {
            Value::Null => Value::Null,
            Value::Array(items) if self.nested.is_many() => {
                Value::Array(items.iter().map(pick).collect())
            }
            other => pick(&other),
        })
    }

    fn deserialize(
        &self,
        field: &Field,
        value: &Value,
        data: &Value,
        scope: &FieldScope<'_>,
    ) -> Result<Value, MarshError> {
        let key = self.data_key(scope)?;
        let wrap = |v: &Value| {
            let mut map = Map::new();
            map.insert(key.clone(), v.clone());
            Value::Object(map)
        };
        let wrapped = match value {
            Value::Array(items) if self.nested.is_many() => {
                Value::Array(items.iter().map(wrap).collect())
            }
            other => wrap(other),
        };
        self.nested.deserialize(field, &wrapped, data, scope)
    }
}
