//! # Load and Dump Pipelines
//!
//! A [`Schema`] is a configured instance of a [`SchemaDeclaration`]: the
//! declaration's fields narrowed by `only`/`exclude`, plus per-instance
//! flags (`many`, `unknown`, `partial`), a shared [`Context`], and the
//! attribute accessor used by `dump`.
//!
//! ## Dump
//!
//! ```text
//! pre_dump (per item, then batch)
//!   → serialize every dump field of every item
//!   → post_dump (per item, then batch)      only when no field failed
//! ```
//!
//! ## Load
//!
//! ```text
//! pre_load (batch, then per item)
//!   → input type check, deserialize load fields, unknown-key policy
//!   → field validators (`validates`)
//!   → schema validators (batch, then per item)
//!   → post_load (per item, then batch)      only when nothing failed
//! ```
//!
//! Failures are collected into one [`ErrorStore`] and raised together as a
//! [`ValidationError`] whose `valid_data` holds the successfully processed
//! part of the input. Hook errors that are not validation errors abort the
//! call immediately.
//!
//! ## Output order
//!
//! Output keys follow field registry order when the declaration is
//! `ordered`, and canonical (sorted) key order otherwise.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use marsh_core::{
    get_path, remove_path, set_path, type_name, ConfigError, ErrorNode, ErrorStore, MarshError,
    ValidationError,
};

use crate::accessor::{AttributeAccessor, DefaultAccessor};
use crate::context::Context;
use crate::declaration::{resolve_field_sets, FieldSets, SchemaDeclaration, Selection};
use crate::field::{Field, FieldScope};
use crate::hooks::{HookArgs, HookTag, Processor};
use crate::options::{LoadOptions, Partial, UnknownPolicy};

// ─── Schema ──────────────────────────────────────────────────────────

/// A configured, reusable schema instance.
///
/// Cloning is cheap; clones share the declaration, the context, and the
/// accessor.
#[derive(Clone)]
pub struct Schema {
    declaration: Arc<SchemaDeclaration>,
    many: bool,
    unknown: UnknownPolicy,
    partial: Option<Partial>,
    ordered: bool,
    index_errors: bool,
    context: Context,
    accessor: Arc<dyn AttributeAccessor>,
    only: Option<BTreeSet<String>>,
    exclude: BTreeSet<String>,
    sets: Arc<FieldSets>,
}

impl Schema {
    /// An instance with the declaration's defaults.
    pub fn new(declaration: &Arc<SchemaDeclaration>) -> Self {
        let options = declaration.options();
        Self {
            declaration: Arc::clone(declaration),
            many: options.many,
            unknown: options.unknown,
            partial: None,
            ordered: options.ordered,
            index_errors: options.index_errors,
            context: Context::new(),
            accessor: Arc::new(DefaultAccessor),
            only: None,
            exclude: BTreeSet::new(),
            sets: Arc::clone(declaration.default_sets()),
        }
    }

    /// Configure an instance.
    pub fn builder(declaration: &Arc<SchemaDeclaration>) -> SchemaBuilder {
        SchemaBuilder::new(declaration)
    }

    // ── Accessors ────────────────────────────────────────────────────

    /// The declaration this instance executes.
    pub fn declaration(&self) -> &Arc<SchemaDeclaration> {
        &self.declaration
    }

    /// Declaration short name.
    pub fn name(&self) -> &str {
        self.declaration.name()
    }

    /// Whether calls process collections by default.
    pub fn many(&self) -> bool {
        self.many
    }

    /// Default unknown-key policy.
    pub fn unknown(&self) -> UnknownPolicy {
        self.unknown
    }

    /// Default partial set.
    pub fn partial(&self) -> Option<&Partial> {
        self.partial.as_ref()
    }

    /// Shared context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Attribute accessor used by dump.
    pub fn accessor(&self) -> &dyn AttributeAccessor {
        self.accessor.as_ref()
    }

    pub(crate) fn accessor_arc(&self) -> Arc<dyn AttributeAccessor> {
        Arc::clone(&self.accessor)
    }

    /// Fields taking part in load, in registry order.
    pub fn load_fields(&self) -> impl Iterator<Item = (&str, &Field)> + '_ {
        self.sets.load.iter().map(|&i| self.declaration.field_at(i))
    }

    /// Fields taking part in dump, in registry order.
    pub fn dump_fields(&self) -> impl Iterator<Item = (&str, &Field)> + '_ {
        self.sets.dump.iter().map(|&i| self.declaration.field_at(i))
    }

    pub(crate) fn requested_only(&self) -> Option<&BTreeSet<String>> {
        self.only.as_ref()
    }

    pub(crate) fn requested_exclude(&self) -> &BTreeSet<String> {
        &self.exclude
    }

    pub(crate) fn nested_only(&self, field: &str) -> Option<&BTreeSet<String>> {
        self.sets.nested_only.get(field)
    }

    pub(crate) fn nested_exclude(&self, field: &str) -> Option<&BTreeSet<String>> {
        self.sets.nested_exclude.get(field)
    }

    fn error_index(&self, index: usize) -> Option<usize> {
        self.index_errors.then_some(index)
    }

    // ── Dump ─────────────────────────────────────────────────────────

    /// Serialize any `Serialize` value.
    pub fn dump<T: Serialize + ?Sized>(&self, obj: &T) -> Result<Value, MarshError> {
        let value = serde_json::to_value(obj)?;
        self.dump_value(&value)
    }

    /// Serialize a value tree with the instance's `many` flag.
    pub fn dump_value(&self, obj: &Value) -> Result<Value, MarshError> {
        self.run_dump(obj, self.many)
    }

    /// Serialize a collection regardless of the `many` flag.
    pub fn dump_many(&self, objs: &Value) -> Result<Value, MarshError> {
        self.run_dump(objs, true)
    }

    /// Serialize to JSON text.
    pub fn dumps<T: Serialize + ?Sized>(&self, obj: &T) -> Result<String, MarshError> {
        Ok(serde_json::to_string(&self.dump(obj)?)?)
    }

    fn run_dump(&self, obj: &Value, many: bool) -> Result<Value, MarshError> {
        tracing::trace!(schema = %self.declaration.full_name(), many, "dump");
        let source = if self.declaration.has_processors(&HookTag::PreDump) {
            let data =
                self.invoke_processors(&HookTag::PreDump, false, obj.clone(), many, obj, None)?;
            Cow::Owned(self.invoke_processors(&HookTag::PreDump, true, data, many, obj, None)?)
        } else {
            Cow::Borrowed(obj)
        };

        let mut errors = ErrorStore::new();
        let result = self.serialize_items(&source, many, &mut errors)?;
        if !errors.is_empty() {
            return Err(ValidationError::from_store(errors)
                .with_data(obj.clone())
                .with_valid_data(result)
                .into());
        }

        if self.declaration.has_processors(&HookTag::PostDump) {
            let data =
                self.invoke_processors(&HookTag::PostDump, false, result, many, obj, None)?;
            return self.invoke_processors(&HookTag::PostDump, true, data, many, obj, None);
        }
        Ok(result)
    }

    fn serialize_items(
        &self,
        obj: &Value,
        many: bool,
        errors: &mut ErrorStore,
    ) -> Result<Value, MarshError> {
        if !many {
            return self.serialize_item(obj, None, errors);
        }
        let Value::Array(items) = obj else {
            self.store_type_error(obj, errors);
            return Ok(Value::Array(Vec::new()));
        };
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            out.push(self.serialize_item(item, self.error_index(i), errors)?);
        }
        Ok(Value::Array(out))
    }

    fn serialize_item(
        &self,
        obj: &Value,
        index: Option<usize>,
        errors: &mut ErrorStore,
    ) -> Result<Value, MarshError> {
        let mut out = Map::new();
        for (name, field) in self.dump_fields() {
            let key = field.data_key_name().unwrap_or(name);
            let scope = FieldScope::new(self, name, None);
            match field.serialize(name, obj, &scope) {
                Ok(Some(value)) => {
                    out.insert(key.to_string(), value);
                }
                Ok(None) => {}
                Err(MarshError::Validation(err)) => {
                    errors.store_error(err.into_messages(), Some(key), index)
                }
                Err(other) => return Err(other),
            }
        }
        Ok(self.finish(out))
    }

    // ── Load ─────────────────────────────────────────────────────────

    /// Deserialize and validate with the instance defaults.
    pub fn load(&self, data: &Value) -> Result<Value, MarshError> {
        self.run_load(data, LoadOptions::default(), true)
    }

    /// Deserialize and validate with per-call overrides.
    pub fn load_with(&self, data: &Value, opts: LoadOptions) -> Result<Value, MarshError> {
        self.run_load(data, opts, true)
    }

    /// Load and convert the result into `T`.
    pub fn load_into<T: DeserializeOwned>(&self, data: &Value) -> Result<T, MarshError> {
        let loaded = self.load(data)?;
        Ok(serde_json::from_value(loaded)?)
    }

    /// Parse JSON text, then load it.
    pub fn loads(&self, json: &str) -> Result<Value, MarshError> {
        let data: Value = serde_json::from_str(json)?;
        self.load(&data)
    }

    /// Run the load pipeline without post-load hooks and return the errors
    /// it found (empty when the input is valid).
    pub fn validate(&self, data: &Value) -> Result<ErrorStore, MarshError> {
        self.validate_with(data, LoadOptions::default())
    }

    /// [`validate`](Self::validate) with per-call overrides.
    pub fn validate_with(&self, data: &Value, opts: LoadOptions) -> Result<ErrorStore, MarshError> {
        match self.run_load(data, opts, false) {
            Ok(_) => Ok(ErrorStore::new()),
            Err(MarshError::Validation(err)) => Ok(err.into_store()),
            Err(other) => Err(other),
        }
    }

    fn run_load(
        &self,
        data: &Value,
        opts: LoadOptions,
        postprocess: bool,
    ) -> Result<Value, MarshError> {
        let many = opts.many.unwrap_or(self.many);
        let partial = opts.partial.or_else(|| self.partial.clone());
        let partial = partial.as_ref();
        let unknown = opts.unknown.unwrap_or(self.unknown);
        tracing::trace!(schema = %self.declaration.full_name(), many, %unknown, "load");

        let mut errors = ErrorStore::new();

        let processed = if self.declaration.has_processors(&HookTag::PreLoad) {
            let run = self
                .invoke_processors(&HookTag::PreLoad, true, data.clone(), many, data, partial)
                .and_then(|d| {
                    self.invoke_processors(&HookTag::PreLoad, false, d, many, data, partial)
                });
            match run {
                Ok(d) => Some(Cow::Owned(d)),
                Err(MarshError::Validation(err)) => {
                    errors.merge(err.into_store());
                    None
                }
                Err(other) => return Err(other),
            }
        } else {
            Some(Cow::Borrowed(data))
        };

        let mut result = None;
        if let Some(processed) = processed {
            let (mut loaded, mut item_errors) =
                self.deserialize_items(&processed, many, partial, unknown, &mut errors)?;
            self.invoke_field_validators(
                &mut errors,
                &mut loaded,
                many,
                &mut item_errors,
                partial,
                data,
            )?;
            self.invoke_schema_validators(&mut errors, &loaded, many, &item_errors, partial, data)?;

            let post_load = postprocess && self.declaration.has_processors(&HookTag::PostLoad);
            if errors.is_empty() && post_load {
                let run = self
                    .invoke_processors(
                        &HookTag::PostLoad,
                        false,
                        loaded.clone(),
                        many,
                        data,
                        partial,
                    )
                    .and_then(|d| {
                        self.invoke_processors(&HookTag::PostLoad, true, d, many, data, partial)
                    });
                match run {
                    Ok(d) => loaded = d,
                    Err(MarshError::Validation(err)) => errors.merge(err.into_store()),
                    Err(other) => return Err(other),
                }
            }
            result = Some(loaded);
        }

        match result {
            Some(loaded) if errors.is_empty() => Ok(loaded),
            result => {
                tracing::trace!(
                    schema = %self.declaration.full_name(),
                    errors = errors.len(),
                    "load failed"
                );
                let mut err = ValidationError::from_store(errors).with_data(data.clone());
                if let Some(valid) = result {
                    err = err.with_valid_data(valid);
                }
                Err(err.into())
            }
        }
    }

    /// Deserialize one item or a collection. Returns the output plus one
    /// "has errors" flag per item.
    fn deserialize_items(
        &self,
        data: &Value,
        many: bool,
        partial: Option<&Partial>,
        unknown: UnknownPolicy,
        errors: &mut ErrorStore,
    ) -> Result<(Value, Vec<bool>), MarshError> {
        if !many {
            let mut local = ErrorStore::new();
            let item = self.deserialize_item(data, partial, unknown, &mut local)?;
            let failed = !local.is_empty();
            errors.merge(local);
            return Ok((item, vec![failed]));
        }
        let Value::Array(items) = data else {
            self.store_type_error(data, errors);
            return Ok((Value::Array(Vec::new()), Vec::new()));
        };
        let mut out = Vec::with_capacity(items.len());
        let mut flags = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let mut local = ErrorStore::new();
            out.push(self.deserialize_item(item, partial, unknown, &mut local)?);
            flags.push(!local.is_empty());
            errors.merge_at(self.error_index(i), local);
        }
        Ok((Value::Array(out), flags))
    }

    fn deserialize_item(
        &self,
        data: &Value,
        partial: Option<&Partial>,
        unknown: UnknownPolicy,
        errors: &mut ErrorStore,
    ) -> Result<Value, MarshError> {
        let Value::Object(input) = data else {
            self.store_type_error(data, errors);
            return Ok(Value::Object(Map::new()));
        };

        let mut out = Map::new();
        for (name, field) in self.load_fields() {
            let key = field.data_key_name().unwrap_or(name);
            let raw = input.get(key);
            if raw.is_none() && partial.is_some_and(|p| p.exempts(name)) {
                continue;
            }
            let scope = FieldScope::new(self, name, partial.map(|p| p.scoped(key)));
            match field.deserialize(raw, data, &scope) {
                Ok(Some(value)) => {
                    set_path(&mut out, field.attribute_name().unwrap_or(name), value)?
                }
                Ok(None) => {}
                Err(MarshError::Validation(err)) => {
                    errors.store_error(err.into_messages(), Some(key), None)
                }
                Err(other) => return Err(other),
            }
        }

        if unknown != UnknownPolicy::Exclude {
            let known: BTreeSet<&str> = self
                .load_fields()
                .map(|(name, field)| field.data_key_name().unwrap_or(name))
                .collect();
            for (key, value) in input {
                if known.contains(key.as_str()) {
                    continue;
                }
                match unknown {
                    UnknownPolicy::Include => {
                        out.insert(key.clone(), value.clone());
                    }
                    _ => errors.store_error(
                        ErrorNode::message(self.declaration.error_message("unknown")),
                        Some(key.as_str()),
                        None,
                    ),
                }
            }
        }

        Ok(self.finish(out))
    }

    // ── Validators ───────────────────────────────────────────────────

    fn invoke_field_validators(
        &self,
        errors: &mut ErrorStore,
        loaded: &mut Value,
        many: bool,
        item_errors: &mut [bool],
        partial: Option<&Partial>,
        original: &Value,
    ) -> Result<(), MarshError> {
        for processor in self.declaration.processors() {
            let HookTag::ValidatesField(field_name) = processor.tag() else {
                continue;
            };
            let Some(index) = self.declaration.field_index(field_name) else {
                continue;
            };
            if !self.sets.load.contains(&index) {
                continue;
            }
            let (name, field) = self.declaration.field_at(index);
            let attribute = field.attribute_name().unwrap_or(name);
            let key = field.data_key_name().unwrap_or(name);

            let items: Vec<(Option<usize>, &mut Value)> = match &mut *loaded {
                Value::Array(items) if many => items
                    .iter_mut()
                    .enumerate()
                    .map(|(i, v)| (Some(i), v))
                    .collect(),
                other => vec![(None, other)],
            };
            for (position, item) in items {
                let Some(value) = get_path(item, attribute).cloned() else {
                    continue;
                };
                let item_original = match position {
                    Some(i) => original.get(i),
                    None => Some(original),
                };
                let args = self.hook_args(processor, many, partial, item_original);
                match processor.run_check(&value, &args) {
                    Ok(()) => {}
                    Err(MarshError::Validation(err)) => {
                        let index = position.and_then(|i| self.error_index(i));
                        errors.store_error(err.into_messages(), Some(key), index);
                        remove_path(item, attribute);
                        if let Some(flag) = item_errors.get_mut(position.unwrap_or(0)) {
                            *flag = true;
                        }
                    }
                    Err(other) => return Err(other),
                }
            }
        }
        Ok(())
    }

    /// Validators are skipped by field-level errors only; a failing schema
    /// validator never suppresses the next one.
    fn invoke_schema_validators(
        &self,
        errors: &mut ErrorStore,
        loaded: &Value,
        many: bool,
        item_errors: &[bool],
        partial: Option<&Partial>,
        original: &Value,
    ) -> Result<(), MarshError> {
        let field_errors = !errors.is_empty();
        let (batch, per_item): (Vec<&Processor>, Vec<&Processor>) = self
            .declaration
            .processors()
            .iter()
            .filter(|p| *p.tag() == HookTag::ValidatesSchema)
            .partition(|p| p.is_pass_many());

        for processor in batch {
            if processor.skips_on_field_errors() && field_errors {
                continue;
            }
            self.run_schema_validator(processor, errors, loaded, original, many, partial, None)?;
        }

        for processor in per_item {
            match loaded {
                Value::Array(items) if many => {
                    for (i, item) in items.iter().enumerate() {
                        let failed = item_errors.get(i).copied().unwrap_or(false);
                        if processor.skips_on_field_errors() && failed {
                            continue;
                        }
                        let item_original = original.get(i).unwrap_or(&Value::Null);
                        self.run_schema_validator(
                            processor,
                            errors,
                            item,
                            item_original,
                            many,
                            partial,
                            Some(i),
                        )?;
                    }
                }
                single => {
                    let failed = item_errors.first().copied().unwrap_or(false);
                    if processor.skips_on_field_errors() && failed {
                        continue;
                    }
                    self.run_schema_validator(
                        processor,
                        errors,
                        single,
                        original,
                        many,
                        partial,
                        None,
                    )?;
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn run_schema_validator(
        &self,
        processor: &Processor,
        errors: &mut ErrorStore,
        data: &Value,
        original: &Value,
        many: bool,
        partial: Option<&Partial>,
        index: Option<usize>,
    ) -> Result<(), MarshError> {
        let args = self.hook_args(processor, many, partial, Some(original));
        match processor.run_check(data, &args) {
            Ok(()) => Ok(()),
            Err(MarshError::Validation(err)) => {
                let field = err.field_name().map(str::to_string);
                let index = index.and_then(|i| self.error_index(i));
                errors.store_error(err.into_messages(), field.as_deref(), index);
                Ok(())
            }
            Err(other) => Err(other),
        }
    }

    // ── Hooks ────────────────────────────────────────────────────────

    fn invoke_processors(
        &self,
        tag: &HookTag,
        pass_many: bool,
        data: Value,
        many: bool,
        original: &Value,
        partial: Option<&Partial>,
    ) -> Result<Value, MarshError> {
        let mut data = data;
        for processor in self.declaration.processors() {
            if processor.tag() != tag || processor.is_pass_many() != pass_many {
                continue;
            }
            data = match data {
                Value::Array(items) if many && !pass_many => {
                    let mut out = Vec::with_capacity(items.len());
                    for (i, item) in items.into_iter().enumerate() {
                        let args = self.hook_args(processor, many, partial, original.get(i));
                        out.push(processor.apply(item, &args)?);
                    }
                    Value::Array(out)
                }
                other => {
                    let args = self.hook_args(processor, many, partial, Some(original));
                    processor.apply(other, &args)?
                }
            };
        }
        Ok(data)
    }

    fn hook_args<'a>(
        &'a self,
        processor: &Processor,
        many: bool,
        partial: Option<&'a Partial>,
        original: Option<&'a Value>,
    ) -> HookArgs<'a> {
        HookArgs {
            many,
            partial,
            original: original.filter(|_| processor.passes_original()),
            context: &self.context,
        }
    }

    fn store_type_error(&self, data: &Value, errors: &mut ErrorStore) {
        tracing::debug!(
            schema = %self.declaration.full_name(),
            input_type = type_name(data),
            "invalid input type"
        );
        let message = self.declaration.error_message("type");
        errors.store_error(ErrorNode::message(message), None, None);
    }

    fn finish(&self, map: Map<String, Value>) -> Value {
        if self.ordered {
            return Value::Object(map);
        }
        let mut entries: Vec<(String, Value)> = map.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Value::Object(entries.into_iter().collect())
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("declaration", &self.declaration.full_name())
            .field("many", &self.many)
            .field("unknown", &self.unknown)
            .field("partial", &self.partial)
            .field("only", &self.only)
            .field("exclude", &self.exclude)
            .finish()
    }
}

// ─── Builder ─────────────────────────────────────────────────────────

/// Builder for a configured [`Schema`].
pub struct SchemaBuilder {
    declaration: Arc<SchemaDeclaration>,
    many: Option<bool>,
    only: Option<BTreeSet<String>>,
    exclude: BTreeSet<String>,
    load_only: BTreeSet<String>,
    dump_only: BTreeSet<String>,
    context: Option<Context>,
    unknown: Option<UnknownPolicy>,
    partial: Option<Partial>,
    accessor: Option<Arc<dyn AttributeAccessor>>,
}

impl SchemaBuilder {
    fn new(declaration: &Arc<SchemaDeclaration>) -> Self {
        Self {
            declaration: Arc::clone(declaration),
            many: None,
            only: None,
            exclude: BTreeSet::new(),
            load_only: BTreeSet::new(),
            dump_only: BTreeSet::new(),
            context: None,
            unknown: None,
            partial: None,
            accessor: None,
        }
    }

    /// Process collections.
    pub fn many(mut self, many: bool) -> Self {
        self.many = Some(many);
        self
    }

    /// Keep only these fields. Dotted names select inside nested fields.
    pub fn only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Drop these fields. Dotted names reach inside nested fields.
    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(names.into_iter().map(Into::into));
        self
    }

    /// Additional load-only fields.
    pub fn load_only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.load_only.extend(names.into_iter().map(Into::into));
        self
    }

    /// Additional dump-only fields.
    pub fn dump_only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dump_only.extend(names.into_iter().map(Into::into));
        self
    }

    /// Share `context` with this instance and its nested schemas.
    pub fn context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    /// Unknown-key policy.
    pub fn unknown(mut self, policy: UnknownPolicy) -> Self {
        self.unknown = Some(policy);
        self
    }

    /// Default partial set for load.
    pub fn partial(mut self, partial: Partial) -> Self {
        self.partial = Some(partial);
        self
    }

    /// Attribute accessor for dump.
    pub fn accessor(self, accessor: impl AttributeAccessor + 'static) -> Self {
        self.accessor_arc(Arc::new(accessor))
    }

    /// Shared attribute accessor for dump.
    pub fn accessor_arc(mut self, accessor: Arc<dyn AttributeAccessor>) -> Self {
        self.accessor = Some(accessor);
        self
    }

    /// Validate the selection and build the instance.
    pub fn build(self) -> Result<Schema, ConfigError> {
        let mut schema = Schema::new(&self.declaration);
        let customized = self.only.is_some()
            || !self.exclude.is_empty()
            || !self.load_only.is_empty()
            || !self.dump_only.is_empty();
        if customized {
            let selection = Selection {
                only: self.only.as_ref(),
                exclude: Some(&self.exclude),
                load_only: Some(&self.load_only),
                dump_only: Some(&self.dump_only),
            };
            let sets = resolve_field_sets(
                self.declaration.full_name(),
                self.declaration.fields(),
                self.declaration.options(),
                &selection,
            )?;
            schema.sets = Arc::new(sets);
        }
        if let Some(many) = self.many {
            schema.many = many;
        }
        if let Some(unknown) = self.unknown {
            schema.unknown = unknown;
        }
        if let Some(context) = self.context {
            schema.context = context;
        }
        if let Some(accessor) = self.accessor {
            schema.accessor = accessor;
        }
        schema.partial = self.partial;
        schema.only = self.only;
        schema.exclude = self.exclude;
        Ok(schema)
    }
}

impl fmt::Debug for SchemaBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaBuilder")
            .field("declaration", &self.declaration.full_name())
            .field("many", &self.many)
            .field("only", &self.only)
            .field("exclude", &self.exclude)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::Range;
    use serde_json::json;

    fn person() -> Arc<SchemaDeclaration> {
        SchemaDeclaration::builder("SchemaUnitPerson")
            .register(false)
            .field("name", Field::str().required())
            .field("age", Field::integer().validate(Range::min(0.0)))
            .build()
            .unwrap()
    }

    // ── Dump ─────────────────────────────────────────────────────────

    #[test]
    fn test_dump_omits_missing_attributes() {
        let schema = Schema::new(&person());
        assert_eq!(
            schema.dump_value(&json!({"name": "Ada"})).unwrap(),
            json!({"name": "Ada"})
        );
    }

    #[test]
    fn test_dump_many_rejects_non_collections() {
        let schema = Schema::new(&person());
        let err = schema.dump_many(&json!({"name": "Ada"})).unwrap_err();
        assert_eq!(
            err.as_validation().unwrap().to_json(),
            json!({"_schema": ["Invalid input type."]})
        );
    }

    #[test]
    fn test_unordered_output_is_sorted() {
        let decl = SchemaDeclaration::builder("SchemaUnitSorted")
            .register(false)
            .field("z", Field::raw())
            .field("a", Field::raw())
            .build()
            .unwrap();
        let out = Schema::new(&decl).dump_value(&json!({"z": 1, "a": 2})).unwrap();
        let keys: Vec<&String> = out.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["a", "z"]);
    }

    // ── Load ─────────────────────────────────────────────────────────

    #[test]
    fn test_load_collects_all_field_errors() {
        let schema = Schema::new(&person());
        let err = schema
            .load(&json!({"age": "x"}))
            .unwrap_err()
            .into_validation()
            .unwrap();
        assert_eq!(
            err.to_json(),
            json!({"age": ["Not a valid integer."], "name": ["Missing data for required field."]})
        );
        assert_eq!(err.valid_data(), Some(&json!({})));
        assert_eq!(err.data(), Some(&json!({"age": "x"})));
    }

    #[test]
    fn test_load_rejects_non_mapping() {
        let schema = Schema::new(&person());
        let err = schema.load(&json!([1, 2])).unwrap_err();
        assert_eq!(
            err.as_validation().unwrap().to_json(),
            json!({"_schema": ["Invalid input type."]})
        );
    }

    #[test]
    fn test_validate_returns_errors_without_raising() {
        let schema = Schema::new(&person());
        assert!(schema.validate(&json!({"name": "Ada"})).unwrap().is_empty());
        let errors = schema.validate(&json!({"name": 1})).unwrap();
        assert_eq!(
            errors.messages_for("name").unwrap(),
            ["Not a valid string."]
        );
    }

    #[test]
    fn test_loads_parses_json_text() {
        let schema = Schema::new(&person());
        let loaded = schema.loads(r#"{"name": "Ada", "age": 36}"#).unwrap();
        assert_eq!(loaded, json!({"age": 36, "name": "Ada"}));
        assert!(matches!(schema.loads("{"), Err(MarshError::Serialization(_))));
    }

    // ── Builder ──────────────────────────────────────────────────────

    #[test]
    fn test_builder_rejects_unknown_only() {
        let err = Schema::builder(&person())
            .only(["nickname"])
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnknownFields { ref option, .. } if option == "only"
        ));
    }

    #[test]
    fn test_builder_dump_only_hides_field_from_load() {
        let schema = Schema::builder(&person()).dump_only(["age"]).build().unwrap();
        let loaded_names: Vec<&str> = schema.load_fields().map(|(n, _)| n).collect();
        assert_eq!(loaded_names, ["name"]);
        let err = schema.load(&json!({"name": "Ada", "age": 3})).unwrap_err();
        assert_eq!(
            err.as_validation().unwrap().to_json(),
            json!({"age": ["Unknown field."]})
        );
    }

    #[test]
    fn test_schema_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Schema>();
        assert_send_sync::<Arc<SchemaDeclaration>>();
    }
}
