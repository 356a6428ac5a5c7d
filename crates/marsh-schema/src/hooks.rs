//! # Processors
//!
//! A [`Processor`] is a named callable attached to a schema declaration
//! under a [`HookTag`]. Transform hooks (`pre_dump`, `post_dump`,
//! `pre_load`, `post_load`) receive data by value and return the replacement.
//! Check hooks (`validates_schema`, `validates`) inspect data and fail with
//! a [`ValidationError`](marsh_core::ValidationError) wrapped in
//! [`MarshError::Validation`].
//!
//! ## Call shape
//!
//! | flag                   | effect                                                  |
//! |------------------------|---------------------------------------------------------|
//! | `pass_many`            | invoked once with the whole collection                  |
//! | `pass_original`        | [`HookArgs::original`] carries the raw input            |
//! | `skip_on_field_errors` | schema validators skip items that already have errors   |
//!
//! Processors are inherited from base declarations. A processor declared
//! under an inherited name replaces the inherited one.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use marsh_core::MarshError;

use crate::context::Context;
use crate::options::Partial;

/// When a processor runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HookTag {
    /// Before serialization.
    PreDump,
    /// After serialization.
    PostDump,
    /// Before deserialization.
    PreLoad,
    /// After deserialization and validation.
    PostLoad,
    /// Whole-object validation after field deserialization.
    ValidatesSchema,
    /// Validation of one declared field's loaded value.
    ValidatesField(String),
}

/// What a processor receives besides the data.
#[derive(Debug, Clone, Copy)]
pub struct HookArgs<'a> {
    /// Whether the call processes a collection.
    pub many: bool,
    /// Partial set of the load call, if any.
    pub partial: Option<&'a Partial>,
    /// Raw input (load) or source object (dump) when `pass_original` is set.
    pub original: Option<&'a Value>,
    /// Shared schema context.
    pub context: &'a Context,
}

type TransformFn = Arc<dyn Fn(Value, &HookArgs<'_>) -> Result<Value, MarshError> + Send + Sync>;
type CheckFn = Arc<dyn Fn(&Value, &HookArgs<'_>) -> Result<(), MarshError> + Send + Sync>;

#[derive(Clone)]
enum Callable {
    Transform(TransformFn),
    Check(CheckFn),
}

/// A named hook or validator.
#[derive(Clone)]
pub struct Processor {
    name: String,
    tag: HookTag,
    pass_many: bool,
    pass_original: bool,
    skip_on_field_errors: bool,
    callable: Callable,
}

impl Processor {
    fn transform<F>(name: impl Into<String>, tag: HookTag, f: F) -> Self
    where
        F: Fn(Value, &HookArgs<'_>) -> Result<Value, MarshError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            tag,
            pass_many: false,
            pass_original: false,
            skip_on_field_errors: true,
            callable: Callable::Transform(Arc::new(f)),
        }
    }

    fn check<F>(name: impl Into<String>, tag: HookTag, f: F) -> Self
    where
        F: Fn(&Value, &HookArgs<'_>) -> Result<(), MarshError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            tag,
            pass_many: false,
            pass_original: false,
            skip_on_field_errors: true,
            callable: Callable::Check(Arc::new(f)),
        }
    }

    /// Transform the source object before serialization.
    pub fn pre_dump<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value, &HookArgs<'_>) -> Result<Value, MarshError> + Send + Sync + 'static,
    {
        Self::transform(name, HookTag::PreDump, f)
    }

    /// Transform serialized output.
    pub fn post_dump<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value, &HookArgs<'_>) -> Result<Value, MarshError> + Send + Sync + 'static,
    {
        Self::transform(name, HookTag::PostDump, f)
    }

    /// Transform raw input before deserialization.
    pub fn pre_load<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value, &HookArgs<'_>) -> Result<Value, MarshError> + Send + Sync + 'static,
    {
        Self::transform(name, HookTag::PreLoad, f)
    }

    /// Transform fully validated load output.
    pub fn post_load<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value, &HookArgs<'_>) -> Result<Value, MarshError> + Send + Sync + 'static,
    {
        Self::transform(name, HookTag::PostLoad, f)
    }

    /// Validate the whole loaded object.
    pub fn validates_schema<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value, &HookArgs<'_>) -> Result<(), MarshError> + Send + Sync + 'static,
    {
        Self::check(name, HookTag::ValidatesSchema, f)
    }

    /// Validate the loaded value of the declared field `field`.
    pub fn validates<F>(field: impl Into<String>, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value, &HookArgs<'_>) -> Result<(), MarshError> + Send + Sync + 'static,
    {
        Self::check(name, HookTag::ValidatesField(field.into()), f)
    }

    /// Receive the whole collection in one invocation.
    pub fn pass_many(mut self) -> Self {
        self.pass_many = true;
        self
    }

    /// Receive the raw input alongside the data.
    pub fn pass_original(mut self) -> Self {
        self.pass_original = true;
        self
    }

    /// Whether a schema validator skips data that already has errors.
    pub fn skip_on_field_errors(mut self, skip: bool) -> Self {
        self.skip_on_field_errors = skip;
        self
    }

    /// Processor name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hook tag.
    pub fn tag(&self) -> &HookTag {
        &self.tag
    }

    /// Whether the processor sees the whole collection.
    pub fn is_pass_many(&self) -> bool {
        self.pass_many
    }

    /// Whether the processor receives the original input.
    pub fn passes_original(&self) -> bool {
        self.pass_original
    }

    /// Whether errors already present suppress this validator.
    pub fn skips_on_field_errors(&self) -> bool {
        self.skip_on_field_errors
    }

    /// Run a transform hook. Check hooks leave the data untouched.
    pub(crate) fn apply(&self, data: Value, args: &HookArgs<'_>) -> Result<Value, MarshError> {
        match &self.callable {
            Callable::Transform(f) => f(data, args),
            Callable::Check(f) => f(&data, args).map(|()| data),
        }
    }

    /// Run a check hook. Transform hooks run on a copy and are discarded.
    pub(crate) fn run_check(&self, data: &Value, args: &HookArgs<'_>) -> Result<(), MarshError> {
        match &self.callable {
            Callable::Check(f) => f(data, args),
            Callable::Transform(f) => f(data.clone(), args).map(drop),
        }
    }
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("pass_many", &self.pass_many)
            .field("pass_original", &self.pass_original)
            .field("skip_on_field_errors", &self.skip_on_field_errors)
            .finish()
    }
}
