//! # marsh-schema — Declarative Load/Dump Engine
//!
//! Declare a schema once, then use it to validate and convert loosely
//! structured input into application data (`load`) and to serialize
//! application data back into plain data (`dump`).
//!
//! ```ignore
//! use marsh_schema::{Field, Schema, SchemaDeclaration, validate::Range};
//! use serde_json::json;
//!
//! let person = SchemaDeclaration::builder("Person")
//!     .field("name", Field::str().required())
//!     .field("age", Field::integer().validate(Range::min(0.0)))
//!     .build()?;
//!
//! let schema = Schema::new(&person);
//! let loaded = schema.load(&json!({"name": "Ada", "age": 36}))?;
//! ```
//!
//! ## Modules
//!
//! - [`field`] / [`fields`]: the field contract and built-in kinds.
//! - [`validate`]: reusable value validators.
//! - [`hooks`]: pre/post processors and schema/field validators.
//! - [`declaration`]: field registry, inheritance, and build-time checks.
//! - [`schema`]: configured instances and the load/dump pipelines.
//! - [`registry`]: name resolution for nested fields.
//! - [`options`], [`context`], [`accessor`]: configuration and plumbing.
//!
//! ## Crate Policy
//!
//! - Built declarations are immutable and shared behind `Arc`.
//! - [`Schema`] is `Send + Sync`; concurrent calls share only the context.
//! - No `.unwrap()` outside tests.

pub mod accessor;
pub mod context;
pub mod declaration;
pub mod field;
pub mod fields;
pub mod hooks;
pub mod options;
pub mod registry;
pub mod schema;
pub mod validate;

pub use accessor::{AttributeAccessor, DefaultAccessor};
pub use context::Context;
pub use declaration::{SchemaDeclaration, SchemaDeclarationBuilder};
pub use field::{DefaultValue, Field, FieldKind, FieldMode, FieldScope};
pub use fields::{Nested, NestedTarget, SELF_REFERENCE};
pub use hooks::{HookArgs, HookTag, Processor};
pub use options::{LoadOptions, Partial, SchemaOptions, UnknownPolicy};
pub use schema::{Schema, SchemaBuilder};
pub use validate::Validator;

pub use marsh_core::{
    ConfigError, ErrorKey, ErrorNode, ErrorStore, MarshError, RegistryError, ValidationError,
    SCHEMA_KEY,
};
