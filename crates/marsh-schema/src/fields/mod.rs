//! # Built-in Field Kinds
//!
//! Concrete [`FieldKind`](crate::field::FieldKind) implementations plus
//! shorthand constructors on [`Field`]:
//!
//! | Constructor            | Kind          | Load accepts                         |
//! |------------------------|---------------|--------------------------------------|
//! | `Field::raw()`         | [`Raw`]       | anything                             |
//! | `Field::str()`         | [`Str`]       | strings                              |
//! | `Field::integer()`     | [`Integer`]   | integers, integral floats, digits    |
//! | `Field::float()`       | [`Float`]     | finite numbers, numeric strings      |
//! | `Field::boolean()`     | [`Boolean`]   | booleans and their usual spellings   |
//! | `Field::list(inner)`   | [`List`]      | arrays, each item through `inner`    |
//! | `Field::dict()`        | [`Dict`]      | mappings                             |
//! | `Field::nested(t)`     | [`Nested`]    | whatever the target schema loads     |
//! | `Field::pluck(t, f)`   | [`Pluck`]     | bare values of one nested field      |
//! | `Field::constant(v)`   | [`Constant`]  | anything; always yields `v`          |

mod collection;
mod function;
mod nested;
mod primitive;

pub use collection::{Dict, List};
pub use function::Function;
pub use nested::{Nested, NestedTarget, Pluck, SELF_REFERENCE};
pub use primitive::{Boolean, Constant, Float, Integer, Raw, Str};

use serde_json::Value;

use crate::field::Field;

impl Field {
    /// Pass-through field.
    pub fn raw() -> Self {
        Self::new(Raw)
    }

    /// String field.
    pub fn str() -> Self {
        Self::new(Str)
    }

    /// Integer field.
    pub fn integer() -> Self {
        Self::new(Integer::default())
    }

    /// Floating-point field.
    pub fn float() -> Self {
        Self::new(Float)
    }

    /// Boolean field.
    pub fn boolean() -> Self {
        Self::new(Boolean)
    }

    /// List whose items go through `inner`.
    pub fn list(inner: Field) -> Self {
        Self::new(List::new(inner))
    }

    /// Mapping field with unchecked keys and values.
    pub fn dict() -> Self {
        Self::new(Dict::default())
    }

    /// Single nested object.
    pub fn nested(target: impl Into<NestedTarget>) -> Self {
        Self::new(Nested::new(target))
    }

    /// Collection of nested objects.
    pub fn nested_many(target: impl Into<NestedTarget>) -> Self {
        Self::new(Nested::new(target).many())
    }

    /// One field of a nested schema, flattened to its bare value.
    pub fn pluck(target: impl Into<NestedTarget>, field_name: impl Into<String>) -> Self {
        Self::new(Pluck::new(target, field_name))
    }

    /// Field that always produces `value`, in both directions.
    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        Self::new(Constant::new(value.clone()))
            .dump_default(value.clone())
            .load_default(value)
    }
}
