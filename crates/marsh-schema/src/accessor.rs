//! Attribute extraction for `dump`.
//!
//! Dumping pulls each field's attribute out of the source object through an
//! [`AttributeAccessor`]. The default walks dotted paths through mappings
//! and arrays; schemas can inject their own accessor to read from other
//! shapes (reference tables, computed views, ...). Closures with the right
//! signature are accessors too.

use std::fmt;

use serde_json::Value;

use marsh_core::get_path;

/// Reads one attribute from a source object.
pub trait AttributeAccessor: Send + Sync {
    /// The attribute value, or `None` if the object does not have it.
    fn get_value(&self, obj: &Value, attr: &str) -> Option<Value>;
}

/// Dotted-path key lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAccessor;

impl AttributeAccessor for DefaultAccessor {
    fn get_value(&self, obj: &Value, attr: &str) -> Option<Value> {
        get_path(obj, attr).cloned()
    }
}

impl<F> AttributeAccessor for F
where
    F: Fn(&Value, &str) -> Option<Value> + Send + Sync,
{
    fn get_value(&self, obj: &Value, attr: &str) -> Option<Value> {
        self(obj, attr)
    }
}

impl fmt::Debug for dyn AttributeAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AttributeAccessor")
    }
}
