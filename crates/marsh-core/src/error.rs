//! # Error Types
//!
//! Defines the error types used throughout marsh. Enumerated errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - [`ValidationError`] is the only error that is accumulated. It carries
//!   an error tree, an optional target field, an optional error code, and
//!   the data that was valid before failure.
//! - [`ConfigError`] is raised while building declarations and schema
//!   instances, never during a load or dump call.
//! - [`RegistryError`] is raised when a nested schema referenced by name
//!   cannot be resolved.
//! - Every other [`MarshError`] variant is terminal for the call.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::error_store::{ErrorNode, ErrorStore, SCHEMA_KEY};

/// Top-level error type for marsh.
#[derive(Error, Debug)]
pub enum MarshError {
    /// Field, schema, or structural validation failure.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Schema configuration rejected.
    #[error("schema configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Nested schema name could not be resolved.
    #[error("schema registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Conversion between typed values and `serde_json::Value` failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A dotted attribute path crosses a value that is not a mapping.
    #[error("cannot assign attribute path '{path}': '{segment}' is not a mapping")]
    AttributePath {
        /// Full dotted attribute path.
        path: String,
        /// Segment whose current value is not a mapping.
        segment: String,
    },

    /// A hook or callable failed with a non-validation error.
    #[error("hook '{hook}' failed: {reason}")]
    Hook {
        /// Name of the hook or callable.
        hook: String,
        /// Reason reported by the hook.
        reason: String,
    },
}

impl MarshError {
    /// Build a terminal hook failure.
    pub fn hook(hook: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Hook {
            hook: hook.into(),
            reason: reason.to_string(),
        }
    }

    /// The validation error, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }

    /// Consume into the validation error, if this is one.
    pub fn into_validation(self) -> Option<ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

// ─── Validation ──────────────────────────────────────────────────────

/// A structured validation failure.
///
/// Raised by fields, validators, and hooks; raised in aggregate by
/// `load`/`dump`, in which case [`messages`](Self::messages) is the whole
/// error tree and [`valid_data`](Self::valid_data) holds whatever was
/// produced successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    messages: ErrorNode,
    field_name: Option<String>,
    code: Option<String>,
    data: Option<Value>,
    valid_data: Option<Value>,
}

impl ValidationError {
    /// A single untargeted message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::from_node(ErrorNode::message(message))
    }

    /// Several untargeted messages.
    pub fn with_messages<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_node(ErrorNode::Messages(
            messages.into_iter().map(Into::into).collect(),
        ))
    }

    /// An error tree.
    pub fn from_store(store: ErrorStore) -> Self {
        Self::from_node(ErrorNode::Nested(store))
    }

    /// Any error node.
    pub fn from_node(messages: ErrorNode) -> Self {
        Self {
            messages,
            field_name: None,
            code: None,
            data: None,
            valid_data: None,
        }
    }

    /// One message per named field, as a single multi-field error.
    pub fn for_fields<I, K, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<String>,
    {
        let mut store = ErrorStore::new();
        for (field, msg) in entries {
            store.insert(field.into(), ErrorNode::message(msg));
        }
        Self::from_store(store)
    }

    /// Target the error at one field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field_name = Some(field.into());
        self
    }

    /// Attach an error code, used to look up overriding messages.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach the raw input that was being processed.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach the successfully processed part of the input.
    pub fn with_valid_data(mut self, valid_data: Value) -> Self {
        self.valid_data = Some(valid_data);
        self
    }

    /// The raw error node.
    pub fn messages(&self) -> &ErrorNode {
        &self.messages
    }

    /// Consume into the raw error node.
    pub fn into_messages(self) -> ErrorNode {
        self.messages
    }

    /// Target field, `None` for schema-level errors.
    pub fn field_name(&self) -> Option<&str> {
        self.field_name.as_deref()
    }

    /// Error code, if one was attached.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Raw input, if attached.
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Successfully processed data, if attached.
    pub fn valid_data(&self) -> Option<&Value> {
        self.valid_data.as_ref()
    }

    /// Messages keyed by field: targeted errors are wrapped under their
    /// field, untargeted lists under [`SCHEMA_KEY`], trees are returned as-is.
    pub fn normalized_messages(&self) -> ErrorStore {
        let mut store = ErrorStore::new();
        store.store_error(self.messages.clone(), self.field_name.as_deref(), None);
        store
    }

    /// Consuming variant of [`normalized_messages`](Self::normalized_messages).
    pub fn into_store(self) -> ErrorStore {
        let mut store = ErrorStore::new();
        store.store_error(self.messages, self.field_name.as_deref(), None);
        store
    }

    /// JSON rendering of the normalized messages.
    pub fn to_json(&self) -> Value {
        self.normalized_messages().to_json()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl std::error::Error for ValidationError {}

impl From<ErrorStore> for ValidationError {
    fn from(store: ErrorStore) -> Self {
        Self::from_store(store)
    }
}

// ─── Configuration ───────────────────────────────────────────────────

/// Schema configuration rejected at construction time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Names that do not match any declared field.
    #[error("invalid fields for schema '{schema}' in `{option}`: {}", .names.join(", "))]
    UnknownFields {
        /// Schema name.
        schema: String,
        /// Option that referenced the names (`only`, `exclude`, ...).
        option: String,
        /// The unknown names.
        names: Vec<String>,
    },

    /// Two fields read or write the same serialized key.
    #[error(
        "data key '{key}' of schema '{schema}' is shared by fields {} on {direction}",
        .fields.join(", ")
    )]
    DuplicateDataKey {
        /// Schema name.
        schema: String,
        /// `load` or `dump`.
        direction: String,
        /// The colliding key.
        key: String,
        /// Fields bound to the key.
        fields: Vec<String>,
    },

    /// Two fields load into the same target attribute.
    #[error(
        "attribute '{attribute}' of schema '{schema}' is shared by fields {}",
        .fields.join(", ")
    )]
    DuplicateAttribute {
        /// Schema name.
        schema: String,
        /// The colliding attribute.
        attribute: String,
        /// Fields bound to the attribute.
        fields: Vec<String>,
    },

    /// A required field may not also declare a load default.
    #[error("field '{field}' of schema '{schema}' is required and cannot declare a load default")]
    RequiredWithDefault {
        /// Schema name.
        schema: String,
        /// Field name.
        field: String,
    },

    /// A different declaration is already registered under this name.
    #[error("schema name '{0}' is already registered")]
    DuplicateSchemaName(String),

    /// Options document could not be parsed.
    #[error("invalid schema options: {0}")]
    InvalidOptions(String),
}

// ─── Registry ────────────────────────────────────────────────────────

/// Failure to resolve a schema by name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No declaration is registered under the name.
    #[error("no schema registered under '{0}'")]
    NotFound(String),

    /// The short name is shared by several modules.
    #[error("schema name '{name}' is ambiguous; use one of: {}", .candidates.join(", "))]
    Ambiguous {
        /// Requested short name.
        name: String,
        /// Fully-qualified names sharing it.
        candidates: Vec<String>,
    },
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_untargeted_message_normalizes_to_schema_key() {
        let err = ValidationError::new("Invalid input type.");
        assert_eq!(err.to_json(), json!({"_schema": ["Invalid input type."]}));
    }

    #[test]
    fn test_targeted_message_normalizes_to_field() {
        let err = ValidationError::new("Too young.").with_field("age");
        assert_eq!(err.to_json(), json!({"age": ["Too young."]}));
    }

    #[test]
    fn test_multi_field_error() {
        let err = ValidationError::for_fields([
            ("start", "Must precede end."),
            ("end", "Must follow start."),
        ]);
        assert_eq!(
            err.to_json(),
            json!({"end": ["Must follow start."], "start": ["Must precede end."]})
        );
    }

    #[test]
    fn test_targeted_tree_stays_under_field() {
        let tree = ErrorStore::single("city", ErrorNode::message("required"));
        let err = ValidationError::from_store(tree).with_field("address");
        assert_eq!(err.to_json(), json!({"address": {"city": ["required"]}}));
    }

    #[test]
    fn test_code_and_valid_data_are_carried() {
        let err = ValidationError::new("nope")
            .with_code("range")
            .with_valid_data(json!({"a": 1}));
        assert_eq!(err.code(), Some("range"));
        assert_eq!(err.valid_data(), Some(&json!({"a": 1})));
    }

    #[test]
    fn test_marsh_error_display() {
        let err = MarshError::from(ConfigError::UnknownFields {
            schema: "User".into(),
            option: "only".into(),
            names: vec!["nope".into(), "gone".into()],
        });
        assert_eq!(
            err.to_string(),
            "schema configuration error: invalid fields for schema 'User' in `only`: nope, gone"
        );
    }

    #[test]
    fn test_into_validation() {
        let err = MarshError::from(ValidationError::new("x"));
        assert!(err.as_validation().is_some());
        assert!(MarshError::hook("h", "boom").into_validation().is_none());
    }

    #[test]
    fn test_schema_key_constant() {
        assert_eq!(SCHEMA_KEY, "_schema");
    }
}
