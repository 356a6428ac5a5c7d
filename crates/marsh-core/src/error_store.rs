//! # Error Store
//!
//! An [`ErrorStore`] is a tree keyed by field name or collection index.
//! Leaves are ordered message lists; internal nodes are nested stores.
//!
//! ## Merge Rules
//!
//! Merging never overwrites:
//!
//! ```text
//! [a] + [b]               -> [a, b]
//! [a] + {k: ..}           -> {_schema: [a, ..], k: ..}
//! {k: ..} + [b]           -> {_schema: [.., b], k: ..}
//! {k: x} + {k: y, j: z}   -> {k: x + y, j: z}
//! ```
//!
//! Untargeted schema-level messages live under the reserved [`SCHEMA_KEY`].
//!
//! ## JSON Shape
//!
//! [`ErrorStore::to_json`] produces the caller-facing messages value: an
//! object from field name (or stringified index) to either a list of
//! strings or a nested object.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Reserved key for errors that are not attached to a single field.
pub const SCHEMA_KEY: &str = "_schema";

// ─── Keys ────────────────────────────────────────────────────────────

/// A single step in an error path: a field name or a collection index.
///
/// Indices order before names so that per-item errors of a batch are
/// reported in input order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKey {
    /// Position of an item within a collection.
    Index(usize),
    /// Field name, data key, or [`SCHEMA_KEY`].
    Field(String),
}

impl ErrorKey {
    /// The reserved schema-level key.
    pub fn schema() -> Self {
        Self::Field(SCHEMA_KEY.to_string())
    }
}

impl fmt::Display for ErrorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Field(name) => f.write_str(name),
        }
    }
}

impl From<&str> for ErrorKey {
    fn from(s: &str) -> Self {
        Self::Field(s.to_string())
    }
}

impl From<String> for ErrorKey {
    fn from(s: String) -> Self {
        Self::Field(s)
    }
}

impl From<usize> for ErrorKey {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

// ─── Nodes ───────────────────────────────────────────────────────────

/// A value in the error tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorNode {
    /// Ordered list of human-readable messages.
    Messages(Vec<String>),
    /// Errors of a nested schema, a collection, or several fields.
    Nested(ErrorStore),
}

impl ErrorNode {
    /// A leaf holding one message.
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Messages(vec![msg.into()])
    }

    /// Whether the node carries no messages at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Messages(msgs) => msgs.is_empty(),
            Self::Nested(store) => store.is_empty(),
        }
    }

    /// The message list, if this is a leaf.
    pub fn as_messages(&self) -> Option<&[String]> {
        match self {
            Self::Messages(msgs) => Some(msgs),
            Self::Nested(_) => None,
        }
    }

    /// The subtree, if this is an internal node.
    pub fn as_store(&self) -> Option<&ErrorStore> {
        match self {
            Self::Messages(_) => None,
            Self::Nested(store) => Some(store),
        }
    }

    /// Merge `other` into `self`, following the rules in the module docs.
    pub fn merge(self, other: ErrorNode) -> ErrorNode {
        match (self, other) {
            (Self::Messages(mut a), Self::Messages(b)) => {
                a.extend(b);
                Self::Messages(a)
            }
            (Self::Messages(a), Self::Nested(store)) => {
                let mut merged = ErrorStore::new();
                merged.insert(ErrorKey::schema(), Self::Messages(a));
                merged.merge(store);
                Self::Nested(merged)
            }
            (Self::Nested(mut store), Self::Messages(b)) => {
                store.insert(ErrorKey::schema(), Self::Messages(b));
                Self::Nested(store)
            }
            (Self::Nested(mut a), Self::Nested(b)) => {
                a.merge(b);
                Self::Nested(a)
            }
        }
    }

    /// JSON rendering of this node.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Messages(msgs) => Value::Array(msgs.iter().cloned().map(Value::String).collect()),
            Self::Nested(store) => store.to_json(),
        }
    }
}

impl From<ErrorStore> for ErrorNode {
    fn from(store: ErrorStore) -> Self {
        Self::Nested(store)
    }
}

impl From<Vec<String>> for ErrorNode {
    fn from(msgs: Vec<String>) -> Self {
        Self::Messages(msgs)
    }
}

// ─── Store ───────────────────────────────────────────────────────────

/// Path-keyed multi-error accumulator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorStore {
    errors: BTreeMap<ErrorKey, ErrorNode>,
}

impl ErrorStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with a single entry.
    pub fn single(key: impl Into<ErrorKey>, node: ErrorNode) -> Self {
        let mut store = Self::new();
        store.insert(key, node);
        store
    }

    /// Whether no errors have been recorded.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of top-level keys.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Merge `node` in at `key`.
    pub fn insert(&mut self, key: impl Into<ErrorKey>, node: ErrorNode) {
        let key = key.into();
        let merged = match self.errors.remove(&key) {
            Some(existing) => existing.merge(node),
            None => node,
        };
        self.errors.insert(key, merged);
    }

    /// Record `messages` for `field` (or the schema when `None`), under
    /// `index` when processing a collection.
    ///
    /// A nested store recorded without a field (or at [`SCHEMA_KEY`]) is
    /// merged into the top level, so schema validators can target several
    /// fields at once.
    pub fn store_error(&mut self, messages: ErrorNode, field: Option<&str>, index: Option<usize>) {
        let tree = match (field, messages) {
            (None, ErrorNode::Nested(store)) => store,
            (Some(SCHEMA_KEY), ErrorNode::Nested(store)) => store,
            (None, msgs) => Self::single(ErrorKey::schema(), msgs),
            (Some(name), msgs) => Self::single(name, msgs),
        };
        self.merge_at(index, tree);
    }

    /// Merge `other` into `self`, wrapping it under `index` if given.
    pub fn merge_at(&mut self, index: Option<usize>, other: ErrorStore) {
        if other.is_empty() {
            return;
        }
        match index {
            Some(i) => self.insert(ErrorKey::Index(i), ErrorNode::Nested(other)),
            None => self.merge(other),
        }
    }

    /// Deep-merge every entry of `other` into `self`.
    pub fn merge(&mut self, other: ErrorStore) {
        for (key, node) in other.errors {
            self.insert(key, node);
        }
    }

    /// The node stored at `key`.
    pub fn get(&self, key: &ErrorKey) -> Option<&ErrorNode> {
        self.errors.get(key)
    }

    /// The node stored for a named field.
    pub fn field(&self, name: &str) -> Option<&ErrorNode> {
        self.errors.get(&ErrorKey::Field(name.to_string()))
    }

    /// The node stored for a collection index.
    pub fn index(&self, i: usize) -> Option<&ErrorNode> {
        self.errors.get(&ErrorKey::Index(i))
    }

    /// The message list stored for a named field, if it is a leaf.
    pub fn messages_for(&self, name: &str) -> Option<&[String]> {
        self.field(name).and_then(ErrorNode::as_messages)
    }

    /// Schema-level messages.
    pub fn schema_messages(&self) -> Option<&[String]> {
        self.messages_for(SCHEMA_KEY)
    }

    /// Whether the store has an entry for `key`.
    pub fn contains(&self, key: &ErrorKey) -> bool {
        self.errors.contains_key(key)
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&ErrorKey, &ErrorNode)> {
        self.errors.iter()
    }

    /// Consume the store into its entries.
    pub fn into_inner(self) -> BTreeMap<ErrorKey, ErrorNode> {
        self.errors
    }

    /// JSON rendering: indices become decimal strings.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (key, node) in &self.errors {
            map.insert(key.to_string(), node.to_json());
        }
        Value::Object(map)
    }
}

impl Serialize for ErrorStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for ErrorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl FromIterator<(ErrorKey, ErrorNode)> for ErrorStore {
    fn from_iter<I: IntoIterator<Item = (ErrorKey, ErrorNode)>>(iter: I) -> Self {
        let mut store = Self::new();
        for (key, node) in iter {
            store.insert(key, node);
        }
        store
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn msgs(list: &[&str]) -> ErrorNode {
        ErrorNode::Messages(list.iter().map(|s| s.to_string()).collect())
    }

    // ── Merge rules ──────────────────────────────────────────────────

    #[test]
    fn test_lists_concatenate() {
        let merged = msgs(&["a"]).merge(msgs(&["b"]));
        assert_eq!(merged, msgs(&["a", "b"]));
    }

    #[test]
    fn test_list_then_tree_lands_under_schema_key() {
        let tree = ErrorStore::single("name", msgs(&["bad"]));
        let merged = msgs(&["first"]).merge(ErrorNode::Nested(tree));
        assert_eq!(
            merged.to_json(),
            json!({"_schema": ["first"], "name": ["bad"]})
        );
    }

    #[test]
    fn test_tree_then_list_appends_schema_messages() {
        let mut tree = ErrorStore::single(SCHEMA_KEY, msgs(&["x"]));
        tree.insert("age", msgs(&["y"]));
        let merged = ErrorNode::Nested(tree).merge(msgs(&["z"]));
        assert_eq!(
            merged.to_json(),
            json!({"_schema": ["x", "z"], "age": ["y"]})
        );
    }

    #[test]
    fn test_same_key_never_overwrites() {
        let mut store = ErrorStore::new();
        store.insert("name", msgs(&["one"]));
        store.insert("name", msgs(&["two"]));
        assert_eq!(store.messages_for("name").unwrap(), ["one", "two"]);
    }

    #[test]
    fn test_deep_merge_of_subtrees() {
        let mut a = ErrorStore::single(
            "author",
            ErrorNode::Nested(ErrorStore::single("name", msgs(&["required"]))),
        );
        let b = ErrorStore::single(
            "author",
            ErrorNode::Nested(ErrorStore::single("age", msgs(&["invalid"]))),
        );
        a.merge(b);
        assert_eq!(
            a.to_json(),
            json!({"author": {"age": ["invalid"], "name": ["required"]}})
        );
    }

    // ── store_error ──────────────────────────────────────────────────

    #[test]
    fn test_store_error_untargeted_goes_to_schema_key() {
        let mut store = ErrorStore::new();
        store.store_error(msgs(&["invalid input"]), None, None);
        assert_eq!(store.schema_messages().unwrap(), ["invalid input"]);
    }

    #[test]
    fn test_store_error_untargeted_tree_merges_at_top_level() {
        let mut store = ErrorStore::new();
        let mut tree = ErrorStore::new();
        tree.insert("a", msgs(&["x"]));
        tree.insert("b", msgs(&["y"]));
        store.store_error(ErrorNode::Nested(tree), None, None);
        assert_eq!(store.to_json(), json!({"a": ["x"], "b": ["y"]}));
    }

    #[test]
    fn test_store_error_with_index() {
        let mut store = ErrorStore::new();
        store.store_error(msgs(&["required"]), Some("name"), Some(1));
        store.store_error(msgs(&["invalid"]), Some("age"), Some(1));
        store.store_error(msgs(&["required"]), Some("name"), Some(0));
        assert_eq!(
            store.to_json(),
            json!({"0": {"name": ["required"]}, "1": {"age": ["invalid"], "name": ["required"]}})
        );
    }

    #[test]
    fn test_merge_at_skips_empty() {
        let mut store = ErrorStore::new();
        store.merge_at(Some(3), ErrorStore::new());
        assert!(store.is_empty());
    }

    #[test]
    fn test_indices_order_before_names() {
        let mut store = ErrorStore::new();
        store.insert("name", msgs(&["x"]));
        store.insert(2usize, msgs(&["y"]));
        let keys: Vec<String> = store.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["2", "name"]);
    }

    #[test]
    fn test_serialize_matches_to_json() {
        let store = ErrorStore::single("name", msgs(&["required"]));
        let json = serde_json::to_value(&store).unwrap();
        assert_eq!(json, store.to_json());
    }
}
