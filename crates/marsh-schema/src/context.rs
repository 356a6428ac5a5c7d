//! Shared key-value store visible to fields, validators, and hooks.
//!
//! A [`Context`] is cloned by reference: a parent schema and every nested
//! schema built during its traversal see the same map. The engine never
//! resets it between calls.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};

/// Caller-managed context shared across one schema tree.
#[derive(Debug, Clone, Default)]
pub struct Context {
    inner: Arc<RwLock<Map<String, Value>>>,
}

impl Context {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context seeded with `entries`.
    pub fn from_map(entries: Map<String, Value>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(entries)),
        }
    }

    /// Clone of the value stored at `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().get(key).cloned()
    }

    /// Store `value` at `key`, returning the previous value.
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.inner.write().insert(key.into(), value)
    }

    /// Remove `key`, returning its value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.write().remove(key)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.read().contains_key(key)
    }

    /// Copy of the whole map.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.inner.read().clone()
    }

    /// Run `f` with exclusive access to the map.
    pub fn update<R>(&self, f: impl FnOnce(&mut Map<String, Value>) -> R) -> R {
        f(&mut self.inner.write())
    }

    /// Whether two handles share the same map.
    pub fn ptr_eq(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
