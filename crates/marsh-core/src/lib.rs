//! # marsh-core — Foundational Types for the marsh Engine
//!
//! This crate holds the types every other marsh crate speaks: the
//! path-keyed error accumulator, the structured validation error, the
//! top-level error enum, and helpers for walking dotted paths through
//! `serde_json::Value` trees. It depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Errors accumulate, they do not overwrite.** [`ErrorStore`] merges
//!    two trees at the same key by concatenating message lists and
//!    recursively merging subtrees.
//!
//! 2. **One error type per failure class.** Validation failures are data
//!    ([`ValidationError`]) and travel with the partially valid result.
//!    Configuration failures ([`ConfigError`]) are raised eagerly when a
//!    schema is built. Everything else is terminal.
//!
//! 3. **Loosely-structured data is `serde_json::Value`.** Input mappings,
//!    primitives, and output trees all use the same representation.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `marsh-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod error_store;
pub mod path;

// Re-export primary types for ergonomic imports.
pub use error::{ConfigError, MarshError, RegistryError, ValidationError};
pub use error_store::{ErrorKey, ErrorNode, ErrorStore, SCHEMA_KEY};
pub use path::{get_path, remove_path, set_path, type_name};
pub use serde_json::{Map, Value};
