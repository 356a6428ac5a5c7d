//! # Schema Registry
//!
//! A process-wide map from schema names to declarations, populated by
//! [`SchemaDeclarationBuilder::build`](crate::SchemaDeclarationBuilder::build)
//! when the `register` option is set. Nested fields that name their target
//! as a string resolve it here on first use.
//!
//! ## Naming
//!
//! Each declaration is filed under its full name (`module.Name`) and its
//! short name (`Name`). Lookups try the full name first. A short name shared
//! by declarations from different modules is ambiguous and must be looked up
//! by full name. Registering a different declaration under an existing full
//! name is a configuration error.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use marsh_core::{ConfigError, RegistryError};

use crate::declaration::SchemaDeclaration;

#[derive(Default)]
struct Registry {
    by_full_name: BTreeMap<String, Arc<SchemaDeclaration>>,
    by_name: BTreeMap<String, BTreeSet<String>>,
}

fn registry() -> &'static RwLock<Registry> {
    static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(Registry::default()))
}

/// Add `decl` to the registry.
///
/// Re-registering the same declaration is a no-op.
pub fn register(decl: &Arc<SchemaDeclaration>) -> Result<(), ConfigError> {
    let mut reg = registry().write();
    if let Some(existing) = reg.by_full_name.get(decl.full_name()) {
        if Arc::ptr_eq(existing, decl) {
            return Ok(());
        }
        return Err(ConfigError::DuplicateSchemaName(decl.full_name().to_string()));
    }
    reg.by_full_name.insert(decl.full_name().to_string(), Arc::clone(decl));
    reg.by_name
        .entry(decl.name().to_string())
        .or_default()
        .insert(decl.full_name().to_string());
    tracing::debug!(schema = %decl.full_name(), "registered schema");
    Ok(())
}

/// Resolve `name` (full or short) to a declaration.
pub fn lookup(name: &str) -> Result<Arc<SchemaDeclaration>, RegistryError> {
    let reg = registry().read();
    if let Some(decl) = reg.by_full_name.get(name) {
        return Ok(Arc::clone(decl));
    }
    match reg.by_name.get(name) {
        Some(full_names) if full_names.len() == 1 => full_names
            .iter()
            .next()
            .and_then(|full| reg.by_full_name.get(full))
            .map(Arc::clone)
            .ok_or_else(|| RegistryError::NotFound(name.to_string())),
        Some(full_names) => Err(RegistryError::Ambiguous {
            name: name.to_string(),
            candidates: full_names.iter().cloned().collect(),
        }),
        None => Err(RegistryError::NotFound(name.to_string())),
    }
}

/// Whether `name` resolves unambiguously.
pub fn is_registered(name: &str) -> bool {
    lookup(name).is_ok()
}

/// Every registered full name, sorted.
pub fn registered_names() -> Vec<String> {
    registry().read().by_full_name.keys().cloned().collect()
}
