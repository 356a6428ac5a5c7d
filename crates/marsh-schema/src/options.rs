//! # Schema Options
//!
//! [`SchemaOptions`] is the per-declaration configuration block: field
//! allowlist and exclusions, direction restrictions, the unknown-key
//! policy, and output/ error-shape toggles. It is plain serde data so it
//! can live in YAML or JSON next to the application's other settings:
//!
//! ```yaml
//! unknown: exclude
//! ordered: true
//! dump_only: [id, created_at]
//! ```
//!
//! Per-call knobs ([`LoadOptions`], [`Partial`]) live here too.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use marsh_core::ConfigError;

// ─── Unknown-key policy ──────────────────────────────────────────────

/// What `load` does with input keys that no field claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownPolicy {
    /// Record an "Unknown field." error at the key.
    #[default]
    Raise,
    /// Drop the key silently.
    Exclude,
    /// Copy the key and value into the output unvalidated.
    Include,
}

impl fmt::Display for UnknownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raise => f.write_str("raise"),
            Self::Exclude => f.write_str("exclude"),
            Self::Include => f.write_str("include"),
        }
    }
}

// ─── Partial loading ─────────────────────────────────────────────────

/// Fields exempted from "required" checks for one load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Partial {
    /// Every field, at every nesting depth.
    All,
    /// Named fields; dotted names reach into nested schemas.
    Fields(BTreeSet<String>),
}

impl Partial {
    /// Exempt the given field names.
    pub fn fields<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Fields(names.into_iter().map(Into::into).collect())
    }

    /// Whether a missing `name` is tolerated.
    pub fn exempts(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Fields(names) => names.contains(name),
        }
    }

    /// The partial set seen by the nested schema behind `key`.
    pub fn scoped(&self, key: &str) -> Partial {
        match self {
            Self::All => Self::All,
            Self::Fields(names) => {
                let prefix = format!("{key}.");
                Self::Fields(
                    names
                        .iter()
                        .filter_map(|n| n.strip_prefix(&prefix).map(str::to_string))
                        .collect(),
                )
            }
        }
    }
}

// ─── Declaration options ─────────────────────────────────────────────

/// Declaration-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemaOptions {
    /// Allowlist of declared fields; `None` keeps all of them.
    pub fields: Option<Vec<String>>,
    /// Declared fields to drop.
    pub exclude: Vec<String>,
    /// Fields that only take part in `load`.
    pub load_only: Vec<String>,
    /// Fields that only take part in `dump`.
    pub dump_only: Vec<String>,
    /// Default unknown-key policy.
    pub unknown: UnknownPolicy,
    /// Whether instances default to processing collections.
    pub many: bool,
    /// Key per-item errors by index when processing collections.
    pub index_errors: bool,
    /// Emit output keys in field order instead of canonical key order.
    pub ordered: bool,
    /// Make the declaration resolvable by name from nested fields.
    pub register: bool,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            fields: None,
            exclude: Vec::new(),
            load_only: Vec::new(),
            dump_only: Vec::new(),
            unknown: UnknownPolicy::Raise,
            many: false,
            index_errors: true,
            ordered: false,
            register: true,
        }
    }
}

impl SchemaOptions {
    /// Parse options from a YAML document.
    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(source).map_err(|e| ConfigError::InvalidOptions(e.to_string()))
    }

    /// Parse options from a JSON value.
    pub fn from_json(value: &Value) -> Result<Self, ConfigError> {
        Self::deserialize(value).map_err(|e| ConfigError::InvalidOptions(e.to_string()))
    }
}

// ─── Per-call options ────────────────────────────────────────────────

/// Overrides for a single `load` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Process a collection (`Some(true)`) or a single item.
    pub many: Option<bool>,
    /// Fields exempted from required checks.
    pub partial: Option<Partial>,
    /// Unknown-key policy for this call.
    pub unknown: Option<UnknownPolicy>,
}

impl LoadOptions {
    /// No overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the many flag.
    pub fn many(mut self, many: bool) -> Self {
        self.many = Some(many);
        self
    }

    /// Load partially.
    pub fn partial(mut self, partial: Partial) -> Self {
        self.partial = Some(partial);
        self
    }

    /// Override the unknown-key policy.
    pub fn unknown(mut self, unknown: UnknownPolicy) -> Self {
        self.unknown = Some(unknown);
        self
    }
}
