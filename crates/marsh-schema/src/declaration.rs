//! # Schema Declaration
//!
//! A [`SchemaDeclaration`] is the immutable description a schema instance
//! executes: an ordered field registry, the resolved [`SchemaOptions`], the
//! processor list, and schema-level error messages.
//!
//! ## Inheritance
//!
//! Declarations are built with [`SchemaDeclarationBuilder`]. Base
//! declarations contribute their fields and processors before the local
//! ones, walking the bases from last to first so that earlier bases win:
//!
//! ```text
//! builder("Child").base(A).base(B).field("x", ..)
//!   registry = fields(B) ⊕ fields(A) ⊕ local
//! ```
//!
//! Redeclaring a name replaces the inherited entry in place. Options are
//! taken from the first base unless set on the builder.
//!
//! ## Build-time checks
//!
//! `build()` rejects configurations that can never execute correctly:
//! unknown names in `fields`/`exclude`/`load_only`/`dump_only`/`validates`,
//! required fields with a load default, and colliding data keys or
//! attributes. Declarations with `register` set are added to the global
//! registry under `module.name`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use marsh_core::ConfigError;

use crate::field::{Field, FieldMode};
use crate::hooks::{HookTag, Processor};
use crate::options::{SchemaOptions, UnknownPolicy};
use crate::registry;

/// Schema-level messages.
const SCHEMA_ERROR_MESSAGES: &[(&str, &str)] = &[
    ("type", "Invalid input type."),
    ("unknown", "Unknown field."),
];

// ─── Declaration ─────────────────────────────────────────────────────

/// Immutable schema description shared by every instance.
pub struct SchemaDeclaration {
    name: String,
    full_name: String,
    fields: Vec<(String, Field)>,
    options: SchemaOptions,
    processors: Vec<Processor>,
    error_messages: BTreeMap<String, String>,
    defaults: Arc<FieldSets>,
}

impl SchemaDeclaration {
    /// Start declaring a schema called `name`.
    pub fn builder(name: impl Into<String>) -> SchemaDeclarationBuilder {
        SchemaDeclarationBuilder::new(name)
    }

    /// Short name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module-qualified name used by the registry.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Fields in registry order.
    pub fn fields(&self) -> &[(String, Field)] {
        &self.fields
    }

    /// The field declared as `name`.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.field_index(name).map(|i| &self.fields[i].1)
    }

    pub(crate) fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| n == name)
    }

    pub(crate) fn field_at(&self, index: usize) -> (&str, &Field) {
        let (name, field) = &self.fields[index];
        (name, field)
    }

    /// Resolved options.
    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    /// Processors in execution order.
    pub fn processors(&self) -> &[Processor] {
        &self.processors
    }

    /// Whether any processor is registered under `tag`.
    pub fn has_processors(&self, tag: &HookTag) -> bool {
        self.processors.iter().any(|p| p.tag() == tag)
    }

    /// Schema-level message for `code`.
    pub fn error_message(&self, code: &str) -> String {
        self.error_messages
            .get(code)
            .cloned()
            .or_else(|| {
                SCHEMA_ERROR_MESSAGES
                    .iter()
                    .find(|(c, _)| *c == code)
                    .map(|(_, m)| m.to_string())
            })
            .unwrap_or_else(|| "Invalid value.".to_string())
    }

    pub(crate) fn default_sets(&self) -> &Arc<FieldSets> {
        &self.defaults
    }
}

impl fmt::Debug for SchemaDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaDeclaration")
            .field("full_name", &self.full_name)
            .field(
                "fields",
                &self.fields.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            )
            .field("options", &self.options)
            .field("processors", &self.processors.len())
            .finish()
    }
}

// ─── Builder ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum OptionTweak {
    Unknown(UnknownPolicy),
    Many(bool),
    Ordered(bool),
    IndexErrors(bool),
    Register(bool),
}

/// Builder for [`SchemaDeclaration`].
#[derive(Debug)]
pub struct SchemaDeclarationBuilder {
    name: String,
    module: Option<String>,
    bases: Vec<Arc<SchemaDeclaration>>,
    fields: Vec<(String, Field)>,
    options: Option<SchemaOptions>,
    tweaks: Vec<OptionTweak>,
    processors: Vec<Processor>,
    error_messages: BTreeMap<String, String>,
}

impl SchemaDeclarationBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: None,
            bases: Vec::new(),
            fields: Vec::new(),
            options: None,
            tweaks: Vec::new(),
            processors: Vec::new(),
            error_messages: BTreeMap::new(),
        }
    }

    /// Namespace for the registry's full name.
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Inherit from `base`. Earlier bases take precedence.
    pub fn base(mut self, base: &Arc<SchemaDeclaration>) -> Self {
        self.bases.push(Arc::clone(base));
        self
    }

    /// Declare a field. Redeclaring a name replaces the earlier field.
    pub fn field(mut self, name: impl Into<String>, field: impl Into<Field>) -> Self {
        upsert(&mut self.fields, name.into(), field.into());
        self
    }

    /// Replace the inherited options wholesale.
    pub fn options(mut self, options: SchemaOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Default unknown-key policy.
    pub fn unknown(mut self, policy: UnknownPolicy) -> Self {
        self.tweaks.push(OptionTweak::Unknown(policy));
        self
    }

    /// Default many flag for instances.
    pub fn many(mut self, many: bool) -> Self {
        self.tweaks.push(OptionTweak::Many(many));
        self
    }

    /// Emit output in field order.
    pub fn ordered(mut self, ordered: bool) -> Self {
        self.tweaks.push(OptionTweak::Ordered(ordered));
        self
    }

    /// Key collection errors by item index.
    pub fn index_errors(mut self, index_errors: bool) -> Self {
        self.tweaks.push(OptionTweak::IndexErrors(index_errors));
        self
    }

    /// Add the declaration to the global registry.
    pub fn register(mut self, register: bool) -> Self {
        self.tweaks.push(OptionTweak::Register(register));
        self
    }

    /// Attach a hook or validator. Reusing a name replaces the earlier one.
    pub fn processor(mut self, processor: Processor) -> Self {
        upsert_processor(&mut self.processors, processor);
        self
    }

    /// Override a schema-level error message (`type`, `unknown`).
    pub fn error_message(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.error_messages.insert(code.into(), message.into());
        self
    }

    /// Validate and freeze the declaration, registering it if requested.
    pub fn build(self) -> Result<Arc<SchemaDeclaration>, ConfigError> {
        let mut fields = Vec::new();
        let mut processors = Vec::new();
        let mut error_messages = BTreeMap::new();
        for base in self.bases.iter().rev() {
            for (name, field) in base.fields() {
                upsert(&mut fields, name.clone(), field.clone());
            }
            for processor in base.processors() {
                upsert_processor(&mut processors, processor.clone());
            }
            error_messages.extend(base.error_messages.clone());
        }
        for (name, field) in self.fields {
            upsert(&mut fields, name, field);
        }
        for processor in self.processors {
            upsert_processor(&mut processors, processor);
        }
        error_messages.extend(self.error_messages);

        let mut options = self
            .options
            .or_else(|| self.bases.first().map(|b| b.options().clone()))
            .unwrap_or_default();
        for tweak in self.tweaks {
            match tweak {
                OptionTweak::Unknown(p) => options.unknown = p,
                OptionTweak::Many(m) => options.many = m,
                OptionTweak::Ordered(o) => options.ordered = o,
                OptionTweak::IndexErrors(i) => options.index_errors = i,
                OptionTweak::Register(r) => options.register = r,
            }
        }

        let full_name = match &self.module {
            Some(module) => format!("{module}.{}", self.name),
            None => self.name.clone(),
        };

        check_declaration(&full_name, &fields, &options, &processors)?;
        let defaults = resolve_field_sets(&full_name, &fields, &options, &Selection::default())?;

        let decl = Arc::new(SchemaDeclaration {
            name: self.name,
            full_name,
            fields,
            options,
            processors,
            error_messages,
            defaults: Arc::new(defaults),
        });
        tracing::debug!(
            schema = %decl.full_name,
            fields = decl.fields.len(),
            processors = decl.processors.len(),
            "built schema declaration"
        );
        if decl.options.register {
            registry::register(&decl)?;
        }
        Ok(decl)
    }
}

fn upsert(fields: &mut Vec<(String, Field)>, name: String, field: Field) {
    match fields.iter_mut().find(|(n, _)| *n == name) {
        Some(slot) => slot.1 = field,
        None => fields.push((name, field)),
    }
}

fn upsert_processor(processors: &mut Vec<Processor>, processor: Processor) {
    match processors.iter_mut().find(|p| p.name() == processor.name()) {
        Some(slot) => *slot = processor,
        None => processors.push(processor),
    }
}

fn check_declaration(
    schema: &str,
    fields: &[(String, Field)],
    options: &SchemaOptions,
    processors: &[Processor],
) -> Result<(), ConfigError> {
    let declared: BTreeSet<&str> = fields.iter().map(|(n, _)| n.as_str()).collect();

    if let Some(allow) = &options.fields {
        unknown_names(schema, "fields", allow.iter().map(String::as_str), &declared)?;
    }

    for (name, field) in fields {
        if field.is_required() && field.has_load_default() {
            return Err(ConfigError::RequiredWithDefault {
                schema: schema.to_string(),
                field: name.clone(),
            });
        }
    }

    let validated = processors.iter().filter_map(|p| match p.tag() {
        HookTag::ValidatesField(field) => Some(field.as_str()),
        _ => None,
    });
    unknown_names(schema, "validates", validated, &declared)
}

fn unknown_names<'a>(
    schema: &str,
    option: &str,
    names: impl IntoIterator<Item = &'a str>,
    known: &BTreeSet<&str>,
) -> Result<(), ConfigError> {
    let invalid: Vec<String> = names
        .into_iter()
        .filter(|n| !known.contains(n))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if invalid.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::UnknownFields {
            schema: schema.to_string(),
            option: option.to_string(),
            names: invalid,
        })
    }
}

// ─── Field selection ─────────────────────────────────────────────────

/// Instance-level field selection.
#[derive(Debug, Clone, Default)]
pub(crate) struct Selection<'a> {
    pub only: Option<&'a BTreeSet<String>>,
    pub exclude: Option<&'a BTreeSet<String>>,
    pub load_only: Option<&'a BTreeSet<String>>,
    pub dump_only: Option<&'a BTreeSet<String>>,
}

/// The fields one instance loads and dumps, plus the selection it hands
/// down to nested fields.
#[derive(Debug, Clone, Default)]
pub(crate) struct FieldSets {
    /// Indices into the declaration's registry, in registry order.
    pub load: Vec<usize>,
    pub dump: Vec<usize>,
    pub nested_only: HashMap<String, BTreeSet<String>>,
    pub nested_exclude: HashMap<String, BTreeSet<String>>,
}

/// Resolve which fields take part in each direction.
///
/// `only` and `exclude` accept dotted names; the first segment selects a
/// field here and the remainder is handed to that field's nested schema.
pub(crate) fn resolve_field_sets(
    schema: &str,
    fields: &[(String, Field)],
    options: &SchemaOptions,
    selection: &Selection<'_>,
) -> Result<FieldSets, ConfigError> {
    let declared: BTreeSet<&str> = fields.iter().map(|(n, _)| n.as_str()).collect();
    let available: Vec<usize> = (0..fields.len())
        .filter(|&i| {
            options
                .fields
                .as_ref()
                .map_or(true, |allow| allow.iter().any(|n| *n == fields[i].0))
        })
        .collect();
    let available_names: BTreeSet<&str> =
        available.iter().map(|&i| fields[i].0.as_str()).collect();

    let mut sets = FieldSets::default();

    let only_top: Option<BTreeSet<String>> = match selection.only {
        None => None,
        Some(only) => {
            let mut top = BTreeSet::new();
            for name in only {
                let (head, rest) = split_dotted(name);
                top.insert(head.to_string());
                if let Some(rest) = rest {
                    sets.nested_only
                        .entry(head.to_string())
                        .or_default()
                        .insert(rest.to_string());
                }
            }
            unknown_names(schema, "only", top.iter().map(String::as_str), &available_names)?;
            Some(top)
        }
    };

    let mut exclude_top = BTreeSet::new();
    let excludes = options
        .exclude
        .iter()
        .chain(selection.exclude.into_iter().flatten());
    for name in excludes {
        match split_dotted(name) {
            (head, Some(rest)) => {
                sets.nested_exclude
                    .entry(head.to_string())
                    .or_default()
                    .insert(rest.to_string());
                unknown_names(schema, "exclude", [head], &available_names)?;
            }
            (head, None) => {
                exclude_top.insert(head.to_string());
            }
        }
    }
    let excluded = exclude_top.iter().map(String::as_str);
    unknown_names(schema, "exclude", excluded, &declared)?;

    let load_only: BTreeSet<&str> = options
        .load_only
        .iter()
        .chain(selection.load_only.into_iter().flatten())
        .map(String::as_str)
        .collect();
    let dump_only: BTreeSet<&str> = options
        .dump_only
        .iter()
        .chain(selection.dump_only.into_iter().flatten())
        .map(String::as_str)
        .collect();
    unknown_names(schema, "load_only", load_only.iter().copied(), &declared)?;
    unknown_names(schema, "dump_only", dump_only.iter().copied(), &declared)?;
    if let Some(both) = load_only.intersection(&dump_only).next() {
        return Err(ConfigError::InvalidOptions(format!(
            "{schema}: field '{both}' cannot be both load_only and dump_only"
        )));
    }

    for &i in &available {
        let (name, field) = (&fields[i].0, &fields[i].1);
        let selected =
            only_top.as_ref().map_or(true, |o| o.contains(name)) && !exclude_top.contains(name);
        if !selected {
            continue;
        }
        let to_load = field.mode() != FieldMode::DumpOnly && !dump_only.contains(name.as_str());
        let to_dump = field.mode() != FieldMode::LoadOnly && !load_only.contains(name.as_str());
        if to_load {
            sets.load.push(i);
        }
        if to_dump {
            sets.dump.push(i);
        }
    }

    for (direction, selected) in [("dump", &sets.dump), ("load", &sets.load)] {
        if let Err((key, names)) = check_unique(schema, fields, selected, direction, data_key_of) {
            return Err(ConfigError::DuplicateDataKey {
                schema: schema.to_string(),
                direction: direction.into(),
                key,
                fields: names,
            });
        }
    }
    let attributes = check_unique(schema, fields, &sets.load, "load", attribute_of);
    if let Err((attribute, names)) = attributes {
        return Err(ConfigError::DuplicateAttribute {
            schema: schema.to_string(),
            attribute,
            fields: names,
        });
    }

    Ok(sets)
}

fn data_key_of<'f>(name: &'f str, field: &'f Field) -> &'f str {
    field.data_key_name().unwrap_or(name)
}

fn attribute_of<'f>(name: &'f str, field: &'f Field) -> &'f str {
    field.attribute_name().unwrap_or(name)
}

fn split_dotted(name: &str) -> (&str, Option<&str>) {
    match name.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (name, None),
    }
}

/// First key shared by two or more of the selected fields.
fn check_unique<'f>(
    schema: &str,
    fields: &'f [(String, Field)],
    selected: &[usize],
    direction: &str,
    key_of: impl Fn(&'f str, &'f Field) -> &'f str,
) -> Result<(), (String, Vec<String>)> {
    let mut seen: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for &i in selected {
        let (name, field) = &fields[i];
        seen.entry(key_of(name.as_str(), field)).or_default().push(name.clone());
    }
    match seen.into_iter().find(|(_, names)| names.len() > 1) {
        Some((key, names)) => {
            tracing::debug!(schema, direction, key, "colliding field keys");
            Err((key.to_string(), names))
        }
        None => Ok(()),
    }
}
