//! Scalar field kinds.

use serde_json::{Number, Value};

use marsh_core::MarshError;

use crate::field::{Field, FieldKind, FieldScope};

// ─── Raw ─────────────────────────────────────────────────────────────

/// Passes values through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Raw;

impl FieldKind for Raw {
    fn type_name(&self) -> &'static str {
        "raw"
    }

    fn serialize(
        &self,
        _: &Field,
        value: &Value,
        _: &Value,
        _: &FieldScope<'_>,
    ) -> Result<Value, MarshError> {
        Ok(value.clone())
    }

    fn deserialize(
        &self,
        _: &Field,
        value: &Value,
        _: &Value,
        _: &FieldScope<'_>,
    ) -> Result<Value, MarshError> {
        Ok(value.clone())
    }
}

// ─── Str ─────────────────────────────────────────────────────────────

/// Strings. Dump stringifies scalars; load accepts only strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Str;

impl FieldKind for Str {
    fn type_name(&self) -> &'static str {
        "string"
    }

    fn default_error_messages(&self) -> &'static [(&'static str, &'static str)] {
        &[("invalid", "Not a valid string.")]
    }

    fn serialize(
        &self,
        _: &Field,
        value: &Value,
        _: &Value,
        _: &FieldScope<'_>,
    ) -> Result<Value, MarshError> {
        Ok(match value {
            Value::Null | Value::String(_) => value.clone(),
            other => Value::String(other.to_string()),
        })
    }

    fn deserialize(
        &self,
        field: &Field,
        value: &Value,
        _: &Value,
        _: &FieldScope<'_>,
    ) -> Result<Value, MarshError> {
        match value {
            Value::String(_) => Ok(value.clone()),
            _ => Err(field.make_error("invalid")),
        }
    }
}

// ─── Integer ─────────────────────────────────────────────────────────

/// Whole numbers.
///
/// Non-strict mode also accepts integral floats and strings of digits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Integer {
    strict: bool,
}

impl Integer {
    /// Accept only JSON integers on load.
    pub fn strict() -> Self {
        Self { strict: true }
    }

    fn coerce(&self, value: &Value) -> Option<Value> {
        match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
            Value::Number(n) if !self.strict => n
                .as_f64()
                .filter(|f| f.fract() == 0.0)
                .and_then(to_i64)
                .map(Value::from),
            Value::String(s) if !self.strict => s.trim().parse::<i64>().ok().map(Value::from),
            _ => None,
        }
    }
}

/// `None` for non-finite values and values outside the `i64` range.
fn to_i64(f: f64) -> Option<i64> {
    // 2^63 has no i64 counterpart; `as` would saturate it.
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    (f.is_finite() && (-BOUND..BOUND).contains(&f)).then_some(f as i64)
}

impl FieldKind for Integer {
    fn type_name(&self) -> &'static str {
        "integer"
    }

    fn default_error_messages(&self) -> &'static [(&'static str, &'static str)] {
        &[("invalid", "Not a valid integer.")]
    }

    fn serialize(
        &self,
        field: &Field,
        value: &Value,
        _: &Value,
        _: &FieldScope<'_>,
    ) -> Result<Value, MarshError> {
        match value {
            Value::Null => Ok(Value::Null),
            // Truncate toward zero, the way integer formatting does.
            Value::Number(n) if n.is_f64() => n
                .as_f64()
                .and_then(|f| to_i64(f.trunc()))
                .map(Value::from)
                .ok_or_else(|| field.make_error("invalid")),
            _ => Integer::default()
                .coerce(value)
                .ok_or_else(|| field.make_error("invalid")),
        }
    }

    fn deserialize(
        &self,
        field: &Field,
        value: &Value,
        _: &Value,
        _: &FieldScope<'_>,
    ) -> Result<Value, MarshError> {
        self.coerce(value).ok_or_else(|| field.make_error("invalid"))
    }
}

// ─── Float ───────────────────────────────────────────────────────────

/// Finite floating-point numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Float;

impl Float {
    fn coerce(field: &Field, value: &Value) -> Result<Value, MarshError> {
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        let Some(f) = parsed else {
            return Err(field.make_error("invalid"));
        };
        Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| field.make_error("special"))
    }
}

impl FieldKind for Float {
    fn type_name(&self) -> &'static str {
        "float"
    }

    fn default_error_messages(&self) -> &'static [(&'static str, &'static str)] {
        &[
            ("invalid", "Not a valid number."),
            ("special", "Special numeric values (nan or infinity) are not permitted."),
        ]
    }

    fn serialize(
        &self,
        field: &Field,
        value: &Value,
        _: &Value,
        _: &FieldScope<'_>,
    ) -> Result<Value, MarshError> {
        match value {
            Value::Null => Ok(Value::Null),
            _ => Self::coerce(field, value),
        }
    }

    fn deserialize(
        &self,
        field: &Field,
        value: &Value,
        _: &Value,
        _: &FieldScope<'_>,
    ) -> Result<Value, MarshError> {
        Self::coerce(field, value)
    }
}

// ─── Boolean ─────────────────────────────────────────────────────────

const TRUTHY: &[&str] = &[
    "t", "T", "true", "True", "TRUE", "on", "On", "ON", "y", "Y", "yes", "Yes", "YES", "1",
];
const FALSY: &[&str] = &[
    "f", "F", "false", "False", "FALSE", "off", "Off", "OFF", "n", "N", "no", "No", "NO", "0",
];

/// Booleans, accepting the common textual and numeric spellings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Boolean;

impl Boolean {
    fn recognize(value: &Value) -> Option<bool> {
        match value {
            Value::Bool(b) => Some(*b),
            Value::String(s) if TRUTHY.contains(&s.as_str()) => Some(true),
            Value::String(s) if FALSY.contains(&s.as_str()) => Some(false),
            Value::Number(n) => match n.as_f64() {
                Some(f) if f == 1.0 => Some(true),
                Some(f) if f == 0.0 => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    fn truthiness(value: &Value) -> bool {
        match value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
        }
    }
}

impl FieldKind for Boolean {
    fn type_name(&self) -> &'static str {
        "boolean"
    }

    fn default_error_messages(&self) -> &'static [(&'static str, &'static str)] {
        &[("invalid", "Not a valid boolean.")]
    }

    fn serialize(
        &self,
        _: &Field,
        value: &Value,
        _: &Value,
        _: &FieldScope<'_>,
    ) -> Result<Value, MarshError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let b = Self::recognize(value).unwrap_or_else(|| Self::truthiness(value));
        Ok(Value::Bool(b))
    }

    fn deserialize(
        &self,
        field: &Field,
        value: &Value,
        _: &Value,
        _: &FieldScope<'_>,
    ) -> Result<Value, MarshError> {
        Self::recognize(value)
            .map(Value::Bool)
            .ok_or_else(|| field.make_error("invalid"))
    }
}

// ─── Constant ────────────────────────────────────────────────────────

/// Always produces the same value, ignoring the source.
#[derive(Debug, Clone)]
pub struct Constant {
    value: Value,
}

impl Constant {
    /// A constant producing `value`.
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

impl FieldKind for Constant {
    fn type_name(&self) -> &'static str {
        "constant"
    }

    fn checks_attribute(&self) -> bool {
        false
    }

    fn serialize(
        &self,
        _: &Field,
        _: &Value,
        _: &Value,
        _: &FieldScope<'_>,
    ) -> Result<Value, MarshError> {
        Ok(self.value.clone())
    }

    fn deserialize(
        &self,
        _: &Field,
        _: &Value,
        _: &Value,
        _: &FieldScope<'_>,
    ) -> Result<Value, MarshError> {
        Ok(self.value.clone())
    }
}
