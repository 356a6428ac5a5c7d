//! # Validators
//!
//! A [`Validator`] inspects a deserialized value. It reports failure in one
//! of two ways:
//!
//! - `Ok(false)`: the owning field substitutes its `validator_failed`
//!   message.
//! - `Err(ValidationError)`: the error's own messages are used. If the error
//!   carries a code and the field declares a message for that code, the
//!   field's message wins.
//!
//! Validators run only on load, only after type coercion succeeded, and
//! never short-circuit each other.
//!
//! Format validators (email, URL, ...) are not provided here; they plug in
//! through the same trait.

use std::fmt;

use serde_json::Value;

use marsh_core::ValidationError;

/// A check applied to a deserialized value.
pub trait Validator: Send + Sync {
    /// `Ok(true)` if the value passes.
    fn validate(&self, value: &Value) -> Result<bool, ValidationError>;
}

impl fmt::Debug for dyn Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validator")
    }
}

/// Closure adapter.
pub struct FnValidator<F>(pub F);

impl<F> Validator for FnValidator<F>
where
    F: Fn(&Value) -> Result<bool, ValidationError> + Send + Sync,
{
    fn validate(&self, value: &Value) -> Result<bool, ValidationError> {
        (self.0)(value)
    }
}

fn fail(message: String, code: &str) -> Result<bool, ValidationError> {
    Err(ValidationError::new(message).with_code(code))
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_list(values: &[Value]) -> String {
    values.iter().map(render).collect::<Vec<_>>().join(", ")
}

// ─── Range ───────────────────────────────────────────────────────────

/// Numeric bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    min: Option<f64>,
    max: Option<f64>,
    min_inclusive: bool,
    max_inclusive: bool,
    error: Option<String>,
}

impl Range {
    /// Inclusive bounds; `None` leaves a side open.
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            min,
            max,
            min_inclusive: true,
            max_inclusive: true,
            error: None,
        }
    }

    /// `value >= min`.
    pub fn min(min: f64) -> Self {
        Self::new(Some(min), None)
    }

    /// `value <= max`.
    pub fn max(max: f64) -> Self {
        Self::new(None, Some(max))
    }

    /// Make the lower bound exclusive.
    pub fn min_exclusive(mut self) -> Self {
        self.min_inclusive = false;
        self
    }

    /// Make the upper bound exclusive.
    pub fn max_exclusive(mut self) -> Self {
        self.max_inclusive = false;
        self
    }

    /// Replace the generated message.
    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    fn message(&self) -> String {
        if let Some(custom) = &self.error {
            return custom.clone();
        }
        let min_op = if self.min_inclusive {
            "greater than or equal to"
        } else {
            "greater than"
        };
        let max_op = if self.max_inclusive {
            "less than or equal to"
        } else {
            "less than"
        };
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("Must be {min_op} {min} and {max_op} {max}."),
            (Some(min), None) => format!("Must be {min_op} {min}."),
            (None, Some(max)) => format!("Must be {max_op} {max}."),
            (None, None) => "Invalid value.".to_string(),
        }
    }
}

impl Validator for Range {
    fn validate(&self, value: &Value) -> Result<bool, ValidationError> {
        let Some(n) = value.as_f64() else {
            return fail(self.message(), "range");
        };
        let below = match self.min {
            Some(min) if self.min_inclusive => n < min,
            Some(min) => n <= min,
            None => false,
        };
        let above = match self.max {
            Some(max) if self.max_inclusive => n > max,
            Some(max) => n >= max,
            None => false,
        };
        if below || above {
            return fail(self.message(), "range");
        }
        Ok(true)
    }
}

// ─── Length ──────────────────────────────────────────────────────────

/// Length bounds for strings (in characters), arrays, and mappings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Length {
    min: Option<usize>,
    max: Option<usize>,
    equal: Option<usize>,
    error: Option<String>,
}

impl Length {
    /// Inclusive bounds.
    pub fn new(min: Option<usize>, max: Option<usize>) -> Self {
        Self {
            min,
            max,
            equal: None,
            error: None,
        }
    }

    /// Exact length.
    pub fn equal(len: usize) -> Self {
        Self {
            min: None,
            max: None,
            equal: Some(len),
            error: None,
        }
    }

    /// Replace the generated message.
    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    fn measure(value: &Value) -> Option<usize> {
        match value {
            Value::String(s) => Some(s.chars().count()),
            Value::Array(items) => Some(items.len()),
            Value::Object(map) => Some(map.len()),
            _ => None,
        }
    }

    fn message(&self, generated: String) -> String {
        self.error.clone().unwrap_or(generated)
    }
}

impl Validator for Length {
    fn validate(&self, value: &Value) -> Result<bool, ValidationError> {
        let Some(len) = Self::measure(value) else {
            return fail(self.message("Invalid value.".into()), "length");
        };
        if let Some(equal) = self.equal {
            if len != equal {
                return fail(self.message(format!("Length must be {equal}.")), "length");
            }
            return Ok(true);
        }
        let too_short = self.min.is_some_and(|min| len < min);
        let too_long = self.max.is_some_and(|max| len > max);
        if !too_short && !too_long {
            return Ok(true);
        }
        let generated = match (self.min, self.max) {
            (Some(min), Some(max)) => format!("Length must be between {min} and {max}."),
            (Some(min), None) => format!("Shorter than minimum length {min}."),
            (None, Some(max)) => format!("Longer than maximum length {max}."),
            (None, None) => "Invalid value.".to_string(),
        };
        fail(self.message(generated), "length")
    }
}

// ─── Equality and membership ─────────────────────────────────────────

/// Value must equal a fixed value.
#[derive(Debug, Clone, PartialEq)]
pub struct Equal(pub Value);

impl Validator for Equal {
    fn validate(&self, value: &Value) -> Result<bool, ValidationError> {
        if *value == self.0 {
            return Ok(true);
        }
        fail(format!("Must be equal to {}.", render(&self.0)), "equal")
    }
}

/// Value must be one of the choices.
#[derive(Debug, Clone, PartialEq)]
pub struct OneOf(pub Vec<Value>);

impl OneOf {
    /// Build from anything convertible to JSON values.
    pub fn new<I, V>(choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self(choices.into_iter().map(Into::into).collect())
    }
}

impl Validator for OneOf {
    fn validate(&self, value: &Value) -> Result<bool, ValidationError> {
        if self.0.contains(value) {
            return Ok(true);
        }
        fail(format!("Must be one of: {}.", render_list(&self.0)), "one_of")
    }
}

/// Value must not be any of the listed values.
#[derive(Debug, Clone, PartialEq)]
pub struct NoneOf(pub Vec<Value>);

impl NoneOf {
    /// Build from anything convertible to JSON values.
    pub fn new<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self(values.into_iter().map(Into::into).collect())
    }
}

impl Validator for NoneOf {
    fn validate(&self, value: &Value) -> Result<bool, ValidationError> {
        if self.0.contains(value) {
            return fail("Invalid input.".to_string(), "none_of");
        }
        Ok(true)
    }
}

/// Every element of an array must be one of the choices.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainsOnly(pub Vec<Value>);

impl Validator for ContainsOnly {
    fn validate(&self, value: &Value) -> Result<bool, ValidationError> {
        let message = || {
            format!(
                "One or more of the choices you made was not in: {}.",
                render_list(&self.0)
            )
        };
        match value {
            Value::Array(items) if items.iter().all(|v| self.0.contains(v)) => Ok(true),
            _ => fail(message(), "contains_only"),
        }
    }
}

/// No element of an array may be one of the listed values.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainsNoneOf(pub Vec<Value>);

impl Validator for ContainsNoneOf {
    fn validate(&self, value: &Value) -> Result<bool, ValidationError> {
        match value {
            Value::Array(items) if !items.iter().any(|v| self.0.contains(v)) => Ok(true),
            _ => fail(
                format!("One or more of the choices you made was in: {}.", render_list(&self.0)),
                "contains_none_of",
            ),
        }
    }
}

// ─── Predicates and composition ──────────────────────────────────────

/// Boolean predicate with a fixed message.
pub struct Predicate<F> {
    check: F,
    message: String,
}

impl<F> Predicate<F>
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    /// Fail with `message` whenever `check` returns false.
    pub fn new(check: F, message: impl Into<String>) -> Self {
        Self {
            check,
            message: message.into(),
        }
    }
}

impl<F> Validator for Predicate<F>
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    fn validate(&self, value: &Value) -> Result<bool, ValidationError> {
        if (self.check)(value) {
            return Ok(true);
        }
        fail(self.message.clone(), "predicate")
    }
}

/// Runs every inner validator and reports all failures together.
pub struct And {
    validators: Vec<Box<dyn Validator>>,
    error: String,
}

impl And {
    /// Compose validators; `error` replaces falsy results.
    pub fn new(validators: Vec<Box<dyn Validator>>, error: impl Into<String>) -> Self {
        Self {
            validators,
            error: error.into(),
        }
    }
}

impl Validator for And {
    fn validate(&self, value: &Value) -> Result<bool, ValidationError> {
        let mut messages = Vec::new();
        for validator in &self.validators {
            match validator.validate(value) {
                Ok(true) => {}
                Ok(false) => messages.push(self.error.clone()),
                Err(err) => match err.messages().as_messages() {
                    Some(list) => messages.extend(list.iter().cloned()),
                    None => messages.push(err.to_string()),
                },
            }
        }
        if messages.is_empty() {
            Ok(true)
        } else {
            Err(ValidationError::with_messages(messages))
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
