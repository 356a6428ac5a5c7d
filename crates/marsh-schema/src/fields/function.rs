//! Computed fields backed by closures.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use marsh_core::MarshError;

use crate::context::Context;
use crate::field::{Field, FieldKind, FieldMode, FieldScope};

type ComputeFn = Arc<dyn Fn(&Value, &Context) -> Result<Value, MarshError> + Send + Sync>;

/// A field whose dump output is computed from the whole source object and
/// whose load conversion is an arbitrary closure.
///
/// With only a serializer the field is dump-only; with only a deserializer
/// it is load-only.
#[derive(Clone, Default)]
pub struct Function {
    serialize: Option<ComputeFn>,
    deserialize: Option<ComputeFn>,
}

impl Function {
    /// A function field with no closures yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the dumped value from the source object.
    pub fn dump_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Context) -> Result<Value, MarshError> + Send + Sync + 'static,
    {
        self.serialize = Some(Arc::new(f));
        self
    }

    /// Convert the raw input value.
    pub fn load_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &Context) -> Result<Value, MarshError> + Send + Sync + 'static,
    {
        self.deserialize = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("serialize", &self.serialize.is_some())
            .field("deserialize", &self.deserialize.is_some())
            .finish()
    }
}

impl FieldKind for Function {
    fn type_name(&self) -> &'static str {
        "function"
    }

    fn checks_attribute(&self) -> bool {
        false
    }

    fn default_mode(&self) -> FieldMode {
        match (&self.serialize, &self.deserialize) {
            (Some(_), None) => FieldMode::DumpOnly,
            (None, Some(_)) => FieldMode::LoadOnly,
            _ => FieldMode::Normal,
        }
    }

    fn serialize(
        &self,
        _: &Field,
        _: &Value,
        obj: &Value,
        scope: &FieldScope<'_>,
    ) -> Result<Value, MarshError> {
        match &self.serialize {
            Some(f) => f(obj, scope.context()),
            None => Ok(Value::Null),
        }
    }

    fn deserialize(
        &self,
        _: &Field,
        value: &Value,
        _: &Value,
        scope: &FieldScope<'_>,
    ) -> Result<Value, MarshError> {
        match &self.deserialize {
            Some(f) => f(value, scope.context()),
            None => Ok(value.clone()),
        }
    }
}

impl From<Function> for Field {
    fn from(function: Function) -> Self {
        Field::new(function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::declaration::SchemaDeclaration;
    use crate::schema::Schema;

    fn scratch_schema() -> Schema {
        let decl = SchemaDeclaration::builder("FunctionFieldTests")
            .register(false)
            .build()
            .unwrap();
        Schema::new(&decl)
    }

    #[test]
    fn test_closures_decide_the_default_mode() {
        let both = Function::new()
            .dump_with(|_, _| Ok(Value::Null))
            .load_with(|v, _| Ok(v.clone()));
        assert_eq!(Field::from(both).mode(), FieldMode::Normal);

        let dump_only = Function::new().dump_with(|_, _| Ok(Value::Null));
        assert_eq!(Field::from(dump_only).mode(), FieldMode::DumpOnly);

        let load_only = Function::new().load_with(|v, _| Ok(v.clone()));
        assert_eq!(Field::from(load_only).mode(), FieldMode::LoadOnly);
    }

    #[test]
    fn test_load_only_function_converts_the_raw_value() {
        let schema = scratch_schema();
        let scope = FieldScope::new(&schema, "initials", None);
        let field = Field::from(Function::new().load_with(|v, _| {
            let text = v.as_str().unwrap_or_default();
            Ok(json!(text.to_uppercase()))
        }));
        let loaded = field
            .deserialize(Some(&json!("ada")), &json!({}), &scope)
            .unwrap();
        assert_eq!(loaded, Some(json!("ADA")));

        // No dump closure: the value dumps as null.
        let dumped = field.serialize("initials", &json!({}), &scope).unwrap();
        assert_eq!(dumped, Some(Value::Null));
    }

    #[test]
    fn test_dump_closure_sees_the_whole_object_and_context() {
        let schema = scratch_schema();
        schema.context().insert("suffix", json!("!"));
        let scope = FieldScope::new(&schema, "greeting", None);
        let field = Field::from(Function::new().dump_with(|obj, ctx| {
            let name = obj["name"].as_str().unwrap_or_default();
            let suffix = ctx.get("suffix").unwrap_or(Value::Null);
            Ok(json!(format!("hi {name}{}", suffix.as_str().unwrap_or_default())))
        }));
        let out = field
            .serialize("greeting", &json!({"name": "Ada"}), &scope)
            .unwrap();
        assert_eq!(out, Some(json!("hi Ada!")));
    }

    #[test]
    fn test_load_closure_errors_propagate() {
        let schema = scratch_schema();
        let scope = FieldScope::new(&schema, "n", None);
        let field = Field::from(Function::new().load_with(|_, _| {
            Err(marsh_core::ValidationError::new("Not accepted.").into())
        }));
        let err = field
            .deserialize(Some(&json!(1)), &json!({}), &scope)
            .unwrap_err();
        let validation = err.into_validation().unwrap();
        assert_eq!(validation.to_json(), json!({"_schema": ["Not accepted."]}));
    }
}
