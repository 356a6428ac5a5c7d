//! # Processors
//!
//! Pre/post hook ordering for dump and load, envelope idioms, schema and
//! field validators, error targeting, and the rules for when post-load
//! hooks and validators are skipped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use marsh_schema::{
    Field, HookArgs, LoadOptions, MarshError, Processor, Schema, SchemaDeclaration, UnknownPolicy,
    ValidationError,
};

type Log = Arc<Mutex<Vec<&'static str>>>;

fn validation(err: MarshError) -> ValidationError {
    err.into_validation().expect("expected a validation error")
}

fn recorder(
    log: &Log,
    entry: &'static str,
) -> impl Fn(Value, &HookArgs<'_>) -> Result<Value, MarshError> {
    let log = Arc::clone(log);
    move |data, _| {
        log.lock().push(entry);
        Ok(data)
    }
}

// ── Ordering ────────────────────────────────────────────────────────

#[test]
fn dump_hooks_run_item_then_batch() {
    let log: Log = Arc::default();
    let decl = SchemaDeclaration::builder("HooksDumpOrder")
        .register(false)
        .field("n", Field::integer())
        .processor(
            Processor::post_dump("post_batch", recorder(&log, "post_batch"))
                .pass_many(),
        )
        .processor(
            Processor::pre_dump("pre_batch", recorder(&log, "pre_batch"))
                .pass_many(),
        )
        .processor(Processor::post_dump("post_item", recorder(&log, "post_item")))
        .processor(Processor::pre_dump("pre_item", recorder(&log, "pre_item")))
        .build()
        .unwrap();
    Schema::new(&decl).dump_many(&json!([{"n": 1}, {"n": 2}])).unwrap();
    assert_eq!(
        *log.lock(),
        ["pre_item", "pre_item", "pre_batch", "post_item", "post_item", "post_batch"]
    );
}

#[test]
fn load_hooks_run_batch_then_item_before_and_item_then_batch_after() {
    let log: Log = Arc::default();
    let check = |entry: &'static str| {
        let log = Arc::clone(&log);
        move |_: &Value, _: &HookArgs<'_>| {
            log.lock().push(entry);
            Ok::<(), MarshError>(())
        }
    };
    let decl = SchemaDeclaration::builder("HooksLoadOrder")
        .register(false)
        .field("n", Field::integer())
        .processor(
            Processor::post_load("post_batch", recorder(&log, "post_batch"))
                .pass_many(),
        )
        .processor(Processor::post_load("post_item", recorder(&log, "post_item")))
        .processor(Processor::pre_load("pre_item", recorder(&log, "pre_item")))
        .processor(
            Processor::pre_load("pre_batch", recorder(&log, "pre_batch"))
                .pass_many(),
        )
        .processor(Processor::validates_schema("schema_item", check("schema_item")))
        .processor(
            Processor::validates_schema("schema_batch", check("schema_batch"))
                .pass_many(),
        )
        .processor(Processor::validates("n", "field_n", check("field_n")))
        .build()
        .unwrap();
    let schema = Schema::builder(&decl).many(true).build().unwrap();
    schema.load(&json!([{"n": 1}, {"n": 2}])).unwrap();
    assert_eq!(
        *log.lock(),
        [
            "pre_batch",
            "pre_item",
            "pre_item",
            "field_n",
            "field_n",
            "schema_batch",
            "schema_item",
            "schema_item",
            "post_item",
            "post_item",
            "post_batch",
        ]
    );
}

// ── Envelopes ───────────────────────────────────────────────────────

#[test]
fn envelope_hooks_wrap_and_unwrap_collections() {
    let decl = SchemaDeclaration::builder("HooksEnvelope")
        .register(false)
        .field("name", Field::str())
        .processor(
            Processor::pre_load("unwrap", |data, _| Ok(data["users"].clone()))
                .pass_many(),
        )
        .processor(
            Processor::post_dump("wrap", |data, args| {
                let key = if args.many { "users" } else { "user" };
                Ok(json!({ key: data }))
            })
            .pass_many(),
        )
        .build()
        .unwrap();
    let schema = Schema::builder(&decl).many(true).build().unwrap();

    let dumped = schema.dump_value(&json!([{"name": "a"}, {"name": "b"}])).unwrap();
    assert_eq!(dumped, json!({"users": [{"name": "a"}, {"name": "b"}]}));
    assert_eq!(
        schema.load(&dumped).unwrap(),
        json!([{"name": "a"}, {"name": "b"}])
    );

    let single = Schema::new(&decl).dump_value(&json!({"name": "a"})).unwrap();
    assert_eq!(single, json!({"user": {"name": "a"}}));
}

#[test]
fn pre_load_can_normalize_input() {
    let decl = SchemaDeclaration::builder("HooksNormalize")
        .register(false)
        .field("email", Field::str())
        .processor(Processor::pre_load("lowercase", |mut data, _| {
            let email = data.get("email").and_then(Value::as_str).map(str::to_lowercase);
            if let Some(email) = email {
                data["email"] = json!(email);
            }
            Ok(data)
        }))
        .build()
        .unwrap();
    let loaded = Schema::new(&decl).load(&json!({"email": "ADA@Example.COM"})).unwrap();
    assert_eq!(loaded, json!({"email": "ada@example.com"}));
}

#[test]
fn pass_original_exposes_raw_input() {
    let decl = SchemaDeclaration::builder("HooksOriginal")
        .register(false)
        .unknown(UnknownPolicy::Exclude)
        .field("name", Field::str())
        .processor(
            Processor::validates_schema("no_extras", |data, args| {
                let original = args.original.and_then(Value::as_object).map_or(0, Map::len);
                let loaded = data.as_object().map_or(0, Map::len);
                if original > loaded {
                    return Err(ValidationError::new("Unexpected keys.").into());
                }
                Ok(())
            })
            .pass_original(),
        )
        .build()
        .unwrap();
    let schema = Schema::new(&decl);
    assert!(schema.load(&json!({"name": "a"})).is_ok());
    let err = validation(schema.load(&json!({"name": "a", "x": 1})).unwrap_err());
    assert_eq!(err.to_json(), json!({"_schema": ["Unexpected keys."]}));
}

// ── Schema validators ───────────────────────────────────────────────

fn range_schema(name: &str, skip: bool) -> Arc<SchemaDeclaration> {
    SchemaDeclaration::builder(name)
        .register(false)
        .field("low", Field::integer())
        .field("high", Field::integer())
        .processor(
            Processor::validates_schema("ordered", |data, _| {
                let low = data.get("low").and_then(Value::as_i64).unwrap_or(i64::MIN);
                let high = data.get("high").and_then(Value::as_i64).unwrap_or(i64::MAX);
                if low > high {
                    let err = ValidationError::new("low must not exceed high").with_field("low");
                    return Err(err.into());
                }
                Ok(())
            })
            .skip_on_field_errors(skip),
        )
        .build()
        .unwrap()
}

#[test]
fn schema_validator_targets_one_field() {
    let schema = Schema::new(&range_schema("HooksTargeted", true));
    let err = validation(schema.load(&json!({"low": 5, "high": 1})).unwrap_err());
    assert_eq!(err.to_json(), json!({"low": ["low must not exceed high"]}));
    assert_eq!(err.valid_data(), Some(&json!({"low": 5, "high": 1})));
}

#[test]
fn schema_validator_skips_on_field_errors_by_default() {
    let schema = Schema::new(&range_schema("HooksSkip", true));
    let err = validation(schema.load(&json!({"low": 5, "high": "x"})).unwrap_err());
    assert_eq!(err.to_json(), json!({"high": ["Not a valid integer."]}));
}

#[test]
fn schema_validator_can_opt_out_of_skipping() {
    let schema = Schema::new(&range_schema("HooksNoSkip", false));
    let input = json!({"low": 5, "high": "x", "extra": 1});
    let err = validation(schema.load(&input).unwrap_err());
    // high is missing from the loaded data, so the validator sees no conflict.
    assert_eq!(
        err.to_json(),
        json!({"high": ["Not a valid integer."], "extra": ["Unknown field."]})
    );

    let input = json!({"low": 5, "high": 1, "extra": 1});
    let err = validation(schema.load(&input).unwrap_err());
    assert_eq!(
        err.to_json(),
        json!({"low": ["low must not exceed high"], "extra": ["Unknown field."]})
    );
}

#[test]
fn schema_validator_can_target_several_fields_or_none() {
    let decl = SchemaDeclaration::builder("HooksMultiTarget")
        .register(false)
        .field("a", Field::raw())
        .field("b", Field::raw())
        .processor(Processor::validates_schema("pair", |_, _| {
            Err(ValidationError::for_fields([("a", "bad a"), ("b", "bad b")]).into())
        }))
        .processor(Processor::validates_schema("whole", |_, _| {
            Err(ValidationError::new("bad object").into())
        }))
        .build()
        .unwrap();
    let err = validation(Schema::new(&decl).load(&json!({"a": 1, "b": 2})).unwrap_err());
    assert_eq!(
        err.to_json(),
        json!({"a": ["bad a"], "b": ["bad b"], "_schema": ["bad object"]})
    );
}

#[test]
fn per_item_schema_validators_skip_only_failing_items() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let decl = SchemaDeclaration::builder("HooksPerItem")
        .register(false)
        .field("n", Field::integer())
        .processor(Processor::validates_schema("count", move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .build()
        .unwrap();
    let schema = Schema::builder(&decl).many(true).build().unwrap();
    assert!(schema.load(&json!([{"n": 1}, {"n": "x"}, {"n": 3}])).is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// ── Field validators ────────────────────────────────────────────────

#[test]
fn field_validator_failure_removes_the_value() {
    let decl = SchemaDeclaration::builder("HooksFieldValidator")
        .register(false)
        .field("name", Field::str())
        .field("age", Field::integer().data_key("years"))
        .processor(Processor::validates("age", "adult", |value, _| {
            if value.as_i64().unwrap_or(0) < 18 {
                return Err(ValidationError::new("Must be an adult.").into());
            }
            Ok(())
        }))
        .build()
        .unwrap();
    let schema = Schema::new(&decl);
    assert_eq!(
        schema.load(&json!({"name": "a", "years": 30})).unwrap(),
        json!({"name": "a", "age": 30})
    );
    let err = validation(schema.load(&json!({"name": "a", "years": 3})).unwrap_err());
    assert_eq!(err.to_json(), json!({"years": ["Must be an adult."]}));
    assert_eq!(err.valid_data(), Some(&json!({"name": "a"})));
}

#[test]
fn field_validator_does_not_run_for_missing_values() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let decl = SchemaDeclaration::builder("HooksFieldValidatorMissing")
        .register(false)
        .field("age", Field::integer())
        .processor(Processor::validates("age", "count", move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .build()
        .unwrap();
    Schema::new(&decl).load(&json!({})).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

// ── Post-load gating and hook failures ──────────────────────────────

#[test]
fn post_load_is_skipped_when_validation_fails() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let decl = SchemaDeclaration::builder("HooksPostLoadGate")
        .register(false)
        .field("n", Field::integer())
        .processor(Processor::post_load("count", move |data, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(data)
        }))
        .build()
        .unwrap();
    let schema = Schema::new(&decl);
    assert!(schema.load(&json!({"n": "x"})).is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    schema.load(&json!({"n": 1})).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn validate_never_runs_post_load() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let decl = SchemaDeclaration::builder("HooksValidateOnly")
        .register(false)
        .field("n", Field::integer())
        .processor(Processor::post_load("count", move |data, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(data)
        }))
        .build()
        .unwrap();
    let errors = Schema::new(&decl).validate(&json!({"n": 1})).unwrap();
    assert!(errors.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn validation_errors_from_hooks_are_collected() {
    let decl = SchemaDeclaration::builder("HooksPreLoadError")
        .register(false)
        .field("n", Field::integer())
        .processor(Processor::pre_load("require_object", |data, _| {
            if data.get("n").is_none() {
                return Err(ValidationError::new("Empty payload.").into());
            }
            Ok(data)
        }))
        .build()
        .unwrap();
    let err = validation(Schema::new(&decl).load(&json!({})).unwrap_err());
    assert_eq!(err.to_json(), json!({"_schema": ["Empty payload."]}));
    assert!(err.valid_data().is_none());
}

#[test]
fn other_hook_errors_abort_the_call() {
    let decl = SchemaDeclaration::builder("HooksAbort")
        .register(false)
        .field("n", Field::integer())
        .processor(Processor::post_load("explode", |_, _| {
            Err(MarshError::hook("explode", "storage offline"))
        }))
        .build()
        .unwrap();
    let err = Schema::new(&decl).load(&json!({"n": 1})).unwrap_err();
    assert!(matches!(
        err,
        MarshError::Hook { ref hook, .. } if hook == "explode"
    ));
}

#[test]
fn hooks_respect_per_call_many() {
    let decl = SchemaDeclaration::builder("HooksPerCallMany")
        .register(false)
        .field("n", Field::integer())
        .processor(
            Processor::post_load("tag", |data, args| {
                Ok(json!({"many": args.many, "data": data}))
            })
            .pass_many(),
        )
        .build()
        .unwrap();
    let out = Schema::new(&decl)
        .load_with(&json!([{"n": 1}]), LoadOptions::new().many(true))
        .unwrap();
    assert_eq!(out, json!({"many": true, "data": [{"n": 1}]}));
}
