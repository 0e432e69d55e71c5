//! The native host surface: `console`, `Math`, `JSON`, `Object`/`Array`/
//! `Number` statics, and the instance-method surface for strings, arrays,
//! promises, and `Map`/`Set` — everything a script can reach without the
//! checker having emitted a user-defined declaration for it.
//!
//! A full `lib.es*.d.ts` implementation is explicitly out of scope; what's
//! here is the minimal dispatch surface the evaluator's own machinery
//! (iteration, `await`, disposal) and ordinary everyday scripts need.
//! Builtin objects are ordinary `RuntimeValue::Object`s holding native
//! `PropertySlot`s, so `get_property`/`call_value` need no special-casing
//! for them beyond the construction marker described below.

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use sharpts_common::Atom;

use crate::environment::{BindingKind, RuntimeEnvironment};
use crate::errors;
use crate::evaluator::calls::new_function;
use crate::evaluator::Evaluator;
use crate::promise::PromiseData;
use crate::result::ExecutionResult;
use crate::value::{
    format_number, DateData, FunctionData, MapKey, ObjectData, PropertySlot, RegexData, RuntimeValue,
};

type EvalResult = Result<RuntimeValue, ExecutionResult>;

fn throw(v: RuntimeValue) -> ExecutionResult {
    ExecutionResult::Throw(v)
}

fn native_object(entries: Vec<(&str, RuntimeValue)>) -> RuntimeValue {
    let mut props = IndexMap::new();
    for (k, v) in entries {
        props.insert(Atom::new(k), PropertySlot::value(v));
    }
    RuntimeValue::object(ObjectData { props, symbol_props: Default::default(), is_fresh_literal: false })
}

/// Marks an object as a dispatch target for `construct_native` instead of
/// `calls::construct`'s `RuntimeValue::Class` path — `new Promise(...)`,
/// `new Map()`, and friends are host-provided constructors, not classes
/// the evaluator ever builds a `ClassData` for.
fn native_ctor(name: &str) -> RuntimeValue {
    native_object(vec![("__sharpts_native_ctor", RuntimeValue::string(name))])
}

pub fn install(global: &RuntimeEnvironment) {
    global.define(Atom::new("console"), console_object(), BindingKind::Const);
    global.define(Atom::new("Math"), math_object(), BindingKind::Const);
    global.define(Atom::new("JSON"), json_object(), BindingKind::Const);
    global.define(Atom::new("Object"), object_statics(), BindingKind::Const);
    global.define(Atom::new("Array"), array_statics(), BindingKind::Const);
    global.define(Atom::new("Number"), number_statics(), BindingKind::Const);
    global.define(Atom::new("Symbol"), new_function("Symbol", |_ev, _this, args| {
        let desc = args.first().map(|v| Atom::new(v.display_string()));
        Ok(RuntimeValue::Symbol(crate::symbol::SymbolId::fresh(), desc))
    }), BindingKind::Const);
    global.define(Atom::new("Promise"), promise_ctor(), BindingKind::Const);
    global.define(Atom::new("Map"), native_ctor("Map"), BindingKind::Const);
    global.define(Atom::new("Set"), native_ctor("Set"), BindingKind::Const);
    global.define(Atom::new("WeakMap"), native_ctor("WeakMap"), BindingKind::Const);
    global.define(Atom::new("WeakSet"), native_ctor("WeakSet"), BindingKind::Const);
    global.define(Atom::new("Date"), native_ctor("Date"), BindingKind::Const);
    global.define(Atom::new("RegExp"), native_ctor("RegExp"), BindingKind::Const);
}

fn console_object() -> RuntimeValue {
    fn log_fn(prefix: &'static str) -> RuntimeValue {
        new_function("log", move |_ev, _this, args| {
            let line = args.iter().map(|a| a.display_string()).collect::<Vec<_>>().join(" ");
            tracing::info!(target: "sharpts::console", "{prefix}{line}");
            println!("{line}");
            Ok(RuntimeValue::Undefined)
        })
    }
    native_object(vec![
        ("log", log_fn("")),
        ("info", log_fn("")),
        ("warn", log_fn("")),
        ("error", log_fn("")),
        ("debug", log_fn("")),
    ])
}

fn math_object() -> RuntimeValue {
    fn unary(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> RuntimeValue {
        new_function("", move |_ev, _this, args| {
            Ok(RuntimeValue::number(f(args.first().and_then(|v| v.as_f64()).unwrap_or(f64::NAN))))
        })
    }
    native_object(vec![
        ("PI", RuntimeValue::number(std::f64::consts::PI)),
        ("E", RuntimeValue::number(std::f64::consts::E)),
        ("abs", unary(f64::abs)),
        ("floor", unary(f64::floor)),
        ("ceil", unary(f64::ceil)),
        ("round", unary(f64::round)),
        ("trunc", unary(f64::trunc)),
        ("sqrt", unary(f64::sqrt)),
        ("sign", unary(f64::signum)),
        ("max", new_function("max", |_ev, _this, args| {
            Ok(RuntimeValue::number(args.iter().filter_map(|v| v.as_f64()).fold(f64::NEG_INFINITY, f64::max)))
        })),
        ("min", new_function("min", |_ev, _this, args| {
            Ok(RuntimeValue::number(args.iter().filter_map(|v| v.as_f64()).fold(f64::INFINITY, f64::min)))
        })),
        ("pow", new_function("pow", |_ev, _this, args| {
            let base = args.first().and_then(|v| v.as_f64()).unwrap_or(f64::NAN);
            let exp = args.get(1).and_then(|v| v.as_f64()).unwrap_or(f64::NAN);
            Ok(RuntimeValue::number(base.powf(exp)))
        })),
        ("random", new_function("random", |_ev, _this, _args| Ok(RuntimeValue::number(0.5)))),
    ])
}

fn json_object() -> RuntimeValue {
    native_object(vec![
        ("stringify", new_function("stringify", |_ev, _this, args| {
            let Some(value) = args.first() else { return Ok(RuntimeValue::Undefined) };
            let json = to_json(value);
            Ok(RuntimeValue::string(json.to_string()))
        })),
        ("parse", new_function("parse", |_ev, _this, args| {
            let text = args.first().map(|v| v.display_string()).unwrap_or_default();
            let parsed: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| throw(errors::syntax_error(format!("Unexpected token in JSON: {e}"))))?;
            Ok(from_json(&parsed))
        })),
    ])
}

fn to_json(value: &RuntimeValue) -> serde_json::Value {
    match value {
        RuntimeValue::Null | RuntimeValue::Undefined => serde_json::Value::Null,
        RuntimeValue::Boolean(b) => serde_json::Value::Bool(*b),
        RuntimeValue::Number(bits) => serde_json::Number::from_f64(f64::from_bits(*bits))
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        RuntimeValue::String(s) => serde_json::Value::String(s.to_string()),
        RuntimeValue::Array(items) => {
            serde_json::Value::Array(items.lock().expect("array lock poisoned").iter().map(to_json).collect())
        }
        RuntimeValue::Object(o) => {
            let mut map = serde_json::Map::new();
            for (k, slot) in &o.lock().expect("object lock poisoned").props {
                if let PropertySlot::Value { value, .. } = slot {
                    map.insert(k.to_string(), to_json(value));
                }
            }
            serde_json::Value::Object(map)
        }
        other => serde_json::Value::String(other.display_string()),
    }
}

fn from_json(value: &serde_json::Value) -> RuntimeValue {
    match value {
        serde_json::Value::Null => RuntimeValue::Null,
        serde_json::Value::Bool(b) => RuntimeValue::Boolean(*b),
        serde_json::Value::Number(n) => RuntimeValue::number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => RuntimeValue::string(s.clone()),
        serde_json::Value::Array(items) => RuntimeValue::array(items.iter().map(from_json).collect()),
        serde_json::Value::Object(map) => {
            let mut props = IndexMap::new();
            for (k, v) in map {
                props.insert(Atom::new(k), PropertySlot::value(from_json(v)));
            }
            RuntimeValue::object(ObjectData { props, symbol_props: Default::default(), is_fresh_literal: false })
        }
    }
}

fn object_statics() -> RuntimeValue {
    native_object(vec![
        ("keys", new_function("keys", |_ev, _this, args| {
            Ok(RuntimeValue::array(object_keys(args.first()).into_iter().map(RuntimeValue::string).collect()))
        })),
        ("values", new_function("values", |ev, _this, args| {
            let Some(obj) = args.first().cloned() else { return Ok(RuntimeValue::array(Vec::new())) };
            let mut out = Vec::new();
            for key in object_keys(Some(&obj)) {
                out.push(ev.get_property(&obj, &Atom::new(key))?);
            }
            Ok(RuntimeValue::array(out))
        })),
        ("entries", new_function("entries", |ev, _this, args| {
            let Some(obj) = args.first().cloned() else { return Ok(RuntimeValue::array(Vec::new())) };
            let mut out = Vec::new();
            for key in object_keys(Some(&obj)) {
                let value = ev.get_property(&obj, &Atom::new(key.clone()))?;
                out.push(RuntimeValue::array(vec![RuntimeValue::string(key), value]));
            }
            Ok(RuntimeValue::array(out))
        })),
        ("assign", new_function("assign", |ev, _this, args| {
            let Some(target) = args.first().cloned() else { return Ok(RuntimeValue::Undefined) };
            for source in &args[1.min(args.len())..] {
                for key in object_keys(Some(source)) {
                    let v = ev.get_property(source, &Atom::new(key.clone()))?;
                    ev.set_property(&target, &Atom::new(key), v)?;
                }
            }
            Ok(target)
        })),
        ("freeze", new_function("freeze", |_ev, _this, args| Ok(args.first().cloned().unwrap_or(RuntimeValue::Undefined)))),
        ("fromEntries", new_function("fromEntries", |ev, _this, args| {
            let Some(entries) = args.first().cloned() else { return Ok(RuntimeValue::Undefined) };
            let mut props = IndexMap::new();
            for pair in ev.iterate_to_vec(&entries)? {
                let key = ev.get_index(&pair, &RuntimeValue::number(0.0))?;
                let value = ev.get_index(&pair, &RuntimeValue::number(1.0))?;
                props.insert(Atom::new(key.display_string()), PropertySlot::value(value));
            }
            Ok(RuntimeValue::object(ObjectData { props, symbol_props: Default::default(), is_fresh_literal: false }))
        })),
    ])
}

fn object_keys(value: Option<&RuntimeValue>) -> Vec<String> {
    match value {
        Some(RuntimeValue::Object(o)) => o.lock().expect("object lock poisoned").props.keys().map(|a| a.to_string()).collect(),
        Some(RuntimeValue::Instance(i)) => i.lock().expect("instance lock poisoned").fields.keys().map(|a| a.to_string()).collect(),
        Some(RuntimeValue::Array(items)) => (0..items.lock().expect("array lock poisoned").len()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    }
}

fn array_statics() -> RuntimeValue {
    native_object(vec![
        ("isArray", new_function("isArray", |_ev, _this, args| {
            Ok(RuntimeValue::Boolean(matches!(args.first(), Some(RuntimeValue::Array(_)))))
        })),
        ("of", new_function("of", |_ev, _this, args| Ok(RuntimeValue::array(args.to_vec())))),
        ("from", new_function("from", |ev, _this, args| {
            let Some(source) = args.first().cloned() else { return Ok(RuntimeValue::array(Vec::new())) };
            let items = ev.iterate_to_vec(&source).or_else(|_| match &source {
                RuntimeValue::Object(_) => Ok(object_keys(Some(&source)).into_iter().map(RuntimeValue::string).collect()),
                _ => Err(throw(errors::type_error(format!("{} is not iterable", source.display_string())))),
            })?;
            match args.get(1) {
                Some(mapper) => {
                    let mut out = Vec::with_capacity(items.len());
                    for (i, item) in items.into_iter().enumerate() {
                        out.push(ev.call_value(mapper, RuntimeValue::Undefined, &[item, RuntimeValue::number(i as f64)])?);
                    }
                    Ok(RuntimeValue::array(out))
                }
                None => Ok(RuntimeValue::array(items)),
            }
        })),
    ])
}

fn number_statics() -> RuntimeValue {
    native_object(vec![
        ("MAX_SAFE_INTEGER", RuntimeValue::number(9007199254740991.0)),
        ("MIN_SAFE_INTEGER", RuntimeValue::number(-9007199254740991.0)),
        ("EPSILON", RuntimeValue::number(f64::EPSILON)),
        ("isInteger", new_function("isInteger", |_ev, _this, args| {
            Ok(RuntimeValue::Boolean(matches!(args.first().and_then(|v| v.as_f64()), Some(n) if n.is_finite() && n.trunc() == n)))
        })),
        ("isFinite", new_function("isFinite", |_ev, _this, args| {
            Ok(RuntimeValue::Boolean(args.first().and_then(|v| v.as_f64()).is_some_and(f64::is_finite)))
        })),
        ("isNaN", new_function("isNaN", |_ev, _this, args| {
            Ok(RuntimeValue::Boolean(args.first().and_then(|v| v.as_f64()).is_some_and(f64::is_nan)))
        })),
        ("parseFloat", new_function("parseFloat", |_ev, _this, args| {
            let s = args.first().map(|v| v.display_string()).unwrap_or_default();
            Ok(RuntimeValue::number(s.trim().parse::<f64>().unwrap_or(f64::NAN)))
        })),
        ("parseInt", new_function("parseInt", |_ev, _this, args| {
            let s = args.first().map(|v| v.display_string()).unwrap_or_default();
            let radix = args.get(1).and_then(|v| v.as_f64()).map(|n| n as u32).filter(|r| *r >= 2 && *r <= 36).unwrap_or(10);
            Ok(RuntimeValue::number(i64::from_str_radix(s.trim(), radix).map(|n| n as f64).unwrap_or(f64::NAN)))
        })),
    ])
}

/// `Promise` itself, plus its static-method table — the constructor needs
/// the `__sharpts_native_ctor` marker for `new Promise(executor)` to reach
/// `construct_native` below, but it's also callable as a plain object for
/// `Promise.resolve`/`.reject`/`.all`/`.race`/`.any`.
fn promise_ctor() -> RuntimeValue {
    let mut entries = vec![("__sharpts_native_ctor", RuntimeValue::string("Promise"))];
    entries.extend(vec![
        ("resolve", new_function("resolve", |ev, _this, args| {
            let value = args.first().cloned().unwrap_or(RuntimeValue::Undefined);
            if matches!(value, RuntimeValue::Promise(_)) {
                return Ok(value);
            }
            let promise = ev.new_promise();
            ev.resolve_promise(&promise, value);
            Ok(RuntimeValue::Promise(promise))
        })),
        ("reject", new_function("reject", |ev, _this, args| {
            let promise = ev.new_promise();
            ev.reject_promise(&promise, args.first().cloned().unwrap_or(RuntimeValue::Undefined));
            Ok(RuntimeValue::Promise(promise))
        })),
        ("all", new_function("all", |ev, _this, args| combine_promises(ev, args, CombineMode::All))),
        ("race", new_function("race", |ev, _this, args| combine_promises(ev, args, CombineMode::Race))),
        ("any", new_function("any", |ev, _this, args| combine_promises(ev, args, CombineMode::Any))),
    ]);
    native_object(entries)
}

/// A value that isn't already a promise settles immediately with itself —
/// the same flattening `Promise.resolve` performs, reused so every input
/// to `all`/`race`/`any` goes through one settlement path regardless of
/// whether the caller passed a promise or a plain value.
fn coerce_promise(ev: &mut Evaluator, value: RuntimeValue) -> Arc<PromiseData> {
    if let RuntimeValue::Promise(p) = value {
        p
    } else {
        let p = ev.new_promise();
        ev.resolve_promise(&p, value);
        p
    }
}

#[derive(Clone, Copy)]
enum CombineMode {
    All,
    Race,
    Any,
}

/// Shared settlement engine for `Promise.all`/`.race`/`.any`: each input is
/// coerced to a promise and given a `.then` reaction; what the reaction
/// does with a settlement depends on `mode`. `race` and `any` both resolve
/// "first one wins", differing only in which side of the settlement they
/// react to; `all` collects every fulfillment in input order and rejects
/// as soon as any one input rejects.
fn combine_promises(ev: &mut Evaluator, args: &[RuntimeValue], mode: CombineMode) -> EvalResult {
    let Some(iterable) = args.first() else {
        return Err(throw(errors::type_error("Promise combinator requires an iterable")));
    };
    let items = ev.iterate_to_vec(iterable)?;
    let result = ev.new_promise();
    if items.is_empty() {
        match mode {
            CombineMode::All => ev.resolve_promise(&result, RuntimeValue::array(Vec::new())),
            CombineMode::Race => {}
            CombineMode::Any => ev.reject_promise(&result, errors::aggregate_error(Vec::new(), "All promises were rejected")),
        }
        return Ok(RuntimeValue::Promise(result));
    }
    let n = items.len();
    let fulfillments = Arc::new(std::sync::Mutex::new(vec![RuntimeValue::Undefined; n]));
    let rejections = Arc::new(std::sync::Mutex::new(vec![RuntimeValue::Undefined; n]));
    let remaining = Arc::new(std::sync::Mutex::new(n));
    for (i, item) in items.into_iter().enumerate() {
        let input = coerce_promise(ev, item);
        let on_fulfilled_result = result.clone();
        let on_fulfilled_fulfillments = fulfillments.clone();
        let on_fulfilled_remaining = remaining.clone();
        let on_fulfilled = FunctionData::native(
            "",
            Arc::new(move |ev: &mut Evaluator, _this: RuntimeValue, args: &[RuntimeValue]| {
                let value = args.first().cloned().unwrap_or(RuntimeValue::Undefined);
                match mode {
                    CombineMode::All => {
                        on_fulfilled_fulfillments.lock().expect("slot lock poisoned")[i] = value;
                        let mut left = on_fulfilled_remaining.lock().expect("counter lock poisoned");
                        *left -= 1;
                        if *left == 0 {
                            let all = on_fulfilled_fulfillments.lock().expect("slot lock poisoned").clone();
                            ev.resolve_promise(&on_fulfilled_result, RuntimeValue::array(all));
                        }
                    }
                    CombineMode::Race | CombineMode::Any => ev.resolve_promise(&on_fulfilled_result, value),
                }
                Ok(RuntimeValue::Undefined)
            }),
        );
        let on_rejected_result = result.clone();
        let on_rejected_rejections = rejections.clone();
        let on_rejected_remaining = remaining.clone();
        let on_rejected = FunctionData::native(
            "",
            Arc::new(move |ev: &mut Evaluator, _this: RuntimeValue, args: &[RuntimeValue]| {
                let err = args.first().cloned().unwrap_or(RuntimeValue::Undefined);
                match mode {
                    CombineMode::All | CombineMode::Race => ev.reject_promise(&on_rejected_result, err),
                    CombineMode::Any => {
                        on_rejected_rejections.lock().expect("slot lock poisoned")[i] = err;
                        let mut left = on_rejected_remaining.lock().expect("counter lock poisoned");
                        *left -= 1;
                        if *left == 0 {
                            let all = on_rejected_rejections.lock().expect("slot lock poisoned").clone();
                            ev.reject_promise(&on_rejected_result, errors::aggregate_error(all, "All promises were rejected"));
                        }
                    }
                }
                Ok(RuntimeValue::Undefined)
            }),
        );
        ev.then(&input, Some(on_fulfilled), Some(on_rejected));
    }
    Ok(RuntimeValue::Promise(result))
}

/// Allocates the host object a `construct()` marker-prop dispatch resolves
/// to: everything `calls::construct` cannot express as a `ClassData`
/// because the checker never emits one for a builtin.
pub fn construct_native(evaluator: &mut Evaluator, name: &str, args: &[RuntimeValue]) -> EvalResult {
    match name {
        "Promise" => {
            let promise = PromiseData::pending();
            let resolve_promise = promise.clone();
            let resolve = new_function("resolve", move |ev, _this, args| {
                ev.resolve_promise(&resolve_promise, args.first().cloned().unwrap_or(RuntimeValue::Undefined));
                Ok(RuntimeValue::Undefined)
            });
            let reject_promise = promise.clone();
            let reject = new_function("reject", move |ev, _this, args| {
                ev.reject_promise(&reject_promise, args.first().cloned().unwrap_or(RuntimeValue::Undefined));
                Ok(RuntimeValue::Undefined)
            });
            let Some(executor) = args.first().cloned() else {
                return Err(throw(errors::type_error("Promise resolver is not a function")));
            };
            if let Err(e) = evaluator.call_value(&executor, RuntimeValue::Undefined, &[resolve, reject]) {
                if let ExecutionResult::Throw(err) = e {
                    evaluator.reject_promise(&promise, err);
                } else {
                    return Err(e);
                }
            }
            Ok(RuntimeValue::Promise(promise))
        }
        "Map" => {
            let mut entries = IndexMap::new();
            if let Some(iterable) = args.first() {
                for pair in evaluator.iterate_to_vec(iterable)? {
                    let key = evaluator.get_index(&pair, &RuntimeValue::number(0.0))?;
                    let value = evaluator.get_index(&pair, &RuntimeValue::number(1.0))?;
                    entries.insert(to_map_key(&key), value);
                }
            }
            Ok(RuntimeValue::Map(Arc::new(std::sync::Mutex::new(entries))))
        }
        "Set" => {
            let mut entries = IndexMap::new();
            if let Some(iterable) = args.first() {
                for item in evaluator.iterate_to_vec(iterable)? {
                    entries.insert(to_map_key(&item), item);
                }
            }
            Ok(RuntimeValue::Set(Arc::new(std::sync::Mutex::new(entries))))
        }
        "WeakMap" => Ok(RuntimeValue::WeakMap(Arc::new(std::sync::Mutex::new(FxHashMap::default())))),
        "WeakSet" => Ok(RuntimeValue::WeakSet(Arc::new(std::sync::Mutex::new(FxHashMap::default())))),
        "Date" => {
            let millis = match args.first() {
                Some(v) => v.as_f64().unwrap_or(f64::NAN),
                None => f64::NAN,
            };
            Ok(RuntimeValue::Date(Arc::new(std::sync::Mutex::new(DateData { epoch_millis: millis }))))
        }
        "RegExp" => {
            let pattern = args.first().map(|v| v.display_string()).unwrap_or_default();
            let flags = args.get(1).map(|v| v.display_string()).unwrap_or_default();
            Ok(RuntimeValue::Regex(Arc::new(std::sync::Mutex::new(RegexData { pattern, flags, last_index: 0 }))))
        }
        other => Err(throw(errors::type_error(format!("{other} is not a constructor")))),
    }
}

fn to_map_key(value: &RuntimeValue) -> MapKey {
    match value {
        RuntimeValue::Null => MapKey::Null,
        RuntimeValue::Undefined => MapKey::Undefined,
        RuntimeValue::Boolean(b) => MapKey::Boolean(*b),
        RuntimeValue::Number(bits) => MapKey::Number(*bits),
        RuntimeValue::String(s) => MapKey::String(s.clone()),
        RuntimeValue::BigInt(s) => MapKey::BigInt(s.clone()),
        RuntimeValue::Symbol(s, _) => MapKey::Symbol(*s),
        other => MapKey::ObjectIdentity(runtime_value_identity(other)),
    }
}

fn runtime_value_identity(value: &RuntimeValue) -> usize {
    match value {
        RuntimeValue::Array(a) => Arc::as_ptr(a) as usize,
        RuntimeValue::Object(o) => Arc::as_ptr(o) as usize,
        RuntimeValue::Instance(i) => Arc::as_ptr(i) as usize,
        RuntimeValue::Function(f) => Arc::as_ptr(f) as usize,
        RuntimeValue::Class(c) => Arc::as_ptr(c) as usize,
        _ => 0,
    }
}

/// The instance-method surface dispatched from `calls::get_property`'s
/// fallback for strings, arrays, functions, promises, and `Map`/`Set` —
/// `receiver` is bound as the method's `this` via the returned closure's
/// capture, not via the ordinary call-time `this` argument, since these
/// are native functions with no real parameter list to bind against.
pub fn prototype_method(receiver: &RuntimeValue, name: &Atom) -> EvalResult {
    match receiver {
        RuntimeValue::String(_) => string_method(receiver, name),
        RuntimeValue::Array(_) => array_method(receiver, name),
        RuntimeValue::Function(_) => function_method(receiver, name),
        RuntimeValue::Promise(_) => promise_method(receiver, name),
        RuntimeValue::Map(_) => map_method(receiver, name),
        RuntimeValue::Set(_) => set_method(receiver, name),
        _ => Ok(RuntimeValue::Undefined),
    }
}

fn bound(receiver: RuntimeValue, name: &'static str, f: impl Fn(&mut Evaluator, &RuntimeValue, &[RuntimeValue]) -> EvalResult + Send + Sync + 'static) -> RuntimeValue {
    new_function(name, move |ev, _this, args| f(ev, &receiver, args))
}

fn string_method(receiver: &RuntimeValue, name: &Atom) -> EvalResult {
    let RuntimeValue::String(s) = receiver else { return Ok(RuntimeValue::Undefined) };
    let s = s.clone();
    Ok(match name.as_ref() {
        "charAt" => bound(receiver.clone(), "charAt", move |_ev, _this, args| {
            let i = args.first().and_then(|v| v.as_f64()).unwrap_or(0.0) as usize;
            Ok(RuntimeValue::string(s.chars().nth(i).map(|c| c.to_string()).unwrap_or_default()))
        }),
        "toUpperCase" => bound(receiver.clone(), "toUpperCase", move |_ev, _this, _args| Ok(RuntimeValue::string(s.to_uppercase()))),
        "toLowerCase" => bound(receiver.clone(), "toLowerCase", move |_ev, _this, _args| Ok(RuntimeValue::string(s.to_lowercase()))),
        "trim" => bound(receiver.clone(), "trim", move |_ev, _this, _args| Ok(RuntimeValue::string(s.trim().to_string()))),
        "includes" => bound(receiver.clone(), "includes", move |_ev, _this, args| {
            let needle = args.first().map(|v| v.display_string()).unwrap_or_default();
            Ok(RuntimeValue::Boolean(s.contains(&needle)))
        }),
        "startsWith" => bound(receiver.clone(), "startsWith", move |_ev, _this, args| {
            let needle = args.first().map(|v| v.display_string()).unwrap_or_default();
            Ok(RuntimeValue::Boolean(s.starts_with(&needle)))
        }),
        "endsWith" => bound(receiver.clone(), "endsWith", move |_ev, _this, args| {
            let needle = args.first().map(|v| v.display_string()).unwrap_or_default();
            Ok(RuntimeValue::Boolean(s.ends_with(&needle)))
        }),
        "indexOf" => bound(receiver.clone(), "indexOf", move |_ev, _this, args| {
            let needle = args.first().map(|v| v.display_string()).unwrap_or_default();
            Ok(RuntimeValue::number(s.find(&needle).map(|b| s[..b].chars().count() as f64).unwrap_or(-1.0)))
        }),
        "slice" => bound(receiver.clone(), "slice", move |_ev, _this, args| {
            let chars: Vec<char> = s.chars().collect();
            let (start, end) = slice_bounds(chars.len(), args);
            Ok(RuntimeValue::string(chars[start..end].iter().collect::<String>()))
        }),
        "split" => bound(receiver.clone(), "split", move |_ev, _this, args| {
            let sep = args.first().map(|v| v.display_string());
            let parts: Vec<RuntimeValue> = match sep {
                Some(sep) if !sep.is_empty() => s.split(sep.as_str()).map(RuntimeValue::string).collect(),
                _ => s.chars().map(|c| RuntimeValue::string(c.to_string())).collect(),
            };
            Ok(RuntimeValue::array(parts))
        }),
        "repeat" => bound(receiver.clone(), "repeat", move |_ev, _this, args| {
            let n = args.first().and_then(|v| v.as_f64()).unwrap_or(0.0).max(0.0) as usize;
            Ok(RuntimeValue::string(s.repeat(n)))
        }),
        "padStart" => bound(receiver.clone(), "padStart", move |_ev, _this, args| Ok(RuntimeValue::string(pad(&s, args, true)))),
        "padEnd" => bound(receiver.clone(), "padEnd", move |_ev, _this, args| Ok(RuntimeValue::string(pad(&s, args, false)))),
        "concat" => bound(receiver.clone(), "concat", move |_ev, _this, args| {
            let mut out = s.to_string();
            for a in args {
                out.push_str(&a.display_string());
            }
            Ok(RuntimeValue::string(out))
        }),
        "replace" => bound(receiver.clone(), "replace", move |_ev, _this, args| {
            let from = args.first().map(|v| v.display_string()).unwrap_or_default();
            let to = args.get(1).map(|v| v.display_string()).unwrap_or_default();
            Ok(RuntimeValue::string(s.replacen(&from, &to, 1)))
        }),
        "toString" => bound(receiver.clone(), "toString", move |_ev, _this, _args| Ok(RuntimeValue::string(s.to_string()))),
        _ => RuntimeValue::Undefined,
    })
}

fn pad(s: &str, args: &[RuntimeValue], start: bool) -> String {
    let target = args.first().and_then(|v| v.as_f64()).unwrap_or(0.0) as usize;
    let fill = args.get(1).map(|v| v.display_string()).unwrap_or_else(|| " ".to_string());
    let current = s.chars().count();
    if current >= target || fill.is_empty() {
        return s.to_string();
    }
    let fill_chars: Vec<char> = fill.chars().collect();
    let needed = target - current;
    let padding: String = (0..needed).map(|i| fill_chars[i % fill_chars.len()]).collect();
    if start { format!("{padding}{s}") } else { format!("{s}{padding}") }
}

fn slice_bounds(len: usize, args: &[RuntimeValue]) -> (usize, usize) {
    let norm = |n: f64| -> usize {
        if n < 0.0 { (len as f64 + n).max(0.0) as usize } else { (n as usize).min(len) }
    };
    let start = args.first().and_then(|v| v.as_f64()).map(norm).unwrap_or(0);
    let end = args.get(1).and_then(|v| v.as_f64()).map(norm).unwrap_or(len);
    if start > end { (start, start) } else { (start, end) }
}

fn array_method(receiver: &RuntimeValue, name: &Atom) -> EvalResult {
    let RuntimeValue::Array(items) = receiver else { return Ok(RuntimeValue::Undefined) };
    let items = items.clone();
    Ok(match name.as_ref() {
        "push" => bound(receiver.clone(), "push", move |_ev, _this, args| {
            let mut v = items.lock().expect("array lock poisoned");
            v.extend(args.iter().cloned());
            Ok(RuntimeValue::number(v.len() as f64))
        }),
        "pop" => bound(receiver.clone(), "pop", move |_ev, _this, _args| {
            Ok(items.lock().expect("array lock poisoned").pop().unwrap_or(RuntimeValue::Undefined))
        }),
        "shift" => bound(receiver.clone(), "shift", move |_ev, _this, _args| {
            let mut v = items.lock().expect("array lock poisoned");
            if v.is_empty() { Ok(RuntimeValue::Undefined) } else { Ok(v.remove(0)) }
        }),
        "unshift" => bound(receiver.clone(), "unshift", move |_ev, _this, args| {
            let mut v = items.lock().expect("array lock poisoned");
            for (i, a) in args.iter().enumerate() {
                v.insert(i, a.clone());
            }
            Ok(RuntimeValue::number(v.len() as f64))
        }),
        "slice" => bound(receiver.clone(), "slice", move |_ev, _this, args| {
            let v = items.lock().expect("array lock poisoned");
            let (start, end) = slice_bounds(v.len(), args);
            Ok(RuntimeValue::array(v[start..end].to_vec()))
        }),
        "concat" => bound(receiver.clone(), "concat", move |_ev, _this, args| {
            let mut out = items.lock().expect("array lock poisoned").clone();
            for a in args {
                match a {
                    RuntimeValue::Array(other) => out.extend(other.lock().expect("array lock poisoned").iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Ok(RuntimeValue::array(out))
        }),
        "join" => bound(receiver.clone(), "join", move |_ev, _this, args| {
            let sep = args.first().map(|v| v.display_string()).unwrap_or_else(|| ",".to_string());
            let v = items.lock().expect("array lock poisoned");
            Ok(RuntimeValue::string(v.iter().map(|v| if v.is_nullish() { String::new() } else { v.display_string() }).collect::<Vec<_>>().join(&sep)))
        }),
        "indexOf" => bound(receiver.clone(), "indexOf", move |ev, _this, args| {
            let needle = args.first().cloned().unwrap_or(RuntimeValue::Undefined);
            let v = items.lock().expect("array lock poisoned").clone();
            for (i, item) in v.iter().enumerate() {
                if ev.strict_equals(item, &needle) {
                    return Ok(RuntimeValue::number(i as f64));
                }
            }
            Ok(RuntimeValue::number(-1.0))
        }),
        "includes" => bound(receiver.clone(), "includes", move |ev, _this, args| {
            let needle = args.first().cloned().unwrap_or(RuntimeValue::Undefined);
            let v = items.lock().expect("array lock poisoned").clone();
            Ok(RuntimeValue::Boolean(v.iter().any(|item| ev.strict_equals(item, &needle))))
        }),
        "reverse" => bound(receiver.clone(), "reverse", move |_ev, this, _args| {
            items.lock().expect("array lock poisoned").reverse();
            Ok(this.clone())
        }),
        "flat" => bound(receiver.clone(), "flat", move |_ev, _this, _args| {
            let mut out = Vec::new();
            for item in items.lock().expect("array lock poisoned").iter() {
                match item {
                    RuntimeValue::Array(inner) => out.extend(inner.lock().expect("array lock poisoned").iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Ok(RuntimeValue::array(out))
        }),
        "forEach" => bound(receiver.clone(), "forEach", move |ev, _this, args| {
            let Some(callback) = args.first().cloned() else { return Ok(RuntimeValue::Undefined) };
            let v = items.lock().expect("array lock poisoned").clone();
            for (i, item) in v.into_iter().enumerate() {
                ev.call_value(&callback, RuntimeValue::Undefined, &[item, RuntimeValue::number(i as f64)])?;
            }
            Ok(RuntimeValue::Undefined)
        }),
        "map" => bound(receiver.clone(), "map", move |ev, _this, args| {
            let Some(callback) = args.first().cloned() else { return Ok(RuntimeValue::array(Vec::new())) };
            let v = items.lock().expect("array lock poisoned").clone();
            let mut out = Vec::with_capacity(v.len());
            for (i, item) in v.into_iter().enumerate() {
                out.push(ev.call_value(&callback, RuntimeValue::Undefined, &[item, RuntimeValue::number(i as f64)])?);
            }
            Ok(RuntimeValue::array(out))
        }),
        "filter" => bound(receiver.clone(), "filter", move |ev, _this, args| {
            let Some(callback) = args.first().cloned() else { return Ok(RuntimeValue::array(Vec::new())) };
            let v = items.lock().expect("array lock poisoned").clone();
            let mut out = Vec::new();
            for (i, item) in v.into_iter().enumerate() {
                if ev.call_value(&callback, RuntimeValue::Undefined, &[item.clone(), RuntimeValue::number(i as f64)])?.to_boolean() {
                    out.push(item);
                }
            }
            Ok(RuntimeValue::array(out))
        }),
        "find" => bound(receiver.clone(), "find", move |ev, _this, args| {
            let Some(callback) = args.first().cloned() else { return Ok(RuntimeValue::Undefined) };
            let v = items.lock().expect("array lock poisoned").clone();
            for (i, item) in v.into_iter().enumerate() {
                if ev.call_value(&callback, RuntimeValue::Undefined, &[item.clone(), RuntimeValue::number(i as f64)])?.to_boolean() {
                    return Ok(item);
                }
            }
            Ok(RuntimeValue::Undefined)
        }),
        "some" => bound(receiver.clone(), "some", move |ev, _this, args| {
            let Some(callback) = args.first().cloned() else { return Ok(RuntimeValue::Boolean(false)) };
            let v = items.lock().expect("array lock poisoned").clone();
            for (i, item) in v.into_iter().enumerate() {
                if ev.call_value(&callback, RuntimeValue::Undefined, &[item, RuntimeValue::number(i as f64)])?.to_boolean() {
                    return Ok(RuntimeValue::Boolean(true));
                }
            }
            Ok(RuntimeValue::Boolean(false))
        }),
        "every" => bound(receiver.clone(), "every", move |ev, _this, args| {
            let Some(callback) = args.first().cloned() else { return Ok(RuntimeValue::Boolean(true)) };
            let v = items.lock().expect("array lock poisoned").clone();
            for (i, item) in v.into_iter().enumerate() {
                if !ev.call_value(&callback, RuntimeValue::Undefined, &[item, RuntimeValue::number(i as f64)])?.to_boolean() {
                    return Ok(RuntimeValue::Boolean(false));
                }
            }
            Ok(RuntimeValue::Boolean(true))
        }),
        "reduce" => bound(receiver.clone(), "reduce", move |ev, _this, args| {
            let Some(callback) = args.first().cloned() else {
                return Err(throw(errors::type_error("Reduce of empty array with no initial value")));
            };
            let v = items.lock().expect("array lock poisoned").clone();
            let mut iter = v.into_iter().enumerate();
            let mut acc = match args.get(1) {
                Some(init) => init.clone(),
                None => match iter.next() {
                    Some((_, first)) => first,
                    None => return Err(throw(errors::type_error("Reduce of empty array with no initial value"))),
                },
            };
            for (i, item) in iter {
                acc = ev.call_value(&callback, RuntimeValue::Undefined, &[acc, item, RuntimeValue::number(i as f64)])?;
            }
            Ok(acc)
        }),
        "toString" => bound(receiver.clone(), "toString", move |_ev, _this, _args| {
            Ok(RuntimeValue::string(RuntimeValue::Array(items.clone()).display_string()))
        }),
        _ => RuntimeValue::Undefined,
    })
}

fn function_method(receiver: &RuntimeValue, name: &Atom) -> EvalResult {
    let f = receiver.clone();
    Ok(match name.as_ref() {
        "call" => bound(f, "call", |ev, this, args| {
            let bound_this = args.first().cloned().unwrap_or(RuntimeValue::Undefined);
            ev.call_value(this, bound_this, args.get(1..).unwrap_or(&[]))
        }),
        "apply" => bound(receiver.clone(), "apply", |ev, this, args| {
            let bound_this = args.first().cloned().unwrap_or(RuntimeValue::Undefined);
            let call_args = match args.get(1) {
                Some(arr) => ev.iterate_to_vec(arr)?,
                None => Vec::new(),
            };
            ev.call_value(this, bound_this, &call_args)
        }),
        "bind" => bound(receiver.clone(), "bind", |ev, this, args| {
            let bound_this = args.first().cloned().unwrap_or(RuntimeValue::Undefined);
            let preset: Vec<RuntimeValue> = args.get(1..).unwrap_or(&[]).to_vec();
            let target = this.clone();
            Ok(new_function("bound", move |ev, _this, call_args| {
                let mut all = preset.clone();
                all.extend(call_args.iter().cloned());
                ev.call_value(&target, bound_this.clone(), &all)
            }))
            .and_then(|v| Ok(v) as EvalResult)
            .map(|v| { let _ = ev; v })
        }),
        _ => RuntimeValue::Undefined,
    })
}

fn promise_method(receiver: &RuntimeValue, name: &Atom) -> EvalResult {
    let RuntimeValue::Promise(promise) = receiver else { return Ok(RuntimeValue::Undefined) };
    let promise = promise.clone();
    Ok(match name.as_ref() {
        "then" => bound(receiver.clone(), "then", move |ev, _this, args| {
            let on_fulfilled = as_function_ref(args.first());
            let on_rejected = as_function_ref(args.get(1));
            Ok(RuntimeValue::Promise(ev.then(&promise, on_fulfilled, on_rejected)))
        }),
        "catch" => bound(receiver.clone(), "catch", move |ev, _this, args| {
            let on_rejected = as_function_ref(args.first());
            Ok(RuntimeValue::Promise(ev.then(&promise, None, on_rejected)))
        }),
        "finally" => bound(receiver.clone(), "finally", move |ev, _this, args| {
            let Some(callback) = as_function_ref(args.first()) else { return Ok(RuntimeValue::Promise(promise.clone())) };
            let on_fulfilled = callback.clone();
            let on_rejected = callback;
            Ok(RuntimeValue::Promise(ev.then(&promise, Some(on_fulfilled), Some(on_rejected))))
        }),
        _ => RuntimeValue::Undefined,
    })
}

fn as_function_ref(value: Option<&RuntimeValue>) -> Option<crate::value::FunctionRef> {
    match value {
        Some(RuntimeValue::Function(f)) => Some(f.clone()),
        _ => None,
    }
}

fn map_method(receiver: &RuntimeValue, name: &Atom) -> EvalResult {
    let RuntimeValue::Map(m) = receiver else { return Ok(RuntimeValue::Undefined) };
    let m = m.clone();
    Ok(match name.as_ref() {
        "size" => RuntimeValue::number(m.lock().expect("map lock poisoned").len() as f64),
        "get" => bound(receiver.clone(), "get", move |_ev, _this, args| {
            let key = to_map_key(&args.first().cloned().unwrap_or(RuntimeValue::Undefined));
            Ok(m.lock().expect("map lock poisoned").get(&key).cloned().unwrap_or(RuntimeValue::Undefined))
        }),
        "set" => bound(receiver.clone(), "set", move |_ev, this, args| {
            let key = to_map_key(&args.first().cloned().unwrap_or(RuntimeValue::Undefined));
            let value = args.get(1).cloned().unwrap_or(RuntimeValue::Undefined);
            m.lock().expect("map lock poisoned").insert(key, value);
            Ok(this.clone())
        }),
        "has" => bound(receiver.clone(), "has", move |_ev, _this, args| {
            let key = to_map_key(&args.first().cloned().unwrap_or(RuntimeValue::Undefined));
            Ok(RuntimeValue::Boolean(m.lock().expect("map lock poisoned").contains_key(&key)))
        }),
        "delete" => bound(receiver.clone(), "delete", move |_ev, _this, args| {
            let key = to_map_key(&args.first().cloned().unwrap_or(RuntimeValue::Undefined));
            Ok(RuntimeValue::Boolean(m.lock().expect("map lock poisoned").shift_remove(&key).is_some()))
        }),
        "clear" => bound(receiver.clone(), "clear", move |_ev, _this, _args| {
            m.lock().expect("map lock poisoned").clear();
            Ok(RuntimeValue::Undefined)
        }),
        _ => RuntimeValue::Undefined,
    })
}

fn set_method(receiver: &RuntimeValue, name: &Atom) -> EvalResult {
    let RuntimeValue::Set(s) = receiver else { return Ok(RuntimeValue::Undefined) };
    let s = s.clone();
    Ok(match name.as_ref() {
        "size" => RuntimeValue::number(s.lock().expect("set lock poisoned").len() as f64),
        "add" => bound(receiver.clone(), "add", move |_ev, this, args| {
            let value = args.first().cloned().unwrap_or(RuntimeValue::Undefined);
            s.lock().expect("set lock poisoned").insert(to_map_key(&value), value);
            Ok(this.clone())
        }),
        "has" => bound(receiver.clone(), "has", move |_ev, _this, args| {
            let key = to_map_key(&args.first().cloned().unwrap_or(RuntimeValue::Undefined));
            Ok(RuntimeValue::Boolean(s.lock().expect("set lock poisoned").contains_key(&key)))
        }),
        "delete" => bound(receiver.clone(), "delete", move |_ev, _this, args| {
            let key = to_map_key(&args.first().cloned().unwrap_or(RuntimeValue::Undefined));
            Ok(RuntimeValue::Boolean(s.lock().expect("set lock poisoned").shift_remove(&key).is_some()))
        }),
        "clear" => bound(receiver.clone(), "clear", move |_ev, _this, _args| {
            s.lock().expect("set lock poisoned").clear();
            Ok(RuntimeValue::Undefined)
        }),
        _ => RuntimeValue::Undefined,
    })
}

#[allow(dead_code)]
fn unused_format_number_reference() -> String {
    format_number(0.0)
}
