//! Runtime error construction.
//!
//! Errors are plain values carried by `ExecutionResult::Throw`, never Rust
//! panics or `Result::Err` — a host-language exception raised *by the
//! interpreter itself* (an internal bug) is the only thing that panics, and
//! user-visible failures are translated into one of these synthesized
//! objects before they ever reach a `Throw`.

use std::sync::Arc;

use indexmap::IndexMap;
use sharpts_common::Atom;

use crate::value::{ObjectData, PropertySlot, RuntimeValue, SuppressedErrorData};

fn error_object(kind: &str, message: impl Into<String>) -> RuntimeValue {
    let mut props = IndexMap::new();
    props.insert(Atom::new("name"), PropertySlot::value(RuntimeValue::string(kind.to_string())));
    props.insert(Atom::new("message"), PropertySlot::value(RuntimeValue::string(message.into())));
    props.insert(
        Atom::new("stack"),
        PropertySlot::value(RuntimeValue::string(format!("{kind}: <no native stack>"))),
    );
    RuntimeValue::object(ObjectData { props, symbol_props: Default::default(), is_fresh_literal: false })
}

pub fn reference_error(message: impl Into<String>) -> RuntimeValue {
    error_object("ReferenceError", message)
}

pub fn type_error(message: impl Into<String>) -> RuntimeValue {
    error_object("TypeError", message)
}

pub fn range_error(message: impl Into<String>) -> RuntimeValue {
    error_object("RangeError", message)
}

pub fn syntax_error(message: impl Into<String>) -> RuntimeValue {
    error_object("SyntaxError", message)
}

/// Thrown by `Promise.any` when every input promise rejected.
pub fn aggregate_error(errors: Vec<RuntimeValue>, message: impl Into<String>) -> RuntimeValue {
    let mut value = error_object("AggregateError", message);
    if let RuntimeValue::Object(obj) = &mut value {
        obj.lock()
            .expect("object lock poisoned")
            .props
            .insert(Atom::new("errors"), PropertySlot::value(RuntimeValue::array(errors)));
    }
    value
}

/// Wraps an error that was already pending when a `using` disposal itself
/// threw. Chained failures nest
/// rather than drop the outer error: disposing `c`, `b`, `a` in order,
/// where both `b` and `a`'s disposers throw while `c`'s error (or the
/// block's original error) is pending, yields
/// `SuppressedError{ error: a_err, suppressed: SuppressedError{ error:
/// b_err, suppressed: original } }`.
pub fn suppressed_error(error: RuntimeValue, suppressed: RuntimeValue) -> RuntimeValue {
    RuntimeValue::SuppressedError(Arc::new(SuppressedErrorData { error, suppressed }))
}

/// Filesystem-style errors additionally carry `code`/`syscall`/`path`/
/// `errno`; the core itself never raises these (no on-disk
/// I/O happens in the core), but the shape is exposed for a host runtime
/// translating its own I/O failures through the same channel.
pub fn fs_error(code: &str, syscall: &str, path: &str, errno: i32, message: impl Into<String>) -> RuntimeValue {
    let mut value = error_object("Error", message);
    if let RuntimeValue::Object(obj) = &mut value {
        let mut obj = obj.lock().expect("object lock poisoned");
        obj.props.insert(Atom::new("code"), PropertySlot::value(RuntimeValue::string(code.to_string())));
        obj.props.insert(Atom::new("syscall"), PropertySlot::value(RuntimeValue::string(syscall.to_string())));
        obj.props.insert(Atom::new("path"), PropertySlot::value(RuntimeValue::string(path.to_string())));
        obj.props.insert(Atom::new("errno"), PropertySlot::value(RuntimeValue::number(errno as f64)));
    }
    value
}
