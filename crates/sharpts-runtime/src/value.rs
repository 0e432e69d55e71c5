//! Boxed runtime value universe.
//!
//! Every mutable container is `Arc<Mutex<_>>` rather than `Rc<RefCell<_>>`.
//! A tree-walking interpreter with only a single active call stack would
//! normally reach for `Rc`/`RefCell` (the checker's own compile-time-only
//! `TypeEnvironment` does exactly that), but real generator suspension
//! means resuming a generator body on its own worker thread
//! (`sharpts-runtime::generator`), so every value a closure can capture
//! must be `Send + Sync`. Only one side of a generator's
//! rendezvous channel ever runs at a time, so the `Mutex`es are never actually contended — they pay
//! for thread-safety, not for concurrency.

use std::fmt;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use sharpts_common::Atom;
use sharpts_parser::ast::{Expr, FunctionModifiers, Param, Stmt};

use crate::environment::RuntimeEnvironment;
use crate::generator::{AsyncGeneratorHandle, GeneratorHandle};
use crate::promise::PromiseData;
use crate::symbol::SymbolId;

/// A property value or accessor pair, keyed by name on `ObjectData`/
/// `InstanceData`.
#[derive(Clone)]
pub enum PropertySlot {
    Value { value: RuntimeValue, writable: bool, enumerable: bool },
    Accessor { get: Option<FunctionRef>, set: Option<FunctionRef> },
}

impl PropertySlot {
    pub fn value(value: RuntimeValue) -> Self {
        PropertySlot::Value { value, writable: true, enumerable: true }
    }

    pub fn readonly(value: RuntimeValue) -> Self {
        PropertySlot::Value { value, writable: false, enumerable: true }
    }
}

#[derive(Default)]
pub struct ObjectData {
    pub props: IndexMap<Atom, PropertySlot>,
    pub symbol_props: FxHashMap<SymbolId, PropertySlot>,
    /// Marks an object literal as "fresh" for the checker's excess-property
    /// check; carried at runtime only for diagnostics
    /// tooling, never consulted by evaluation itself.
    pub is_fresh_literal: bool,
}

pub type ObjectRef = Arc<Mutex<ObjectData>>;
pub type ArrayRef = Arc<Mutex<Vec<RuntimeValue>>>;

#[derive(Clone, Debug)]
pub enum ClosureBody {
    Block(Arc<Stmt>),
}

/// A user-defined, arrow, async, generator, or (any combination of) async
/// generator function.
pub struct Closure {
    pub name: Option<Atom>,
    pub params: Vec<Param>,
    pub body: ClosureBody,
    pub env: RuntimeEnvironment,
    /// Arrow functions share the enclosing `this`; it is
    /// captured once, at closure-creation time.
    pub captured_this: Option<RuntimeValue>,
    pub is_arrow: bool,
    pub is_async: bool,
    pub is_generator: bool,
    pub modifiers: FunctionModifiers,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.name)
            .field("is_arrow", &self.is_arrow)
            .field("is_async", &self.is_async)
            .field("is_generator", &self.is_generator)
            .finish()
    }
}

/// A builtin implemented directly in Rust (`console.log`, `Math.*`, the
/// `resolve`/`reject` pair synthesized for a `Promise` executor, …). The
/// runtime host interface injects these the same way it
/// would inject any other value — the dispatch point for a call does not
/// distinguish a native function from a user one.
pub type NativeFn = Arc<
    dyn Fn(&mut crate::evaluator::Evaluator, RuntimeValue, &[RuntimeValue]) -> Result<RuntimeValue, crate::result::ExecutionResult>
        + Send
        + Sync,
>;

pub enum FunctionKind {
    User(Closure),
    Native(NativeFn),
}

pub struct FunctionData {
    pub name: Option<Atom>,
    pub kind: FunctionKind,
}

impl fmt::Debug for FunctionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FunctionKind::User(c) => c.fmt(f),
            FunctionKind::Native(_) => f.debug_struct("NativeFunction").field("name", &self.name).finish(),
        }
    }
}

pub type FunctionRef = Arc<FunctionData>;

impl FunctionData {
    pub fn user(closure: Closure) -> FunctionRef {
        Arc::new(FunctionData { name: closure.name.clone(), kind: FunctionKind::User(closure) })
    }

    pub fn native(name: &str, f: NativeFn) -> FunctionRef {
        Arc::new(FunctionData { name: Some(Atom::new(name)), kind: FunctionKind::Native(f) })
    }
}

/// One constructor-parameter-property or field declaration's initializer,
/// run in declared order when `new` allocates an instance.
#[derive(Clone, Debug)]
pub struct FieldInit {
    pub name: Atom,
    pub is_private: bool,
    pub initializer: Option<Arc<Expr>>,
}

pub struct ClassData {
    pub name: Atom,
    /// Lexical scope the class body closed over, reused to evaluate field
    /// initializers at construction time the same way a method closure
    /// reuses its own captured `env`.
    pub env: RuntimeEnvironment,
    pub constructor: Option<FunctionRef>,
    pub methods: FxHashMap<Atom, FunctionRef>,
    pub private_methods: FxHashMap<Atom, FunctionRef>,
    pub getters: FxHashMap<Atom, FunctionRef>,
    pub setters: FxHashMap<Atom, FunctionRef>,
    pub static_methods: FxHashMap<Atom, FunctionRef>,
    pub static_getters: FxHashMap<Atom, FunctionRef>,
    pub static_setters: FxHashMap<Atom, FunctionRef>,
    pub static_fields: Mutex<FxHashMap<Atom, RuntimeValue>>,
    pub field_inits: Vec<FieldInit>,
    pub superclass: Option<ClassRef>,
    pub is_abstract: bool,
    /// Methods declared under a computed `Symbol` key (`[Symbol.iterator]`,
    /// `[Symbol.dispose]`, …); bound onto each instance's `symbol_fields`
    /// at construction time since instance member lookup never consults
    /// the class method tables directly for symbol keys.
    pub symbol_methods: FxHashMap<SymbolId, FunctionRef>,
}

pub type ClassRef = Arc<ClassData>;

pub struct InstanceData {
    pub class: ClassRef,
    pub fields: FxHashMap<Atom, RuntimeValue>,
    pub symbol_fields: FxHashMap<SymbolId, RuntimeValue>,
    /// Keyed by the name-mangled `ClassName.#field` form so a private
    /// field is unreachable from outside the declaring class body.
    pub private_fields: FxHashMap<Atom, RuntimeValue>,
}

pub type InstanceRef = Arc<Mutex<InstanceData>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnumKind {
    Numeric,
    String,
    Heterogeneous,
}

pub struct EnumData {
    pub name: Atom,
    pub kind: EnumKind,
    pub members: Vec<(Atom, RuntimeValue)>,
    /// Numeric-enum reverse lookup (value -> name); absent for string enums
    /// and for `const enum`s, which never support reverse lookup.
    pub reverse: Option<FxHashMap<u64, Atom>>,
    pub is_const: bool,
}

pub type EnumRef = Arc<EnumData>;

pub struct NamespaceData {
    pub name: Atom,
    pub exports: Mutex<FxHashMap<Atom, RuntimeValue>>,
}

pub type NamespaceRef = Arc<NamespaceData>;

pub type MapRef = Arc<Mutex<IndexMap<MapKey, RuntimeValue>>>;
pub type SetRef = Arc<Mutex<IndexMap<MapKey, RuntimeValue>>>;
/// `WeakMap`/`WeakSet` entries are not reachable for iteration; the core
/// does not implement real garbage-collector-backed weak references (the
/// GC itself is a host concern), so these behave as ordinary maps/sets
/// that merely decline to expose iteration, matching the observable
/// surface user code can rely on.
pub type WeakMapRef = Arc<Mutex<FxHashMap<MapKey, RuntimeValue>>>;
pub type WeakSetRef = Arc<Mutex<FxHashMap<MapKey, ()>>>;

/// `Map`/`Set` keys compare by SameValueZero, which for our value universe
/// means structural equality on primitives and identity on everything
/// else.
#[derive(Clone, Debug)]
pub enum MapKey {
    Null,
    Undefined,
    Boolean(bool),
    Number(u64),
    String(Arc<str>),
    BigInt(Arc<str>),
    Symbol(SymbolId),
    ObjectIdentity(usize),
}

impl PartialEq for MapKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MapKey::Null, MapKey::Null) | (MapKey::Undefined, MapKey::Undefined) => true,
            (MapKey::Boolean(a), MapKey::Boolean(b)) => a == b,
            (MapKey::Number(a), MapKey::Number(b)) => a == b,
            (MapKey::String(a), MapKey::String(b)) => a == b,
            (MapKey::BigInt(a), MapKey::BigInt(b)) => a == b,
            (MapKey::Symbol(a), MapKey::Symbol(b)) => a == b,
            (MapKey::ObjectIdentity(a), MapKey::ObjectIdentity(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for MapKey {}
impl std::hash::Hash for MapKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            MapKey::Null | MapKey::Undefined => {}
            MapKey::Boolean(b) => b.hash(state),
            MapKey::Number(n) => n.hash(state),
            MapKey::String(s) => s.hash(state),
            MapKey::BigInt(s) => s.hash(state),
            MapKey::Symbol(s) => s.hash(state),
            MapKey::ObjectIdentity(p) => p.hash(state),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DateData {
    /// Milliseconds since the Unix epoch, as IEEE-754 (`NaN` for an
    /// invalid date), matching `Date`'s own internal representation.
    pub epoch_millis: f64,
}
pub type DateRef = Arc<Mutex<DateData>>;

#[derive(Clone, Debug)]
pub struct RegexData {
    pub pattern: String,
    pub flags: String,
    pub last_index: usize,
}
pub type RegexRef = Arc<Mutex<RegexData>>;

/// Backing store for `ArrayBuffer`/typed-array views. The core only needs
/// enough to dispatch indexed reads the way it dispatches `Array` reads;
/// actual numeric-conversion semantics per typed-array kind are a thin,
/// mechanically-repetitive host concern layered on top.
pub type BufferRef = Arc<Mutex<Vec<u8>>>;

#[derive(Clone)]
pub struct SuppressedErrorData {
    pub error: RuntimeValue,
    pub suppressed: RuntimeValue,
}
pub type SuppressedErrorRef = Arc<SuppressedErrorData>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IteratorResultData {
    pub done: bool,
}

/// The boxed value universe.
#[derive(Clone)]
pub enum RuntimeValue {
    Null,
    Undefined,
    Boolean(bool),
    /// IEEE-754 double, stored as bits so the enum can still be cloned and
    /// compared cheaply without pulling in a `PartialOrd`-only numeric
    /// wrapper; arithmetic converts via `f64::from_bits`/`to_bits` at the
    /// call site.
    Number(u64),
    String(Arc<str>),
    BigInt(Arc<str>),
    Symbol(SymbolId, Option<Atom>),
    Array(ArrayRef),
    Object(ObjectRef),
    Instance(InstanceRef),
    Function(FunctionRef),
    Class(ClassRef),
    Enum(EnumRef),
    Namespace(NamespaceRef),
    Promise(Arc<PromiseData>),
    Generator(Arc<GeneratorHandle>),
    AsyncGenerator(Arc<AsyncGeneratorHandle>),
    IteratorResult(Box<RuntimeValue>, IteratorResultData),
    Map(MapRef),
    Set(SetRef),
    WeakMap(WeakMapRef),
    WeakSet(WeakSetRef),
    Date(DateRef),
    Regex(RegexRef),
    TypedBuffer(BufferRef),
    SuppressedError(SuppressedErrorRef),
}

impl RuntimeValue {
    pub fn number(n: f64) -> Self {
        RuntimeValue::Number(n.to_bits())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RuntimeValue::Number(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }

    pub fn string(s: impl Into<Arc<str>>) -> Self {
        RuntimeValue::String(s.into())
    }

    pub fn array(values: Vec<RuntimeValue>) -> Self {
        RuntimeValue::Array(Arc::new(Mutex::new(values)))
    }

    pub fn object(data: ObjectData) -> Self {
        RuntimeValue::Object(Arc::new(Mutex::new(data)))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, RuntimeValue::Null | RuntimeValue::Undefined)
    }

    /// ECMAScript `ToBoolean`, needed for `if`/`while`/`&&`/`||`/`?:`
    /// condition evaluation.
    pub fn to_boolean(&self) -> bool {
        match self {
            RuntimeValue::Null | RuntimeValue::Undefined => false,
            RuntimeValue::Boolean(b) => *b,
            RuntimeValue::Number(bits) => {
                let n = f64::from_bits(*bits);
                n != 0.0 && !n.is_nan()
            }
            RuntimeValue::String(s) => !s.is_empty(),
            RuntimeValue::BigInt(digits) => digits.trim_start_matches('-') != "0",
            _ => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            RuntimeValue::Undefined => "undefined",
            RuntimeValue::Null => "object",
            RuntimeValue::Boolean(_) => "boolean",
            RuntimeValue::Number(_) => "number",
            RuntimeValue::String(_) => "string",
            RuntimeValue::BigInt(_) => "bigint",
            RuntimeValue::Symbol(..) => "symbol",
            RuntimeValue::Function(_) | RuntimeValue::Class(_) => "function",
            _ => "object",
        }
    }

    /// Loose display form used by template literals and `String(x)`.
    pub fn display_string(&self) -> String {
        match self {
            RuntimeValue::Null => "null".to_string(),
            RuntimeValue::Undefined => "undefined".to_string(),
            RuntimeValue::Boolean(b) => b.to_string(),
            RuntimeValue::Number(bits) => format_number(f64::from_bits(*bits)),
            RuntimeValue::String(s) => s.to_string(),
            RuntimeValue::BigInt(d) => d.to_string(),
            RuntimeValue::Symbol(_, desc) => format!("Symbol({})", desc.as_ref().map(|a| a.to_string()).unwrap_or_default()),
            RuntimeValue::Array(items) => items
                .lock()
                .expect("array lock poisoned")
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.display_string() })
                .collect::<Vec<_>>()
                .join(","),
            RuntimeValue::Object(_) => "[object Object]".to_string(),
            RuntimeValue::Instance(inst) => {
                format!("[object {}]", inst.lock().expect("instance lock poisoned").class.name)
            }
            RuntimeValue::Function(f) => format!("function {}() {{ [native code] }}", f.name.as_ref().map(|n| n.to_string()).unwrap_or_default()),
            RuntimeValue::Class(c) => format!("class {} {{ }}", c.name),
            RuntimeValue::Enum(e) => e.name.to_string(),
            RuntimeValue::Namespace(n) => n.name.to_string(),
            RuntimeValue::Promise(_) => "[object Promise]".to_string(),
            RuntimeValue::Generator(_) => "[object Generator]".to_string(),
            RuntimeValue::AsyncGenerator(_) => "[object AsyncGenerator]".to_string(),
            RuntimeValue::IteratorResult(value, result) => {
                format!("{{ value: {}, done: {} }}", value.display_string(), result.done)
            }
            RuntimeValue::Map(_) => "[object Map]".to_string(),
            RuntimeValue::Set(_) => "[object Set]".to_string(),
            RuntimeValue::WeakMap(_) => "[object WeakMap]".to_string(),
            RuntimeValue::WeakSet(_) => "[object WeakSet]".to_string(),
            RuntimeValue::Date(d) => format_date(d.lock().expect("date lock poisoned").epoch_millis),
            RuntimeValue::Regex(r) => {
                let r = r.lock().expect("regex lock poisoned");
                format!("/{}/{}", r.pattern, r.flags)
            }
            RuntimeValue::TypedBuffer(_) => "[object ArrayBuffer]".to_string(),
            RuntimeValue::SuppressedError(e) => format!("SuppressedError: {}", e.error.display_string()),
        }
    }
}

pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if n == 0.0 {
        if n.is_sign_negative() { "0".to_string() } else { "0".to_string() }
    } else {
        let mut s = format!("{n}");
        if s.ends_with(".0") {
            s.truncate(s.len() - 2);
        }
        s
    }
}

fn format_date(epoch_millis: f64) -> String {
    if epoch_millis.is_nan() {
        return "Invalid Date".to_string();
    }
    format!("[epoch-ms {epoch_millis}]")
}
