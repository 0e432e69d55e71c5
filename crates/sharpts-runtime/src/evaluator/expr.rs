//! Expression evaluation.
//!
//! Every function here returns `Result<RuntimeValue, ExecutionResult>`:
//! `Ok` is an ordinary value, `Err` is an abrupt completion. Most of the
//! time that is `Throw` (an exception), but resuming a suspended `yield`
//! with `.return(v)`/`.throw(v)` injects `Return`/`Throw` directly at the
//! expression position (`crate::generator`), so callers that bridge back
//! into statement execution must forward `Err` untouched rather than
//! assume it is always a throw.

use std::sync::Arc;

use indexmap::IndexMap;
use sharpts_common::Atom;
use sharpts_parser::ast::{
    ArrayElement, BinaryOp, Expr, ExprKind, Ident, Literal, LogicalOp, ObjectProperty, PropertyKey, PropertyKind,
    SuperKind, UnaryOp, UpdateOp,
};

use crate::environment::{AssignOutcome, BindingKind, RuntimeEnvironment};
use crate::errors;
use crate::evaluator::Evaluator;
use crate::result::ExecutionResult;
use crate::value::{format_number, ClosureBody, FieldInit, FunctionData, ObjectData, PropertySlot, RuntimeValue};

type EvalResult = Result<RuntimeValue, ExecutionResult>;

fn throw(v: RuntimeValue) -> ExecutionResult {
    ExecutionResult::Throw(v)
}

pub(crate) enum PKey {
    Name(Atom),
    Symbol(crate::symbol::SymbolId),
}

impl Evaluator {
    pub fn eval_expr(&mut self, env: &RuntimeEnvironment, expr: &Expr) -> EvalResult {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(eval_literal(lit)),
            ExprKind::Regex { pattern, flags } => Ok(RuntimeValue::Regex(Arc::new(std::sync::Mutex::new(
                crate::value::RegexData { pattern: pattern.clone(), flags: flags.clone(), last_index: 0 },
            )))),
            ExprKind::Variable(ident) => self.lookup(env, ident),
            ExprKind::Grouping(inner) => self.eval_expr(env, inner),
            ExprKind::Unary { op, operand } => self.eval_unary(env, *op, operand),
            ExprKind::Binary { op, left, right } => self.eval_binary(env, *op, left, right),
            ExprKind::Logical { op, left, right } => self.eval_logical(env, *op, left, right),
            ExprKind::NullishCoalescing { left, right } => {
                let l = self.eval_expr(env, left)?;
                if l.is_nullish() { self.eval_expr(env, right) } else { Ok(l) }
            }
            ExprKind::Ternary { condition, then_branch, else_branch } => {
                if self.eval_expr(env, condition)?.to_boolean() {
                    self.eval_expr(env, then_branch)
                } else {
                    self.eval_expr(env, else_branch)
                }
            }
            ExprKind::Assign { target, value } => {
                let v = self.eval_expr(env, value)?;
                self.assign_target(env, target, v)
            }
            ExprKind::CompoundAssign { op, target, value } => {
                let current = self.eval_expr(env, target)?;
                let rhs = self.eval_expr(env, value)?;
                let result = binary_op(*op, &current, &rhs).map_err(throw)?;
                self.assign_target(env, target, result)
            }
            ExprKind::LogicalAssign { op, narrow_undefined_only, target, value } => {
                let current = self.eval_expr(env, target)?;
                let should_assign = match op {
                    LogicalOp::And => current.to_boolean(),
                    LogicalOp::Or => {
                        if *narrow_undefined_only {
                            matches!(current, RuntimeValue::Undefined)
                        } else {
                            !current.to_boolean()
                        }
                    }
                };
                if should_assign {
                    let v = self.eval_expr(env, value)?;
                    self.assign_target(env, target, v)
                } else {
                    Ok(current)
                }
            }
            ExprKind::Call { callee, args, optional, .. } => self.eval_call(env, callee, args, *optional),
            ExprKind::Get { object, name, optional } => {
                let obj = self.eval_expr(env, object)?;
                if *optional && obj.is_nullish() {
                    return Ok(RuntimeValue::Undefined);
                }
                self.get_property(&obj, name)
            }
            ExprKind::Set { object, name, value } => {
                let obj = self.eval_expr(env, object)?;
                let v = self.eval_expr(env, value)?;
                self.set_property(&obj, name, v.clone())?;
                Ok(v)
            }
            ExprKind::GetIndex { object, index, optional } => {
                let obj = self.eval_expr(env, object)?;
                if *optional && obj.is_nullish() {
                    return Ok(RuntimeValue::Undefined);
                }
                let idx = self.eval_expr(env, index)?;
                self.get_index(&obj, &idx)
            }
            ExprKind::SetIndex { object, index, value } => {
                let obj = self.eval_expr(env, object)?;
                let idx = self.eval_expr(env, index)?;
                let v = self.eval_expr(env, value)?;
                self.set_index(&obj, &idx, v.clone())?;
                Ok(v)
            }
            ExprKind::GetPrivate { object, name } => {
                let obj = self.eval_expr(env, object)?;
                self.get_private(&obj, name)
            }
            ExprKind::SetPrivate { object, name, value } => {
                let obj = self.eval_expr(env, object)?;
                let v = self.eval_expr(env, value)?;
                self.set_private(&obj, name, v.clone())?;
                Ok(v)
            }
            ExprKind::CallPrivate { object, name, args } => {
                let obj = self.eval_expr(env, object)?;
                let method = self.get_private(&obj, name)?;
                let argv = self.eval_args(env, args)?;
                self.call_value(&method, obj, &argv)
            }
            ExprKind::This => Ok(self.this_value.clone().unwrap_or(RuntimeValue::Undefined)),
            ExprKind::Super(kind) => match kind {
                SuperKind::ConstructorTarget | SuperKind::MethodBound => {
                    Ok(self.this_value.clone().unwrap_or(RuntimeValue::Undefined))
                }
            },
            ExprKind::New { callee, args, .. } => {
                let ctor = self.eval_expr(env, callee)?;
                let argv = self.eval_args(env, args)?;
                self.construct(&ctor, &argv)
            }
            ExprKind::ArrayLiteral(elements) => self.eval_array_literal(env, elements),
            ExprKind::ObjectLiteral(props) => self.eval_object_literal(env, props),
            ExprKind::ArrowFunction(arrow) => Ok(self.make_arrow(env, arrow)),
            ExprKind::ClassExpr(decl) => self.eval_class_decl(env, decl),
            ExprKind::TemplateLiteral { quasis, exprs } => {
                let mut out = String::new();
                for (i, q) in quasis.iter().enumerate() {
                    out.push_str(q);
                    if let Some(e) = exprs.get(i) {
                        out.push_str(&self.eval_expr(env, e)?.display_string());
                    }
                }
                Ok(RuntimeValue::string(out))
            }
            ExprKind::TaggedTemplateLiteral { tag, cooked, raw, exprs } => {
                let tag_fn = self.eval_expr(env, tag)?;
                let strings = RuntimeValue::array(
                    cooked.iter().map(|s| s.clone().map(RuntimeValue::string).unwrap_or(RuntimeValue::Undefined)).collect(),
                );
                if let RuntimeValue::Array(arr) = &strings {
                    let raw_arr = RuntimeValue::array(raw.iter().cloned().map(RuntimeValue::string).collect());
                    let mut props = IndexMap::new();
                    props.insert(Atom::new("raw"), PropertySlot::value(raw_arr));
                    if let RuntimeValue::Array(items) = &strings {
                        let _ = items;
                    }
                    let _ = arr;
                    let obj = RuntimeValue::object(ObjectData { props, symbol_props: Default::default(), is_fresh_literal: true });
                    let mut argv = vec![obj];
                    for e in exprs {
                        argv.push(self.eval_expr(env, e)?);
                    }
                    return self.call_value(&tag_fn, RuntimeValue::Undefined, &argv);
                }
                unreachable!()
            }
            ExprKind::Spread(inner) => self.eval_expr(env, inner),
            ExprKind::TypeAssertion { expr, .. } => self.eval_expr(env, expr),
            ExprKind::Satisfies { expr, .. } => self.eval_expr(env, expr),
            ExprKind::NonNullAssertion(inner) => {
                let v = self.eval_expr(env, inner)?;
                if v.is_nullish() {
                    Err(throw(errors::type_error("non-null assertion on null or undefined")))
                } else {
                    Ok(v)
                }
            }
            ExprKind::Await(inner) => {
                let v = self.eval_expr(env, inner)?;
                self.await_value(v)
            }
            ExprKind::Yield { value, delegate } => {
                let v = match value {
                    Some(e) => self.eval_expr(env, e)?,
                    None => RuntimeValue::Undefined,
                };
                if *delegate {
                    self.yield_star(env, v)
                } else {
                    self.do_yield(v)
                }
            }
            ExprKind::DynamicImport(specifier) => {
                let spec_val = self.eval_expr(env, specifier)?;
                let spec = spec_val.display_string();
                match self.loader.clone().load(&spec) {
                    Ok(module) => Ok(RuntimeValue::Promise(crate::promise::PromiseData::pending_resolved(
                        crate::loader::module_to_value(&module),
                    ))),
                    Err(e) => Ok(RuntimeValue::Promise(crate::promise::PromiseData::pending_rejected(errors::type_error(e)))),
                }
            }
            ExprKind::ImportMeta => {
                let mut props = IndexMap::new();
                props.insert(Atom::new("url"), PropertySlot::value(RuntimeValue::string("sharpts://entry")));
                Ok(RuntimeValue::object(ObjectData { props, symbol_props: Default::default(), is_fresh_literal: false }))
            }
            ExprKind::Delete(target) => self.eval_delete(env, target),
            ExprKind::PrefixUpdate { op, operand } => self.eval_update(env, *op, operand, true),
            ExprKind::PostfixUpdate { op, operand } => self.eval_update(env, *op, operand, false),
            ExprKind::SequenceTemp(_) => Ok(RuntimeValue::Undefined),
        }
    }

    fn lookup(&mut self, env: &RuntimeEnvironment, ident: &Ident) -> EvalResult {
        env.get(&ident.name).ok_or_else(|| throw(errors::reference_error(format!("{} is not defined", ident.name))))
    }

    fn eval_args(&mut self, env: &RuntimeEnvironment, args: &[Expr]) -> Result<Vec<RuntimeValue>, ExecutionResult> {
        let mut out = Vec::with_capacity(args.len());
        for a in args {
            if let ExprKind::Spread(inner) = &a.kind {
                let v = self.eval_expr(env, inner)?;
                out.extend(self.iterate_to_vec(&v)?);
            } else {
                out.push(self.eval_expr(env, a)?);
            }
        }
        Ok(out)
    }

    fn eval_array_literal(&mut self, env: &RuntimeEnvironment, elements: &[ArrayElement]) -> EvalResult {
        let mut out = Vec::with_capacity(elements.len());
        for el in elements {
            match el {
                ArrayElement::Item(e) => out.push(self.eval_expr(env, e)?),
                ArrayElement::Hole => out.push(RuntimeValue::Undefined),
                ArrayElement::Spread(e) => {
                    let v = self.eval_expr(env, e)?;
                    out.extend(self.iterate_to_vec(&v)?);
                }
            }
        }
        Ok(RuntimeValue::array(out))
    }

    fn eval_object_literal(&mut self, env: &RuntimeEnvironment, properties: &[ObjectProperty]) -> EvalResult {
        let mut props = IndexMap::new();
        let mut symbol_props: rustc_hash::FxHashMap<crate::symbol::SymbolId, PropertySlot> = Default::default();
        for p in properties {
            match p.kind {
                PropertyKind::Spread => {
                    let v = self.eval_expr(env, p.value.as_ref().expect("spread property carries a value"))?;
                    if let RuntimeValue::Object(src) = &v {
                        let src = src.lock().expect("object lock poisoned");
                        for (k, slot) in src.props.iter() {
                            props.insert(k.clone(), slot.clone());
                        }
                        for (k, slot) in src.symbol_props.iter() {
                            symbol_props.insert(*k, slot.clone());
                        }
                    }
                }
                PropertyKind::Get => {
                    let key = self.property_key(env, &p.key)?;
                    let f = self.eval_expr(env, p.value.as_ref().expect("getter carries a function expr"))?;
                    let getter = as_function(f);
                    match key {
                        PKey::Name(name) => {
                            let entry = props.entry(name).or_insert_with(|| PropertySlot::Accessor { get: None, set: None });
                            if let PropertySlot::Accessor { get, .. } = entry {
                                *get = getter;
                            } else {
                                *entry = PropertySlot::Accessor { get: getter, set: None };
                            }
                        }
                        PKey::Symbol(sym) => {
                            let entry = symbol_props.entry(sym).or_insert_with(|| PropertySlot::Accessor { get: None, set: None });
                            if let PropertySlot::Accessor { get, .. } = entry {
                                *get = getter;
                            } else {
                                *entry = PropertySlot::Accessor { get: getter, set: None };
                            }
                        }
                    }
                }
                PropertyKind::Set => {
                    let key = self.property_key(env, &p.key)?;
                    let f = self.eval_expr(env, p.value.as_ref().expect("setter carries a function expr"))?;
                    let setter = as_function(f);
                    match key {
                        PKey::Name(name) => {
                            let entry = props.entry(name).or_insert_with(|| PropertySlot::Accessor { get: None, set: None });
                            if let PropertySlot::Accessor { set, .. } = entry {
                                *set = setter;
                            } else {
                                *entry = PropertySlot::Accessor { get: None, set: setter };
                            }
                        }
                        PKey::Symbol(sym) => {
                            let entry = symbol_props.entry(sym).or_insert_with(|| PropertySlot::Accessor { get: None, set: None });
                            if let PropertySlot::Accessor { set, .. } = entry {
                                *set = setter;
                            } else {
                                *entry = PropertySlot::Accessor { get: None, set: setter };
                            }
                        }
                    }
                }
                PropertyKind::Init | PropertyKind::Shorthand | PropertyKind::Method => {
                    let key = self.property_key(env, &p.key)?;
                    let v = match &p.value {
                        Some(e) => self.eval_expr(env, e)?,
                        None => match &p.key {
                            PropertyKey::Identifier(n) => env
                                .get(n)
                                .ok_or_else(|| throw(errors::reference_error(format!("{n} is not defined"))))?,
                            _ => RuntimeValue::Undefined,
                        },
                    };
                    match key {
                        PKey::Name(name) => {
                            props.insert(name, PropertySlot::value(v));
                        }
                        PKey::Symbol(sym) => {
                            symbol_props.insert(sym, PropertySlot::value(v));
                        }
                    }
                }
            }
        }
        Ok(RuntimeValue::object(ObjectData { props, symbol_props, is_fresh_literal: true }))
    }

    /// Evaluates a property key, routing a computed key that evaluates to
    /// a `Symbol` into the object's separate symbol-keyed table instead of
    /// stringifying it — the path `using`-disposable object literals like
    /// `{ [Symbol.dispose]() { ... } }` rely on.
    pub(crate) fn property_key(&mut self, env: &RuntimeEnvironment, key: &PropertyKey) -> Result<PKey, ExecutionResult> {
        Ok(match key {
            PropertyKey::Identifier(a) => PKey::Name(a.clone()),
            PropertyKey::StringLiteral(s) => PKey::Name(Atom::new(s)),
            PropertyKey::NumberLiteral(n) => PKey::Name(Atom::new(format_number(*n))),
            PropertyKey::Computed(e) => match self.eval_expr(env, e)? {
                RuntimeValue::Symbol(sym, _) => PKey::Symbol(sym),
                other => PKey::Name(Atom::new(other.display_string())),
            },
        })
    }

    pub(crate) fn property_key_name(&mut self, env: &RuntimeEnvironment, key: &PropertyKey) -> Result<Atom, ExecutionResult> {
        Ok(match key {
            PropertyKey::Identifier(a) => a.clone(),
            PropertyKey::StringLiteral(s) => Atom::new(s),
            PropertyKey::NumberLiteral(n) => Atom::new(format_number(*n)),
            PropertyKey::Computed(e) => Atom::new(self.eval_expr(env, e)?.display_string()),
        })
    }

    fn make_arrow(&mut self, env: &RuntimeEnvironment, arrow: &sharpts_parser::ast::ArrowFunction) -> RuntimeValue {
        let body = match &arrow.body {
            sharpts_parser::ast::ArrowBody::Block(b) => ClosureBody::Block(Arc::new((**b).clone())),
            sharpts_parser::ast::ArrowBody::Expr(e) => {
                let ret = sharpts_parser::ast::Stmt { span: e.span, kind: sharpts_parser::ast::StmtKind::Return(Some((**e).clone())) };
                ClosureBody::Block(Arc::new(ret))
            }
        };
        let closure = crate::value::Closure {
            name: None,
            params: arrow.params.clone(),
            body,
            env: env.clone(),
            captured_this: self.this_value.clone(),
            is_arrow: true,
            is_async: arrow.flags.is_async,
            is_generator: arrow.flags.is_generator,
            modifiers: Default::default(),
        };
        RuntimeValue::Function(FunctionData::user(closure))
    }

    fn eval_call(&mut self, env: &RuntimeEnvironment, callee: &Expr, args: &[Expr], optional: bool) -> EvalResult {
        // `super(...)` resolves to the superclass constructor bound to the
        // current `this`.
        if let ExprKind::Super(SuperKind::ConstructorTarget) = &callee.kind {
            let argv = self.eval_args(env, args)?;
            return self.call_super_constructor(env, &argv);
        }
        let (this_for_call, func) = match &callee.kind {
            ExprKind::Get { object, name, optional: member_opt } => {
                if let ExprKind::Super(SuperKind::MethodBound) = &object.kind {
                    let this_val = self.this_value.clone().unwrap_or(RuntimeValue::Undefined);
                    let f = self.super_method(env, name)?;
                    (this_val, f)
                } else {
                    let obj = self.eval_expr(env, object)?;
                    if *member_opt && obj.is_nullish() {
                        return Ok(RuntimeValue::Undefined);
                    }
                    let f = self.get_property(&obj, name)?;
                    (obj, f)
                }
            }
            ExprKind::GetIndex { object, index, optional: member_opt } => {
                let obj = self.eval_expr(env, object)?;
                if *member_opt && obj.is_nullish() {
                    return Ok(RuntimeValue::Undefined);
                }
                let idx = self.eval_expr(env, index)?;
                let f = self.get_index(&obj, &idx)?;
                (obj, f)
            }
            _ => (RuntimeValue::Undefined, self.eval_expr(env, callee)?),
        };
        if optional && func.is_nullish() {
            return Ok(RuntimeValue::Undefined);
        }
        let argv = self.eval_args(env, args)?;
        self.call_value(&func, this_for_call, &argv)
    }

    fn eval_delete(&mut self, env: &RuntimeEnvironment, target: &Expr) -> EvalResult {
        match &target.kind {
            ExprKind::Get { object, name, .. } => {
                let obj = self.eval_expr(env, object)?;
                if let RuntimeValue::Object(o) = &obj {
                    o.lock().expect("object lock poisoned").props.shift_remove(name);
                }
                Ok(RuntimeValue::Boolean(true))
            }
            ExprKind::GetIndex { object, index, .. } => {
                let obj = self.eval_expr(env, object)?;
                let idx = self.eval_expr(env, index)?;
                if let RuntimeValue::Object(o) = &obj {
                    let key = Atom::new(idx.display_string());
                    o.lock().expect("object lock poisoned").props.shift_remove(&key);
                }
                Ok(RuntimeValue::Boolean(true))
            }
            _ => Ok(RuntimeValue::Boolean(true)),
        }
    }

    fn eval_update(&mut self, env: &RuntimeEnvironment, op: UpdateOp, operand: &Expr, prefix: bool) -> EvalResult {
        let current = self.eval_expr(env, operand)?;
        let n = current.as_f64().unwrap_or(f64::NAN);
        let updated = match op {
            UpdateOp::Increment => n + 1.0,
            UpdateOp::Decrement => n - 1.0,
        };
        let updated_val = RuntimeValue::number(updated);
        self.assign_target(env, operand, updated_val.clone())?;
        Ok(if prefix { updated_val } else { RuntimeValue::number(n) })
    }

    fn eval_unary(&mut self, env: &RuntimeEnvironment, op: UnaryOp, operand: &Expr) -> EvalResult {
        if op == UnaryOp::TypeOf {
            if let ExprKind::Variable(ident) = &operand.kind {
                if env.get(&ident.name).is_none() {
                    return Ok(RuntimeValue::string("undefined"));
                }
            }
        }
        let v = self.eval_expr(env, operand)?;
        Ok(match op {
            UnaryOp::Neg => RuntimeValue::number(-v.as_f64().unwrap_or(f64::NAN)),
            UnaryOp::Plus => RuntimeValue::number(v.as_f64().unwrap_or(f64::NAN)),
            UnaryOp::Not => RuntimeValue::Boolean(!v.to_boolean()),
            UnaryOp::BitNot => RuntimeValue::number(!(to_i32(v.as_f64().unwrap_or(0.0))) as f64),
            UnaryOp::TypeOf => RuntimeValue::string(v.type_of()),
            UnaryOp::Void => RuntimeValue::Undefined,
        })
    }

    fn eval_binary(&mut self, env: &RuntimeEnvironment, op: BinaryOp, left: &Expr, right: &Expr) -> EvalResult {
        if op == BinaryOp::InstanceOf {
            let l = self.eval_expr(env, left)?;
            let r = self.eval_expr(env, right)?;
            return Ok(RuntimeValue::Boolean(self.instance_of(&l, &r)));
        }
        if op == BinaryOp::In {
            let l = self.eval_expr(env, left)?;
            let r = self.eval_expr(env, right)?;
            let key = Atom::new(l.display_string());
            let has = match &r {
                RuntimeValue::Object(o) => o.lock().expect("object lock poisoned").props.contains_key(&key),
                RuntimeValue::Instance(i) => {
                    let i = i.lock().expect("instance lock poisoned");
                    i.fields.contains_key(&key) || class_has_member(&i.class, &key)
                }
                _ => false,
            };
            return Ok(RuntimeValue::Boolean(has));
        }
        let l = self.eval_expr(env, left)?;
        let r = self.eval_expr(env, right)?;
        binary_op(op, &l, &r).map_err(throw)
    }

    fn eval_logical(&mut self, env: &RuntimeEnvironment, op: LogicalOp, left: &Expr, right: &Expr) -> EvalResult {
        let l = self.eval_expr(env, left)?;
        match op {
            LogicalOp::And => if l.to_boolean() { self.eval_expr(env, right) } else { Ok(l) },
            LogicalOp::Or => if l.to_boolean() { Ok(l) } else { self.eval_expr(env, right) },
        }
    }

    fn assign_target(&mut self, env: &RuntimeEnvironment, target: &Expr, value: RuntimeValue) -> EvalResult {
        match &target.kind {
            ExprKind::Variable(ident) => match env.assign(&ident.name, value.clone()) {
                AssignOutcome::Ok | AssignOutcome::ReadOnlySilent => Ok(value),
                AssignOutcome::ReadOnlyStrict => {
                    Err(throw(errors::type_error(format!("Assignment to constant variable '{}'.", ident.name))))
                }
                AssignOutcome::Undeclared => {
                    self.global.define(ident.name.clone(), value.clone(), BindingKind::Var);
                    Ok(value)
                }
            },
            ExprKind::Get { object, name, .. } => {
                let obj = self.eval_expr(env, object)?;
                self.set_property(&obj, name, value.clone())?;
                Ok(value)
            }
            ExprKind::GetIndex { object, index, .. } => {
                let obj = self.eval_expr(env, object)?;
                let idx = self.eval_expr(env, index)?;
                self.set_index(&obj, &idx, value.clone())?;
                Ok(value)
            }
            ExprKind::GetPrivate { object, name } => {
                let obj = self.eval_expr(env, object)?;
                self.set_private(&obj, name, value.clone())?;
                Ok(value)
            }
            ExprKind::Grouping(inner) => self.assign_target(env, inner, value),
            _ => Err(throw(errors::syntax_error("invalid assignment target"))),
        }
    }
}

fn as_function(v: RuntimeValue) -> Option<crate::value::FunctionRef> {
    match v {
        RuntimeValue::Function(f) => Some(f),
        _ => None,
    }
}

fn class_has_member(class: &crate::value::ClassRef, name: &Atom) -> bool {
    class.methods.contains_key(name)
        || class.getters.contains_key(name)
        || class.setters.contains_key(name)
        || class.superclass.as_ref().is_some_and(|s| class_has_member(s, name))
}

fn eval_literal(lit: &Literal) -> RuntimeValue {
    match lit {
        Literal::Null => RuntimeValue::Null,
        Literal::Undefined => RuntimeValue::Undefined,
        Literal::Bool(b) => RuntimeValue::Boolean(*b),
        Literal::Number(n) => RuntimeValue::number(*n),
        Literal::BigInt(digits) => RuntimeValue::BigInt(Arc::from(digits.as_str())),
        Literal::Str(s) => RuntimeValue::string(s.clone()),
    }
}

pub fn to_i32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    (n.trunc() as i64 & 0xFFFF_FFFF) as u32 as i32
}

pub fn to_u32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    (n.trunc() as i64 & 0xFFFF_FFFF) as u32
}

/// Pure numeric/string/comparison binary operators;
/// `in`/`instanceof` need evaluator context and are handled by the caller.
pub fn binary_op(op: BinaryOp, l: &RuntimeValue, r: &RuntimeValue) -> Result<RuntimeValue, RuntimeValue> {
    use BinaryOp::*;
    Ok(match op {
        Add => {
            if matches!(l, RuntimeValue::String(_)) || matches!(r, RuntimeValue::String(_)) {
                RuntimeValue::string(format!("{}{}", l.display_string(), r.display_string()))
            } else {
                RuntimeValue::number(num(l) + num(r))
            }
        }
        Sub => RuntimeValue::number(num(l) - num(r)),
        Mul => RuntimeValue::number(num(l) * num(r)),
        Div => RuntimeValue::number(num(l) / num(r)),
        Mod => RuntimeValue::number(num(l) % num(r)),
        Pow => RuntimeValue::number(num(l).powf(num(r))),
        Eq => RuntimeValue::Boolean(loose_eq(l, r)),
        NotEq => RuntimeValue::Boolean(!loose_eq(l, r)),
        StrictEq => RuntimeValue::Boolean(strict_eq(l, r)),
        StrictNotEq => RuntimeValue::Boolean(!strict_eq(l, r)),
        Lt => RuntimeValue::Boolean(num(l) < num(r)),
        LtEq => RuntimeValue::Boolean(num(l) <= num(r)),
        Gt => RuntimeValue::Boolean(num(l) > num(r)),
        GtEq => RuntimeValue::Boolean(num(l) >= num(r)),
        Shl => RuntimeValue::number((to_i32(num(l)) << (to_u32(num(r)) & 31)) as f64),
        Shr => RuntimeValue::number((to_i32(num(l)) >> (to_u32(num(r)) & 31)) as f64),
        UShr => RuntimeValue::number(((to_u32(num(l))) >> (to_u32(num(r)) & 31)) as f64),
        BitAnd => RuntimeValue::number((to_i32(num(l)) & to_i32(num(r))) as f64),
        BitOr => RuntimeValue::number((to_i32(num(l)) | to_i32(num(r))) as f64),
        BitXor => RuntimeValue::number((to_i32(num(l)) ^ to_i32(num(r))) as f64),
        In | InstanceOf => unreachable!("handled by eval_binary directly"),
    })
}

fn num(v: &RuntimeValue) -> f64 {
    match v {
        RuntimeValue::Number(bits) => f64::from_bits(*bits),
        RuntimeValue::Boolean(b) => if *b { 1.0 } else { 0.0 },
        RuntimeValue::Null => 0.0,
        RuntimeValue::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        RuntimeValue::Undefined => f64::NAN,
        _ => f64::NAN,
    }
}

fn strict_eq(l: &RuntimeValue, r: &RuntimeValue) -> bool {
    match (l, r) {
        (RuntimeValue::Null, RuntimeValue::Null) | (RuntimeValue::Undefined, RuntimeValue::Undefined) => true,
        (RuntimeValue::Boolean(a), RuntimeValue::Boolean(b)) => a == b,
        (RuntimeValue::Number(a), RuntimeValue::Number(b)) => f64::from_bits(*a) == f64::from_bits(*b),
        (RuntimeValue::String(a), RuntimeValue::String(b)) => a == b,
        (RuntimeValue::BigInt(a), RuntimeValue::BigInt(b)) => a == b,
        (RuntimeValue::Symbol(a, _), RuntimeValue::Symbol(b, _)) => a == b,
        (RuntimeValue::Array(a), RuntimeValue::Array(b)) => Arc::ptr_eq(a, b),
        (RuntimeValue::Object(a), RuntimeValue::Object(b)) => Arc::ptr_eq(a, b),
        (RuntimeValue::Instance(a), RuntimeValue::Instance(b)) => Arc::ptr_eq(a, b),
        (RuntimeValue::Function(a), RuntimeValue::Function(b)) => Arc::ptr_eq(a, b),
        (RuntimeValue::Class(a), RuntimeValue::Class(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

fn loose_eq(l: &RuntimeValue, r: &RuntimeValue) -> bool {
    if std::mem::discriminant(l) == std::mem::discriminant(r) {
        return strict_eq(l, r);
    }
    match (l, r) {
        (RuntimeValue::Null, RuntimeValue::Undefined) | (RuntimeValue::Undefined, RuntimeValue::Null) => true,
        (RuntimeValue::Number(_), RuntimeValue::String(_)) | (RuntimeValue::String(_), RuntimeValue::Number(_)) => {
            num(l) == num(r)
        }
        (RuntimeValue::Boolean(_), _) => num(l) == num(r) || loose_eq(&RuntimeValue::number(num(l)), r),
        (_, RuntimeValue::Boolean(_)) => loose_eq(l, &RuntimeValue::number(num(r))),
        _ => false,
    }
}
