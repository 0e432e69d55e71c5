//! The iterator protocol and `for-of`/`for-in`/`for-await-of` execution.
//!
//! `Symbol.iterator`/`Symbol.asyncIterator` dispatch on arbitrary objects
//! is supported (`Custom`), but arrays, strings, `Map`/`Set`, and
//! generator handles get a direct fast path instead of round-tripping
//! through a synthesized method call, matching how a real engine
//! special-cases its own builtin iterables.

use sharpts_common::Atom;
use sharpts_parser::ast::{BindingPattern, Stmt, VarKind};

use crate::environment::{BindingKind, RuntimeEnvironment};
use crate::errors;
use crate::evaluator::coroutine::step_result_or_throw;
use crate::evaluator::Evaluator;
use crate::generator::{AsyncGeneratorHandle, GeneratorHandle, IteratorStep};
use crate::result::ExecutionResult;
use crate::value::{ArrayRef, RuntimeValue};

type EvalResult = Result<RuntimeValue, ExecutionResult>;

fn throw(v: RuntimeValue) -> ExecutionResult {
    ExecutionResult::Throw(v)
}

pub struct StepResult {
    pub value: RuntimeValue,
    pub done: bool,
}

pub enum Iter {
    Array(ArrayRef, usize),
    Chars(Vec<char>, usize),
    Entries(Vec<RuntimeValue>, usize),
    Generator(std::sync::Arc<GeneratorHandle>),
    AsyncGenerator(std::sync::Arc<AsyncGeneratorHandle>),
    Custom(RuntimeValue),
}

impl Evaluator {
    pub fn get_iterator(&mut self, value: &RuntimeValue) -> Result<Iter, ExecutionResult> {
        match value {
            RuntimeValue::Array(items) => Ok(Iter::Array(items.clone(), 0)),
            RuntimeValue::String(s) => Ok(Iter::Chars(s.chars().collect(), 0)),
            RuntimeValue::Generator(g) => Ok(Iter::Generator(g.clone())),
            RuntimeValue::AsyncGenerator(g) => Ok(Iter::AsyncGenerator(g.clone())),
            RuntimeValue::Map(m) => {
                let entries = m
                    .lock()
                    .expect("map lock poisoned")
                    .iter()
                    .map(|(_, v)| v.clone())
                    .collect::<Vec<_>>();
                Ok(Iter::Entries(entries, 0))
            }
            RuntimeValue::Set(s) => {
                let entries = s.lock().expect("set lock poisoned").keys().map(key_to_value).collect::<Vec<_>>();
                Ok(Iter::Entries(entries, 0))
            }
            RuntimeValue::Object(_) | RuntimeValue::Instance(_) => {
                let iter_fn = self.get_symbol_iterator(value)?;
                match iter_fn {
                    Some(f) => {
                        let iterator = self.call_value(&f, value.clone(), &[])?;
                        Ok(Iter::Custom(iterator))
                    }
                    None => Err(throw(errors::type_error(format!("{} is not iterable", value.display_string())))),
                }
            }
            _ => Err(throw(errors::type_error(format!("{} is not iterable", value.display_string())))),
        }
    }

    fn get_symbol_iterator(&mut self, value: &RuntimeValue) -> Result<Option<RuntimeValue>, ExecutionResult> {
        let result = self.get_index(value, &RuntimeValue::Symbol(crate::symbol::SymbolId::iterator(), None))?;
        Ok(if matches!(result, RuntimeValue::Undefined) { None } else { Some(result) })
    }

    pub fn iterator_next(&mut self, iter: &mut Iter, sent: RuntimeValue) -> Result<StepResult, ExecutionResult> {
        match iter {
            Iter::Array(items, i) => {
                let items = items.lock().expect("array lock poisoned");
                if *i >= items.len() {
                    return Ok(StepResult { value: RuntimeValue::Undefined, done: true });
                }
                let v = items[*i].clone();
                *i += 1;
                Ok(StepResult { value: v, done: false })
            }
            Iter::Chars(chars, i) => {
                if *i >= chars.len() {
                    return Ok(StepResult { value: RuntimeValue::Undefined, done: true });
                }
                let v = RuntimeValue::string(chars[*i].to_string());
                *i += 1;
                Ok(StepResult { value: v, done: false })
            }
            Iter::Entries(entries, i) => {
                if *i >= entries.len() {
                    return Ok(StepResult { value: RuntimeValue::Undefined, done: true });
                }
                let v = entries[*i].clone();
                *i += 1;
                Ok(StepResult { value: v, done: false })
            }
            Iter::Generator(g) => {
                let step = g.next(sent);
                to_step(step)
            }
            Iter::AsyncGenerator(g) => {
                let step = g.next(sent);
                let result = step_result_or_throw(step)?;
                let RuntimeValue::IteratorResult(value, data) = result else { unreachable!() };
                let unwrapped = self.await_value(*value)?;
                Ok(StepResult { value: unwrapped, done: data.done })
            }
            Iter::Custom(obj) => {
                let next_fn = self.get_property(obj, &Atom::new("next"))?;
                let result = self.call_value(&next_fn, obj.clone(), &[sent])?;
                let done = self.get_property(&result, &Atom::new("done"))?.to_boolean();
                let value = self.get_property(&result, &Atom::new("value"))?;
                Ok(StepResult { value, done })
            }
        }
    }

    pub fn iterate_to_vec(&mut self, value: &RuntimeValue) -> Result<Vec<RuntimeValue>, ExecutionResult> {
        let mut iter = self.get_iterator(value)?;
        let mut out = Vec::new();
        loop {
            let step = self.iterator_next(&mut iter, RuntimeValue::Undefined)?;
            if step.done {
                return Ok(out);
            }
            out.push(step.value);
        }
    }

    pub fn exec_for_of(
        &mut self,
        env: &RuntimeEnvironment,
        kind: VarKind,
        pattern: &BindingPattern,
        iterable: &sharpts_parser::ast::Expr,
        body: &Stmt,
        is_await: bool,
        labels: &[Atom],
    ) -> ExecutionResult {
        let value = match self.eval_expr(env, iterable) {
            Ok(v) => v,
            Err(e) => return e,
        };
        let mut iter = match self.get_iterator(&value) {
            Ok(i) => i,
            Err(e) => return e,
        };
        loop {
            let step = match self.iterator_next(&mut iter, RuntimeValue::Undefined) {
                Ok(s) => s,
                Err(e) => return e,
            };
            if step.done {
                return ExecutionResult::Normal(RuntimeValue::Undefined);
            }
            let item_value = if is_await {
                match self.await_value(step.value) {
                    Ok(v) => v,
                    Err(e) => return e,
                }
            } else {
                step.value
            };
            let loop_env = env.child_block();
            let binding_kind = match kind {
                VarKind::Var => BindingKind::Var,
                VarKind::Let => BindingKind::Let,
                VarKind::Const => BindingKind::Const,
            };
            if let Err(e) = self.bind_pattern(&loop_env, pattern, item_value, binding_kind) {
                return e;
            }
            match self.exec_stmt(&loop_env, body) {
                ExecutionResult::Normal(_) | ExecutionResult::Continue(None) => {}
                ExecutionResult::Continue(Some(ref l)) if labels.iter().any(|x| x == l) => {}
                ExecutionResult::Break(None) => return ExecutionResult::Normal(RuntimeValue::Undefined),
                ExecutionResult::Break(Some(ref l)) if labels.iter().any(|x| x == l) => {
                    return ExecutionResult::Normal(RuntimeValue::Undefined);
                }
                other => return other,
            }
        }
    }

    pub fn exec_for_in(
        &mut self,
        env: &RuntimeEnvironment,
        kind: VarKind,
        pattern: &BindingPattern,
        object: &sharpts_parser::ast::Expr,
        body: &Stmt,
        labels: &[Atom],
    ) -> ExecutionResult {
        let value = match self.eval_expr(env, object) {
            Ok(v) => v,
            Err(e) => return e,
        };
        // Enumerates in property-insertion order: `IndexMap` already preserves
        // that order, so no separate sort step is needed.
        let keys: Vec<Atom> = match &value {
            RuntimeValue::Object(o) => o.lock().expect("object lock poisoned").props.keys().cloned().collect(),
            RuntimeValue::Instance(i) => i.lock().expect("instance lock poisoned").fields.keys().cloned().collect(),
            RuntimeValue::Array(items) => (0..items.lock().expect("array lock poisoned").len())
                .map(|i| Atom::new(i.to_string()))
                .collect(),
            _ => Vec::new(),
        };
        for key in keys {
            let loop_env = env.child_block();
            let binding_kind = match kind {
                VarKind::Var => BindingKind::Var,
                VarKind::Let => BindingKind::Let,
                VarKind::Const => BindingKind::Const,
            };
            if let Err(e) = self.bind_pattern(&loop_env, pattern, RuntimeValue::string(key.to_string()), binding_kind) {
                return e;
            }
            match self.exec_stmt(&loop_env, body) {
                ExecutionResult::Normal(_) | ExecutionResult::Continue(None) => {}
                ExecutionResult::Continue(Some(ref l)) if labels.iter().any(|x| x == l) => {}
                ExecutionResult::Break(None) => return ExecutionResult::Normal(RuntimeValue::Undefined),
                ExecutionResult::Break(Some(ref l)) if labels.iter().any(|x| x == l) => {
                    return ExecutionResult::Normal(RuntimeValue::Undefined);
                }
                other => return other,
            }
        }
        ExecutionResult::Normal(RuntimeValue::Undefined)
    }
}

fn to_step(step: IteratorStep) -> Result<StepResult, ExecutionResult> {
    match step {
        IteratorStep::Yielded(v) => Ok(StepResult { value: v, done: false }),
        IteratorStep::Done(v) => Ok(StepResult { value: v, done: true }),
        IteratorStep::Threw(e) => Err(throw(e)),
    }
}

fn key_to_value(key: &crate::value::MapKey) -> RuntimeValue {
    match key {
        crate::value::MapKey::Null => RuntimeValue::Null,
        crate::value::MapKey::Undefined => RuntimeValue::Undefined,
        crate::value::MapKey::Boolean(b) => RuntimeValue::Boolean(*b),
        crate::value::MapKey::Number(bits) => RuntimeValue::Number(*bits),
        crate::value::MapKey::String(s) => RuntimeValue::String(s.clone()),
        crate::value::MapKey::BigInt(s) => RuntimeValue::BigInt(s.clone()),
        crate::value::MapKey::Symbol(s) => RuntimeValue::Symbol(*s, None),
        crate::value::MapKey::ObjectIdentity(_) => RuntimeValue::Undefined,
    }
}
