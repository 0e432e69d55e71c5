//! `RuntimeEnvironment` — the evaluator's scope chain.
//!
//! Unlike the checker's `TypeEnvironment` (a `Vec` stack that never outlives
//! the call that built it), a runtime frame must outlive its creating call
//! whenever a closure captures it — a closure is a captured reference to
//! the environment frame. Frames are therefore `Arc<Mutex<_>>` nodes in a
//! parent-pointer chain, cloned (cheaply, by reference) into every closure
//! created inside them.

use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};

use sharpts_common::Atom;

use crate::value::RuntimeValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingKind {
    Var,
    Let,
    Const,
    Function,
    Param,
    Catch,
    Class,
}

impl BindingKind {
    fn is_reassignable(self) -> bool {
        !matches!(self, BindingKind::Const)
    }
}

struct Slot {
    value: RuntimeValue,
    kind: BindingKind,
}

struct Frame {
    bindings: FxHashMap<Atom, Slot>,
    parent: Option<RuntimeEnvironment>,
    /// A function-call frame is where `var` hoists to, mirroring
    /// `TypeEnvironment`'s rule at runtime.
    is_function_boundary: bool,
    /// Inherited from the enclosing scope unless this frame starts a new
    /// module or carries its own `"use strict"` prologue.
    strict: bool,
    /// `using`/`await using` bindings declared directly in this frame, in
    /// declaration order; disposed in reverse order
    /// when the block this frame backs exits.
    disposables: Vec<(Atom, bool)>,
}

/// A reference-counted handle to one scope frame. Cloning an
/// `RuntimeEnvironment` clones the `Arc`, not the frame — two closures
/// created in the same block share one frame and observe each other's
/// mutations, as ECMAScript closures do.
#[derive(Clone)]
pub struct RuntimeEnvironment(Arc<Mutex<Frame>>);

/// Failure modes for `assign`/`get`: assigning to a name
/// that was never declared anywhere in the chain is a `ReferenceError` at
/// the call site; assigning to a `const` is a hard error only in strict
/// mode, a silent no-op otherwise.
pub enum AssignOutcome {
    Ok,
    Undeclared,
    ReadOnlyStrict,
    ReadOnlySilent,
}

impl RuntimeEnvironment {
    pub fn root(strict: bool) -> Self {
        RuntimeEnvironment(Arc::new(Mutex::new(Frame {
            bindings: FxHashMap::default(),
            parent: None,
            is_function_boundary: true,
            strict,
            disposables: Vec::new(),
        })))
    }

    fn child(&self, is_function_boundary: bool) -> Self {
        let strict = self.is_strict();
        RuntimeEnvironment(Arc::new(Mutex::new(Frame {
            bindings: FxHashMap::default(),
            parent: Some(self.clone()),
            is_function_boundary,
            strict,
            disposables: Vec::new(),
        })))
    }

    pub fn child_block(&self) -> Self {
        self.child(false)
    }

    pub fn child_function(&self) -> Self {
        self.child(true)
    }

    pub fn is_strict(&self) -> bool {
        self.0.lock().expect("env lock poisoned").strict
    }

    pub fn set_strict(&self, strict: bool) {
        self.0.lock().expect("env lock poisoned").strict = strict;
    }

    /// Defines a binding in this frame, except `BindingKind::Var`, which
    /// hoists to the nearest enclosing function-boundary frame.
    pub fn define(&self, name: Atom, value: RuntimeValue, kind: BindingKind) {
        if kind == BindingKind::Var {
            let target = self.nearest_function_frame();
            target.0.lock().expect("env lock poisoned").bindings.insert(name, Slot { value, kind });
            return;
        }
        self.0.lock().expect("env lock poisoned").bindings.insert(name, Slot { value, kind });
    }

    fn nearest_function_frame(&self) -> RuntimeEnvironment {
        let mut current = self.clone();
        loop {
            let (is_boundary, parent) = {
                let frame = current.0.lock().expect("env lock poisoned");
                (frame.is_function_boundary, frame.parent.clone())
            };
            if is_boundary {
                return current;
            }
            match parent {
                Some(p) => current = p,
                None => return current,
            }
        }
    }

    pub fn get(&self, name: &Atom) -> Option<RuntimeValue> {
        let mut current = self.clone();
        loop {
            let (found, parent) = {
                let frame = current.0.lock().expect("env lock poisoned");
                (frame.bindings.get(name).map(|s| s.value.clone()), frame.parent.clone())
            };
            if let Some(v) = found {
                return Some(v);
            }
            match parent {
                Some(p) => current = p,
                None => return None,
            }
        }
    }

    pub fn assign(&self, name: &Atom, value: RuntimeValue) -> AssignOutcome {
        let mut current = self.clone();
        loop {
            let outcome = {
                let mut frame = current.0.lock().expect("env lock poisoned");
                let strict = frame.strict;
                if let Some(slot) = frame.bindings.get_mut(name) {
                    if slot.kind.is_reassignable() {
                        slot.value = value.clone();
                        Some(AssignOutcome::Ok)
                    } else if strict {
                        Some(AssignOutcome::ReadOnlyStrict)
                    } else {
                        Some(AssignOutcome::ReadOnlySilent)
                    }
                } else {
                    None
                }
            };
            if let Some(o) = outcome {
                return o;
            }
            let parent = current.0.lock().expect("env lock poisoned").parent.clone();
            match parent {
                Some(p) => current = p,
                None => return AssignOutcome::Undeclared,
            }
        }
    }

    pub fn declared_in_current_scope(&self, name: &Atom) -> bool {
        self.0.lock().expect("env lock poisoned").bindings.contains_key(name)
    }

    /// Records a `using`/`await using` binding declared directly in this
    /// frame, in declaration order.
    pub fn register_disposable(&self, name: Atom, is_await: bool) {
        self.0.lock().expect("env lock poisoned").disposables.push((name, is_await));
    }

    /// Removes and returns this frame's disposables in reverse
    /// declaration order — the order they must be disposed in when the
    /// block this frame backs exits.
    pub fn take_disposables_reversed(&self) -> Vec<(Atom, bool)> {
        let mut disposables = std::mem::take(&mut self.0.lock().expect("env lock poisoned").disposables);
        disposables.reverse();
        disposables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_hoists_past_block_scope() {
        let root = RuntimeEnvironment::root(false);
        let block = root.child_block();
        block.define(Atom::new("x"), RuntimeValue::Undefined, BindingKind::Var);
        assert!(root.declared_in_current_scope(&Atom::new("x")));
    }

    #[test]
    fn let_stays_in_its_block() {
        let root = RuntimeEnvironment::root(false);
        let block = root.child_block();
        block.define(Atom::new("y"), RuntimeValue::Undefined, BindingKind::Let);
        assert!(!root.declared_in_current_scope(&Atom::new("y")));
        assert!(block.declared_in_current_scope(&Atom::new("y")));
    }

    #[test]
    fn closures_sharing_a_frame_see_each_others_mutations() {
        let root = RuntimeEnvironment::root(false);
        root.define(Atom::new("counter"), RuntimeValue::number(0.0), BindingKind::Let);
        let captured_a = root.clone();
        let captured_b = root.clone();
        captured_a.assign(&Atom::new("counter"), RuntimeValue::number(1.0));
        assert_eq!(captured_b.get(&Atom::new("counter")).unwrap().as_f64(), Some(1.0));
    }

    #[test]
    fn const_assignment_is_silent_noop_outside_strict_mode() {
        let root = RuntimeEnvironment::root(false);
        root.define(Atom::new("c"), RuntimeValue::number(1.0), BindingKind::Const);
        let outcome = root.assign(&Atom::new("c"), RuntimeValue::number(2.0));
        assert!(matches!(outcome, AssignOutcome::ReadOnlySilent));
        assert_eq!(root.get(&Atom::new("c")).unwrap().as_f64(), Some(1.0));
    }

    #[test]
    fn const_assignment_fails_in_strict_mode() {
        let root = RuntimeEnvironment::root(true);
        root.define(Atom::new("c"), RuntimeValue::number(1.0), BindingKind::Const);
        let outcome = root.assign(&Atom::new("c"), RuntimeValue::number(2.0));
        assert!(matches!(outcome, AssignOutcome::ReadOnlyStrict));
    }

    #[test]
    fn undeclared_assignment_is_reference_error() {
        let root = RuntimeEnvironment::root(false);
        let outcome = root.assign(&Atom::new("nope"), RuntimeValue::number(1.0));
        assert!(matches!(outcome, AssignOutcome::Undeclared));
    }
}
