//! `TypeEnvironment` — the checker's scope chain.
//!
//! A stack of frames mirrors lexical scoping well enough for a
//! recursive-descent checker: entering a block, function body, or
//! namespace pushes a frame; leaving it pops one. Unlike the runtime's
//! scope chain (`sharpts-runtime`), nothing here needs to outlive the
//! call that created it, so a plain `Vec` stack is enough — no `Rc`
//! parent-pointer graph is needed.

use rustc_hash::FxHashMap;
use sharpts_common::Atom;
use sharpts_types::TypeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingKind {
    Var,
    Let,
    Const,
    Function,
    Class,
    Interface,
    Enum,
    Namespace,
    TypeAlias,
    TypeParameter,
    Param,
    Catch,
}

impl BindingKind {
    pub fn is_reassignable(self) -> bool {
        !matches!(self, BindingKind::Const | BindingKind::Enum)
    }
}

#[derive(Clone, Debug)]
pub struct Binding {
    pub declared_type: TypeId,
    pub kind: BindingKind,
    /// Set once a `let`/`var` binding with no initializer has been
    /// assigned at least once, for definite-assignment-adjacent checks.
    pub readonly: bool,
}

impl Binding {
    pub fn new(declared_type: TypeId, kind: BindingKind) -> Self {
        Binding {
            declared_type,
            kind,
            readonly: matches!(kind, BindingKind::Const | BindingKind::TypeParameter),
        }
    }
}

struct Frame {
    bindings: FxHashMap<Atom, Binding>,
    /// A function-boundary frame starts a new `this`/closure scope; used to
    /// decide whether `var` hoists past a block frame into the enclosing
    /// function frame.
    is_function_boundary: bool,
}

pub struct TypeEnvironment {
    frames: Vec<Frame>,
}

impl Default for TypeEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeEnvironment {
    pub fn new() -> Self {
        TypeEnvironment {
            frames: vec![Frame {
                bindings: FxHashMap::default(),
                is_function_boundary: true,
            }],
        }
    }

    pub fn push_block_scope(&mut self) {
        self.frames.push(Frame {
            bindings: FxHashMap::default(),
            is_function_boundary: false,
        });
    }

    pub fn push_function_scope(&mut self) {
        self.frames.push(Frame {
            bindings: FxHashMap::default(),
            is_function_boundary: true,
        });
    }

    pub fn pop_scope(&mut self) {
        self.frames.pop();
        debug_assert!(!self.frames.is_empty(), "popped the root scope");
    }

    /// Defines a binding in the innermost frame, except `var` which hoists
    /// to the nearest enclosing function (or root) frame.
    pub fn define(&mut self, name: Atom, binding: Binding) {
        if binding.kind == BindingKind::Var {
            if let Some(idx) = self.nearest_function_frame_index() {
                self.frames[idx].bindings.insert(name, binding);
                return;
            }
        }
        self.frames
            .last_mut()
            .expect("at least one frame")
            .bindings
            .insert(name, binding);
    }

    fn nearest_function_frame_index(&self) -> Option<usize> {
        self.frames
            .iter()
            .enumerate()
            .rev()
            .find(|(_, f)| f.is_function_boundary)
            .map(|(i, _)| i)
    }

    pub fn lookup(&self, name: &Atom) -> Option<&Binding> {
        self.frames.iter().rev().find_map(|f| f.bindings.get(name))
    }

    /// True when `name` is declared in the current (innermost) frame only
    /// — used for "duplicate declaration in the same scope" diagnostics.
    pub fn declared_in_current_scope(&self, name: &Atom) -> bool {
        self.frames
            .last()
            .map(|f| f.bindings.contains_key(name))
            .unwrap_or(false)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharpts_types::{TypeArena, TypeInfo};

    #[test]
    fn var_hoists_past_block_scope() {
        let mut arena = TypeArena::new();
        let number = arena.intern(TypeInfo::Primitive(sharpts_types::Primitive::Number));
        let mut env = TypeEnvironment::new();
        env.push_block_scope();
        env.define(Atom::new("x"), Binding::new(number, BindingKind::Var));
        env.pop_scope();
        assert!(env.lookup(&Atom::new("x")).is_some());
    }

    #[test]
    fn let_stays_in_its_block() {
        let mut arena = TypeArena::new();
        let number = arena.intern(TypeInfo::Primitive(sharpts_types::Primitive::Number));
        let mut env = TypeEnvironment::new();
        env.push_block_scope();
        env.define(Atom::new("y"), Binding::new(number, BindingKind::Let));
        env.pop_scope();
        assert!(env.lookup(&Atom::new("y")).is_none());
    }
}
