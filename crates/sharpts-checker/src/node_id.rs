//! `TypeMap` — AST node identity to `TypeId`. The AST is an owned, immutable `Box` tree built once by the parser
//! and held alive for the whole check, so a node's address is a stable,
//! collision-free identity for the lifetime of the run — no separate id
//! needs to be threaded through the parser.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHashMap;
use sharpts_parser::ast::{Expr, Stmt};

#[derive(Clone, Copy, Eq)]
pub struct NodeId(usize);

impl PartialEq for NodeId {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Hash for NodeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

pub fn expr_id(expr: &Expr) -> NodeId {
    NodeId(expr as *const Expr as usize)
}

pub fn stmt_id(stmt: &Stmt) -> NodeId {
    NodeId(stmt as *const Stmt as usize)
}

/// Records the checker's inferred/checked type for every expression and
/// statement it visits, so a later pass (or the evaluator, or a future
/// language-service layer) can ask "what type did the checker give this
/// node" without re-running inference.
#[derive(Default)]
pub struct TypeMap {
    expr_types: FxHashMap<NodeId, sharpts_types::TypeId>,
    stmt_types: FxHashMap<NodeId, sharpts_types::TypeId>,
}

impl TypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_expr(&mut self, expr: &Expr, ty: sharpts_types::TypeId) {
        self.expr_types.insert(expr_id(expr), ty);
    }

    pub fn record_stmt(&mut self, stmt: &Stmt, ty: sharpts_types::TypeId) {
        self.stmt_types.insert(stmt_id(stmt), ty);
    }

    pub fn type_of_expr(&self, expr: &Expr) -> Option<sharpts_types::TypeId> {
        self.expr_types.get(&expr_id(expr)).copied()
    }

    pub fn type_of_stmt(&self, stmt: &Stmt) -> Option<sharpts_types::TypeId> {
        self.stmt_types.get(&stmt_id(stmt)).copied()
    }

    pub fn len(&self) -> usize {
        self.expr_types.len() + self.stmt_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
