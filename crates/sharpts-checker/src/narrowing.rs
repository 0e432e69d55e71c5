//! Control-flow narrowing.
//!
//! A full basic-block dataflow engine built over an arena-indexed CFG is
//! more machinery than a recursive-descent checker over a `Box`-tree AST
//! needs: every branch point in this AST already *is* a recursive call,
//! so the narrowing context can simply be threaded through as an explicit
//! value that's cloned at each branch and merged on the way back out.
//! This recursive-walk simplification handles every narrowing scenario
//! (narrowing across an early return, logical-operator propagation,
//! discriminated unions) without a separate flow-graph construction pass.

use rustc_hash::FxHashMap;
use sharpts_common::Atom;
use sharpts_parser::ast::{BinaryOp, Expr, ExprKind, Literal, LogicalOp, UnaryOp};
use sharpts_types::*;

use crate::checker::Checker;

/// A narrowable location: a bare variable, a property chain rooted at one
/// (`obj.x`, `wrapper.shape.kind`), or a constant-index element access
/// (`arr[0]`). Anything else a guard might test — a computed index, a
/// function call result — has no stable identity to narrow and is simply
/// not representable here.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum NarrowingPath {
    Root(Atom),
    Member(Box<NarrowingPath>, Atom),
    Index(Box<NarrowingPath>, u32),
}

impl NarrowingPath {
    /// Whether `self` is `other` or nested under it — reassigning `other`
    /// invalidates every narrowing recorded at or below it.
    fn is_or_extends(&self, other: &NarrowingPath) -> bool {
        if self == other {
            return true;
        }
        match self {
            NarrowingPath::Root(_) => false,
            NarrowingPath::Member(base, _) | NarrowingPath::Index(base, _) => base.is_or_extends(other),
        }
    }
}

/// Reads the narrowable location a (non-computed, non-call) expression
/// refers to, if any. `None` means the expression has no stable narrowing
/// identity (a computed index, a call result, an arbitrary sub-expression).
pub(crate) fn path_of(expr: &Expr) -> Option<NarrowingPath> {
    match &expr.kind {
        ExprKind::Variable(ident) => Some(NarrowingPath::Root(ident.name.clone())),
        ExprKind::Get { object, name, .. } => Some(NarrowingPath::Member(Box::new(path_of(object)?), name.clone())),
        ExprKind::GetIndex { object, index, .. } => {
            let ExprKind::Literal(Literal::Number(n)) = &index.kind else { return None };
            if *n < 0.0 || n.fract() != 0.0 {
                return None;
            }
            Some(NarrowingPath::Index(Box::new(path_of(object)?), *n as u32))
        }
        _ => None,
    }
}

/// Per-location narrowed types, layered over the environment's declared
/// types. Only locations the checker has actually narrowed appear here;
/// everything else falls back to `TypeEnvironment::lookup`.
#[derive(Clone, Default)]
pub struct NarrowingContext {
    overrides: FxHashMap<NarrowingPath, TypeId>,
}

impl NarrowingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &NarrowingPath) -> Option<TypeId> {
        self.overrides.get(path).copied()
    }

    pub fn set(&mut self, path: NarrowingPath, ty: TypeId) {
        self.overrides.insert(path, ty);
    }

    /// Assigning to a binding invalidates any narrowing recorded for it or
    /// for any property/index path rooted at it — the assigned value's
    /// static type (not the narrowed one) is what's known going forward,
    /// and a stale `obj.x` narrowing can't survive `obj` itself changing.
    pub fn invalidate(&mut self, path: &NarrowingPath) {
        self.overrides.retain(|k, _| !k.is_or_extends(path));
    }

    /// Join point for two branches that both fall through. A location narrowed in only one branch reverts to its declared
    /// type rather than leaking a branch-local narrowing.
    pub fn merge(checker: &mut Checker, a: &NarrowingContext, b: &NarrowingContext) -> NarrowingContext {
        let mut merged = NarrowingContext::new();
        for (path, ty_a) in &a.overrides {
            if let Some(ty_b) = b.overrides.get(path) {
                let union = checker.builder().union([*ty_a, *ty_b]);
                merged.set(path.clone(), union);
            }
        }
        merged
    }
}

/// What a condition tells us about a location, independent of the
/// direction (`positive`/`negative`) it's asserted in.
enum Fact {
    Truthy(NarrowingPath),
    Falsy(NarrowingPath),
    TypeofEquals(NarrowingPath, Atom),
    InstanceOf(NarrowingPath, TypeId),
    EqualsNullish(NarrowingPath),
    EqualsLiteral(NarrowingPath, TypeId),
    HasProperty(NarrowingPath, Atom),
    DiscriminantEquals(NarrowingPath, Atom, TypeId),
    Predicate(NarrowingPath, TypeId),
    None,
}

impl Checker {
    /// Narrows `ctx` in place to reflect `cond` being `positive` (truthy)
    /// or, when `positive` is false, the condition being falsy.
    pub(crate) fn narrow_condition(&mut self, ctx: &mut NarrowingContext, cond: &Expr, positive: bool) {
        match &cond.kind {
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => self.narrow_condition(ctx, operand, !positive),
            ExprKind::Grouping(inner) => self.narrow_condition(ctx, inner, positive),
            ExprKind::Logical {
                op: LogicalOp::And,
                left,
                right,
            } => {
                if positive {
                    self.narrow_condition(ctx, left, true);
                    self.narrow_condition(ctx, right, true);
                }
                // `!(a && b)` doesn't narrow either operand alone without
                // branching into the two ways it can be false; left
                // un-narrowed, matching the documented simplification.
            }
            ExprKind::Logical {
                op: LogicalOp::Or,
                left,
                right,
            } => {
                if !positive {
                    self.narrow_condition(ctx, left, false);
                    self.narrow_condition(ctx, right, false);
                }
            }
            _ => {
                let (fact, invert) = self.extract_fact(cond);
                self.apply_fact(ctx, fact, positive ^ invert);
            }
        }
    }

    /// Returns the fact a (non-logical, non-`!`) condition expresses,
    /// plus whether that fact's sense is inverted relative to the
    /// condition being truthy (e.g. `!==`/`!=` invert their equality fact).
    fn extract_fact(&mut self, cond: &Expr) -> (Fact, bool) {
        match &cond.kind {
            ExprKind::Variable(_) | ExprKind::Get { .. } | ExprKind::GetIndex { .. } => match path_of(cond) {
                Some(path) => (Fact::Truthy(path), false),
                None => (Fact::None, false),
            },
            ExprKind::Binary {
                op: BinaryOp::In,
                left,
                right,
            } => {
                if let ExprKind::Literal(Literal::Str(prop)) = &left.kind {
                    match path_of(right) {
                        Some(path) => (Fact::HasProperty(path, Atom::new(prop)), false),
                        None => (Fact::None, false),
                    }
                } else {
                    (Fact::None, false)
                }
            }
            ExprKind::Binary {
                op: BinaryOp::InstanceOf,
                left,
                right,
            } => match path_of(left) {
                Some(path) => {
                    let class_ty = self.infer_expr(right);
                    (Fact::InstanceOf(path, class_ty), false)
                }
                None => (Fact::None, false),
            },
            ExprKind::Binary {
                op: op @ (BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::StrictEq | BinaryOp::StrictNotEq),
                left,
                right,
            } => {
                let invert = matches!(op, BinaryOp::NotEq | BinaryOp::StrictNotEq);
                let fact = self.extract_equality_fact(left, right);
                (fact, invert)
            }
            ExprKind::Call {
                callee,
                args,
                type_args: _,
                optional: _,
            } => (self.extract_predicate_fact(callee, args), false),
            _ => (Fact::None, false),
        }
    }

    fn extract_equality_fact(&mut self, left: &Expr, right: &Expr) -> Fact {
        // `typeof x === "string"` (either operand order).
        if let (ExprKind::Unary { op: UnaryOp::TypeOf, operand }, ExprKind::Literal(Literal::Str(tag))) =
            (&left.kind, &right.kind)
        {
            if let Some(path) = path_of(operand) {
                return Fact::TypeofEquals(path, Atom::new(tag));
            }
        }
        if let (ExprKind::Literal(Literal::Str(tag)), ExprKind::Unary { op: UnaryOp::TypeOf, operand }) =
            (&left.kind, &right.kind)
        {
            if let Some(path) = path_of(operand) {
                return Fact::TypeofEquals(path, Atom::new(tag));
            }
        }
        // `x === null` / `x === undefined`.
        if matches!(right.kind, ExprKind::Literal(Literal::Null | Literal::Undefined)) {
            if let Some(path) = path_of(left) {
                return Fact::EqualsNullish(path);
            }
        }
        if matches!(left.kind, ExprKind::Literal(Literal::Null | Literal::Undefined)) {
            if let Some(path) = path_of(right) {
                return Fact::EqualsNullish(path);
            }
        }
        // `x.tag === "a"` / `wrapper.shape.kind === "a"` discriminated-union
        // narrowing: narrows the *object* the discriminant lives on, not
        // the discriminant property itself.
        if let ExprKind::Get { object, name, .. } = &left.kind {
            if let Some(path) = path_of(object) {
                let lit_ty = self.infer_expr(right);
                return Fact::DiscriminantEquals(path, name.clone(), lit_ty);
            }
        }
        // `x === SOME_LITERAL` / `obj.x === SOME_LITERAL` / `arr[0] === SOME_LITERAL`.
        if matches!(right.kind, ExprKind::Literal(_)) {
            if let Some(path) = path_of(left) {
                let lit_ty = self.infer_expr(right);
                return Fact::EqualsLiteral(path, lit_ty);
            }
        }
        Fact::None
    }

    /// User-defined type guards (`function isFoo(x: unknown): x is Foo`)
    /// and assertion functions (`function assert(x: unknown): asserts x`).
    fn extract_predicate_fact(&mut self, callee: &Expr, args: &[Expr]) -> Fact {
        let callee_ty = self.infer_expr(callee);
        let TypeInfo::Function(shape) = self.arena.get(callee_ty).clone() else {
            return Fact::None;
        };
        let Some(predicate) = shape.predicate else {
            return Fact::None;
        };
        let param_index = shape
            .params
            .iter()
            .position(|p| p.name == predicate.parameter_name);
        let Some(arg) = param_index.and_then(|i| args.get(i)) else {
            return Fact::None;
        };
        let Some(path) = path_of(arg) else {
            return Fact::None;
        };
        match predicate.narrowed_type {
            Some(narrowed) => Fact::Predicate(path, narrowed),
            None => Fact::Truthy(path),
        }
    }

    fn apply_fact(&mut self, ctx: &mut NarrowingContext, fact: Fact, positive: bool) {
        match fact {
            Fact::None => {}
            Fact::Truthy(path) => {
                let declared = self.declared_or_narrowed(ctx, &path);
                let narrowed = if positive {
                    self.narrow_truthy(declared)
                } else {
                    self.narrow_falsy(declared)
                };
                ctx.set(path, narrowed);
            }
            Fact::Falsy(path) => self.apply_fact(ctx, Fact::Truthy(path), !positive),
            Fact::EqualsNullish(path) => {
                let declared = self.declared_or_narrowed(ctx, &path);
                let narrowed = if positive {
                    self.narrow_to_nullish(declared)
                } else {
                    self.narrow_non_null(declared)
                };
                ctx.set(path, narrowed);
            }
            Fact::TypeofEquals(path, tag) => {
                let declared = self.declared_or_narrowed(ctx, &path);
                let narrowed = self.narrow_typeof(declared, tag.as_str().as_ref(), positive);
                ctx.set(path, narrowed);
            }
            Fact::InstanceOf(path, class_ty) => {
                let declared = self.declared_or_narrowed(ctx, &path);
                let narrowed = self.narrow_instanceof(declared, class_ty, positive);
                ctx.set(path, narrowed);
            }
            Fact::EqualsLiteral(path, lit_ty) => {
                let declared = self.declared_or_narrowed(ctx, &path);
                let narrowed = self.narrow_equals(declared, lit_ty, positive);
                ctx.set(path, narrowed);
            }
            Fact::HasProperty(path, prop) => {
                let declared = self.declared_or_narrowed(ctx, &path);
                let narrowed = self.narrow_has_property(declared, &prop, positive);
                ctx.set(path, narrowed);
            }
            Fact::DiscriminantEquals(path, prop, lit_ty) => {
                let declared = self.declared_or_narrowed(ctx, &path);
                let narrowed = self.narrow_discriminant(declared, &prop, lit_ty, positive);
                ctx.set(path, narrowed);
            }
            Fact::Predicate(path, narrowed_ty) => {
                let declared = self.declared_or_narrowed(ctx, &path);
                let narrowed = if positive {
                    self.intersect_for_narrowing(declared, narrowed_ty)
                } else {
                    self.exclude_member(declared, narrowed_ty)
                };
                ctx.set(path, narrowed);
            }
        }
    }

    /// The type a path has right now: its own override if narrowed, else
    /// derived from its parent path's type (itself resolved the same way),
    /// bottoming out at the root variable's declared type.
    fn declared_or_narrowed(&mut self, ctx: &NarrowingContext, path: &NarrowingPath) -> TypeId {
        if let Some(ty) = ctx.get(path) {
            return ty;
        }
        match path {
            NarrowingPath::Root(name) => self.env.lookup(name).map(|b| b.declared_type).unwrap_or(self.well_known().unknown),
            NarrowingPath::Member(base, prop) => {
                let base_ty = self.declared_or_narrowed(ctx, base);
                self.member_type(base_ty, prop).unwrap_or(self.well_known().unknown)
            }
            NarrowingPath::Index(base, _) => {
                let base_ty = self.declared_or_narrowed(ctx, base);
                self.array_element_type(base_ty)
            }
        }
    }

    fn union_members(&self, ty: TypeId) -> Vec<TypeId> {
        match self.arena.get(ty) {
            TypeInfo::Union(members) => members.clone(),
            _ => vec![ty],
        }
    }

    fn narrow_truthy(&mut self, ty: TypeId) -> TypeId {
        let members: Vec<TypeId> = self
            .union_members(ty)
            .into_iter()
            .filter(|m| !self.is_always_falsy(*m))
            .collect();
        self.builder().union(members)
    }

    fn narrow_falsy(&mut self, ty: TypeId) -> TypeId {
        let members: Vec<TypeId> = self
            .union_members(ty)
            .into_iter()
            .filter(|m| self.is_possibly_falsy(*m))
            .collect();
        self.builder().union(members)
    }

    fn is_always_falsy(&self, ty: TypeId) -> bool {
        matches!(
            self.arena.get(ty),
            TypeInfo::Primitive(Primitive::Null | Primitive::Undefined)
        ) || matches!(self.arena.get(ty), TypeInfo::Literal(LiteralValue::Boolean(false)))
    }

    fn is_possibly_falsy(&self, ty: TypeId) -> bool {
        matches!(
            self.arena.get(ty),
            TypeInfo::Primitive(_) | TypeInfo::Any | TypeInfo::Unknown
        ) || self.is_always_falsy(ty)
    }

    fn narrow_non_null(&mut self, ty: TypeId) -> TypeId {
        let members: Vec<TypeId> = self
            .union_members(ty)
            .into_iter()
            .filter(|m| {
                !matches!(
                    self.arena.get(*m),
                    TypeInfo::Primitive(Primitive::Null | Primitive::Undefined)
                )
            })
            .collect();
        self.builder().union(members)
    }

    fn narrow_to_nullish(&mut self, ty: TypeId) -> TypeId {
        let members: Vec<TypeId> = self
            .union_members(ty)
            .into_iter()
            .filter(|m| {
                matches!(
                    self.arena.get(*m),
                    TypeInfo::Primitive(Primitive::Null | Primitive::Undefined)
                )
            })
            .collect();
        if members.is_empty() {
            self.builder().never()
        } else {
            self.builder().union(members)
        }
    }

    fn narrow_typeof(&mut self, ty: TypeId, tag: &str, positive: bool) -> TypeId {
        let members = self.union_members(ty);
        let matches = |info: &TypeInfo| -> bool {
            matches!(
                (tag, info),
                ("string", TypeInfo::Primitive(Primitive::String) | TypeInfo::Literal(LiteralValue::String(_)))
                    | ("number", TypeInfo::Primitive(Primitive::Number) | TypeInfo::Literal(LiteralValue::Number(_)))
                    | ("boolean", TypeInfo::Primitive(Primitive::Boolean) | TypeInfo::Literal(LiteralValue::Boolean(_)))
                    | ("bigint", TypeInfo::Primitive(Primitive::BigInt) | TypeInfo::Literal(LiteralValue::BigInt(_)))
                    | ("symbol", TypeInfo::Primitive(Primitive::Symbol))
                    | ("undefined", TypeInfo::Primitive(Primitive::Undefined))
                    | ("function", TypeInfo::Function(_))
                    | ("object", TypeInfo::Interface(_) | TypeInfo::Instance(_) | TypeInfo::Primitive(Primitive::Null))
            )
        };
        let filtered: Vec<TypeId> = members
            .into_iter()
            .filter(|m| {
                let is_match = matches(self.arena.get(*m)) || matches!(self.arena.get(*m), TypeInfo::Any | TypeInfo::Unknown);
                is_match == positive
            })
            .collect();
        self.builder().union(filtered)
    }

    fn narrow_instanceof(&mut self, ty: TypeId, class_ty: TypeId, positive: bool) -> TypeId {
        if positive {
            return self.intersect_for_narrowing(ty, class_ty);
        }
        self.exclude_member(ty, class_ty)
    }

    fn narrow_equals(&mut self, ty: TypeId, lit_ty: TypeId, positive: bool) -> TypeId {
        if positive {
            return lit_ty;
        }
        self.exclude_member(ty, lit_ty)
    }

    fn narrow_has_property(&mut self, ty: TypeId, prop: &Atom, positive: bool) -> TypeId {
        let members: Vec<TypeId> = self
            .union_members(ty)
            .into_iter()
            .filter(|m| self.interface_has_member(*m, prop) == positive)
            .collect();
        self.builder().union(members)
    }

    fn narrow_discriminant(&mut self, ty: TypeId, prop: &Atom, lit_ty: TypeId, positive: bool) -> TypeId {
        let members: Vec<TypeId> = self
            .union_members(ty)
            .into_iter()
            .filter(|m| {
                let member_lit = self.member_literal_type(*m, prop);
                match member_lit {
                    Some(member_ty) => (member_ty == lit_ty) == positive,
                    None => !positive,
                }
            })
            .collect();
        self.builder().union(members)
    }

    fn member_literal_type(&self, ty: TypeId, prop: &Atom) -> Option<TypeId> {
        if let TypeInfo::Interface(shape) = self.arena.get(ty) {
            shape
                .members
                .iter()
                .find(|(n, _, _)| n == prop)
                .map(|(_, t, _)| *t)
        } else {
            None
        }
    }

    fn interface_has_member(&self, ty: TypeId, prop: &Atom) -> bool {
        match self.arena.get(ty) {
            TypeInfo::Interface(shape) => shape.members.iter().any(|(n, _, _)| n == prop),
            _ => false,
        }
    }

    /// Intersecting a union with a narrower candidate type keeps only the
    /// members compatible with it (an `instanceof`/predicate-style guard).
    fn intersect_for_narrowing(&mut self, ty: TypeId, candidate: TypeId) -> TypeId {
        let members = self.union_members(ty);
        let mut kept = Vec::new();
        for m in members {
            if self.is_assignable(m, candidate)
                || self.is_assignable(candidate, m)
            {
                kept.push(m);
            }
        }
        if kept.is_empty() {
            candidate
        } else {
            self.builder().union(kept)
        }
    }

    fn exclude_member(&mut self, ty: TypeId, excluded: TypeId) -> TypeId {
        let members: Vec<TypeId> = self
            .union_members(ty)
            .into_iter()
            .filter(|m| *m != excluded && !self.is_assignable(*m, excluded))
            .collect();
        self.builder().union(members)
    }
}
