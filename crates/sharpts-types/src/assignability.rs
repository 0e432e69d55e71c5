//! `isAssignable(src, dst)`.
//!
//! A memoized decision procedure over a [`TypeArena`]. Memoization uses
//! `TypeId` pairs directly as the cache key — because `TypeId` already is
//! a structural-equality class (see `arena.rs`), this gets "fresh
//! union/tuple/function instances are structurally but not referentially
//! equal" for free without re-deriving structural hashing here.
//!
//! Recursion safety: self-referential types (`interface Tree { children:
//! Tree[] }`) would otherwise recurse forever walking `Tree` against
//! itself. An `assume-true` entry is pushed onto the in-flight stack
//! before recursing into a pair's children; if the same pair is hit again
//! before that frame returns, it is assumed assignable (co-inductive
//! assumption used by every structural type-checker with this shape of
//! cycle).

use rustc_hash::{FxHashMap, FxHashSet};

use crate::arena::{TypeArena, TypeId};
use crate::info::*;

pub struct AssignabilityChecker<'a> {
    arena: &'a TypeArena,
    cache: FxHashMap<(TypeId, TypeId), bool>,
    in_flight: FxHashSet<(TypeId, TypeId)>,
}

impl<'a> AssignabilityChecker<'a> {
    pub fn new(arena: &'a TypeArena) -> Self {
        AssignabilityChecker {
            arena,
            cache: FxHashMap::default(),
            in_flight: FxHashSet::default(),
        }
    }

    /// Reset the memoization cache. The in-flight recursion-guard stack is always
    /// empty between top-level calls, so only the cache needs clearing.
    pub fn reset(&mut self) {
        self.cache.clear();
    }

    pub fn is_assignable(&mut self, src: TypeId, dst: TypeId) -> bool {
        if src == dst {
            return true;
        }
        if let Some(&cached) = self.cache.get(&(src, dst)) {
            return cached;
        }
        if !self.in_flight.insert((src, dst)) {
            // Already computing this exact pair further up the stack:
            // assume true (co-inductive cycle breaker) and let the
            // enclosing frame's real result land in the cache.
            return true;
        }
        let result = self.compute(src, dst);
        self.in_flight.remove(&(src, dst));
        self.cache.insert((src, dst), result);
        result
    }

    fn compute(&mut self, src: TypeId, dst: TypeId) -> bool {
        let src_info = self.arena.get(src).clone();
        let dst_info = self.arena.get(dst).clone();

        // any/unknown/never identity rules.
        if matches!(src_info, TypeInfo::Any) || matches!(dst_info, TypeInfo::Any) {
            return true;
        }
        if matches!(dst_info, TypeInfo::Unknown) {
            return true;
        }
        if matches!(src_info, TypeInfo::Never) {
            return true;
        }
        if matches!(dst_info, TypeInfo::Never) {
            return false;
        }

        // Unions: src assignable to dst if every src member is assignable
        // to dst (when src is a union); separately, src is assignable to a
        // union dst if assignable to at least one dst member.
        if let TypeInfo::Union(dst_members) = &dst_info {
            return dst_members
                .clone()
                .into_iter()
                .any(|m| self.is_assignable(src, m));
        }
        if let TypeInfo::Union(src_members) = &src_info {
            return src_members
                .clone()
                .into_iter()
                .all(|m| self.is_assignable(m, dst));
        }

        // Intersections: src assignable to dst if assignable to every dst
        // member; src (itself an intersection) is assignable to a
        // non-union dst if any member is assignable (it has at least that
        // member's capabilities).
        if let TypeInfo::Intersection(dst_members) = &dst_info {
            return dst_members
                .clone()
                .into_iter()
                .all(|m| self.is_assignable(src, m));
        }
        if let TypeInfo::Intersection(src_members) = &src_info {
            return src_members
                .clone()
                .into_iter()
                .any(|m| self.is_assignable(m, dst));
        }

        match (&src_info, &dst_info) {
            (TypeInfo::Literal(lit), TypeInfo::Primitive(p)) => lit.base_primitive() == *p,
            (TypeInfo::Literal(a), TypeInfo::Literal(b)) => a == b,
            (TypeInfo::Primitive(a), TypeInfo::Primitive(b)) => a == b,
            (TypeInfo::Void, TypeInfo::Void) => true,
            (TypeInfo::ThisType, TypeInfo::ThisType) => true,

            (TypeInfo::Array(a), TypeInfo::Array(b)) => self.is_assignable(*a, *b),

            (TypeInfo::Tuple(a), TypeInfo::Tuple(b)) => self.tuple_assignable(a, b),
            (TypeInfo::Tuple(a), TypeInfo::Array(b)) => {
                a.elements.iter().all(|e| self.is_assignable(e.ty, *b))
            }

            (TypeInfo::Function(a), TypeInfo::Function(b)) => self.function_assignable(a, b),

            (TypeInfo::Record(sk, sv), TypeInfo::Record(dk, dv)) => {
                self.is_assignable(*dk, *sk) && self.is_assignable(*sv, *dv)
            }

            (TypeInfo::Instance(a), TypeInfo::Instance(b)) => self.instance_assignable(a, b),

            (TypeInfo::Enum(a), TypeInfo::Enum(b)) => a.name == b.name,
            (TypeInfo::Literal(lit), TypeInfo::Enum(e)) => {
                e.members.iter().any(|(_, v)| v == lit)
            }

            (TypeInfo::Interface(_), TypeInfo::Interface(_))
            | (TypeInfo::Interface(_), TypeInfo::Record(_, _))
            | (TypeInfo::Instance(_), TypeInfo::Interface(_))
            | (TypeInfo::Class(_), TypeInfo::Interface(_)) => {
                self.structural_assignable(src, dst)
            }

            (TypeInfo::TypeParameter(tp), _) => match tp.constraint {
                Some(c) => self.is_assignable(c, dst),
                None => false,
            },
            (_, TypeInfo::TypeParameter(tp)) => match tp.constraint {
                Some(c) => self.is_assignable(src, c),
                None => false,
            },

            _ => false,
        }
    }

    fn tuple_assignable(&mut self, src: &TupleShape, dst: &TupleShape) -> bool {
        if dst.required_count > src.elements.len() {
            return false;
        }
        for (i, dst_elem) in dst.elements.iter().enumerate() {
            match src.elements.get(i) {
                Some(src_elem) => {
                    if !self.is_assignable(src_elem.ty, dst_elem.ty) {
                        return false;
                    }
                }
                None => {
                    if dst_elem.kind == TupleElementKind::Required {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Contravariant parameters, covariant return, rest parameters expand,
    /// fewer-parameter functions are assignable to wider targets.
    fn function_assignable(&mut self, src: &FunctionShape, dst: &FunctionShape) -> bool {
        if dst.required_count < src.required_count {
            return false;
        }
        for (i, dst_param) in dst.params.iter().enumerate() {
            let dst_ty = dst_param.ty;
            let src_ty = match src.params.get(i) {
                Some(p) => p.ty,
                None => {
                    if let Some(last) = src.params.last() {
                        if last.rest {
                            last.ty
                        } else {
                            // src has fewer parameters than dst needs to
                            // supply at this position: fine, src just
                            // ignores the extra argument dst may pass.
                            continue;
                        }
                    } else {
                        continue;
                    }
                }
            };
            // Contravariant: dst's param type must be assignable *to*
            // src's declared param type.
            if !self.is_assignable(dst_ty, src_ty) {
                return false;
            }
        }
        self.is_assignable(src.return_type, dst.return_type)
    }

    /// Generic type arguments are checked invariantly (§4.3.2).
    fn instance_assignable(&mut self, src: &InstanceShape, dst: &InstanceShape) -> bool {
        if src.class != dst.class {
            return self.nominal_supertype(src.class, dst.class, &src.type_arguments, &dst.type_arguments);
        }
        if src.type_arguments.len() != dst.type_arguments.len() {
            return false;
        }
        src.type_arguments
            .iter()
            .zip(dst.type_arguments.iter())
            .all(|(&s, &d)| self.is_assignable(s, d) && self.is_assignable(d, s))
    }

    /// Nominal class compatibility: `src` must be `dst` or a subclass of
    /// `dst` along the `extends` chain.
    fn nominal_supertype(
        &mut self,
        src_class: TypeId,
        dst_class: TypeId,
        src_args: &[TypeId],
        dst_args: &[TypeId],
    ) -> bool {
        let _ = (src_args, dst_args);
        let mut current = Some(src_class);
        while let Some(class_id) = current {
            if class_id == dst_class {
                return true;
            }
            current = match self.arena.get(class_id) {
                TypeInfo::Class(shape) => shape.superclass,
                _ => None,
            };
        }
        false
    }

    /// Structural compatibility for interfaces/records/object-like types:
    /// every declared member of `dst` must exist in `src` with an
    /// assignable type; optional members may be missing.
    fn structural_assignable(&mut self, src: TypeId, dst: TypeId) -> bool {
        let dst_members = match self.members_of(dst) {
            Some(m) => m,
            None => return false,
        };
        let src_members = match self.members_of(src) {
            Some(m) => m,
            None => return false,
        };
        for (name, dst_ty, optional) in &dst_members {
            match src_members.iter().find(|(n, _, _)| n == name) {
                Some((_, src_ty, _)) => {
                    if !self.is_assignable(*src_ty, *dst_ty) {
                        return false;
                    }
                }
                None => {
                    if !optional {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn members_of(&self, id: TypeId) -> Option<Vec<(sharpts_common::Atom, TypeId, bool)>> {
        match self.arena.get(id) {
            TypeInfo::Interface(shape) => Some(
                shape
                    .members
                    .iter()
                    .map(|(n, t, opt)| (n.clone(), *t, *opt))
                    .collect(),
            ),
            TypeInfo::Class(shape) => Some(
                shape
                    .members
                    .iter()
                    .map(|(n, t, _readonly)| (n.clone(), *t, false))
                    .collect(),
            ),
            TypeInfo::Instance(shape) => self.members_of(shape.class),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::TypeArena;
    use crate::builder::TypeBuilder;

    #[test]
    fn reflexivity_for_every_shape() {
        let mut arena = TypeArena::new();
        let mut b = TypeBuilder::new(&mut arena);
        let s = b.primitive(Primitive::String);
        let n = b.never();
        let u = b.unknown();
        let union = b.union([s, n]);
        drop(b);
        let mut checker = AssignabilityChecker::new(&arena);
        for t in [s, n, u, union] {
            assert!(checker.is_assignable(t, t));
        }
    }

    #[test]
    fn never_assignable_to_everything_nothing_assignable_to_never() {
        let mut arena = TypeArena::new();
        let mut b = TypeBuilder::new(&mut arena);
        let s = b.primitive(Primitive::String);
        let n = b.never();
        drop(b);
        let mut checker = AssignabilityChecker::new(&arena);
        assert!(checker.is_assignable(n, s));
        assert!(!checker.is_assignable(s, n));
    }

    #[test]
    fn everything_assignable_to_unknown() {
        let mut arena = TypeArena::new();
        let mut b = TypeBuilder::new(&mut arena);
        let s = b.primitive(Primitive::String);
        let u = b.unknown();
        drop(b);
        let mut checker = AssignabilityChecker::new(&arena);
        assert!(checker.is_assignable(s, u));
    }

    #[test]
    fn literal_assignable_to_primitive_not_reverse() {
        let mut arena = TypeArena::new();
        let mut b = TypeBuilder::new(&mut arena);
        let s = b.primitive(Primitive::String);
        let lit = b.literal(LiteralValue::String(sharpts_common::Atom::new("foo")));
        drop(b);
        let mut checker = AssignabilityChecker::new(&arena);
        assert!(checker.is_assignable(lit, s));
        assert!(!checker.is_assignable(s, lit));
    }

    #[test]
    fn fresh_union_instances_are_memo_equivalent() {
        let mut arena = TypeArena::new();
        let mut b = TypeBuilder::new(&mut arena);
        let s = b.primitive(Primitive::String);
        let n = b.primitive(Primitive::Number);
        let u1 = b.union([s, n]);
        let u2 = b.union([n, s]);
        drop(b);
        assert_eq!(u1, u2, "canonical union construction should hash-cons identically regardless of input order");
        let mut checker = AssignabilityChecker::new(&arena);
        assert!(checker.is_assignable(u1, u2));
    }
}
