//! Canonicalizing constructors over a [`TypeArena`].
//!
//! Plain `arena.intern(TypeInfo::Union(members))` would hash-cons on
//! whatever member order the caller happened to build, so `string|number`
//! and `number|string` would *not* share an id even though they denote the
//! same type. `TypeBuilder` is where the union/intersection invariants
//! (flat and deduplicated; `never` absorbed in intersections, erased in
//! unions) actually get enforced, once, at construction time.

use crate::arena::{TypeArena, TypeId};
use crate::info::*;

pub struct TypeBuilder<'a> {
    pub arena: &'a mut TypeArena,
}

impl<'a> TypeBuilder<'a> {
    pub fn new(arena: &'a mut TypeArena) -> Self {
        TypeBuilder { arena }
    }

    pub fn primitive(&mut self, p: Primitive) -> TypeId {
        self.arena.intern(TypeInfo::Primitive(p))
    }

    pub fn literal(&mut self, v: LiteralValue) -> TypeId {
        self.arena.intern(TypeInfo::Literal(v))
    }

    pub fn any(&mut self) -> TypeId {
        self.arena.intern(TypeInfo::Any)
    }

    pub fn unknown(&mut self) -> TypeId {
        self.arena.intern(TypeInfo::Unknown)
    }

    pub fn never(&mut self) -> TypeId {
        self.arena.intern(TypeInfo::Never)
    }

    pub fn void(&mut self) -> TypeId {
        self.arena.intern(TypeInfo::Void)
    }

    pub fn this_type(&mut self) -> TypeId {
        self.arena.intern(TypeInfo::ThisType)
    }

    pub fn array(&mut self, elem: TypeId) -> TypeId {
        self.arena.intern(TypeInfo::Array(elem))
    }

    pub fn tuple(&mut self, elements: Vec<TupleSlot>) -> TypeId {
        let required_count = elements
            .iter()
            .take_while(|e| e.kind == TupleElementKind::Required)
            .count();
        self.arena.intern(TypeInfo::Tuple(TupleShape {
            elements,
            required_count,
        }))
    }

    /// Flattens nested unions, erases `never`, dedupes, and sorts members
    /// by id for a canonical (order-independent) shape. A singleton
    /// collapses to that member; an empty union collapses to `never`.
    pub fn union(&mut self, members: impl IntoIterator<Item = TypeId>) -> TypeId {
        let never = self.never();
        let mut flat = Vec::new();
        let mut stack: Vec<TypeId> = members.into_iter().collect();
        while let Some(id) = stack.pop() {
            if id == never {
                continue;
            }
            match self.arena.get(id).clone() {
                TypeInfo::Union(inner) => stack.extend(inner),
                _ => flat.push(id),
            }
        }
        flat.sort_by_key(|id| id.raw());
        flat.dedup();
        match flat.len() {
            0 => never,
            1 => flat[0],
            _ => self.arena.intern(TypeInfo::Union(flat)),
        }
    }

    /// Flattens nested intersections and dedupes; any `never` member
    /// absorbs the whole intersection to `never` (§3.3).
    pub fn intersection(&mut self, members: impl IntoIterator<Item = TypeId>) -> TypeId {
        let never = self.never();
        let mut flat = Vec::new();
        let mut stack: Vec<TypeId> = members.into_iter().collect();
        while let Some(id) = stack.pop() {
            if id == never {
                return never;
            }
            match self.arena.get(id).clone() {
                TypeInfo::Intersection(inner) => stack.extend(inner),
                _ => flat.push(id),
            }
        }
        flat.sort_by_key(|id| id.raw());
        flat.dedup();
        match flat.len() {
            0 => self.unknown(),
            1 => flat[0],
            _ => self.arena.intern(TypeInfo::Intersection(flat)),
        }
    }

    pub fn function(&mut self, shape: FunctionShape) -> TypeId {
        self.arena.intern(TypeInfo::Function(shape))
    }

    pub fn interface(&mut self, shape: InterfaceShape) -> TypeId {
        self.arena.intern(TypeInfo::Interface(shape))
    }

    pub fn class(&mut self, shape: ClassShape) -> TypeId {
        self.arena.intern(TypeInfo::Class(shape))
    }

    pub fn instance(&mut self, class: TypeId, type_arguments: Vec<TypeId>) -> TypeId {
        self.arena
            .intern(TypeInfo::Instance(InstanceShape { class, type_arguments }))
    }

    pub fn record(&mut self, key: TypeId, value: TypeId) -> TypeId {
        self.arena.intern(TypeInfo::Record(key, value))
    }

    pub fn type_parameter(&mut self, shape: TypeParameterShape) -> TypeId {
        self.arena.intern(TypeInfo::TypeParameter(shape))
    }

    pub fn r#enum(&mut self, shape: EnumShape) -> TypeId {
        self.arena.intern(TypeInfo::Enum(shape))
    }

    pub fn key_of(&mut self, source: TypeId) -> TypeId {
        self.arena.intern(TypeInfo::KeyOf(source))
    }

    pub fn type_predicate(&mut self, shape: TypePredicateShape) -> TypeId {
        self.arena.intern(TypeInfo::TypePredicate(shape))
    }
}

impl TypeId {
    pub fn raw(self) -> u32 {
        self.0
    }
}
