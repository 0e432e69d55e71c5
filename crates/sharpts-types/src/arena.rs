//! `TypeId` interning arena.
//!
//! `TypeInfo` needs a structural equality comparer that is recursive,
//! collection-aware, and cycle-safe, because it contains ordered
//! collections of child types. Rather than hashing nested `Box<TypeInfo>`
//! trees by hand, this checker interns every `TypeInfo` into a `TypeArena`
//! and refers to children by `TypeId`. Structural equality then falls out
//! of interning for free: two structurally-identical shapes canonicalize
//! to the same id, so equality is an integer comparison, hashing is a
//! no-op `u32` hash, and self-referential types (`interface Tree {
//! children: Tree[] }`) are cycle-safe because the cycle is *ids*, not
//! recursive values — there is nothing to walk.
//!
//! Self-reference is supported by [`TypeArena::reserve`]: allocate a slot
//! before the type's children are fully known, build the children (which
//! may legally reference the reserved id), then [`TypeArena::define`] the
//! slot. Interning a `TypeInfo` that only references already-defined ids
//! just does a hash-cons lookup.

use crate::info::TypeInfo;
use rustc_hash::FxHashMap;
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

/// Arena + hash-cons table. One arena is shared by the checker for the
/// lifetime of a single type-check run.
pub struct TypeArena {
    slots: Vec<Option<TypeInfo>>,
    interned: FxHashMap<TypeInfo, TypeId>,
}

impl Default for TypeArena {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeArena {
    pub fn new() -> Self {
        TypeArena {
            slots: Vec::new(),
            interned: FxHashMap::default(),
        }
    }

    /// Hash-cons: returns the existing id for a structurally-equal
    /// `TypeInfo` already in the arena, or allocates a new one. `TypeInfo`
    /// only ever holds `TypeId` children (never nested `TypeInfo`), so this
    /// hash/eq is shallow and terminates even for self-referential shapes.
    pub fn intern(&mut self, info: TypeInfo) -> TypeId {
        if let Some(&id) = self.interned.get(&info) {
            return id;
        }
        let id = self.push(info.clone());
        self.interned.insert(info, id);
        id
    }

    /// Reserve a slot for a type whose children will reference it before
    /// it is fully known (recursive interfaces/classes/mapped types over
    /// themselves). The reserved id is *not* hash-consed until
    /// [`TypeArena::define`] fills it in.
    pub fn reserve(&mut self) -> TypeId {
        self.push(TypeInfo::Never)
    }

    /// Fill in a reserved slot. Also hash-conses the final shape so later
    /// structurally-identical interning reuses this id.
    pub fn define(&mut self, id: TypeId, info: TypeInfo) {
        self.slots[id.0 as usize] = Some(info.clone());
        self.interned.entry(info).or_insert(id);
    }

    fn push(&mut self, info: TypeInfo) -> TypeId {
        let id = TypeId(self.slots.len() as u32);
        self.slots.push(Some(info));
        id
    }

    pub fn get(&self, id: TypeId) -> &TypeInfo {
        self.slots[id.0 as usize]
            .as_ref()
            .expect("dereferenced a TypeId whose reserved slot was never defined")
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::TypeInfo;

    #[test]
    fn structurally_identical_shapes_share_an_id() {
        let mut arena = TypeArena::new();
        let a = arena.intern(TypeInfo::Primitive(crate::info::Primitive::String));
        let b = arena.intern(TypeInfo::Primitive(crate::info::Primitive::String));
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_shapes_get_distinct_ids() {
        let mut arena = TypeArena::new();
        let a = arena.intern(TypeInfo::Primitive(crate::info::Primitive::String));
        let b = arena.intern(TypeInfo::Primitive(crate::info::Primitive::Number));
        assert_ne!(a, b);
    }

    #[test]
    fn self_referential_interface_hashes_in_bounded_time() {
        let mut arena = TypeArena::new();
        let placeholder = arena.reserve();
        let array_of_self = arena.intern(TypeInfo::Array(placeholder));
        arena.define(
            placeholder,
            TypeInfo::Interface(crate::info::InterfaceShape {
                members: vec![(sharpts_common::Atom::new("children"), array_of_self, false)],
                index_signatures: Vec::new(),
                call_signatures: Vec::new(),
                construct_signatures: Vec::new(),
                extends: Vec::new(),
            }),
        );
        // Must terminate and must not panic — that's the cycle-safety bar.
        assert!(matches!(arena.get(placeholder), TypeInfo::Interface(_)));
    }
}
