//! `TypeInfo` — the immutable type-model sum.
//!
//! Every composite variant holds `TypeId` children (see `arena.rs`)
//! instead of nested `Box<TypeInfo>`, so the type itself derives
//! `PartialEq`/`Eq`/`Hash` directly — no hand-rolled recursive comparer is
//! needed, and self-referential shapes can't blow the stack because there
//! is no recursive structure left to walk once children are ids.

use sharpts_common::Atom;

use crate::arena::TypeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Primitive {
    String,
    Number,
    Boolean,
    BigInt,
    Symbol,
    Null,
    Undefined,
}

/// A literal type's payload. Numbers are stored as IEEE-754 bit patterns
/// so the type derives `Eq`/`Hash` (`f64` does not).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LiteralValue {
    String(Atom),
    Number(u64),
    Boolean(bool),
    BigInt(Atom),
}

impl LiteralValue {
    pub fn number(value: f64) -> Self {
        LiteralValue::Number(value.to_bits())
    }

    pub fn as_f64(self) -> Option<f64> {
        match self {
            LiteralValue::Number(bits) => Some(f64::from_bits(bits)),
            _ => None,
        }
    }

    /// The primitive a literal type is a subtype of.
    pub fn base_primitive(self) -> Primitive {
        match self {
            LiteralValue::String(_) => Primitive::String,
            LiteralValue::Number(_) => Primitive::Number,
            LiteralValue::Boolean(_) => Primitive::Boolean,
            LiteralValue::BigInt(_) => Primitive::BigInt,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TupleElementKind {
    Required,
    Optional,
    Rest,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TupleSlot {
    pub ty: TypeId,
    pub kind: TupleElementKind,
    pub label: Option<Atom>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TupleShape {
    pub elements: Vec<TupleSlot>,
    /// Count of leading `Required` slots, cached per §3.3 ("required
    /// count") so assignability doesn't have to re-scan.
    pub required_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParamShape {
    pub name: Atom,
    pub ty: TypeId,
    pub optional: bool,
    pub rest: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionShape {
    pub type_params: Vec<TypeParameterShape>,
    pub params: Vec<ParamShape>,
    /// Count of leading non-optional, non-rest parameters.
    pub required_count: usize,
    pub return_type: TypeId,
    pub this_type: Option<TypeId>,
    pub predicate: Option<TypePredicateShape>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypePredicateShape {
    pub parameter_name: Atom,
    pub narrowed_type: Option<TypeId>,
    pub is_assertion: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemberShape {
    pub name: Atom,
    pub ty: TypeId,
    pub optional: bool,
    pub readonly: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexSignatureShape {
    pub key: IndexKeyKind,
    pub value: TypeId,
    pub readonly: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexKeyKind {
    String,
    Number,
    Symbol,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InterfaceShape {
    pub members: Vec<(Atom, TypeId, bool)>,
    pub index_signatures: Vec<IndexSignatureShape>,
    pub call_signatures: Vec<FunctionShape>,
    pub construct_signatures: Vec<FunctionShape>,
    /// Interfaces this one (directly) extends, by name — resolved member
    /// sets are already flattened into `members` by the checker at
    /// construction time, so this is kept for diagnostics/nominal display
    /// only, not re-walked during assignability.
    pub extends: Vec<Atom>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClassShape {
    pub name: Atom,
    pub type_params: Vec<TypeParameterShape>,
    /// Instance member name -> (type, readonly).
    pub members: Vec<(Atom, TypeId, bool)>,
    pub static_members: Vec<(Atom, TypeId, bool)>,
    pub superclass: Option<TypeId>,
    pub implements: Vec<TypeId>,
    pub is_abstract: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstanceShape {
    pub class: TypeId,
    pub type_arguments: Vec<TypeId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeParameterShape {
    pub name: Atom,
    pub constraint: Option<TypeId>,
    pub default: Option<TypeId>,
    pub is_const: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnumKind {
    Numeric,
    String,
    Heterogeneous,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EnumShape {
    pub name: Atom,
    pub kind: EnumKind,
    pub members: Vec<(Atom, LiteralValue)>,
    pub is_const: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MappedShape {
    pub source: TypeId,
    pub key_name: Atom,
    /// `as`-clause key remap, if present (`{ [K in keyof T as NewKey]: V }`).
    pub name_type: Option<TypeId>,
    pub value: TypeId,
    pub readonly: Option<MappedModifier>,
    pub optional: Option<MappedModifier>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MappedModifier {
    Add,
    Remove,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConditionalShape {
    pub check: TypeId,
    pub extends: TypeId,
    pub true_branch: TypeId,
    pub false_branch: TypeId,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TemplatePart {
    Text(String),
    Type(TypeId),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeInfo {
    Primitive(Primitive),
    Literal(LiteralValue),
    Array(TypeId),
    Tuple(TupleShape),
    /// Flattened, deduplicated members. Construct only via
    /// [`crate::builder::TypeBuilder::union`], which canonicalizes.
    Union(Vec<TypeId>),
    Intersection(Vec<TypeId>),
    Function(FunctionShape),
    Class(ClassShape),
    Interface(InterfaceShape),
    Instance(InstanceShape),
    Record(TypeId, TypeId),
    TypeParameter(TypeParameterShape),
    Enum(EnumShape),
    KeyOf(TypeId),
    TypeOf(Vec<Atom>),
    Mapped(MappedShape),
    Conditional(ConditionalShape),
    TemplateLiteralType(Vec<TemplatePart>),
    ThisType,
    Void,
    Any,
    Unknown,
    Never,
    TypePredicate(TypePredicateShape),
}

impl TypeInfo {
    pub fn is_never(&self) -> bool {
        matches!(self, TypeInfo::Never)
    }

    pub fn is_any_or_unknown(&self) -> bool {
        matches!(self, TypeInfo::Any | TypeInfo::Unknown)
    }
}
