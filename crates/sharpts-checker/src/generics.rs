//! Generic instantiation: substituting type parameters for concrete type
//! arguments.
//!
//! Structural types only ever reference children by `TypeId`, so
//! substitution is a shape-preserving walk that rebuilds a type with its
//! `TypeParameter` leaves replaced. Self-referential shapes (a recursive
//! generic interface instantiated with itself) are handled the same way
//! [`TypeArena::reserve`]/`define` handle construction: reserve an id for
//! the node being substituted *before* recursing into its children, so a
//! child that refers back to the same original id gets the (stable, if
//! not yet filled in) reserved id instead of looping forever.

use rustc_hash::FxHashMap;
use sharpts_common::Atom;
use sharpts_types::*;

use crate::checker::Checker;

pub fn substitute(checker: &mut Checker, ty: TypeId, map: &FxHashMap<Atom, TypeId>) -> TypeId {
    if map.is_empty() {
        return ty;
    }
    let mut memo = FxHashMap::default();
    substitute_rec(checker, ty, map, &mut memo)
}

fn substitute_rec(
    checker: &mut Checker,
    ty: TypeId,
    map: &FxHashMap<Atom, TypeId>,
    memo: &mut FxHashMap<TypeId, TypeId>,
) -> TypeId {
    if let Some(&cached) = memo.get(&ty) {
        return cached;
    }
    let info = checker.arena.get(ty).clone();
    match info {
        TypeInfo::TypeParameter(shape) => {
            let result = map.get(&shape.name).copied().unwrap_or(ty);
            memo.insert(ty, result);
            result
        }
        TypeInfo::Primitive(_)
        | TypeInfo::Literal(_)
        | TypeInfo::ThisType
        | TypeInfo::Void
        | TypeInfo::Any
        | TypeInfo::Unknown
        | TypeInfo::Never
        | TypeInfo::TypeOf(_)
        | TypeInfo::Class(_)
        | TypeInfo::Enum(_) => {
            memo.insert(ty, ty);
            ty
        }
        TypeInfo::Array(elem) => {
            let placeholder = checker.arena.reserve();
            memo.insert(ty, placeholder);
            let elem = substitute_rec(checker, elem, map, memo);
            checker.arena.define(placeholder, TypeInfo::Array(elem));
            placeholder
        }
        TypeInfo::Tuple(shape) => {
            let placeholder = checker.arena.reserve();
            memo.insert(ty, placeholder);
            let elements = shape
                .elements
                .into_iter()
                .map(|slot| TupleSlot {
                    ty: substitute_rec(checker, slot.ty, map, memo),
                    kind: slot.kind,
                    label: slot.label,
                })
                .collect();
            checker.arena.define(
                placeholder,
                TypeInfo::Tuple(TupleShape {
                    elements,
                    required_count: shape.required_count,
                }),
            );
            placeholder
        }
        TypeInfo::Union(members) => {
            let placeholder = checker.arena.reserve();
            memo.insert(ty, placeholder);
            let members = members
                .into_iter()
                .map(|m| substitute_rec(checker, m, map, memo))
                .collect();
            checker.arena.define(placeholder, TypeInfo::Union(members));
            placeholder
        }
        TypeInfo::Intersection(members) => {
            let placeholder = checker.arena.reserve();
            memo.insert(ty, placeholder);
            let members = members
                .into_iter()
                .map(|m| substitute_rec(checker, m, map, memo))
                .collect();
            checker.arena.define(placeholder, TypeInfo::Intersection(members));
            placeholder
        }
        TypeInfo::Function(shape) => {
            let placeholder = checker.arena.reserve();
            memo.insert(ty, placeholder);
            let new_shape = substitute_function_shape(checker, shape, map, memo);
            checker.arena.define(placeholder, TypeInfo::Function(new_shape));
            placeholder
        }
        TypeInfo::Interface(shape) => {
            let placeholder = checker.arena.reserve();
            memo.insert(ty, placeholder);
            let members = shape
                .members
                .into_iter()
                .map(|(n, t, ro)| (n, substitute_rec(checker, t, map, memo), ro))
                .collect();
            let index_signatures = shape
                .index_signatures
                .into_iter()
                .map(|s| IndexSignatureShape {
                    key: s.key,
                    value: substitute_rec(checker, s.value, map, memo),
                    readonly: s.readonly,
                })
                .collect();
            let call_signatures = shape
                .call_signatures
                .into_iter()
                .map(|f| substitute_function_shape(checker, f, map, memo))
                .collect();
            let construct_signatures = shape
                .construct_signatures
                .into_iter()
                .map(|f| substitute_function_shape(checker, f, map, memo))
                .collect();
            checker.arena.define(
                placeholder,
                TypeInfo::Interface(InterfaceShape {
                    members,
                    index_signatures,
                    call_signatures,
                    construct_signatures,
                    extends: shape.extends,
                }),
            );
            placeholder
        }
        TypeInfo::Instance(shape) => {
            let placeholder = checker.arena.reserve();
            memo.insert(ty, placeholder);
            let type_arguments = shape
                .type_arguments
                .into_iter()
                .map(|a| substitute_rec(checker, a, map, memo))
                .collect();
            checker.arena.define(
                placeholder,
                TypeInfo::Instance(InstanceShape {
                    class: shape.class,
                    type_arguments,
                }),
            );
            placeholder
        }
        TypeInfo::Record(key, value) => {
            let placeholder = checker.arena.reserve();
            memo.insert(ty, placeholder);
            let key = substitute_rec(checker, key, map, memo);
            let value = substitute_rec(checker, value, map, memo);
            checker.arena.define(placeholder, TypeInfo::Record(key, value));
            placeholder
        }
        TypeInfo::KeyOf(inner) => {
            let placeholder = checker.arena.reserve();
            memo.insert(ty, placeholder);
            let inner = substitute_rec(checker, inner, map, memo);
            checker.arena.define(placeholder, TypeInfo::KeyOf(inner));
            placeholder
        }
        TypeInfo::Mapped(shape) => {
            let placeholder = checker.arena.reserve();
            memo.insert(ty, placeholder);
            let source = substitute_rec(checker, shape.source, map, memo);
            let name_type = shape.name_type.map(|t| substitute_rec(checker, t, map, memo));
            let value = substitute_rec(checker, shape.value, map, memo);
            checker.arena.define(
                placeholder,
                TypeInfo::Mapped(MappedShape {
                    source,
                    key_name: shape.key_name,
                    name_type,
                    value,
                    readonly: shape.readonly,
                    optional: shape.optional,
                }),
            );
            placeholder
        }
        TypeInfo::Conditional(shape) => {
            let placeholder = checker.arena.reserve();
            memo.insert(ty, placeholder);
            let check = substitute_rec(checker, shape.check, map, memo);
            let extends = substitute_rec(checker, shape.extends, map, memo);
            let true_branch = substitute_rec(checker, shape.true_branch, map, memo);
            let false_branch = substitute_rec(checker, shape.false_branch, map, memo);
            checker.arena.define(
                placeholder,
                TypeInfo::Conditional(ConditionalShape {
                    check,
                    extends,
                    true_branch,
                    false_branch,
                }),
            );
            placeholder
        }
        TypeInfo::TemplateLiteralType(parts) => {
            let placeholder = checker.arena.reserve();
            memo.insert(ty, placeholder);
            let parts = parts
                .into_iter()
                .map(|p| match p {
                    TemplatePart::Text(s) => TemplatePart::Text(s),
                    TemplatePart::Type(t) => TemplatePart::Type(substitute_rec(checker, t, map, memo)),
                })
                .collect();
            checker.arena.define(placeholder, TypeInfo::TemplateLiteralType(parts));
            placeholder
        }
        TypeInfo::TypePredicate(shape) => {
            let placeholder = checker.arena.reserve();
            memo.insert(ty, placeholder);
            let narrowed_type = shape.narrowed_type.map(|t| substitute_rec(checker, t, map, memo));
            checker.arena.define(
                placeholder,
                TypeInfo::TypePredicate(TypePredicateShape {
                    parameter_name: shape.parameter_name,
                    narrowed_type,
                    is_assertion: shape.is_assertion,
                }),
            );
            placeholder
        }
    }
}

fn substitute_function_shape(
    checker: &mut Checker,
    shape: FunctionShape,
    map: &FxHashMap<Atom, TypeId>,
    memo: &mut FxHashMap<TypeId, TypeId>,
) -> FunctionShape {
    let params = shape
        .params
        .into_iter()
        .map(|p| ParamShape {
            name: p.name,
            ty: substitute_rec(checker, p.ty, map, memo),
            optional: p.optional,
            rest: p.rest,
        })
        .collect();
    let return_type = substitute_rec(checker, shape.return_type, map, memo);
    let this_type = shape.this_type.map(|t| substitute_rec(checker, t, map, memo));
    let predicate = shape.predicate.map(|p| TypePredicateShape {
        parameter_name: p.parameter_name,
        narrowed_type: p.narrowed_type.map(|t| substitute_rec(checker, t, map, memo)),
        is_assertion: p.is_assertion,
    });
    FunctionShape {
        type_params: shape.type_params,
        params,
        required_count: shape.required_count,
        return_type,
        this_type,
        predicate,
    }
}

/// Infers type arguments for a generic call from concrete argument types by
/// unifying each parameter's (possibly parameterized) type against the
/// matching argument's inferred type, preferring the first argument that
/// pins down each type parameter.
/// A type parameter marked `const` keeps the literal argument type supplied
/// at the call site rather than widening it to its base primitive.
pub fn infer_type_arguments(
    checker: &mut Checker,
    shape: &FunctionShape,
    arg_types: &[TypeId],
) -> FxHashMap<Atom, TypeId> {
    let mut inferred: FxHashMap<Atom, TypeId> = FxHashMap::default();
    for (param, arg_ty) in shape.params.iter().zip(arg_types.iter()) {
        unify(checker, param.ty, *arg_ty, shape, &mut inferred);
    }
    for tp in &shape.type_params {
        if !inferred.contains_key(&tp.name) {
            let fallback = tp
                .default
                .or(tp.constraint)
                .unwrap_or_else(|| checker.builder().unknown());
            inferred.insert(tp.name.clone(), fallback);
        } else if !tp.is_const {
            let current = inferred[&tp.name];
            let widened = widen_literal(checker, current);
            inferred.insert(tp.name.clone(), widened);
        }
    }
    inferred
}

fn unify(
    checker: &mut Checker,
    param_ty: TypeId,
    arg_ty: TypeId,
    shape: &FunctionShape,
    out: &mut FxHashMap<Atom, TypeId>,
) {
    match checker.arena.get(param_ty).clone() {
        TypeInfo::TypeParameter(tp) if shape.type_params.iter().any(|p| p.name == tp.name) => {
            out.entry(tp.name).or_insert(arg_ty);
        }
        TypeInfo::Array(elem) => {
            if let TypeInfo::Array(arg_elem) = checker.arena.get(arg_ty).clone() {
                unify(checker, elem, arg_elem, shape, out);
            }
        }
        _ => {}
    }
}

fn widen_literal(checker: &mut Checker, ty: TypeId) -> TypeId {
    match checker.arena.get(ty).clone() {
        TypeInfo::Literal(lit) => checker.builder().primitive(lit.base_primitive()),
        _ => ty,
    }
}
