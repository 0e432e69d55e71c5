//! Type-annotation resolution: `TypeNode` (parser AST, §3.2) to `TypeId`
//! (checker model, §3.3). This is where named references are looked up in
//! the environment and generic type arguments get substituted.

use rustc_hash::FxHashMap;
use sharpts_common::Atom;
use sharpts_parser::ast::{TupleElementKind, TypeMember, TypeNode, TypeNodeKind};
use sharpts_types::*;

use crate::checker::Checker;
use crate::generics::substitute;

impl Checker {
    pub fn resolve_type(&mut self, node: &TypeNode) -> TypeId {
        match &node.kind {
            TypeNodeKind::Named { name, type_args } => self.resolve_named_type(node, name, type_args),
            TypeNodeKind::Array(elem) => {
                let elem_ty = self.resolve_type(elem);
                self.builder().array(elem_ty)
            }
            TypeNodeKind::Tuple(elements) => {
                let slots = elements
                    .iter()
                    .map(|e| {
                        let ty = self.resolve_type(&e.ty);
                        TupleSlot {
                            ty,
                            kind: match e.kind {
                                TupleElementKind::Required => sharpts_types::TupleElementKind::Required,
                                TupleElementKind::Optional => sharpts_types::TupleElementKind::Optional,
                                TupleElementKind::Rest => sharpts_types::TupleElementKind::Rest,
                            },
                            label: e.label.clone(),
                        }
                    })
                    .collect();
                self.builder().tuple(slots)
            }
            TypeNodeKind::Union(members) => {
                let ids: Vec<TypeId> = members.iter().map(|m| self.resolve_type(m)).collect();
                self.builder().union(ids)
            }
            TypeNodeKind::Intersection(members) => {
                let ids: Vec<TypeId> = members.iter().map(|m| self.resolve_type(m)).collect();
                self.builder().intersection(ids)
            }
            TypeNodeKind::Function {
                type_params,
                params,
                this_param,
                return_type,
            } => {
                self.env.push_block_scope();
                let shape_type_params = self.resolve_type_params(type_params);
                let param_shapes = self.resolve_param_shapes(params);
                let this_type = this_param.as_ref().map(|t| self.resolve_type(t));
                let (return_id, predicate) = self.resolve_return_type(return_type);
                self.env.pop_scope();
                let required_count = param_shapes
                    .iter()
                    .take_while(|p| !p.optional && !p.rest)
                    .count();
                self.builder().function(FunctionShape {
                    type_params: shape_type_params,
                    params: param_shapes,
                    required_count,
                    return_type: return_id,
                    this_type,
                    predicate,
                })
            }
            TypeNodeKind::ObjectLiteralType(members) => self.resolve_object_literal_type(members),
            TypeNodeKind::Keyof(inner) => {
                let id = self.resolve_type(inner);
                self.builder().key_of(id)
            }
            TypeNodeKind::Typeof(path) => self.resolve_typeof(path),
            TypeNodeKind::TemplateLiteral(parts) => {
                let parts = parts
                    .iter()
                    .map(|p| match p {
                        sharpts_parser::ast::TemplateLiteralTypePart::Text(s) => TemplatePart::Text(s.clone()),
                        sharpts_parser::ast::TemplateLiteralTypePart::Type(t) => {
                            TemplatePart::Type(self.resolve_type(t))
                        }
                    })
                    .collect();
                self.arena.intern(TypeInfo::TemplateLiteralType(parts))
            }
            TypeNodeKind::Mapped {
                key_name,
                constraint,
                name_type: _name_type,
                value,
                readonly,
                optional,
            } => self.resolve_mapped_type(key_name, constraint, value, *readonly, *optional),
            TypeNodeKind::Conditional {
                check,
                extends,
                true_branch,
                false_branch,
            } => self.resolve_conditional_type(check, extends, true_branch, false_branch),
            TypeNodeKind::Infer(_name) => self.builder().unknown(),
            TypeNodeKind::ThisType => self.builder().this_type(),
            TypeNodeKind::TypePredicate { .. } => self.builder().primitive(Primitive::Boolean),
            TypeNodeKind::Literal(lit) => self.resolve_literal_type(lit),
            TypeNodeKind::Paren(inner) => self.resolve_type(inner),
            TypeNodeKind::Rest(inner) => self.resolve_type(inner),
            TypeNodeKind::Optional(inner) => {
                let id = self.resolve_type(inner);
                let undef = self.builder().primitive(Primitive::Undefined);
                self.builder().union([id, undef])
            }
        }
    }

    fn resolve_literal_type(&mut self, lit: &sharpts_parser::ast::Literal) -> TypeId {
        use sharpts_parser::ast::Literal;
        match lit {
            Literal::Null => self.arena.intern(TypeInfo::Primitive(Primitive::Null)),
            Literal::Undefined => self.arena.intern(TypeInfo::Primitive(Primitive::Undefined)),
            Literal::Bool(b) => self.builder().literal(LiteralValue::Boolean(*b)),
            Literal::Number(n) => self.builder().literal(LiteralValue::number(*n)),
            Literal::BigInt(s) => self.builder().literal(LiteralValue::BigInt(Atom::new(s))),
            Literal::Str(s) => self.builder().literal(LiteralValue::String(Atom::new(s))),
        }
    }

    fn resolve_named_type(&mut self, node: &TypeNode, name: &Atom, type_args: &[TypeNode]) -> TypeId {
        match name.as_str().as_ref() {
            "string" => return self.builder().primitive(Primitive::String),
            "number" => return self.builder().primitive(Primitive::Number),
            "boolean" => return self.builder().primitive(Primitive::Boolean),
            "bigint" => return self.builder().primitive(Primitive::BigInt),
            "symbol" => return self.builder().primitive(Primitive::Symbol),
            "null" => return self.arena.intern(TypeInfo::Primitive(Primitive::Null)),
            "undefined" => return self.arena.intern(TypeInfo::Primitive(Primitive::Undefined)),
            "any" => return self.builder().any(),
            "unknown" => return self.builder().unknown(),
            "never" => return self.builder().never(),
            "void" => return self.builder().void(),
            "object" => return self.builder().interface(InterfaceShape {
                members: Vec::new(),
                index_signatures: Vec::new(),
                call_signatures: Vec::new(),
                construct_signatures: Vec::new(),
                extends: Vec::new(),
            }),
            "Array" | "ReadonlyArray" => {
                let elem = type_args
                    .first()
                    .map(|t| self.resolve_type(t))
                    .unwrap_or_else(|| self.builder().any());
                return self.builder().array(elem);
            }
            "Record" => {
                let key = type_args
                    .first()
                    .map(|t| self.resolve_type(t))
                    .unwrap_or_else(|| self.builder().primitive(Primitive::String));
                let value = type_args
                    .get(1)
                    .map(|t| self.resolve_type(t))
                    .unwrap_or_else(|| self.builder().any());
                return self.builder().record(key, value);
            }
            "Promise" => {
                let inner = type_args
                    .first()
                    .map(|t| self.resolve_type(t))
                    .unwrap_or_else(|| self.builder().any());
                return self.promise_instance(inner);
            }
            _ => {}
        }

        let args: Vec<TypeId> = type_args.iter().map(|t| self.resolve_type(t)).collect();
        let Some(binding) = self.env.lookup(name).cloned() else {
            self.diagnostics.push(sharpts_common::Diagnostic::error(
                node.span,
                format!("Cannot find name '{}'.", name.as_str()),
            ));
            return self.builder().any();
        };

        if args.is_empty() {
            return binding.declared_type;
        }

        let mut substitution = FxHashMap::default();
        if let TypeInfo::Class(shape) = self.arena.get(binding.declared_type).clone() {
            for (param, arg) in shape.type_params.iter().zip(args.iter()) {
                substitution.insert(param.name.clone(), *arg);
            }
            return self.builder().instance(binding.declared_type, args);
        }
        if let TypeInfo::Interface(_) = self.arena.get(binding.declared_type) {
            return substitute(self, binding.declared_type, &substitution);
        }
        substitute(self, binding.declared_type, &substitution)
    }

    fn resolve_typeof(&mut self, path: &[Atom]) -> TypeId {
        let Some(first) = path.first() else {
            return self.builder().any();
        };
        match self.env.lookup(first) {
            Some(binding) => binding.declared_type,
            None => self.builder().any(),
        }
    }

    pub(crate) fn resolve_type_params(&mut self, params: &[sharpts_parser::ast::TypeParam]) -> Vec<TypeParameterShape> {
        let mut shapes = Vec::with_capacity(params.len());
        for p in params {
            let constraint = p.constraint.as_ref().map(|c| self.resolve_type(c));
            let default = p.default.as_ref().map(|d| self.resolve_type(d));
            let shape = TypeParameterShape {
                name: p.name.clone(),
                constraint,
                default,
                is_const: p.is_const,
            };
            let id = self.builder().type_parameter(shape.clone());
            self.env.define(
                p.name.clone(),
                crate::environment::Binding::new(id, crate::environment::BindingKind::TypeParameter),
            );
            shapes.push(shape);
        }
        shapes
    }

    pub(crate) fn resolve_param_shapes(&mut self, params: &[sharpts_parser::ast::Param]) -> Vec<ParamShape> {
        params
            .iter()
            .map(|p| {
                let ty = p
                    .type_annotation
                    .as_ref()
                    .map(|t| self.resolve_type(t))
                    .unwrap_or_else(|| self.builder().any());
                ParamShape {
                    name: crate::hoist::param_name(p),
                    ty,
                    optional: p.optional || p.default.is_some(),
                    rest: p.rest,
                }
            })
            .collect()
    }

    /// Returns the return type id, plus a type predicate shape when the
    /// annotation is `x is T` / `asserts x is T` / bare `asserts x`.
    pub(crate) fn resolve_return_type(
        &mut self,
        node: &TypeNode,
    ) -> (TypeId, Option<TypePredicateShape>) {
        if let TypeNodeKind::TypePredicate {
            parameter_name,
            narrowed_type,
            is_assertion,
        } = &node.kind
        {
            let narrowed = narrowed_type.as_ref().map(|t| self.resolve_type(t));
            let predicate = TypePredicateShape {
                parameter_name: parameter_name.clone(),
                narrowed_type: narrowed,
                is_assertion: *is_assertion,
            };
            let boolean = self.builder().primitive(Primitive::Boolean);
            return (boolean, Some(predicate));
        }
        (self.resolve_type(node), None)
    }

    fn resolve_object_literal_type(&mut self, members: &[TypeMember]) -> TypeId {
        let mut props = Vec::new();
        let mut index_signatures = Vec::new();
        let mut call_signatures = Vec::new();
        let mut construct_signatures = Vec::new();
        for m in members {
            match m {
                TypeMember::Property {
                    name,
                    ty,
                    optional,
                    readonly,
                } => {
                    let id = self.resolve_type(ty);
                    let id = if *optional {
                        let undef = self.builder().primitive(Primitive::Undefined);
                        self.builder().union([id, undef])
                    } else {
                        id
                    };
                    props.push((name.clone(), id, *readonly));
                }
                TypeMember::Index {
                    key_type,
                    value,
                    readonly,
                    ..
                } => {
                    let key = match &key_type.kind {
                        TypeNodeKind::Named { name, .. } if name.as_str().as_ref() == "number" => {
                            IndexKeyKind::Number
                        }
                        TypeNodeKind::Named { name, .. } if name.as_str().as_ref() == "symbol" => {
                            IndexKeyKind::Symbol
                        }
                        _ => IndexKeyKind::String,
                    };
                    let value = self.resolve_type(value);
                    index_signatures.push(IndexSignatureShape {
                        key,
                        value,
                        readonly: *readonly,
                    });
                }
                TypeMember::Call {
                    type_params,
                    params,
                    return_type,
                } => {
                    self.env.push_block_scope();
                    let tp = self.resolve_type_params(type_params);
                    let ps = self.resolve_param_shapes(params);
                    let (ret, predicate) = self.resolve_return_type(return_type);
                    self.env.pop_scope();
                    let required_count = ps.iter().take_while(|p| !p.optional && !p.rest).count();
                    call_signatures.push(FunctionShape {
                        type_params: tp,
                        params: ps,
                        required_count,
                        return_type: ret,
                        this_type: None,
                        predicate,
                    });
                }
                TypeMember::Construct {
                    type_params,
                    params,
                    return_type,
                } => {
                    self.env.push_block_scope();
                    let tp = self.resolve_type_params(type_params);
                    let ps = self.resolve_param_shapes(params);
                    let (ret, predicate) = self.resolve_return_type(return_type);
                    self.env.pop_scope();
                    let required_count = ps.iter().take_while(|p| !p.optional && !p.rest).count();
                    construct_signatures.push(FunctionShape {
                        type_params: tp,
                        params: ps,
                        required_count,
                        return_type: ret,
                        this_type: None,
                        predicate,
                    });
                }
                TypeMember::Method {
                    name,
                    type_params,
                    params,
                    return_type,
                    optional,
                } => {
                    self.env.push_block_scope();
                    let tp = self.resolve_type_params(type_params);
                    let ps = self.resolve_param_shapes(params);
                    let (ret, predicate) = self.resolve_return_type(return_type);
                    self.env.pop_scope();
                    let required_count = ps.iter().take_while(|p| !p.optional && !p.rest).count();
                    let fn_ty = self.builder().function(FunctionShape {
                        type_params: tp,
                        params: ps,
                        required_count,
                        return_type: ret,
                        this_type: None,
                        predicate,
                    });
                    let fn_ty = if *optional {
                        let undef = self.builder().primitive(Primitive::Undefined);
                        self.builder().union([fn_ty, undef])
                    } else {
                        fn_ty
                    };
                    props.push((name.clone(), fn_ty, false));
                }
            }
        }
        self.builder().interface(InterfaceShape {
            members: props,
            index_signatures,
            call_signatures,
            construct_signatures,
            extends: Vec::new(),
        })
    }

    /// Homomorphic mapped types over a union-of-string-literals source
    /// (the common case: `keyof` of a known object type, or an explicit
    /// string-literal union). A non-literal-union constraint (e.g. mapping
    /// over a bare `string`) falls back to a `Record`, since there is no
    /// finite member set to enumerate.
    fn resolve_mapped_type(
        &mut self,
        key_name: &Atom,
        constraint: &TypeNode,
        value: &TypeNode,
        readonly: Option<sharpts_parser::ast::MappedModifier>,
        optional: Option<sharpts_parser::ast::MappedModifier>,
    ) -> TypeId {
        let constraint_ty = self.resolve_type(constraint);
        let keys = self.enumerate_string_literal_members(constraint_ty);
        let Some(keys) = keys else {
            self.env.push_block_scope();
            let param_ty = self.builder().primitive(Primitive::String);
            self.env.define(
                key_name.clone(),
                crate::environment::Binding::new(param_ty, crate::environment::BindingKind::TypeParameter),
            );
            let value_ty = self.resolve_type(value);
            self.env.pop_scope();
            return self.builder().record(constraint_ty, value_ty);
        };
        let mut members = Vec::with_capacity(keys.len());
        for key in keys {
            self.env.push_block_scope();
            let key_ty = self.builder().literal(LiteralValue::String(key.clone()));
            self.env.define(
                key_name.clone(),
                crate::environment::Binding::new(key_ty, crate::environment::BindingKind::TypeParameter),
            );
            let mut value_ty = self.resolve_type(value);
            self.env.pop_scope();
            if optional == Some(sharpts_parser::ast::MappedModifier::Add) {
                let undef = self.builder().primitive(Primitive::Undefined);
                value_ty = self.builder().union([value_ty, undef]);
            }
            members.push((key, value_ty, readonly == Some(sharpts_parser::ast::MappedModifier::Add)));
        }
        self.builder().interface(InterfaceShape {
            members,
            index_signatures: Vec::new(),
            call_signatures: Vec::new(),
            construct_signatures: Vec::new(),
            extends: Vec::new(),
        })
    }

    fn enumerate_string_literal_members(&self, ty: TypeId) -> Option<Vec<Atom>> {
        match self.arena.get(ty) {
            TypeInfo::Literal(LiteralValue::String(s)) => Some(vec![s.clone()]),
            TypeInfo::Union(members) => {
                let mut out = Vec::with_capacity(members.len());
                for m in members {
                    match self.arena.get(*m) {
                        TypeInfo::Literal(LiteralValue::String(s)) => out.push(s.clone()),
                        _ => return None,
                    }
                }
                Some(out)
            }
            TypeInfo::KeyOf(source) => {
                if let TypeInfo::Interface(shape) = self.arena.get(*source) {
                    Some(shape.members.iter().map(|(n, _, _)| n.clone()).collect())
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// `extends` is evaluated non-distributively (a documented
    /// simplification of full conditional-type distribution over naked
    /// type-parameter checks).
    fn resolve_conditional_type(
        &mut self,
        check: &TypeNode,
        extends: &TypeNode,
        true_branch: &TypeNode,
        false_branch: &TypeNode,
    ) -> TypeId {
        let check_ty = self.resolve_type(check);
        let extends_ty = self.resolve_type(extends);
        let matches = self.is_assignable(check_ty, extends_ty);
        if matches {
            self.resolve_type(true_branch)
        } else {
            self.resolve_type(false_branch)
        }
    }

    pub(crate) fn builder(&mut self) -> TypeBuilder<'_> {
        TypeBuilder::new(&mut self.arena)
    }

    pub(crate) fn promise_instance(&mut self, inner: TypeId) -> TypeId {
        let name = self.well_known.promise_class;
        self.builder().instance(name, vec![inner])
    }
}
