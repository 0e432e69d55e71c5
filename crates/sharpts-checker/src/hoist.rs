//! Pass 1 of the two-pass global algorithm: register
//! every named top-level declaration before any statement body is checked,
//! so mutually recursive functions/classes/interfaces resolve regardless
//! of source order.
//!
//! Two sub-passes avoid an ordering dependency: the first reserves a
//! `TypeId` and an environment binding for every named declaration; the
//! second fills in each reservation's real shape, by which point every
//! sibling name the shape might reference is already bound.

use sharpts_common::Atom;
use sharpts_parser::ast::*;
use sharpts_types::*;

use crate::checker::Checker;
use crate::environment::{Binding, BindingKind};

pub fn hoist_block(checker: &mut Checker, stmts: &[Stmt]) {
    let mut reserved: Vec<(usize, TypeId)> = Vec::new();
    for (i, stmt) in stmts.iter().enumerate() {
        if let Some((name, kind)) = declared_name_and_kind(&stmt.kind) {
            let placeholder = checker.arena.reserve();
            checker.env.define(name, Binding::new(placeholder, kind));
            reserved.push((i, placeholder));
        }
    }
    for (i, placeholder) in reserved {
        fill_declaration(checker, &stmts[i].kind, placeholder);
    }
}

fn declared_name_and_kind(kind: &StmtKind) -> Option<(Atom, BindingKind)> {
    match kind {
        StmtKind::Function(f) => f.name.as_ref().map(|n| (n.name.clone(), BindingKind::Function)),
        StmtKind::Class(c) => c.name.as_ref().map(|n| (n.name.clone(), BindingKind::Class)),
        StmtKind::Interface(i) => Some((i.name.name.clone(), BindingKind::Interface)),
        StmtKind::TypeAlias { name, .. } => Some((name.name.clone(), BindingKind::TypeAlias)),
        StmtKind::Enum(e) => Some((e.name.name.clone(), BindingKind::Enum)),
        StmtKind::Namespace(n) => Some((n.name.clone(), BindingKind::Namespace)),
        _ => None,
    }
}

fn fill_declaration(checker: &mut Checker, kind: &StmtKind, placeholder: TypeId) {
    match kind {
        StmtKind::Function(f) => {
            let shape = checker.function_decl_shape(f);
            checker.arena.define(placeholder, TypeInfo::Function(shape));
        }
        StmtKind::Class(c) => {
            let shape = checker.class_decl_shape(c);
            checker.arena.define(placeholder, TypeInfo::Class(shape));
        }
        StmtKind::Interface(i) => {
            checker.env.push_block_scope();
            let _ = checker.resolve_type_params(&i.type_params);
            let mut extends_names = Vec::new();
            let mut merged = Vec::new();
            let mut index_signatures = Vec::new();
            let mut call_signatures = Vec::new();
            let mut construct_signatures = Vec::new();
            for ext in &i.extends {
                if let TypeNodeKind::Named { name, .. } = &ext.kind {
                    extends_names.push(name.clone());
                }
                let resolved = checker.resolve_type(ext);
                if let TypeInfo::Interface(parent_shape) = checker.arena.get(resolved).clone() {
                    merged.extend(parent_shape.members);
                    index_signatures.extend(parent_shape.index_signatures);
                    call_signatures.extend(parent_shape.call_signatures);
                    construct_signatures.extend(parent_shape.construct_signatures);
                }
            }
            for member in &i.members {
                merge_type_member(
                    checker,
                    member,
                    &mut merged,
                    &mut index_signatures,
                    &mut call_signatures,
                    &mut construct_signatures,
                );
            }
            checker.env.pop_scope();
            checker.arena.define(
                placeholder,
                TypeInfo::Interface(InterfaceShape {
                    members: merged,
                    index_signatures,
                    call_signatures,
                    construct_signatures,
                    extends: extends_names,
                }),
            );
        }
        StmtKind::TypeAlias {
            type_params, ty, ..
        } => {
            checker.env.push_block_scope();
            let _ = checker.resolve_type_params(type_params);
            let resolved = checker.resolve_type(ty);
            checker.env.pop_scope();
            // Type aliases don't need their own id: point the placeholder's
            // slot at the aliased shape so every reference sees it.
            let info = checker.arena.get(resolved).clone();
            checker.arena.define(placeholder, info);
        }
        StmtKind::Enum(e) => {
            let shape = checker.enum_decl_shape(e);
            checker.arena.define(placeholder, TypeInfo::Enum(shape));
        }
        StmtKind::Namespace(n) => {
            // Namespaces are modeled as a plain scope merge rather than a
            // distinct nominal type: members become ordinary bindings in
            // the enclosing scope. The placeholder just carries an empty
            // interface so `typeof Ns` resolves to *something*.
            hoist_block(checker, &n.body);
            checker.arena.define(
                placeholder,
                TypeInfo::Interface(InterfaceShape {
                    members: Vec::new(),
                    index_signatures: Vec::new(),
                    call_signatures: Vec::new(),
                    construct_signatures: Vec::new(),
                    extends: Vec::new(),
                }),
            );
        }
        _ => {}
    }
}

fn merge_type_member(
    checker: &mut Checker,
    member: &TypeMember,
    members: &mut Vec<(Atom, TypeId, bool)>,
    index_signatures: &mut Vec<IndexSignatureShape>,
    call_signatures: &mut Vec<FunctionShape>,
    construct_signatures: &mut Vec<FunctionShape>,
) {
    match member {
        TypeMember::Property {
            name,
            ty,
            optional,
            readonly,
        } => {
            let mut id = checker.resolve_type(ty);
            if *optional {
                let undef = checker.builder().primitive(Primitive::Undefined);
                id = checker.builder().union([id, undef]);
            }
            members.retain(|(n, _, _)| n != name);
            members.push((name.clone(), id, *readonly));
        }
        TypeMember::Index {
            key_type,
            value,
            readonly,
            ..
        } => {
            let key = match &key_type.kind {
                TypeNodeKind::Named { name, .. } if name.as_str().as_ref() == "number" => IndexKeyKind::Number,
                TypeNodeKind::Named { name, .. } if name.as_str().as_ref() == "symbol" => IndexKeyKind::Symbol,
                _ => IndexKeyKind::String,
            };
            let value = checker.resolve_type(value);
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
            checker.env.push_block_scope();
            let tp = checker.resolve_type_params(type_params);
            let ps = checker.resolve_param_shapes(params);
            let (ret, predicate) = checker.resolve_return_type(return_type);
            checker.env.pop_scope();
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
            checker.env.push_block_scope();
            let tp = checker.resolve_type_params(type_params);
            let ps = checker.resolve_param_shapes(params);
            let (ret, predicate) = checker.resolve_return_type(return_type);
            checker.env.pop_scope();
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
            checker.env.push_block_scope();
            let tp = checker.resolve_type_params(type_params);
            let ps = checker.resolve_param_shapes(params);
            let (ret, predicate) = checker.resolve_return_type(return_type);
            checker.env.pop_scope();
            let required_count = ps.iter().take_while(|p| !p.optional && !p.rest).count();
            let fn_ty = checker.builder().function(FunctionShape {
                type_params: tp,
                params: ps,
                required_count,
                return_type: ret,
                this_type: None,
                predicate,
            });
            let fn_ty = if *optional {
                let undef = checker.builder().primitive(Primitive::Undefined);
                checker.builder().union([fn_ty, undef])
            } else {
                fn_ty
            };
            members.retain(|(n, _, _)| n != name);
            members.push((name.clone(), fn_ty, false));
        }
    }
}

/// The declared-then-bound-pattern name convention: a destructuring
/// parameter has no single name, so its `ParamShape` is keyed by a
/// synthetic label built from its position. Simple identifier patterns
/// keep their source name so diagnostics read naturally.
pub(crate) fn param_name(param: &Param) -> Atom {
    match &param.pattern {
        BindingPattern::Identifier(ident) => ident.name.clone(),
        _ => Atom::new("__sharpts_pattern_param"),
    }
}

impl Checker {
    pub(crate) fn function_decl_shape(&mut self, f: &FunctionDecl) -> FunctionShape {
        self.env.push_block_scope();
        let type_params = self.resolve_type_params(&f.type_params);
        let params = self.resolve_param_shapes(&f.params);
        let this_type = f.this_param.as_ref().map(|t| self.resolve_type(t));
        let (return_type, predicate) = match &f.return_type {
            Some(t) => self.resolve_return_type(t),
            None => (self.builder().any(), None),
        };
        self.env.pop_scope();
        let required_count = params.iter().take_while(|p| !p.optional && !p.rest).count();
        FunctionShape {
            type_params,
            params,
            required_count,
            return_type,
            this_type,
            predicate,
        }
    }

    pub(crate) fn class_decl_shape(&mut self, c: &ClassDecl) -> ClassShape {
        self.env.push_block_scope();
        let type_params = self.resolve_type_params(&c.type_params);
        let superclass = c.superclass.as_ref().and_then(|expr| {
            if let ExprKind::Variable(ident) = &expr.kind {
                self.env.lookup(&ident.name).map(|b| b.declared_type)
            } else {
                None
            }
        });
        let implements = c
            .implements
            .iter()
            .filter_map(|i| self.env.lookup(&i.name).map(|b| b.declared_type))
            .collect();

        let mut members = Vec::new();
        let mut static_members = Vec::new();
        for member in &c.members {
            match member {
                ClassMember::Field(field) => {
                    let ty = field
                        .type_annotation
                        .as_ref()
                        .map(|t| self.resolve_type(t))
                        .or_else(|| field.initializer.as_ref().map(|e| self.infer_expr(e)))
                        .unwrap_or_else(|| self.builder().any());
                    let name = property_key_name(&field.name);
                    let readonly = field.modifiers.is_readonly;
                    if field.modifiers.is_static {
                        static_members.push((name, ty, readonly));
                    } else {
                        members.push((name, ty, readonly));
                    }
                }
                ClassMember::Method(method) => {
                    let shape = self.function_decl_shape(&method.function);
                    let fn_ty = self.builder().function(shape);
                    let name = property_key_name(&method.name);
                    if method.function.modifiers.is_static {
                        static_members.push((name, fn_ty, true));
                    } else {
                        members.push((name, fn_ty, true));
                    }
                }
                ClassMember::Accessor(accessor) => {
                    let ty = accessor
                        .return_type
                        .as_ref()
                        .map(|t| self.resolve_type(t))
                        .or_else(|| accessor.params.first().and_then(|p| p.type_annotation.as_ref()).map(|t| self.resolve_type(t)))
                        .unwrap_or_else(|| self.builder().any());
                    let name = property_key_name(&accessor.name);
                    if accessor.modifiers.is_static {
                        static_members.push((name, ty, false));
                    } else {
                        members.push((name, ty, false));
                    }
                }
                ClassMember::AutoAccessor(auto) => {
                    let ty = auto
                        .type_annotation
                        .as_ref()
                        .map(|t| self.resolve_type(t))
                        .or_else(|| auto.initializer.as_ref().map(|e| self.infer_expr(e)))
                        .unwrap_or_else(|| self.builder().any());
                    let name = property_key_name(&auto.name);
                    if auto.modifiers.is_static {
                        static_members.push((name, ty, false));
                    } else {
                        members.push((name, ty, false));
                    }
                }
                ClassMember::Constructor(_) | ClassMember::StaticBlock(_) => {}
            }
        }
        self.env.pop_scope();

        let name = c
            .name
            .as_ref()
            .map(|n| n.name.clone())
            .unwrap_or_else(|| Atom::new("<anonymous class>"));
        ClassShape {
            name,
            type_params,
            members,
            static_members,
            superclass,
            implements,
            is_abstract: c.is_abstract,
        }
    }

    pub(crate) fn enum_decl_shape(&mut self, e: &EnumDecl) -> EnumShape {
        let mut members = Vec::new();
        let mut next_numeric = 0.0f64;
        let mut kind = EnumKind::Numeric;
        let mut seen_string = false;
        let mut seen_numeric = false;
        for member in &e.members {
            let value = match &member.initializer {
                Some(expr) => match self.const_eval_enum_initializer(expr) {
                    Some(LiteralValue::Number(bits)) => {
                        next_numeric = f64::from_bits(bits) + 1.0;
                        seen_numeric = true;
                        LiteralValue::Number(bits)
                    }
                    Some(LiteralValue::String(s)) => {
                        seen_string = true;
                        LiteralValue::String(s)
                    }
                    Some(other) => other,
                    None => {
                        let v = LiteralValue::number(next_numeric);
                        next_numeric += 1.0;
                        seen_numeric = true;
                        v
                    }
                },
                None => {
                    let v = LiteralValue::number(next_numeric);
                    next_numeric += 1.0;
                    seen_numeric = true;
                    v
                }
            };
            members.push((member.name.clone(), value));
        }
        if seen_string && seen_numeric {
            kind = EnumKind::Heterogeneous;
        } else if seen_string {
            kind = EnumKind::String;
        }
        EnumShape {
            name: e.name.name.clone(),
            kind,
            members,
            is_const: e.is_const,
        }
    }

    /// Restricted constant-expression evaluator for enum member
    /// initializers.
    fn const_eval_enum_initializer(&mut self, expr: &Expr) -> Option<LiteralValue> {
        match &expr.kind {
            ExprKind::Literal(Literal::Number(n)) => Some(LiteralValue::number(*n)),
            ExprKind::Literal(Literal::Str(s)) => Some(LiteralValue::String(Atom::new(s))),
            ExprKind::Unary {
                op: UnaryOp::Neg,
                operand,
            } => match self.const_eval_enum_initializer(operand)? {
                LiteralValue::Number(bits) => Some(LiteralValue::number(-f64::from_bits(bits))),
                other => Some(other),
            },
            ExprKind::Binary { op, left, right } => {
                let (Some(LiteralValue::Number(l)), Some(LiteralValue::Number(r))) = (
                    self.const_eval_enum_initializer(left),
                    self.const_eval_enum_initializer(right),
                ) else {
                    return None;
                };
                let (l, r) = (f64::from_bits(l), f64::from_bits(r));
                let result = match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => l / r,
                    BinaryOp::Shl => ((l as i64) << (r as i64)) as f64,
                    BinaryOp::Shr => ((l as i64) >> (r as i64)) as f64,
                    BinaryOp::BitOr => ((l as i64) | (r as i64)) as f64,
                    BinaryOp::BitAnd => ((l as i64) & (r as i64)) as f64,
                    BinaryOp::BitXor => ((l as i64) ^ (r as i64)) as f64,
                    _ => return None,
                };
                Some(LiteralValue::number(result))
            }
            _ => None,
        }
    }
}

pub(crate) fn property_key_name(key: &PropertyKey) -> Atom {
    match key {
        PropertyKey::Identifier(name) => name.clone(),
        PropertyKey::StringLiteral(s) => Atom::new(s),
        PropertyKey::NumberLiteral(n) => Atom::new(&n.to_string()),
        PropertyKey::Computed(_) => Atom::new("__sharpts_computed_key"),
    }
}
