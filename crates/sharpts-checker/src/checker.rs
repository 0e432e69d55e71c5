//! The bidirectional checker: expression inference,
//! contextual (expected-type-driven) checking, and statement traversal.
//!
//! "Bidirectional" here means two directions of information flow meet at
//! each expression: `infer_expr` synthesizes a type bottom-up from an
//! expression's own structure, while `check_expr_against` pushes an
//! expected type down into contexts (a variable's declared annotation, a
//! parameter's declared type, a `return` against the enclosing function's
//! signature) where the expression alone is too little information — an
//! object literal's excess-property check or a generic call's implicit
//! type-argument inference both need the target type, not just the source.

use rustc_hash::FxHashMap;
use sharpts_common::{Diagnostic, DiagnosticSink};
use sharpts_parser::ast::*;
use sharpts_types::*;

use crate::environment::{Binding, BindingKind, TypeEnvironment};
use crate::generics::{infer_type_arguments, substitute};
use crate::hoist::property_key_name;
use crate::narrowing::{path_of, NarrowingContext, NarrowingPath};
use crate::node_id::TypeMap;
use crate::options::CheckerOptions;

/// Whether control reaches the end of a statement (sequence). Used to
/// decide which side of an `if`'s narrowing survives past it — the classic
/// "narrow across an early return" scenario.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continues,
    Diverges,
}

pub(crate) struct WellKnown {
    pub string: TypeId,
    pub number: TypeId,
    pub boolean: TypeId,
    pub bigint: TypeId,
    pub symbol: TypeId,
    pub null: TypeId,
    pub undefined: TypeId,
    pub any: TypeId,
    pub unknown: TypeId,
    pub never: TypeId,
    pub void_: TypeId,
    pub promise_class: TypeId,
}

impl WellKnown {
    fn new(arena: &mut TypeArena) -> Self {
        let mut b = TypeBuilder::new(arena);
        let string = b.primitive(Primitive::String);
        let number = b.primitive(Primitive::Number);
        let boolean = b.primitive(Primitive::Boolean);
        let bigint = b.primitive(Primitive::BigInt);
        let symbol = b.primitive(Primitive::Symbol);
        let null = b.arena.intern(TypeInfo::Primitive(Primitive::Null));
        let undefined = b.arena.intern(TypeInfo::Primitive(Primitive::Undefined));
        let any = b.any();
        let unknown = b.unknown();
        let never = b.never();
        let void_ = b.void();
        let promise_class = b.class(ClassShape {
            name: sharpts_common::Atom::new("Promise"),
            type_params: vec![TypeParameterShape {
                name: sharpts_common::Atom::new("T"),
                constraint: None,
                default: None,
                is_const: false,
            }],
            members: Vec::new(),
            static_members: Vec::new(),
            superclass: None,
            implements: Vec::new(),
            is_abstract: false,
        });
        WellKnown {
            string,
            number,
            boolean,
            bigint,
            symbol,
            null,
            undefined,
            any,
            unknown,
            never,
            void_,
            promise_class,
        }
    }
}

pub struct Checker {
    pub arena: TypeArena,
    pub env: TypeEnvironment,
    pub type_map: TypeMap,
    pub diagnostics: DiagnosticSink,
    pub options: CheckerOptions,
    pub(crate) narrowing: NarrowingContext,
    pub(crate) well_known: WellKnown,
    return_type_stack: Vec<TypeId>,
    generator_stack: Vec<bool>,
    async_stack: Vec<bool>,
    loop_depth: u32,
    this_stack: Vec<TypeId>,
}

impl Checker {
    pub fn new(options: CheckerOptions) -> Self {
        let mut arena = TypeArena::new();
        let well_known = WellKnown::new(&mut arena);
        Checker {
            arena,
            env: TypeEnvironment::new(),
            type_map: TypeMap::new(),
            diagnostics: DiagnosticSink::with_cap(options.diagnostic_cap),
            options,
            narrowing: NarrowingContext::new(),
            well_known,
            return_type_stack: Vec::new(),
            generator_stack: Vec::new(),
            async_stack: Vec::new(),
            loop_depth: 0,
            this_stack: Vec::new(),
        }
    }

    pub(crate) fn well_known(&self) -> &WellKnown {
        &self.well_known
    }

    /// `isAssignable(src, dst)`. `AssignabilityChecker`
    /// borrows the arena it was built over, so it can't live as a stored
    /// field next to an arena we also mutate elsewhere — a fresh checker
    /// (and its memoization cache) is cheap enough to build per call.
    pub(crate) fn is_assignable(&self, src: TypeId, dst: TypeId) -> bool {
        AssignabilityChecker::new(&self.arena).is_assignable(src, dst)
    }

    fn error(&mut self, span: sharpts_common::Span, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error(span, message.into()));
    }

    fn check_assignable(&mut self, span: sharpts_common::Span, expected: TypeId, actual: TypeId) {
        if !self.is_assignable(actual, expected) {
            let expected_text = describe(&self.arena, expected);
            let actual_text = describe(&self.arena, actual);
            let diag = Diagnostic::error(
                span,
                format!("Type '{actual_text}' is not assignable to type '{expected_text}'."),
            )
            .with_types(expected_text, actual_text);
            self.diagnostics.push(diag);
        }
    }

    fn widen(&mut self, ty: TypeId) -> TypeId {
        match self.arena.get(ty).clone() {
            TypeInfo::Literal(lit) => self.builder().primitive(lit.base_primitive()),
            _ => ty,
        }
    }

    // -----------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------

    pub fn check_program(&mut self, stmts: &[Stmt]) {
        crate::hoist::hoist_block(self, stmts);
        self.check_statements(stmts);
    }

    pub(crate) fn check_statements(&mut self, stmts: &[Stmt]) -> Flow {
        let mut flow = Flow::Continues;
        for (i, stmt) in stmts.iter().enumerate() {
            if flow == Flow::Diverges {
                self.diagnostics.push(Diagnostic::warning(stmt.span, "Unreachable code detected."));
            }
            let stmt_flow = self.check_stmt(stmt);
            if i == stmts.len() - 1 || stmt_flow == Flow::Diverges {
                flow = stmt_flow;
            }
        }
        flow
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> Flow {
        match &stmt.kind {
            StmtKind::Expression(expr) => {
                self.infer_expr(expr);
                Flow::Continues
            }
            StmtKind::VarDecl { kind, declarators } => {
                self.check_var_declarators(*kind, declarators);
                Flow::Continues
            }
            StmtKind::Function(f) => {
                self.check_function_body(f, None);
                Flow::Continues
            }
            StmtKind::Class(c) => {
                self.check_class_body(c);
                Flow::Continues
            }
            StmtKind::Interface(_) | StmtKind::TypeAlias { .. } | StmtKind::Enum(_) => Flow::Continues,
            StmtKind::Namespace(n) => {
                self.env.push_block_scope();
                crate::hoist::hoist_block(self, &n.body);
                self.check_statements(&n.body);
                self.env.pop_scope();
                Flow::Continues
            }
            StmtKind::ImportAlias(alias) => {
                let ty = self
                    .resolve_typeof_path(&alias.target)
                    .unwrap_or(self.well_known.any);
                self.env.define(alias.name.name.clone(), Binding::new(ty, BindingKind::Const));
                Flow::Continues
            }
            StmtKind::Import(import) => {
                if let Some(default) = &import.default_import {
                    self.env
                        .define(default.name.clone(), Binding::new(self.well_known.any, BindingKind::Const));
                }
                if let Some(ns) = &import.namespace_import {
                    self.env
                        .define(ns.name.clone(), Binding::new(self.well_known.any, BindingKind::Const));
                }
                for spec in &import.named {
                    self.env
                        .define(spec.local.name.clone(), Binding::new(self.well_known.any, BindingKind::Const));
                }
                Flow::Continues
            }
            StmtKind::Export(export) => match export {
                ExportDecl::Declaration(inner) => self.check_stmt(inner),
                ExportDecl::Default(expr) => {
                    self.infer_expr(expr);
                    Flow::Continues
                }
                ExportDecl::Named { .. } | ExportDecl::ReExportAll { .. } => Flow::Continues,
            },
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.check_if(condition, then_branch, else_branch.as_deref()),
            StmtKind::While { condition, body } => {
                self.infer_expr(condition);
                let mut then_ctx = self.narrowing.clone();
                self.narrow_condition(&mut then_ctx, condition, true);
                let saved = std::mem::replace(&mut self.narrowing, then_ctx);
                self.loop_depth += 1;
                self.env.push_block_scope();
                self.check_stmt(body);
                self.env.pop_scope();
                self.loop_depth -= 1;
                self.narrowing = saved;
                let mut exit_ctx = self.narrowing.clone();
                self.narrow_condition(&mut exit_ctx, condition, false);
                self.narrowing = exit_ctx;
                Flow::Continues
            }
            StmtKind::DoWhile { body, condition } => {
                self.loop_depth += 1;
                self.env.push_block_scope();
                self.check_stmt(body);
                self.env.pop_scope();
                self.loop_depth -= 1;
                self.infer_expr(condition);
                Flow::Continues
            }
            StmtKind::For {
                init,
                condition,
                update,
                body,
            } => {
                self.env.push_block_scope();
                if let Some(init) = init {
                    match init.as_ref() {
                        ForInit::VarDecl(kind, declarators) => self.check_var_declarators(*kind, declarators),
                        ForInit::Expr(expr) => {
                            self.infer_expr(expr);
                        }
                    }
                }
                if let Some(cond) = condition {
                    self.infer_expr(cond);
                }
                if let Some(update) = update {
                    self.infer_expr(update);
                }
                self.loop_depth += 1;
                self.check_stmt(body);
                self.loop_depth -= 1;
                self.env.pop_scope();
                Flow::Continues
            }
            StmtKind::ForOf {
                kind,
                pattern,
                iterable,
                body,
                r#await,
            } => {
                let iterable_ty = self.infer_expr(iterable);
                let element_ty = self.element_type_of_iterable(iterable_ty, *r#await == ForOfAwait::Await);
                self.env.push_block_scope();
                self.bind_pattern(pattern, element_ty, var_kind_to_binding(*kind));
                self.loop_depth += 1;
                self.check_stmt(body);
                self.loop_depth -= 1;
                self.env.pop_scope();
                Flow::Continues
            }
            StmtKind::ForIn {
                kind,
                pattern,
                object,
                body,
            } => {
                self.infer_expr(object);
                self.env.push_block_scope();
                self.bind_pattern(pattern, self.well_known.string, var_kind_to_binding(*kind));
                self.loop_depth += 1;
                self.check_stmt(body);
                self.loop_depth -= 1;
                self.env.pop_scope();
                Flow::Continues
            }
            StmtKind::Switch { discriminant, cases } => {
                let discriminant_ty = self.infer_expr(discriminant);
                let discriminant_path = path_of(discriminant);
                let mut any_reaches_end = cases.is_empty();
                let has_default = cases.iter().any(|c| c.test.is_none());
                if !has_default {
                    any_reaches_end = true;
                }
                for case in cases {
                    self.env.push_block_scope();
                    let mut case_ctx = self.narrowing.clone();
                    if let (Some(path), Some(test)) = (&discriminant_path, &case.test) {
                        let lit_ty = self.infer_expr(test);
                        let narrowed = self.narrow_case_value(discriminant_ty, lit_ty);
                        case_ctx.set(path.clone(), narrowed);
                    } else if let Some(test) = &case.test {
                        self.infer_expr(test);
                    }
                    let saved = std::mem::replace(&mut self.narrowing, case_ctx);
                    let flow = self.check_statements(&case.body);
                    self.narrowing = saved;
                    self.env.pop_scope();
                    if flow == Flow::Continues {
                        any_reaches_end = true;
                    }
                }
                if any_reaches_end {
                    Flow::Continues
                } else {
                    Flow::Diverges
                }
            }
            StmtKind::TryCatch {
                try_block,
                catch_param,
                catch_block,
                finally_block,
            } => {
                self.env.push_block_scope();
                self.check_stmt(try_block);
                self.env.pop_scope();
                if let Some(catch_block) = catch_block {
                    self.env.push_block_scope();
                    if let Some(pattern) = catch_param {
                        let caught = if self.options.strict { self.well_known.unknown } else { self.well_known.any };
                        self.bind_pattern(pattern, caught, BindingKind::Catch);
                    }
                    self.check_stmt(catch_block);
                    self.env.pop_scope();
                }
                if let Some(finally_block) = finally_block {
                    self.env.push_block_scope();
                    self.check_stmt(finally_block);
                    self.env.pop_scope();
                }
                Flow::Continues
            }
            StmtKind::Throw(expr) => {
                self.infer_expr(expr);
                Flow::Diverges
            }
            StmtKind::Return(expr) => {
                let actual = expr.as_ref().map(|e| self.infer_expr(e)).unwrap_or(self.well_known.void_);
                if let Some(&expected) = self.return_type_stack.last() {
                    if expected != self.well_known.any {
                        self.check_assignable(stmt.span, expected, actual);
                    }
                }
                Flow::Diverges
            }
            StmtKind::Break(_) | StmtKind::Continue(_) => Flow::Diverges,
            StmtKind::Labeled { body, .. } => self.check_stmt(body),
            StmtKind::Block(stmts) => {
                self.env.push_block_scope();
                crate::hoist::hoist_block(self, stmts);
                let flow = self.check_statements(stmts);
                self.env.pop_scope();
                flow
            }
            StmtKind::Sequence(stmts) => self.check_statements(stmts),
            StmtKind::Using { declarators, .. } => {
                for decl in declarators {
                    let ty = self.infer_expr(&decl.initializer);
                    self.env.define(decl.name.name.clone(), Binding::new(ty, BindingKind::Const));
                }
                Flow::Continues
            }
            StmtKind::Directive(_)
            | StmtKind::FileDirective(_)
            | StmtKind::StaticBlockMarker
            | StmtKind::Empty => Flow::Continues,
        }
    }

    fn check_if(&mut self, condition: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) -> Flow {
        self.infer_expr(condition);
        let base = self.narrowing.clone();

        let mut then_ctx = base.clone();
        self.narrow_condition(&mut then_ctx, condition, true);
        self.narrowing = then_ctx.clone();
        self.env.push_block_scope();
        let then_flow = self.check_stmt(then_branch);
        self.env.pop_scope();
        let then_ctx_after = self.narrowing.clone();

        let mut else_ctx = base;
        self.narrow_condition(&mut else_ctx, condition, false);
        self.narrowing = else_ctx.clone();
        let else_flow = if let Some(else_branch) = else_branch {
            self.env.push_block_scope();
            let flow = self.check_stmt(else_branch);
            self.env.pop_scope();
            flow
        } else {
            Flow::Continues
        };
        let else_ctx_after = self.narrowing.clone();

        self.narrowing = match (then_flow, else_flow) {
            (Flow::Diverges, Flow::Diverges) => else_ctx_after,
            (Flow::Diverges, Flow::Continues) => else_ctx_after,
            (Flow::Continues, Flow::Diverges) => then_ctx_after,
            (Flow::Continues, Flow::Continues) => NarrowingContext::merge(self, &then_ctx_after, &else_ctx_after),
        };

        if then_flow == Flow::Diverges && else_flow == Flow::Diverges {
            Flow::Diverges
        } else {
            Flow::Continues
        }
    }

    fn check_var_declarators(&mut self, kind: VarKind, declarators: &[VarDeclarator]) {
        let binding_kind = match kind {
            VarKind::Var => BindingKind::Var,
            VarKind::Let => BindingKind::Let,
            VarKind::Const => BindingKind::Const,
        };
        for decl in declarators {
            let ty = match (&decl.type_annotation, &decl.initializer) {
                (Some(annotation), Some(init)) => {
                    let annotated = self.resolve_type(annotation);
                    self.check_expr_against(init, annotated);
                    annotated
                }
                (Some(annotation), None) => self.resolve_type(annotation),
                (None, Some(init)) => {
                    let inferred = self.infer_expr(init);
                    if matches!(kind, VarKind::Const) {
                        inferred
                    } else {
                        self.widen(inferred)
                    }
                }
                (None, None) => self.well_known.any,
            };
            self.bind_pattern(&decl.pattern, ty, binding_kind);
        }
    }

    fn bind_pattern(&mut self, pattern: &BindingPattern, ty: TypeId, kind: BindingKind) {
        match pattern {
            BindingPattern::Identifier(ident) => {
                self.env.define(ident.name.clone(), Binding::new(ty, kind));
            }
            BindingPattern::Array(elements) => {
                let elem_ty = self.array_element_type(ty);
                for element in elements.iter().flatten() {
                    let element_ty = if element.rest { ty } else { elem_ty };
                    let final_ty = element
                        .default
                        .as_ref()
                        .map(|_| element_ty)
                        .unwrap_or(element_ty);
                    self.bind_pattern(&element.pattern, final_ty, kind);
                }
            }
            BindingPattern::Object(props) => {
                for prop in props {
                    let key_name = property_key_name(&prop.key);
                    let member_ty = self.member_type(ty, &key_name).unwrap_or(self.well_known.any);
                    self.bind_pattern(&prop.value.pattern, member_ty, kind);
                }
            }
        }
    }

    pub(crate) fn array_element_type(&mut self, ty: TypeId) -> TypeId {
        match self.arena.get(ty).clone() {
            TypeInfo::Array(elem) => elem,
            TypeInfo::Tuple(shape) => {
                let members: Vec<TypeId> = shape.elements.iter().map(|s| s.ty).collect();
                self.builder().union(members)
            }
            _ => self.well_known.any,
        }
    }

    pub(crate) fn member_type(&mut self, ty: TypeId, name: &sharpts_common::Atom) -> Option<TypeId> {
        match self.arena.get(ty).clone() {
            TypeInfo::Interface(shape) => shape.members.iter().find(|(n, _, _)| n == name).map(|(_, t, _)| *t),
            TypeInfo::Instance(shape) => self.instance_member_type(shape.class, &shape.type_arguments, name, false),
            _ => None,
        }
    }

    fn instance_member_type(
        &mut self,
        class_ty: TypeId,
        type_arguments: &[TypeId],
        name: &sharpts_common::Atom,
        is_static: bool,
    ) -> Option<TypeId> {
        let TypeInfo::Class(shape) = self.arena.get(class_ty).clone() else {
            return None;
        };
        let list = if is_static { &shape.static_members } else { &shape.members };
        if let Some((_, ty, _)) = list.iter().find(|(n, _, _)| n == name) {
            let mut substitution = FxHashMap::default();
            for (param, arg) in shape.type_params.iter().zip(type_arguments.iter()) {
                substitution.insert(param.name.clone(), *arg);
            }
            return Some(substitute(self, *ty, &substitution));
        }
        if !is_static {
            if let Some(super_ty) = shape.superclass {
                if let TypeInfo::Instance(super_shape) = self.arena.get(super_ty).clone() {
                    return self.instance_member_type(super_shape.class, &super_shape.type_arguments, name, false);
                }
                return self.instance_member_type(super_ty, &[], name, false);
            }
        }
        None
    }

    fn resolve_typeof_path(&self, path: &[sharpts_common::Atom]) -> Option<TypeId> {
        let first = path.first()?;
        self.env.lookup(first).map(|b| b.declared_type)
    }

    fn element_type_of_iterable(&mut self, iterable_ty: TypeId, is_await: bool) -> TypeId {
        let base = match self.arena.get(iterable_ty).clone() {
            TypeInfo::Array(elem) => elem,
            TypeInfo::Primitive(Primitive::String) => self.well_known.string,
            TypeInfo::Instance(shape) if shape.class == self.well_known.promise_class => {
                shape.type_arguments.first().copied().unwrap_or(self.well_known.any)
            }
            _ => self.well_known.any,
        };
        if is_await {
            self.unwrap_promise(base)
        } else {
            base
        }
    }

    fn unwrap_promise(&mut self, ty: TypeId) -> TypeId {
        match self.arena.get(ty).clone() {
            TypeInfo::Instance(shape) if shape.class == self.well_known.promise_class => {
                shape.type_arguments.first().copied().unwrap_or(self.well_known.any)
            }
            _ => ty,
        }
    }

    fn narrow_case_value(&mut self, discriminant: TypeId, case_literal: TypeId) -> TypeId {
        match self.arena.get(discriminant).clone() {
            TypeInfo::Union(members) => {
                let kept: Vec<TypeId> = members
                    .into_iter()
                    .filter(|m| {
                        self.is_assignable(case_literal, *m)
                            || self.is_assignable(*m, case_literal)
                    })
                    .collect();
                if kept.is_empty() {
                    case_literal
                } else {
                    self.builder().union(kept)
                }
            }
            _ => case_literal,
        }
    }

    fn check_function_body(&mut self, f: &FunctionDecl, this_type: Option<TypeId>) {
        let Some(body) = &f.body else { return };
        self.env.push_function_scope();
        self.resolve_type_params(&f.type_params);
        for (param, shape) in f.params.iter().zip(self.resolve_param_shapes(&f.params)) {
            self.bind_pattern(&param.pattern, shape.ty, BindingKind::Param);
        }
        if let Some(this_type) = this_type {
            self.this_stack.push(this_type);
        }
        let return_type = match &f.return_type {
            Some(t) => self.resolve_return_type(t).0,
            None => self.well_known.any,
        };
        self.return_type_stack.push(return_type);
        self.generator_stack.push(f.modifiers.is_generator);
        self.async_stack.push(f.modifiers.is_async);
        self.check_stmt(body);
        self.async_stack.pop();
        self.generator_stack.pop();
        self.return_type_stack.pop();
        if this_type.is_some() {
            self.this_stack.pop();
        }
        self.env.pop_scope();
    }

    fn check_class_body(&mut self, c: &ClassDecl) {
        let name = c.name.as_ref().map(|n| n.name.clone()).unwrap_or_else(|| sharpts_common::Atom::new("<anonymous class>"));
        let class_ty = self.env.lookup(&name).map(|b| b.declared_type).unwrap_or(self.well_known.any);
        for decorator in &c.decorators {
            self.infer_expr(&decorator.expr);
        }
        self.env.push_block_scope();
        self.resolve_type_params(&c.type_params);
        self.this_stack.push(class_ty);
        for member in &c.members {
            match member {
                ClassMember::Method(method) => {
                    for decorator in &method.decorators {
                        self.infer_expr(&decorator.expr);
                    }
                    self.check_function_body(&method.function, Some(class_ty));
                }
                ClassMember::Constructor(ctor) => self.check_function_body(ctor, Some(class_ty)),
                ClassMember::Field(field) => {
                    for decorator in &field.decorators {
                        self.infer_expr(&decorator.expr);
                    }
                    if let (Some(annotation), Some(init)) = (&field.type_annotation, &field.initializer) {
                        let ty = self.resolve_type(annotation);
                        self.check_expr_against(init, ty);
                    } else if let Some(init) = &field.initializer {
                        self.infer_expr(init);
                    }
                }
                ClassMember::Accessor(accessor) => {
                    self.env.push_function_scope();
                    for p in &accessor.params {
                        let ty = p.type_annotation.as_ref().map(|t| self.resolve_type(t)).unwrap_or(self.well_known.any);
                        self.bind_pattern(&p.pattern, ty, BindingKind::Param);
                    }
                    self.check_stmt(&accessor.body);
                    self.env.pop_scope();
                }
                ClassMember::AutoAccessor(auto) => {
                    if let Some(init) = &auto.initializer {
                        self.infer_expr(init);
                    }
                }
                ClassMember::StaticBlock(stmt) => {
                    self.env.push_block_scope();
                    self.check_stmt(stmt);
                    self.env.pop_scope();
                }
            }
        }
        self.this_stack.pop();
        self.env.pop_scope();
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    pub(crate) fn infer_expr(&mut self, expr: &Expr) -> TypeId {
        let ty = self.infer_expr_inner(expr);
        self.type_map.record_expr(expr, ty);
        ty
    }

    /// Checks `expr` against an expected type, recording whatever type it
    /// actually has (not the expected one) in the type map, and emitting a
    /// diagnostic on mismatch.
    pub(crate) fn check_expr_against(&mut self, expr: &Expr, expected: TypeId) -> TypeId {
        let actual = self.infer_expr(expr);
        if expected != self.well_known.any {
            self.check_assignable(expr.span, expected, actual);
        }
        actual
    }

    fn infer_expr_inner(&mut self, expr: &Expr) -> TypeId {
        match &expr.kind {
            ExprKind::Literal(lit) => self.infer_literal(lit),
            ExprKind::Regex { .. } => self.builder().interface(InterfaceShape {
                members: Vec::new(),
                index_signatures: Vec::new(),
                call_signatures: Vec::new(),
                construct_signatures: Vec::new(),
                extends: Vec::new(),
            }),
            ExprKind::Variable(ident) => {
                if let Some(ty) = self.narrowing.get(&NarrowingPath::Root(ident.name.clone())) {
                    return ty;
                }
                match self.env.lookup(&ident.name) {
                    Some(binding) => binding.declared_type,
                    None => {
                        self.error(expr.span, format!("Cannot find name '{}'.", ident.name.as_str()));
                        self.well_known.any
                    }
                }
            }
            ExprKind::Grouping(inner) => self.infer_expr(inner),
            ExprKind::Unary { op, operand } => {
                let operand_ty = self.infer_expr(operand);
                match op {
                    UnaryOp::Neg | UnaryOp::Plus | UnaryOp::BitNot => self.well_known.number,
                    UnaryOp::Not => self.well_known.boolean,
                    UnaryOp::TypeOf => self.well_known.string,
                    UnaryOp::Void => {
                        let _ = operand_ty;
                        self.well_known.void_
                    }
                }
            }
            ExprKind::Binary { op, left, right } => self.infer_binary(*op, left, right),
            ExprKind::Logical { op, left, right } => self.infer_logical(*op, left, right),
            ExprKind::NullishCoalescing { left, right } => {
                let left_ty = self.infer_expr(left);
                let right_ty = self.infer_expr(right);
                let non_null = self.exclude_nullish(left_ty);
                self.builder().union([non_null, right_ty])
            }
            ExprKind::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                self.infer_expr(condition);
                let base = self.narrowing.clone();
                let mut then_ctx = base.clone();
                self.narrow_condition(&mut then_ctx, condition, true);
                self.narrowing = then_ctx;
                let then_ty = self.infer_expr(then_branch);
                let mut else_ctx = base;
                self.narrow_condition(&mut else_ctx, condition, false);
                self.narrowing = else_ctx;
                let else_ty = self.infer_expr(else_branch);
                self.builder().union([then_ty, else_ty])
            }
            ExprKind::Assign { target, value } => {
                let target_ty = self.infer_expr(target);
                let value_ty = self.infer_expr(value);
                if target_ty != self.well_known.any {
                    self.check_assignable(expr.span, target_ty, value_ty);
                }
                if let Some(path) = path_of(target) {
                    self.narrowing.invalidate(&path);
                }
                value_ty
            }
            ExprKind::CompoundAssign { op, target, value } => {
                let result = self.infer_binary(*op, target, value);
                if let Some(path) = path_of(target) {
                    self.narrowing.invalidate(&path);
                }
                result
            }
            ExprKind::LogicalAssign { target, value, .. } => {
                let target_ty = self.infer_expr(target);
                let value_ty = self.infer_expr(value);
                if let Some(path) = path_of(target) {
                    self.narrowing.invalidate(&path);
                }
                self.builder().union([target_ty, value_ty])
            }
            ExprKind::Call {
                callee,
                type_args,
                args,
                optional: _,
            } => self.infer_call(callee, type_args.as_deref(), args),
            ExprKind::Get { object, name, .. } => {
                let object_ty = self.infer_expr(object);
                if let Some(ty) = path_of(expr).and_then(|p| self.narrowing.get(&p)) {
                    return ty;
                }
                self.member_type(object_ty, name).unwrap_or_else(|| {
                    self.error(
                        expr.span,
                        format!("Property '{}' does not exist on type '{}'.", name.as_str(), describe(&self.arena, object_ty)),
                    );
                    self.well_known.any
                })
            }
            ExprKind::Set { object, name, value } => {
                self.infer_expr(object);
                let value_ty = self.infer_expr(value);
                if let Some(path) = path_of(object) {
                    self.narrowing.invalidate(&NarrowingPath::Member(Box::new(path), name.clone()));
                }
                value_ty
            }
            ExprKind::GetIndex { object, index, .. } => {
                let object_ty = self.infer_expr(object);
                self.infer_expr(index);
                if let Some(ty) = path_of(expr).and_then(|p| self.narrowing.get(&p)) {
                    return ty;
                }
                self.array_element_type(object_ty)
            }
            ExprKind::SetIndex { object, index, value } => {
                self.infer_expr(object);
                self.infer_expr(index);
                let value_ty = self.infer_expr(value);
                if let Some(base) = path_of(object) {
                    match &index.kind {
                        ExprKind::Literal(Literal::Number(n)) if *n >= 0.0 && n.fract() == 0.0 => {
                            self.narrowing.invalidate(&NarrowingPath::Index(Box::new(base), *n as u32));
                        }
                        _ => self.narrowing.invalidate(&base),
                    }
                }
                value_ty
            }
            ExprKind::GetPrivate { object, name } => {
                let object_ty = self.infer_expr(object);
                self.member_type(object_ty, name).unwrap_or(self.well_known.any)
            }
            ExprKind::SetPrivate { object, value, .. } => {
                self.infer_expr(object);
                self.infer_expr(value)
            }
            ExprKind::CallPrivate { object, args, .. } => {
                self.infer_expr(object);
                for arg in args {
                    self.infer_expr(arg);
                }
                self.well_known.any
            }
            ExprKind::This => self.this_stack.last().copied().unwrap_or(self.well_known.any),
            ExprKind::Super(_) => self.well_known.any,
            ExprKind::New { callee, type_args, args } => self.infer_new(callee, type_args.as_deref(), args),
            ExprKind::ArrayLiteral(elements) => {
                let mut member_types = Vec::new();
                for element in elements {
                    match element {
                        ArrayElement::Item(e) => member_types.push(self.infer_expr(e)),
                        ArrayElement::Spread(e) => {
                            let spread_ty = self.infer_expr(e);
                            member_types.push(self.array_element_type(spread_ty));
                        }
                        ArrayElement::Hole => member_types.push(self.well_known.undefined),
                    }
                }
                let elem = self.builder().union(member_types);
                self.builder().array(elem)
            }
            ExprKind::ObjectLiteral(props) => self.infer_object_literal(props),
            ExprKind::ArrowFunction(arrow) => self.infer_arrow(arrow),
            ExprKind::ClassExpr(decl) => {
                let shape = self.class_decl_shape(decl);
                let ty = self.builder().class(shape);
                self.check_class_body_anonymous(decl, ty);
                ty
            }
            ExprKind::TemplateLiteral { exprs, .. } => {
                for e in exprs {
                    self.infer_expr(e);
                }
                self.well_known.string
            }
            ExprKind::TaggedTemplateLiteral { tag, exprs, .. } => {
                let tag_ty = self.infer_expr(tag);
                for e in exprs {
                    self.infer_expr(e);
                }
                match self.arena.get(tag_ty).clone() {
                    TypeInfo::Function(shape) => shape.return_type,
                    _ => self.well_known.any,
                }
            }
            ExprKind::Spread(inner) => self.infer_expr(inner),
            ExprKind::TypeAssertion { expr: inner, ty } => {
                let inner_ty = self.infer_expr(inner);
                let target = self.resolve_type(ty);
                if !self.is_assignable(inner_ty, target)
                    && !self.is_assignable(target, inner_ty)
                {
                    self.error(
                        expr.span,
                        format!(
                            "Conversion of type '{}' to type '{}' may be a mistake.",
                            describe(&self.arena, inner_ty),
                            describe(&self.arena, target)
                        ),
                    );
                }
                target
            }
            ExprKind::Satisfies { expr: inner, ty } => {
                let inner_ty = self.infer_expr(inner);
                let target = self.resolve_type(ty);
                self.check_assignable(expr.span, target, inner_ty);
                inner_ty
            }
            ExprKind::NonNullAssertion(inner) => {
                let inner_ty = self.infer_expr(inner);
                self.exclude_nullish(inner_ty)
            }
            ExprKind::Await(inner) => {
                let inner_ty = self.infer_expr(inner);
                self.unwrap_promise(inner_ty)
            }
            ExprKind::Yield { value, .. } => {
                if let Some(value) = value {
                    self.infer_expr(value);
                }
                self.well_known.any
            }
            ExprKind::DynamicImport(inner) => {
                self.infer_expr(inner);
                self.well_known.any
            }
            ExprKind::ImportMeta => self.well_known.any,
            ExprKind::Delete(inner) => {
                self.infer_expr(inner);
                self.well_known.boolean
            }
            ExprKind::PrefixUpdate { operand, .. } | ExprKind::PostfixUpdate { operand, .. } => {
                self.infer_expr(operand);
                self.well_known.number
            }
            ExprKind::SequenceTemp(n) => {
                let name = sharpts_common::Atom::new(&format!("__sharpts_tmp{n}"));
                self.env.lookup(&name).map(|b| b.declared_type).unwrap_or(self.well_known.any)
            }
        }
    }

    fn check_class_body_anonymous(&mut self, c: &ClassDecl, class_ty: TypeId) {
        self.env.push_block_scope();
        self.this_stack.push(class_ty);
        for member in &c.members {
            if let ClassMember::Method(method) = member {
                self.check_function_body(&method.function, Some(class_ty));
            }
            if let ClassMember::Constructor(ctor) = member {
                self.check_function_body(ctor, Some(class_ty));
            }
        }
        self.this_stack.pop();
        self.env.pop_scope();
    }

    fn infer_literal(&mut self, lit: &Literal) -> TypeId {
        match lit {
            Literal::Null => self.well_known.null,
            Literal::Undefined => self.well_known.undefined,
            Literal::Bool(b) => self.builder().literal(LiteralValue::Boolean(*b)),
            Literal::Number(n) => self.builder().literal(LiteralValue::number(*n)),
            Literal::BigInt(s) => self.builder().literal(LiteralValue::BigInt(sharpts_common::Atom::new(s))),
            Literal::Str(s) => self.builder().literal(LiteralValue::String(sharpts_common::Atom::new(s))),
        }
    }

    fn infer_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> TypeId {
        let left_ty = self.infer_expr(left);
        let right_ty = self.infer_expr(right);
        match op {
            BinaryOp::Add => {
                if self.is_string_like(left_ty) || self.is_string_like(right_ty) {
                    self.well_known.string
                } else {
                    self.well_known.number
                }
            }
            BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Mod
            | BinaryOp::Pow
            | BinaryOp::Shl
            | BinaryOp::Shr
            | BinaryOp::UShr
            | BinaryOp::BitAnd
            | BinaryOp::BitOr
            | BinaryOp::BitXor => self.well_known.number,
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::StrictEq
            | BinaryOp::StrictNotEq
            | BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq
            | BinaryOp::In
            | BinaryOp::InstanceOf => self.well_known.boolean,
        }
    }

    fn is_string_like(&self, ty: TypeId) -> bool {
        matches!(
            self.arena.get(ty),
            TypeInfo::Primitive(Primitive::String) | TypeInfo::Literal(LiteralValue::String(_))
        )
    }

    fn infer_logical(&mut self, op: LogicalOp, left: &Expr, right: &Expr) -> TypeId {
        self.infer_expr(left);
        let base = self.narrowing.clone();
        match op {
            LogicalOp::And => {
                let mut ctx = base;
                self.narrow_condition(&mut ctx, left, true);
                self.narrowing = ctx;
                let right_ty = self.infer_expr(right);
                let left_ty = self.infer_expr(left);
                let falsy_left = self.narrow_falsy(left_ty);
                self.builder().union([falsy_left, right_ty])
            }
            LogicalOp::Or => {
                let mut ctx = base;
                self.narrow_condition(&mut ctx, left, false);
                self.narrowing = ctx;
                let right_ty = self.infer_expr(right);
                let left_ty = self.infer_expr(left);
                let truthy_left = self.narrow_truthy(left_ty);
                self.builder().union([truthy_left, right_ty])
            }
        }
    }

    fn exclude_nullish(&mut self, ty: TypeId) -> TypeId {
        let members = match self.arena.get(ty).clone() {
            TypeInfo::Union(members) => members,
            _ => vec![ty],
        };
        let filtered: Vec<TypeId> = members
            .into_iter()
            .filter(|m| !matches!(self.arena.get(*m), TypeInfo::Primitive(Primitive::Null | Primitive::Undefined)))
            .collect();
        self.builder().union(filtered)
    }

    fn infer_call(&mut self, callee: &Expr, type_args: Option<&[TypeNode]>, args: &[Expr]) -> TypeId {
        let callee_ty = self.infer_expr(callee);
        let arg_types: Vec<TypeId> = args.iter().map(|a| self.infer_expr(a)).collect();
        let TypeInfo::Function(shape) = self.arena.get(callee_ty).clone() else {
            if callee_ty != self.well_known.any && callee_ty != self.well_known.unknown {
                self.error(
                    callee.span,
                    format!("This expression is not callable. Type '{}' has no call signatures.", describe(&self.arena, callee_ty)),
                );
            }
            return self.well_known.any;
        };
        if shape.type_params.is_empty() {
            self.check_call_args(&shape, args, &arg_types);
            return shape.return_type;
        }
        let explicit: FxHashMap<sharpts_common::Atom, TypeId> = match type_args {
            Some(nodes) => shape
                .type_params
                .iter()
                .zip(nodes.iter().map(|n| self.resolve_type(n)))
                .map(|(p, t)| (p.name.clone(), t))
                .collect(),
            None => FxHashMap::default(),
        };
        let mut substitution = if explicit.is_empty() {
            infer_type_arguments(self, &shape, &arg_types)
        } else {
            explicit
        };
        for tp in &shape.type_params {
            substitution.entry(tp.name.clone()).or_insert(tp.default.unwrap_or(self.well_known.unknown));
        }
        let instantiated_params: Vec<ParamShape> = shape
            .params
            .iter()
            .map(|p| ParamShape {
                name: p.name.clone(),
                ty: substitute(self, p.ty, &substitution),
                optional: p.optional,
                rest: p.rest,
            })
            .collect();
        let return_type = substitute(self, shape.return_type, &substitution);
        let instantiated = FunctionShape {
            type_params: Vec::new(),
            params: instantiated_params,
            required_count: shape.required_count,
            return_type,
            this_type: shape.this_type,
            predicate: shape.predicate,
        };
        self.check_call_args(&instantiated, args, &arg_types);
        return_type
    }

    fn check_call_args(&mut self, shape: &FunctionShape, args: &[Expr], arg_types: &[TypeId]) {
        if args.len() < shape.required_count {
            if let Some(last) = args.last() {
                self.error(last.span, "Expected more arguments.");
            }
        }
        for (i, (arg, &arg_ty)) in args.iter().zip(arg_types).enumerate() {
            let Some(param) = shape.params.get(i).or_else(|| shape.params.last().filter(|p| p.rest)) else {
                continue;
            };
            let expected = if param.rest {
                self.array_element_type(param.ty)
            } else {
                param.ty
            };
            if expected != self.well_known.any {
                self.check_assignable(arg.span, expected, arg_ty);
            }
        }
    }

    fn infer_new(&mut self, callee: &Expr, type_args: Option<&[TypeNode]>, args: &[Expr]) -> TypeId {
        let callee_ty = self.infer_expr(callee);
        for arg in args {
            self.infer_expr(arg);
        }
        match self.arena.get(callee_ty).clone() {
            TypeInfo::Class(shape) => {
                let type_arguments = match type_args {
                    Some(nodes) => nodes.iter().map(|n| self.resolve_type(n)).collect(),
                    None => shape
                        .type_params
                        .iter()
                        .map(|p| p.default.unwrap_or(self.well_known.unknown))
                        .collect(),
                };
                self.builder().instance(callee_ty, type_arguments)
            }
            _ => self.well_known.any,
        }
    }

    fn infer_object_literal(&mut self, props: &[ObjectProperty]) -> TypeId {
        let mut members = Vec::new();
        for prop in props {
            match prop.kind {
                PropertyKind::Spread => {
                    if let Some(value) = &prop.value {
                        let value_ty = self.infer_expr(value);
                        if let TypeInfo::Interface(shape) = self.arena.get(value_ty).clone() {
                            members.extend(shape.members);
                        }
                    }
                }
                PropertyKind::Get => {
                    if let Some(value) = &prop.value {
                        let ty = self.infer_expr(value);
                        let ret = match self.arena.get(ty).clone() {
                            TypeInfo::Function(f) => f.return_type,
                            _ => ty,
                        };
                        members.push((property_key_name(&prop.key), ret, false));
                    }
                }
                _ => {
                    let ty = match &prop.value {
                        Some(value) => self.infer_expr(value),
                        None => {
                            if let PropertyKey::Identifier(name) = &prop.key {
                                self.env.lookup(name).map(|b| b.declared_type).unwrap_or(self.well_known.any)
                            } else {
                                self.well_known.any
                            }
                        }
                    };
                    members.push((property_key_name(&prop.key), ty, false));
                }
            }
        }
        self.builder().interface(InterfaceShape {
            members,
            index_signatures: Vec::new(),
            call_signatures: Vec::new(),
            construct_signatures: Vec::new(),
            extends: Vec::new(),
        })
    }

    fn infer_arrow(&mut self, arrow: &ArrowFunction) -> TypeId {
        self.env.push_function_scope();
        let type_params = self.resolve_type_params(&arrow.type_params);
        let params = self.resolve_param_shapes(&arrow.params);
        for (param, shape) in arrow.params.iter().zip(&params) {
            self.bind_pattern(&param.pattern, shape.ty, BindingKind::Param);
        }
        let declared_return = arrow.return_type.as_ref().map(|t| self.resolve_type(t));
        self.async_stack.push(arrow.flags.is_async);
        self.generator_stack.push(arrow.flags.is_generator);
        let body_return = match &arrow.body {
            ArrowBody::Expr(expr) => {
                let ty = self.infer_expr(expr);
                if arrow.flags.is_async {
                    self.promise_instance(ty)
                } else {
                    ty
                }
            }
            ArrowBody::Block(stmt) => {
                let return_type = declared_return.unwrap_or(self.well_known.any);
                self.return_type_stack.push(return_type);
                self.check_stmt(stmt);
                self.return_type_stack.pop();
                if arrow.flags.is_async {
                    self.promise_instance(return_type)
                } else {
                    self.well_known.void_
                }
            }
        };
        self.async_stack.pop();
        self.generator_stack.pop();
        self.env.pop_scope();
        let return_type = declared_return.unwrap_or(body_return);
        let required_count = params.iter().take_while(|p| !p.optional && !p.rest).count();
        self.builder().function(FunctionShape {
            type_params,
            params,
            required_count,
            return_type,
            this_type: None,
            predicate: None,
        })
    }
}

fn var_kind_to_binding(kind: VarKind) -> BindingKind {
    match kind {
        VarKind::Var => BindingKind::Var,
        VarKind::Let => BindingKind::Let,
        VarKind::Const => BindingKind::Const,
    }
}

/// Minimal human-readable rendering of a type for diagnostic messages —
/// not a full pretty-printer, just enough to point at what went wrong.
pub(crate) fn describe(arena: &TypeArena, ty: TypeId) -> String {
    match arena.get(ty) {
        TypeInfo::Primitive(Primitive::String) => "string".to_string(),
        TypeInfo::Primitive(Primitive::Number) => "number".to_string(),
        TypeInfo::Primitive(Primitive::Boolean) => "boolean".to_string(),
        TypeInfo::Primitive(Primitive::BigInt) => "bigint".to_string(),
        TypeInfo::Primitive(Primitive::Symbol) => "symbol".to_string(),
        TypeInfo::Primitive(Primitive::Null) => "null".to_string(),
        TypeInfo::Primitive(Primitive::Undefined) => "undefined".to_string(),
        TypeInfo::Literal(LiteralValue::String(s)) => format!("\"{}\"", s.as_str()),
        TypeInfo::Literal(LiteralValue::Number(bits)) => format!("{}", f64::from_bits(*bits)),
        TypeInfo::Literal(LiteralValue::Boolean(b)) => b.to_string(),
        TypeInfo::Literal(LiteralValue::BigInt(s)) => format!("{}n", s.as_str()),
        TypeInfo::Any => "any".to_string(),
        TypeInfo::Unknown => "unknown".to_string(),
        TypeInfo::Never => "never".to_string(),
        TypeInfo::Void => "void".to_string(),
        TypeInfo::ThisType => "this".to_string(),
        TypeInfo::Array(elem) => format!("{}[]", describe(arena, *elem)),
        TypeInfo::Union(members) => members.iter().map(|m| describe(arena, *m)).collect::<Vec<_>>().join(" | "),
        TypeInfo::Intersection(members) => members.iter().map(|m| describe(arena, *m)).collect::<Vec<_>>().join(" & "),
        TypeInfo::Class(shape) => shape.name.as_str().to_string(),
        TypeInfo::Enum(shape) => shape.name.as_str().to_string(),
        TypeInfo::Instance(shape) => describe(arena, shape.class),
        TypeInfo::Function(_) => "Function".to_string(),
        TypeInfo::Interface(_) => "object".to_string(),
        _ => "unknown".to_string(),
    }
}
