//! Statement execution and binding-pattern destructuring,
//! shared by `var`/`let`/`const` declarations, function parameters,
//! `catch` clauses, and `for-of`/`for-in` loop variables.

use sharpts_common::Atom;
use sharpts_parser::ast::{
    BindingElement, BindingPattern, ExportDecl, ForInit, Stmt, StmtKind, SwitchCase, UsingKind, VarDeclarator, VarKind,
};

use crate::environment::{BindingKind, RuntimeEnvironment};
use crate::errors;
use crate::evaluator::Evaluator;
use crate::result::ExecutionResult;
use crate::value::{FunctionData, RuntimeValue};

fn binding_kind_for(kind: VarKind) -> BindingKind {
    match kind {
        VarKind::Var => BindingKind::Var,
        VarKind::Let => BindingKind::Let,
        VarKind::Const => BindingKind::Const,
    }
}

impl Evaluator {
    /// Runs a function body and always surfaces `Return`/`Throw` to the
    /// caller; `Normal` completion of the body (falling off the end)
    /// means an implicit `return undefined`.
    pub fn exec_function_body(&mut self, env: &RuntimeEnvironment, body: &Stmt) -> ExecutionResult {
        if let StmtKind::Block(stmts) = &body.kind {
            hoist_statements(self, env, stmts);
            let result = exec_stmts(self, env, stmts);
            return self.dispose_block_env(env, result);
        }
        self.exec_stmt(env, body)
    }

    pub fn exec_stmt(&mut self, env: &RuntimeEnvironment, stmt: &Stmt) -> ExecutionResult {
        match &stmt.kind {
            StmtKind::Expression(e) => match self.eval_expr(env, e) {
                Ok(v) => ExecutionResult::Normal(v),
                Err(abrupt) => abrupt,
            },
            StmtKind::VarDecl { kind, declarators } => self.exec_var_decl(env, *kind, declarators),
            StmtKind::Function(_) => ExecutionResult::Normal(RuntimeValue::Undefined),
            StmtKind::Class(decl) => match self.eval_class_decl(env, decl) {
                Ok(v) => {
                    if let Some(name) = &decl.name {
                        env.define(name.name.clone(), v, BindingKind::Class);
                    }
                    ExecutionResult::Normal(RuntimeValue::Undefined)
                }
                Err(e) => e,
            },
            StmtKind::Interface(_) | StmtKind::TypeAlias { .. } | StmtKind::ImportAlias(_) => {
                ExecutionResult::Normal(RuntimeValue::Undefined)
            }
            StmtKind::Namespace(decl) => self.exec_namespace(env, decl),
            StmtKind::Enum(decl) => self.exec_enum(env, decl),
            StmtKind::Import(decl) => self.exec_import(env, decl),
            StmtKind::Export(decl) => self.exec_export(env, decl),
            StmtKind::If { condition, then_branch, else_branch } => {
                let cond = match self.eval_expr(env, condition) {
                    Ok(v) => v,
                    Err(e) => return e,
                };
                if cond.to_boolean() {
                    self.exec_stmt(env, then_branch)
                } else if let Some(e) = else_branch {
                    self.exec_stmt(env, e)
                } else {
                    ExecutionResult::Normal(RuntimeValue::Undefined)
                }
            }
            StmtKind::While { condition, body } => self.exec_while(env, condition, body, &[]),
            StmtKind::DoWhile { body, condition } => self.exec_do_while(env, body, condition, &[]),
            StmtKind::For { init, condition, update, body } => self.exec_for(env, init, condition, update, body, &[]),
            StmtKind::ForOf { kind, pattern, iterable, body, r#await } => self.exec_for_of(
                env,
                *kind,
                pattern,
                iterable,
                body,
                matches!(r#await, sharpts_parser::ast::ForOfAwait::Await),
                &[],
            ),
            StmtKind::ForIn { kind, pattern, object, body } => self.exec_for_in(env, *kind, pattern, object, body, &[]),
            StmtKind::Switch { discriminant, cases } => self.exec_switch(env, discriminant, cases),
            StmtKind::TryCatch { try_block, catch_param, catch_block, finally_block } => {
                self.exec_try(env, try_block, catch_param.as_ref(), catch_block.as_deref(), finally_block.as_deref())
            }
            StmtKind::Throw(e) => match self.eval_expr(env, e) {
                Ok(v) => ExecutionResult::Throw(v),
                Err(abrupt) => abrupt,
            },
            StmtKind::Return(e) => match e {
                Some(e) => match self.eval_expr(env, e) {
                    Ok(v) => ExecutionResult::Return(v),
                    Err(abrupt) => abrupt,
                },
                None => ExecutionResult::Return(RuntimeValue::Undefined),
            },
            StmtKind::Break(label) => ExecutionResult::Break(label.as_ref().map(|i| i.name.clone())),
            StmtKind::Continue(label) => ExecutionResult::Continue(label.as_ref().map(|i| i.name.clone())),
            StmtKind::Labeled { label, body } => {
                // A label binds to the nearest enclosing iteration statement
                // it directly wraps: `outer: for (...)
                // continue outer;` must re-enter *this* loop's next
                // iteration, not terminate it the way an unlabeled `break`
                // would. Stacked labels (`a: b: for (...)`) all bind to the
                // same loop, so the whole chain is collected before
                // dispatching into the label-aware loop executors below.
                let mut labels = vec![label.name.clone()];
                let mut inner = body.as_ref();
                while let StmtKind::Labeled { label: next_label, body: next_body } = &inner.kind {
                    labels.push(next_label.name.clone());
                    inner = next_body.as_ref();
                }
                self.exec_labeled_body(env, &labels, inner)
            }
            StmtKind::Block(stmts) => {
                let block_env = env.child_block();
                hoist_statements(self, &block_env, stmts);
                let result = exec_stmts(self, &block_env, stmts);
                self.dispose_block_env(&block_env, result)
            }
            StmtKind::Sequence(stmts) => exec_stmts(self, env, stmts),
            StmtKind::Using { kind, declarators } => self.exec_using(env, *kind, declarators),
            StmtKind::Directive(text) => {
                if text == "use strict" {
                    env.set_strict(true);
                }
                ExecutionResult::Normal(RuntimeValue::Undefined)
            }
            StmtKind::FileDirective(_) | StmtKind::StaticBlockMarker | StmtKind::Empty => {
                ExecutionResult::Normal(RuntimeValue::Undefined)
            }
        }
    }

    fn exec_var_decl(&mut self, env: &RuntimeEnvironment, kind: VarKind, declarators: &[VarDeclarator]) -> ExecutionResult {
        for d in declarators {
            let value = match &d.initializer {
                Some(e) => match self.eval_expr(env, e) {
                    Ok(v) => v,
                    Err(abrupt) => return abrupt,
                },
                None => RuntimeValue::Undefined,
            };
            if let Err(e) = self.bind_pattern(env, &d.pattern, value, binding_kind_for(kind)) {
                return e;
            }
        }
        ExecutionResult::Normal(RuntimeValue::Undefined)
    }

    /// Recursively destructures `value` against `pattern`, defining each
    /// leaf identifier in `env`.
    pub fn bind_pattern(
        &mut self,
        env: &RuntimeEnvironment,
        pattern: &BindingPattern,
        value: RuntimeValue,
        kind: BindingKind,
    ) -> Result<(), ExecutionResult> {
        match pattern {
            BindingPattern::Identifier(ident) => {
                env.define(ident.name.clone(), value, kind);
                Ok(())
            }
            BindingPattern::Array(elements) => {
                let mut iter = self.get_iterator(&value)?;
                for el in elements {
                    match el {
                        None => {
                            let _ = self.iterator_next(&mut iter, RuntimeValue::Undefined)?;
                        }
                        Some(BindingElement { pattern, default, rest: true }) => {
                            let mut rest = Vec::new();
                            loop {
                                let step = self.iterator_next(&mut iter, RuntimeValue::Undefined)?;
                                if step.done {
                                    break;
                                }
                                rest.push(step.value);
                            }
                            let _ = default;
                            self.bind_pattern(env, pattern, RuntimeValue::array(rest), kind)?;
                        }
                        Some(BindingElement { pattern, default, rest: false }) => {
                            let step = self.iterator_next(&mut iter, RuntimeValue::Undefined)?;
                            let mut v = step.value;
                            if matches!(v, RuntimeValue::Undefined) {
                                if let Some(d) = default {
                                    v = self.eval_expr(env, d)?;
                                }
                            }
                            self.bind_pattern(env, pattern, v, kind)?;
                        }
                    }
                }
                Ok(())
            }
            BindingPattern::Object(props) => {
                let mut taken = Vec::new();
                for p in props {
                    let key = match &p.key {
                        sharpts_parser::ast::PropertyKey::Identifier(a) => a.clone(),
                        sharpts_parser::ast::PropertyKey::StringLiteral(s) => Atom::new(s),
                        sharpts_parser::ast::PropertyKey::NumberLiteral(n) => Atom::new(crate::value::format_number(*n)),
                        sharpts_parser::ast::PropertyKey::Computed(e) => {
                            Atom::new(self.eval_expr(env, e)?.display_string())
                        }
                    };
                    taken.push(key.clone());
                    if p.value.rest {
                        continue;
                    }
                    let mut v = self.get_property(&value, &key)?;
                    if matches!(v, RuntimeValue::Undefined) {
                        if let Some(d) = &p.value.default {
                            v = self.eval_expr(env, d)?;
                        }
                    }
                    self.bind_pattern(env, &p.value.pattern, v, kind)?;
                }
                if let Some(rest_prop) = props.iter().find(|p| p.value.rest) {
                    let rest_obj = match &value {
                        RuntimeValue::Object(o) => {
                            let mut out = indexmap::IndexMap::new();
                            for (k, slot) in o.lock().expect("object lock poisoned").props.iter() {
                                if !taken.contains(k) {
                                    out.insert(k.clone(), slot.clone());
                                }
                            }
                            RuntimeValue::object(crate::value::ObjectData { props: out, symbol_props: Default::default(), is_fresh_literal: true })
                        }
                        _ => RuntimeValue::object(Default::default()),
                    };
                    self.bind_pattern(env, &rest_prop.value.pattern, rest_obj, kind)?;
                }
                Ok(())
            }
        }
    }

    /// Dispatches the statement a chain of labels directly wraps.
    /// Iteration statements get `labels` threaded all
    /// the way into their own break/continue matching so a matching
    /// labeled `continue` re-enters the loop instead of terminating it;
    /// anything else only needs `break` handled, matching an unlabeled
    /// `break`'s behavior once its label resolves here.
    fn exec_labeled_body(&mut self, env: &RuntimeEnvironment, labels: &[Atom], stmt: &Stmt) -> ExecutionResult {
        match &stmt.kind {
            StmtKind::For { init, condition, update, body } => self.exec_for(env, init, condition, update, body, labels),
            StmtKind::While { condition, body } => self.exec_while(env, condition, body, labels),
            StmtKind::DoWhile { body, condition } => self.exec_do_while(env, body, condition, labels),
            StmtKind::ForOf { kind, pattern, iterable, body, r#await } => self.exec_for_of(
                env,
                *kind,
                pattern,
                iterable,
                body,
                matches!(r#await, sharpts_parser::ast::ForOfAwait::Await),
                labels,
            ),
            StmtKind::ForIn { kind, pattern, object, body } => self.exec_for_in(env, *kind, pattern, object, body, labels),
            _ => match self.exec_stmt(env, stmt) {
                ExecutionResult::Break(Some(ref l)) if labels.iter().any(|x| x == l) => {
                    ExecutionResult::Normal(RuntimeValue::Undefined)
                }
                other => other,
            },
        }
    }

    fn exec_while(
        &mut self,
        env: &RuntimeEnvironment,
        condition: &sharpts_parser::ast::Expr,
        body: &Stmt,
        labels: &[Atom],
    ) -> ExecutionResult {
        loop {
            let cond = match self.eval_expr(env, condition) {
                Ok(v) => v,
                Err(e) => return e,
            };
            if !cond.to_boolean() {
                return ExecutionResult::Normal(RuntimeValue::Undefined);
            }
            match self.exec_stmt(env, body) {
                ExecutionResult::Normal(_) | ExecutionResult::Continue(None) => {}
                ExecutionResult::Continue(Some(ref l)) if labels.iter().any(|x| x == l) => {}
                ExecutionResult::Break(None) => return ExecutionResult::Normal(RuntimeValue::Undefined),
                ExecutionResult::Break(Some(ref l)) if labels.iter().any(|x| x == l) => {
                    return ExecutionResult::Normal(RuntimeValue::Undefined)
                }
                other => return other,
            }
        }
    }

    fn exec_do_while(
        &mut self,
        env: &RuntimeEnvironment,
        body: &Stmt,
        condition: &sharpts_parser::ast::Expr,
        labels: &[Atom],
    ) -> ExecutionResult {
        loop {
            match self.exec_stmt(env, body) {
                ExecutionResult::Normal(_) | ExecutionResult::Continue(None) => {}
                ExecutionResult::Continue(Some(ref l)) if labels.iter().any(|x| x == l) => {}
                ExecutionResult::Break(None) => return ExecutionResult::Normal(RuntimeValue::Undefined),
                ExecutionResult::Break(Some(ref l)) if labels.iter().any(|x| x == l) => {
                    return ExecutionResult::Normal(RuntimeValue::Undefined)
                }
                other => return other,
            }
            let cond = match self.eval_expr(env, condition) {
                Ok(v) => v,
                Err(e) => return e,
            };
            if !cond.to_boolean() {
                return ExecutionResult::Normal(RuntimeValue::Undefined);
            }
        }
    }

    fn exec_for(
        &mut self,
        env: &RuntimeEnvironment,
        init: &Option<Box<ForInit>>,
        condition: &Option<sharpts_parser::ast::Expr>,
        update: &Option<sharpts_parser::ast::Expr>,
        body: &Stmt,
        labels: &[Atom],
    ) -> ExecutionResult {
        let loop_env = env.child_block();
        if let Some(init) = init {
            match init.as_ref() {
                ForInit::VarDecl(kind, decls) => {
                    if let ExecutionResult::Throw(e) = self.exec_var_decl(&loop_env, *kind, decls) {
                        return ExecutionResult::Throw(e);
                    }
                }
                ForInit::Expr(e) => {
                    if let Err(abrupt) = self.eval_expr(&loop_env, e) {
                        return abrupt;
                    }
                }
            }
        }
        loop {
            if let Some(cond) = condition {
                match self.eval_expr(&loop_env, cond) {
                    Ok(v) => {
                        if !v.to_boolean() {
                            return ExecutionResult::Normal(RuntimeValue::Undefined);
                        }
                    }
                    Err(e) => return e,
                }
            }
            let iter_env = loop_env.child_block();
            match self.exec_stmt(&iter_env, body) {
                ExecutionResult::Normal(_) | ExecutionResult::Continue(None) => {}
                ExecutionResult::Continue(Some(ref l)) if labels.iter().any(|x| x == l) => {}
                ExecutionResult::Break(None) => return ExecutionResult::Normal(RuntimeValue::Undefined),
                ExecutionResult::Break(Some(ref l)) if labels.iter().any(|x| x == l) => {
                    return ExecutionResult::Normal(RuntimeValue::Undefined)
                }
                other => return other,
            }
            if let Some(update) = update {
                if let Err(abrupt) = self.eval_expr(&loop_env, update) {
                    return abrupt;
                }
            }
        }
    }

    fn exec_switch(&mut self, env: &RuntimeEnvironment, discriminant: &sharpts_parser::ast::Expr, cases: &[SwitchCase]) -> ExecutionResult {
        let switch_env = env.child_block();
        let disc = match self.eval_expr(&switch_env, discriminant) {
            Ok(v) => v,
            Err(e) => return e,
        };
        let mut matched = false;
        let mut default_index = None;
        for (i, case) in cases.iter().enumerate() {
            match &case.test {
                Some(test) => {
                    if !matched {
                        let test_val = match self.eval_expr(&switch_env, test) {
                            Ok(v) => v,
                            Err(e) => return e,
                        };
                        if crate::evaluator::expr::binary_op(sharpts_parser::ast::BinaryOp::StrictEq, &disc, &test_val)
                            .ok()
                            .map(|v| v.to_boolean())
                            .unwrap_or(false)
                        {
                            matched = true;
                        }
                    }
                }
                None => default_index = Some(i),
            }
            if matched {
                match exec_stmts(self, &switch_env, &case.body) {
                    ExecutionResult::Normal(_) => {}
                    ExecutionResult::Break(None) => return ExecutionResult::Normal(RuntimeValue::Undefined),
                    other => return other,
                }
            }
        }
        if !matched {
            if let Some(start) = default_index {
                for case in &cases[start..] {
                    match exec_stmts(self, &switch_env, &case.body) {
                        ExecutionResult::Normal(_) => {}
                        ExecutionResult::Break(None) => return ExecutionResult::Normal(RuntimeValue::Undefined),
                        other => return other,
                    }
                }
            }
        }
        ExecutionResult::Normal(RuntimeValue::Undefined)
    }

    fn exec_try(
        &mut self,
        env: &RuntimeEnvironment,
        try_block: &Stmt,
        catch_param: Option<&BindingPattern>,
        catch_block: Option<&Stmt>,
        finally_block: Option<&Stmt>,
    ) -> ExecutionResult {
        let mut result = self.exec_stmt(env, try_block);
        if let ExecutionResult::Throw(err) = result {
            result = match catch_block {
                Some(block) => {
                    let catch_env = env.child_block();
                    if let Some(pattern) = catch_param {
                        if let Err(e) = self.bind_pattern(&catch_env, pattern, err, BindingKind::Catch) {
                            return self.run_finally(finally_block, env, e);
                        }
                    }
                    self.exec_stmt(&catch_env, block)
                }
                None => ExecutionResult::Throw(err),
            };
        }
        self.run_finally(finally_block, env, result)
    }

    fn run_finally(&mut self, finally_block: Option<&Stmt>, env: &RuntimeEnvironment, result: ExecutionResult) -> ExecutionResult {
        let Some(block) = finally_block else { return result };
        match self.exec_stmt(env, block) {
            // A `finally` completion that is itself abrupt overrides
            // whatever `try`/`catch` produced.
            ExecutionResult::Normal(_) => result,
            other => other,
        }
    }

    /// `using`/`await using` declarations: disposers run in reverse declaration order when the
    /// enclosing block exits, and a disposer that itself throws while
    /// another error is already pending nests as a `SuppressedError`
    /// rather than replacing it.
    fn exec_using(
        &mut self,
        env: &RuntimeEnvironment,
        kind: UsingKind,
        declarators: &[sharpts_parser::ast::UsingDeclarator],
    ) -> ExecutionResult {
        for d in declarators {
            let value = match self.eval_expr(env, &d.initializer) {
                Ok(v) => v,
                Err(e) => return e,
            };
            env.define(d.name.name.clone(), value, BindingKind::Const);
            env.register_disposable(d.name.name.clone(), matches!(kind, UsingKind::Await));
        }
        ExecutionResult::Normal(RuntimeValue::Undefined)
    }

    /// Runs disposal for every `using`/`await using` binding declared
    /// directly in `env`, in reverse declaration order, after `result`
    /// completed. A disposer that
    /// itself throws while an earlier error (the block's own, or an
    /// earlier disposer's) is still pending wraps as a `SuppressedError`
    /// rather than replacing it; an abrupt disposal overrides whatever
    /// completion the block itself produced, mirroring `finally`.
    fn dispose_block_env(&mut self, env: &RuntimeEnvironment, result: ExecutionResult) -> ExecutionResult {
        let disposables = env.take_disposables_reversed();
        if disposables.is_empty() {
            return result;
        }
        let mut pending_error = match &result {
            ExecutionResult::Throw(v) => Some(v.clone()),
            _ => None,
        };
        for (name, is_await) in disposables {
            let Some(value) = env.get(&name) else { continue };
            if value.is_nullish() {
                continue;
            }
            let sym = if is_await { crate::symbol::SymbolId::async_dispose() } else { crate::symbol::SymbolId::dispose() };
            let dispose_fn = match self.get_index(&value, &RuntimeValue::Symbol(sym, None)) {
                Ok(f) => f,
                Err(ExecutionResult::Throw(e)) => {
                    pending_error = Some(match pending_error {
                        Some(prev) => errors::suppressed_error(prev, e),
                        None => e,
                    });
                    continue;
                }
                Err(other) => return other,
            };
            let outcome = self.call_value(&dispose_fn, value.clone(), &[]);
            let outcome = match outcome {
                Ok(v) if is_await => self.await_value(v),
                other => other,
            };
            if let Err(ExecutionResult::Throw(e)) = outcome {
                pending_error = Some(match pending_error {
                    Some(prev) => errors::suppressed_error(prev, e),
                    None => e,
                });
            } else if let Err(other) = outcome {
                return other;
            }
        }
        match pending_error {
            Some(e) => ExecutionResult::Throw(e),
            None => result,
        }
    }

    fn exec_namespace(&mut self, env: &RuntimeEnvironment, decl: &sharpts_parser::ast::NamespaceDecl) -> ExecutionResult {
        let ns_env = env.child_function();
        hoist_statements(self, &ns_env, &decl.body);
        if let ExecutionResult::Throw(e) = exec_stmts(self, &ns_env, &decl.body) {
            return ExecutionResult::Throw(e);
        }
        let mut exports = rustc_hash::FxHashMap::default();
        for stmt in &decl.body {
            if let StmtKind::Export(ExportDecl::Declaration(inner)) = &stmt.kind {
                collect_export_names(inner, &mut exports, &ns_env);
            }
        }
        let ns = RuntimeValue::Namespace(std::sync::Arc::new(crate::value::NamespaceData {
            name: decl.name.clone(),
            exports: std::sync::Mutex::new(exports),
        }));
        env.define(decl.name.clone(), ns, BindingKind::Const);
        ExecutionResult::Normal(RuntimeValue::Undefined)
    }

    fn exec_enum(&mut self, env: &RuntimeEnvironment, decl: &sharpts_parser::ast::EnumDecl) -> ExecutionResult {
        match self.build_enum(env, decl) {
            Ok(e) => {
                env.define(decl.name.name.clone(), e, BindingKind::Const);
                ExecutionResult::Normal(RuntimeValue::Undefined)
            }
            Err(err) => err,
        }
    }

    fn exec_import(&mut self, env: &RuntimeEnvironment, decl: &sharpts_parser::ast::ImportDecl) -> ExecutionResult {
        let module = match self.loader.clone().load(&decl.module_specifier) {
            Ok(m) => m,
            Err(msg) => return ExecutionResult::Throw(errors::type_error(msg)),
        };
        if let Some(default) = &decl.default_import {
            let v = module.get(&Atom::new("default")).unwrap_or(RuntimeValue::Undefined);
            env.define(default.name.clone(), v, BindingKind::Const);
        }
        if let Some(ns) = &decl.namespace_import {
            let mut exports = rustc_hash::FxHashMap::default();
            for (k, v) in module.iter() {
                exports.insert(k.clone(), v.clone());
            }
            env.define(
                ns.name.clone(),
                RuntimeValue::Namespace(std::sync::Arc::new(crate::value::NamespaceData {
                    name: ns.name.clone(),
                    exports: std::sync::Mutex::new(exports),
                })),
                BindingKind::Const,
            );
        }
        for spec in &decl.named {
            let v = module.get(&spec.imported).unwrap_or(RuntimeValue::Undefined);
            env.define(spec.local.name.clone(), v, BindingKind::Const);
        }
        ExecutionResult::Normal(RuntimeValue::Undefined)
    }

    fn exec_export(&mut self, env: &RuntimeEnvironment, decl: &ExportDecl) -> ExecutionResult {
        match decl {
            ExportDecl::Declaration(inner) => self.exec_stmt(env, inner),
            ExportDecl::Default(expr) => match self.eval_expr(env, expr) {
                Ok(v) => {
                    env.define(Atom::new("default"), v, BindingKind::Const);
                    ExecutionResult::Normal(RuntimeValue::Undefined)
                }
                Err(e) => e,
            },
            ExportDecl::Named { .. } | ExportDecl::ReExportAll { .. } => ExecutionResult::Normal(RuntimeValue::Undefined),
        }
    }
}

fn collect_export_names(stmt: &Stmt, out: &mut rustc_hash::FxHashMap<Atom, RuntimeValue>, env: &RuntimeEnvironment) {
    match &stmt.kind {
        StmtKind::Function(f) => {
            if let Some(name) = &f.name {
                if let Some(v) = env.get(&name.name) {
                    out.insert(name.name.clone(), v);
                }
            }
        }
        StmtKind::Class(c) => {
            if let Some(name) = &c.name {
                if let Some(v) = env.get(&name.name) {
                    out.insert(name.name.clone(), v);
                }
            }
        }
        StmtKind::VarDecl { declarators, .. } => {
            for d in declarators {
                if let BindingPattern::Identifier(ident) = &d.pattern {
                    if let Some(v) = env.get(&ident.name) {
                        out.insert(ident.name.clone(), v);
                    }
                }
            }
        }
        _ => {}
    }
}

/// Pre-declares `function`/`var` bindings before a statement list runs
/// so forward references to a hoisted function work the same way
/// at runtime as they do at check time.
pub fn hoist_statements(evaluator: &mut Evaluator, env: &RuntimeEnvironment, stmts: &[Stmt]) {
    for stmt in stmts {
        if let StmtKind::Function(f) = &stmt.kind {
            if let (Some(name), Some(body)) = (&f.name, &f.body) {
                let closure = crate::value::Closure {
                    name: Some(name.name.clone()),
                    params: f.params.clone(),
                    body: crate::value::ClosureBody::Block(std::sync::Arc::new((**body).clone())),
                    env: env.clone(),
                    captured_this: None,
                    is_arrow: false,
                    is_async: f.modifiers.is_async,
                    is_generator: f.modifiers.is_generator,
                    modifiers: f.modifiers.clone(),
                };
                env.define(name.name.clone(), RuntimeValue::Function(FunctionData::user(closure)), BindingKind::Function);
            }
        }
    }
    let _ = evaluator;
}

pub fn exec_stmts(evaluator: &mut Evaluator, env: &RuntimeEnvironment, stmts: &[Stmt]) -> ExecutionResult {
    let mut last = RuntimeValue::Undefined;
    for stmt in stmts {
        match evaluator.exec_stmt(env, stmt) {
            ExecutionResult::Normal(v) => last = v,
            other => return other,
        }
    }
    ExecutionResult::Normal(last)
}
