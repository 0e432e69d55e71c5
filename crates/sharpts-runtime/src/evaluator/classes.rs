//! Class and enum declaration evaluation — turns a `ClassDecl`/`EnumDecl`
//! AST node into the boxed `ClassData`/`EnumData` shapes `crate::value`
//! defines, and runs field initializers in declared order for a freshly
//! allocated instance.
//!
//! Mirrors the checker's two-pass shape builders in `sharpts-checker`'s
//! `hoist.rs` (`class_decl_shape`, `enum_decl_shape`), but builds real
//! `RuntimeValue`s instead of compile-time member signatures.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use sharpts_common::Atom;
use sharpts_parser::ast::{ClassDecl, ClassMember, EnumDecl, FunctionDecl, ParamModifier};

use crate::environment::{BindingKind, RuntimeEnvironment};
use crate::errors;
use crate::evaluator::expr::PKey;
use crate::evaluator::Evaluator;
use crate::result::ExecutionResult;
use crate::value::{
    ClassData, ClassRef, Closure, ClosureBody, EnumData, EnumKind, FieldInit, FunctionData, FunctionKind,
    FunctionRef, InstanceData, RuntimeValue,
};

type EvalResult = Result<RuntimeValue, ExecutionResult>;

fn throw(v: RuntimeValue) -> ExecutionResult {
    ExecutionResult::Throw(v)
}

impl Evaluator {
    pub fn eval_class_decl(&mut self, env: &RuntimeEnvironment, decl: &ClassDecl) -> EvalResult {
        let superclass = match &decl.superclass {
            Some(expr) => match self.eval_expr(env, expr)? {
                RuntimeValue::Class(c) => Some(c),
                other => {
                    return Err(throw(errors::type_error(format!("{} is not a class", other.display_string()))));
                }
            },
            None => None,
        };

        let class_env = env.child_block();
        let class_name = decl.name.as_ref().map(|n| n.name.clone()).unwrap_or_else(|| Atom::new("<anonymous class>"));

        let mut constructor = None;
        let mut methods = FxHashMap::default();
        let mut private_methods = FxHashMap::default();
        let mut getters = FxHashMap::default();
        let mut setters = FxHashMap::default();
        let mut static_methods = FxHashMap::default();
        let mut static_getters = FxHashMap::default();
        let mut static_setters = FxHashMap::default();
        let mut static_fields = FxHashMap::default();
        let mut symbol_methods = FxHashMap::default();
        let mut field_inits = Vec::new();
        let mut static_field_inits: Vec<FieldInit> = Vec::new();
        let mut static_blocks = Vec::new();

        for member in &decl.members {
            match member {
                ClassMember::Constructor(f) => {
                    constructor = Some(self.make_method_closure(&class_env, f));
                }
                ClassMember::Method(m) => {
                    let closure = self.make_method_closure(&class_env, &m.function);
                    if m.is_private_name {
                        let name = self.property_key_name(&class_env, &m.name)?;
                        private_methods.insert(name, closure);
                        continue;
                    }
                    match self.property_key(&class_env, &m.name)? {
                        PKey::Name(name) => {
                            if m.function.modifiers.is_static {
                                static_methods.insert(name, closure);
                            } else {
                                methods.insert(name, closure);
                            }
                        }
                        PKey::Symbol(sym) => {
                            symbol_methods.insert(sym, closure);
                        }
                    }
                }
                ClassMember::Accessor(a) => {
                    let name = self.property_key_name(&class_env, &a.name)?;
                    let closure = self.make_accessor_closure(&class_env, a);
                    let is_static = a.modifiers.is_static;
                    match a.kind {
                        sharpts_parser::ast::AccessorKind::Get => {
                            if is_static {
                                static_getters.insert(name, closure);
                            } else {
                                getters.insert(name, closure);
                            }
                        }
                        sharpts_parser::ast::AccessorKind::Set => {
                            if is_static {
                                static_setters.insert(name, closure);
                            } else {
                                setters.insert(name, closure);
                            }
                        }
                    }
                }
                ClassMember::AutoAccessor(a) => {
                    let name = self.property_key_name(&class_env, &a.name)?;
                    let backing = Atom::new(format!("#{name}__accessor"));
                    let init = FieldInit { name: backing.clone(), is_private: true, initializer: a.initializer.clone().map(Arc::new) };
                    if a.modifiers.is_static {
                        static_field_inits.push(init);
                    } else {
                        field_inits.push(init);
                    }
                    let (getter, setter) = make_auto_accessor_pair(backing);
                    if a.modifiers.is_static {
                        static_getters.insert(name.clone(), getter);
                        static_setters.insert(name, setter);
                    } else {
                        getters.insert(name.clone(), getter);
                        setters.insert(name, setter);
                    }
                }
                ClassMember::Field(f) => {
                    let name = self.property_key_name(&class_env, &f.name)?;
                    let init = FieldInit { name, is_private: f.is_private_name, initializer: f.initializer.clone().map(Arc::new) };
                    if f.modifiers.is_static {
                        static_field_inits.push(init);
                    } else {
                        field_inits.push(init);
                    }
                }
                ClassMember::StaticBlock(stmt) => static_blocks.push(stmt.clone()),
            }
        }

        let class = Arc::new(ClassData {
            name: class_name.clone(),
            env: class_env.clone(),
            constructor,
            methods,
            private_methods,
            getters,
            setters,
            static_methods,
            static_getters,
            static_setters,
            static_fields: std::sync::Mutex::new(FxHashMap::default()),
            field_inits,
            superclass,
            is_abstract: decl.is_abstract,
            symbol_methods,
        });

        if let Some(name) = &decl.name {
            class_env.define(name.name.clone(), RuntimeValue::Class(class.clone()), BindingKind::Class);
        }

        for init in &static_field_inits {
            let value = match &init.initializer {
                Some(expr) => {
                    let saved = self.this_value.take();
                    self.this_value = Some(RuntimeValue::Class(class.clone()));
                    let v = self.eval_expr(&class_env, expr);
                    self.this_value = saved;
                    v?
                }
                None => RuntimeValue::Undefined,
            };
            class.static_fields.lock().expect("class lock poisoned").insert(init.name.clone(), value);
        }

        for stmt in &static_blocks {
            let saved = self.this_value.take();
            self.this_value = Some(RuntimeValue::Class(class.clone()));
            let block_env = class_env.child_block();
            let outcome = self.exec_stmt(&block_env, stmt);
            self.this_value = saved;
            if let ExecutionResult::Throw(v) = outcome {
                return Err(throw(v));
            }
        }

        Ok(RuntimeValue::Class(class))
    }

    /// Runs one class's own field initializers (instance fields plus,
    /// implicitly via auto-accessors, their hidden backing fields) against
    /// a freshly allocated instance, and binds its symbol-keyed methods
    /// onto the instance — called once per class in the chain, at the
    /// point `calls::construct`/`call_super_constructor` reach it.
    pub fn init_instance_fields(&mut self, class: &ClassRef, this: &RuntimeValue) -> Result<(), ExecutionResult> {
        let RuntimeValue::Instance(inst) = this else {
            return Err(throw(errors::type_error("cannot initialize fields on a non-instance value")));
        };
        for (sym, func) in &class.symbol_methods {
            inst.lock().expect("instance lock poisoned").symbol_fields.insert(*sym, RuntimeValue::Function(func.clone()));
        }
        for init in &class.field_inits {
            let value = match &init.initializer {
                Some(expr) => {
                    let saved = self.this_value.take();
                    self.this_value = Some(this.clone());
                    let v = self.eval_expr(&class.env, expr);
                    self.this_value = saved;
                    v?
                }
                None => RuntimeValue::Undefined,
            };
            let mut data = inst.lock().expect("instance lock poisoned");
            if init.is_private {
                data.private_fields.insert(init.name.clone(), value);
            } else {
                data.fields.insert(init.name.clone(), value);
            }
        }
        Ok(())
    }

    /// Binds constructor parameter properties (`constructor(public x: T)`)
    /// onto `this` after ordinary parameter binding — the one constructor
    /// call path that plain `call_closure` cannot express, since it needs
    /// both the closure's declared `Param`s and the instance being built.
    pub fn call_constructor(&mut self, ctor: &FunctionRef, this: &RuntimeValue, args: &[RuntimeValue]) -> Result<(), ExecutionResult> {
        let FunctionKind::User(closure) = &ctor.kind else { return Ok(()) };
        let env = closure.env.child_function();
        self.bind_params(&env, &closure.params, args)?;
        for p in &closure.params {
            if p.modifier == ParamModifier::None {
                continue;
            }
            if let sharpts_parser::ast::BindingPattern::Identifier(ident) = &p.pattern {
                if let Some(v) = env.get(&ident.name) {
                    self.set_property(this, &ident.name, v)?;
                }
            }
        }
        let saved_this = self.this_value.take();
        self.this_value = Some(this.clone());
        let ClosureBody::Block(body) = &closure.body;
        let outcome = self.exec_function_body(&env, body);
        self.this_value = saved_this;
        match outcome {
            ExecutionResult::Normal(_) | ExecutionResult::Return(_) => Ok(()),
            ExecutionResult::Throw(v) => Err(throw(v)),
            ExecutionResult::Break(_) | ExecutionResult::Continue(_) => {
                Err(throw(errors::syntax_error("illegal break or continue")))
            }
        }
    }

    fn make_method_closure(&mut self, env: &RuntimeEnvironment, f: &FunctionDecl) -> FunctionRef {
        let body = match &f.body {
            Some(b) => ClosureBody::Block(Arc::new((**b).clone())),
            None => ClosureBody::Block(Arc::new(sharpts_parser::ast::Stmt {
                span: Default::default(),
                kind: sharpts_parser::ast::StmtKind::Block(Vec::new()),
            })),
        };
        let closure = Closure {
            name: f.name.as_ref().map(|n| n.name.clone()),
            params: f.params.clone(),
            body,
            env: env.clone(),
            captured_this: None,
            is_arrow: false,
            is_async: f.modifiers.is_async,
            is_generator: f.modifiers.is_generator,
            modifiers: f.modifiers.clone(),
        };
        FunctionData::user(closure)
    }

    fn make_accessor_closure(&mut self, env: &RuntimeEnvironment, a: &sharpts_parser::ast::AccessorDecl) -> FunctionRef {
        let closure = Closure {
            name: None,
            params: a.params.clone(),
            body: ClosureBody::Block(Arc::new((*a.body).clone())),
            env: env.clone(),
            captured_this: None,
            is_arrow: false,
            is_async: false,
            is_generator: false,
            modifiers: a.modifiers.clone(),
        };
        FunctionData::user(closure)
    }

    /// Builds a runtime `EnumData` the way the checker's `enum_decl_shape`
    /// builds its compile-time member signatures: numeric members
    /// auto-increment from the previous member (or `0` for the first),
    /// string members must be explicitly initialized, and a `const enum`
    /// restricts initializers to literals and simple arithmetic over
    /// earlier members.
    pub fn build_enum(&mut self, env: &RuntimeEnvironment, decl: &EnumDecl) -> EvalResult {
        let mut members = Vec::new();
        let mut by_name: FxHashMap<Atom, RuntimeValue> = FxHashMap::default();
        let mut next_numeric = 0.0_f64;
        let mut seen_string = false;
        let mut seen_numeric = false;

        for member in &decl.members {
            let value = match &member.initializer {
                Some(expr) => {
                    if decl.is_const {
                        self.const_eval_enum_initializer(expr, &by_name)?
                    } else {
                        self.eval_expr(env, expr)?
                    }
                }
                None => RuntimeValue::number(next_numeric),
            };
            match &value {
                RuntimeValue::Number(bits) => {
                    seen_numeric = true;
                    next_numeric = f64::from_bits(*bits) + 1.0;
                }
                RuntimeValue::String(_) => seen_string = true,
                _ => {}
            }
            members.push((member.name.clone(), value.clone()));
            by_name.insert(member.name.clone(), value);
        }

        let kind = match (seen_string, seen_numeric) {
            (true, true) => EnumKind::Heterogeneous,
            (true, false) => EnumKind::String,
            _ => EnumKind::Numeric,
        };

        let reverse = if !decl.is_const && kind == EnumKind::Numeric {
            let mut map = FxHashMap::default();
            for (name, value) in &members {
                if let RuntimeValue::Number(bits) = value {
                    map.insert(*bits, name.clone());
                }
            }
            Some(map)
        } else {
            None
        };

        let data = EnumData { name: decl.name.name.clone(), kind, members, reverse, is_const: decl.is_const };
        Ok(RuntimeValue::Enum(Arc::new(data)))
    }

    /// Restricted constant-expression evaluator for `const enum` member
    /// initializers: literals, unary negation, and the arithmetic/bitwise
    /// operators over two already-evaluated numeric members — mirrors
    /// `Checker::const_eval_enum_initializer` at the value level instead of
    /// the type level.
    fn const_eval_enum_initializer(
        &mut self,
        expr: &sharpts_parser::ast::Expr,
        by_name: &FxHashMap<Atom, RuntimeValue>,
    ) -> EvalResult {
        use sharpts_parser::ast::{ExprKind, Literal};
        match &expr.kind {
            ExprKind::Literal(Literal::Number(n)) => Ok(RuntimeValue::number(*n)),
            ExprKind::Literal(Literal::Str(s)) => Ok(RuntimeValue::string(s.clone())),
            ExprKind::Variable(ident) => by_name
                .get(&ident.name)
                .cloned()
                .ok_or_else(|| throw(errors::type_error(format!("'{}' is not a constant enum member", ident.name)))),
            ExprKind::Unary { op, operand } if *op == sharpts_parser::ast::UnaryOp::Neg => {
                let v = self.const_eval_enum_initializer(operand, by_name)?;
                Ok(RuntimeValue::number(-v.as_f64().unwrap_or(f64::NAN)))
            }
            ExprKind::Binary { op, left, right } => {
                let l = self.const_eval_enum_initializer(left, by_name)?.as_f64().unwrap_or(f64::NAN);
                let r = self.const_eval_enum_initializer(right, by_name)?.as_f64().unwrap_or(f64::NAN);
                use sharpts_parser::ast::BinaryOp;
                let result = match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => l / r,
                    BinaryOp::Shl => (((l as i64) << (r as i64 & 31)) as i32) as f64,
                    BinaryOp::Shr => (((l as i64) >> (r as i64 & 31)) as i32) as f64,
                    BinaryOp::BitOr => (((l as i64) | (r as i64)) as i32) as f64,
                    BinaryOp::BitAnd => (((l as i64) & (r as i64)) as i32) as f64,
                    BinaryOp::BitXor => (((l as i64) ^ (r as i64)) as i32) as f64,
                    _ => return Err(throw(errors::type_error("unsupported const enum expression"))),
                };
                Ok(RuntimeValue::number(result))
            }
            _ => Err(throw(errors::type_error("const enum member initializers must be constant expressions"))),
        }
    }
}

fn make_auto_accessor_pair(backing: Atom) -> (FunctionRef, FunctionRef) {
    let get_backing = backing.clone();
    let getter = FunctionData::native("get", move |evaluator, this, _args| evaluator.get_private(&this, &get_backing));
    let setter = FunctionData::native("set", move |evaluator, this, args| {
        let value = args.first().cloned().unwrap_or(RuntimeValue::Undefined);
        evaluator.set_private(&this, &backing, value)?;
        Ok(RuntimeValue::Undefined)
    });
    (getter, setter)
}
