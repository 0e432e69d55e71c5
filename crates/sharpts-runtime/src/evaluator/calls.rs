//! Property access, indexing, and calling.
//!
//! This is the one place that has to know about every `RuntimeValue`
//! variant's "member surface" at once — arrays expose `length` and index
//! access, instances expose fields plus their class's method table,
//! enums expose member values, and so on. Builtin host objects
//! (`crate::builtins`) are ordinary `Object`s with `PropertySlot::value`
//! entries, so they need no special-casing here.

use std::sync::Arc;

use sharpts_common::Atom;

use crate::environment::BindingKind;
use crate::errors;
use crate::evaluator::Evaluator;
use crate::result::ExecutionResult;
use crate::value::{ClassRef, FunctionData, FunctionKind, InstanceData, PropertySlot, RuntimeValue};

type EvalResult = Result<RuntimeValue, ExecutionResult>;

fn throw(v: RuntimeValue) -> ExecutionResult {
    ExecutionResult::Throw(v)
}

impl Evaluator {
    pub fn get_property(&mut self, obj: &RuntimeValue, name: &Atom) -> EvalResult {
        match obj {
            RuntimeValue::Null | RuntimeValue::Undefined => Err(throw(errors::type_error(format!(
                "Cannot read properties of {} (reading '{name}')",
                obj.display_string()
            )))),
            RuntimeValue::String(s) => {
                if name.as_ref() == "length" {
                    return Ok(RuntimeValue::number(s.chars().count() as f64));
                }
                self.builtin_member(&RuntimeValue::string(s.to_string()), "String", name)
            }
            RuntimeValue::Array(items) => {
                if name.as_ref() == "length" {
                    return Ok(RuntimeValue::number(items.lock().expect("array lock poisoned").len() as f64));
                }
                self.builtin_member(obj, "Array", name)
            }
            RuntimeValue::Object(o) => {
                let slot = o.lock().expect("object lock poisoned").props.get(name).cloned();
                match slot {
                    Some(PropertySlot::Value { value, .. }) => Ok(value),
                    Some(PropertySlot::Accessor { get: Some(g), .. }) => self.call_value(&RuntimeValue::Function(g), obj.clone(), &[]),
                    Some(PropertySlot::Accessor { get: None, .. }) => Ok(RuntimeValue::Undefined),
                    None => Ok(RuntimeValue::Undefined),
                }
            }
            RuntimeValue::Instance(inst) => self.get_instance_member(inst, name, obj.clone()),
            RuntimeValue::Class(class) => self.get_static_member(class, name),
            RuntimeValue::Enum(e) => {
                if let Some((_, v)) = e.members.iter().find(|(n, _)| n == name) {
                    return Ok(v.clone());
                }
                Ok(RuntimeValue::Undefined)
            }
            RuntimeValue::Namespace(ns) => {
                Ok(ns.exports.lock().expect("namespace lock poisoned").get(name).cloned().unwrap_or(RuntimeValue::Undefined))
            }
            RuntimeValue::Function(f) => {
                if f.name.as_deref() == Some("Symbol") {
                    if let Some(sym) = well_known_symbol_static(name) {
                        return Ok(RuntimeValue::Symbol(sym, Some(Atom::new(format!("Symbol.{name}")))));
                    }
                }
                if name.as_ref() == "name" {
                    return Ok(RuntimeValue::string(f.name.as_ref().map(|n| n.to_string()).unwrap_or_default()));
                }
                self.builtin_member(obj, "Function", name)
            }
            RuntimeValue::Promise(_) => self.builtin_member(obj, "Promise", name),
            RuntimeValue::Map(_) | RuntimeValue::Set(_) => self.builtin_member(obj, "Map", name),
            RuntimeValue::SuppressedError(e) => match name.as_ref() {
                "name" => Ok(RuntimeValue::string("SuppressedError")),
                "message" => Ok(RuntimeValue::string("An error was suppressed during disposal")),
                "error" => Ok(e.error.clone()),
                "suppressed" => Ok(e.suppressed.clone()),
                _ => Ok(RuntimeValue::Undefined),
            },
            _ => Ok(RuntimeValue::Undefined),
        }
    }

    fn get_instance_member(&mut self, inst: &crate::value::InstanceRef, name: &Atom, this: RuntimeValue) -> EvalResult {
        {
            let data = inst.lock().expect("instance lock poisoned");
            if let Some(v) = data.fields.get(name) {
                return Ok(v.clone());
            }
        }
        let class = inst.lock().expect("instance lock poisoned").class.clone();
        if let Some(getter) = find_accessor(&class, name, true) {
            return self.call_value(&RuntimeValue::Function(getter), this, &[]);
        }
        if let Some(method) = find_method(&class, name) {
            return Ok(RuntimeValue::Function(method));
        }
        Ok(RuntimeValue::Undefined)
    }

    fn get_static_member(&mut self, class: &ClassRef, name: &Atom) -> EvalResult {
        if let Some(v) = class.static_fields.lock().expect("class lock poisoned").get(name) {
            return Ok(v.clone());
        }
        if let Some(getter) = class.static_getters.get(name).cloned() {
            return self.call_value(&RuntimeValue::Function(getter), RuntimeValue::Class(class.clone()), &[]);
        }
        if let Some(m) = class.static_methods.get(name).cloned() {
            return Ok(RuntimeValue::Function(m));
        }
        if let Some(sup) = &class.superclass {
            return self.get_static_member(sup, name);
        }
        Ok(RuntimeValue::Undefined)
    }

    pub fn set_property(&mut self, obj: &RuntimeValue, name: &Atom, value: RuntimeValue) -> Result<(), ExecutionResult> {
        match obj {
            RuntimeValue::Object(o) => {
                let mut o = o.lock().expect("object lock poisoned");
                let existing = o.props.get(name).cloned();
                match existing {
                    Some(PropertySlot::Accessor { set: Some(s), .. }) => {
                        drop(o);
                        self.call_value(&RuntimeValue::Function(s), obj.clone(), &[value])?;
                    }
                    Some(PropertySlot::Value { writable: false, .. }) => {}
                    _ => {
                        o.props.insert(name.clone(), PropertySlot::value(value));
                    }
                }
                Ok(())
            }
            RuntimeValue::Instance(inst) => {
                let class = inst.lock().expect("instance lock poisoned").class.clone();
                if let Some(setter) = find_accessor(&class, name, false) {
                    self.call_value(&RuntimeValue::Function(setter), obj.clone(), &[value])?;
                    return Ok(());
                }
                inst.lock().expect("instance lock poisoned").fields.insert(name.clone(), value);
                Ok(())
            }
            RuntimeValue::Class(class) => {
                class.static_fields.lock().expect("class lock poisoned").insert(name.clone(), value);
                Ok(())
            }
            RuntimeValue::Null | RuntimeValue::Undefined => {
                Err(throw(errors::type_error(format!("Cannot set properties of {} (setting '{name}')", obj.display_string()))))
            }
            _ => Ok(()),
        }
    }

    pub fn get_private(&mut self, obj: &RuntimeValue, name: &Atom) -> EvalResult {
        match obj {
            RuntimeValue::Instance(inst) => {
                let (field, class) = {
                    let data = inst.lock().expect("instance lock poisoned");
                    (data.private_fields.get(name).cloned(), data.class.clone())
                };
                if let Some(v) = field {
                    return Ok(v);
                }
                if let Some(method) = find_private_method(&class, name) {
                    return Ok(RuntimeValue::Function(method));
                }
                Ok(RuntimeValue::Undefined)
            }
            _ => Err(throw(errors::type_error("Cannot read private member from an object whose class did not declare it"))),
        }
    }

    pub fn set_private(&mut self, obj: &RuntimeValue, name: &Atom, value: RuntimeValue) -> Result<(), ExecutionResult> {
        match obj {
            RuntimeValue::Instance(inst) => {
                inst.lock().expect("instance lock poisoned").private_fields.insert(name.clone(), value);
                Ok(())
            }
            _ => Err(throw(errors::type_error("Cannot write private member to an object whose class did not declare it"))),
        }
    }

    pub fn get_index(&mut self, obj: &RuntimeValue, index: &RuntimeValue) -> EvalResult {
        match obj {
            RuntimeValue::Array(items) => {
                if let Some(i) = index.as_f64() {
                    let items = items.lock().expect("array lock poisoned");
                    let i = i as usize;
                    return Ok(items.get(i).cloned().unwrap_or(RuntimeValue::Undefined));
                }
                self.get_property(obj, &Atom::new(index.display_string()))
            }
            RuntimeValue::String(s) => {
                if let Some(i) = index.as_f64() {
                    return Ok(s.chars().nth(i as usize).map(|c| RuntimeValue::string(c.to_string())).unwrap_or(RuntimeValue::Undefined));
                }
                self.get_property(obj, &Atom::new(index.display_string()))
            }
            _ => {
                let key = if let RuntimeValue::Symbol(sym, _) = index {
                    return self.get_symbol_member(obj, *sym);
                } else {
                    Atom::new(index.display_string())
                };
                self.get_property(obj, &key)
            }
        }
    }

    fn get_symbol_member(&mut self, obj: &RuntimeValue, sym: crate::symbol::SymbolId) -> EvalResult {
        match obj {
            RuntimeValue::Object(o) => Ok(o.lock().expect("object lock poisoned").symbol_props.get(&sym).and_then(|s| match s {
                PropertySlot::Value { value, .. } => Some(value.clone()),
                _ => None,
            }).unwrap_or(RuntimeValue::Undefined)),
            RuntimeValue::Instance(i) => Ok(i.lock().expect("instance lock poisoned").symbol_fields.get(&sym).cloned().unwrap_or(RuntimeValue::Undefined)),
            _ => Ok(RuntimeValue::Undefined),
        }
    }

    pub fn set_index(&mut self, obj: &RuntimeValue, index: &RuntimeValue, value: RuntimeValue) -> Result<(), ExecutionResult> {
        match obj {
            RuntimeValue::Array(items) => {
                if let Some(i) = index.as_f64() {
                    let mut items = items.lock().expect("array lock poisoned");
                    let i = i as usize;
                    if i >= items.len() {
                        items.resize(i + 1, RuntimeValue::Undefined);
                    }
                    items[i] = value;
                    return Ok(());
                }
                self.set_property(obj, &Atom::new(index.display_string()), value)
            }
            _ => self.set_property(obj, &Atom::new(index.display_string()), value),
        }
    }

    /// Minimal prototype-method surface for primitives and builtin
    /// collections; the core's own non-goal list excludes a full
    /// `lib.es*.d.ts` surface, but enough is implemented
    /// here to drive the iteration protocol and the §8 test scenarios.
    fn builtin_member(&mut self, receiver: &RuntimeValue, _family: &str, name: &Atom) -> EvalResult {
        crate::builtins::prototype_method(receiver, name)
    }

    pub fn instance_of(&mut self, value: &RuntimeValue, ctor: &RuntimeValue) -> bool {
        let (RuntimeValue::Instance(inst), RuntimeValue::Class(class)) = (value, ctor) else { return false };
        let mut current = Some(inst.lock().expect("instance lock poisoned").class.clone());
        while let Some(c) = current {
            if Arc::ptr_eq(&c, class) {
                return true;
            }
            current = c.superclass.clone();
        }
        false
    }

    pub fn call_value(&mut self, callee: &RuntimeValue, this: RuntimeValue, args: &[RuntimeValue]) -> EvalResult {
        let RuntimeValue::Function(func) = callee else {
            return Err(throw(errors::type_error(format!("{} is not a function", callee.display_string()))));
        };
        self.enter_call()?;
        let result = match &func.kind {
            FunctionKind::Native(native) => {
                let native = native.clone();
                native(self, this, args)
            }
            FunctionKind::User(closure) => self.call_closure(closure, this, args),
        };
        self.exit_call();
        result
    }

    fn call_closure(&mut self, closure: &crate::value::Closure, this: RuntimeValue, args: &[RuntimeValue]) -> EvalResult {
        if closure.is_generator {
            return Ok(self.start_generator(closure, this, args));
        }
        if closure.is_async {
            return Ok(self.start_async_call(closure, this, args));
        }
        let env = closure.env.child_function();
        self.bind_params(&env, &closure.params, args)?;
        let saved_this = self.this_value.take();
        self.this_value = if closure.is_arrow { closure.captured_this.clone() } else { Some(this) };
        let body_stmt = match &closure.body {
            crate::value::ClosureBody::Block(s) => s.clone(),
            #[allow(unreachable_patterns)]
            _ => unreachable!(),
        };
        let outcome = self.exec_function_body(&env, &body_stmt);
        self.this_value = saved_this;
        match outcome {
            ExecutionResult::Normal(_) => Ok(RuntimeValue::Undefined),
            ExecutionResult::Return(v) => Ok(v),
            ExecutionResult::Throw(v) => Err(throw(v)),
            ExecutionResult::Break(_) | ExecutionResult::Continue(_) => {
                Err(throw(errors::syntax_error("illegal break or continue")))
            }
        }
    }

    pub fn bind_params(
        &mut self,
        env: &crate::environment::RuntimeEnvironment,
        params: &[sharpts_parser::ast::Param],
        args: &[RuntimeValue],
    ) -> Result<(), ExecutionResult> {
        let mut i = 0;
        for p in params {
            if p.rest {
                let rest: Vec<RuntimeValue> = args.get(i..).map(|s| s.to_vec()).unwrap_or_default();
                self.bind_pattern(env, &p.pattern, RuntimeValue::array(rest), BindingKind::Param)?;
                break;
            }
            let mut v = args.get(i).cloned().unwrap_or(RuntimeValue::Undefined);
            if matches!(v, RuntimeValue::Undefined) {
                if let Some(default) = &p.default {
                    v = self.eval_expr(env, default)?;
                }
            }
            self.bind_pattern(env, &p.pattern, v, BindingKind::Param)?;
            i += 1;
        }
        Ok(())
    }

    pub fn construct(&mut self, ctor: &RuntimeValue, args: &[RuntimeValue]) -> EvalResult {
        if let RuntimeValue::Object(o) = ctor {
            let native_name = o.lock().expect("object lock poisoned").props.get(&Atom::new("__sharpts_native_ctor")).and_then(|s| match s {
                PropertySlot::Value { value, .. } => Some(value.display_string()),
                _ => None,
            });
            if let Some(name) = native_name {
                return crate::builtins::construct_native(self, &name, args);
            }
        }
        let RuntimeValue::Class(class) = ctor else {
            return Err(throw(errors::type_error(format!("{} is not a constructor", ctor.display_string()))));
        };
        if class.is_abstract {
            return Err(throw(errors::type_error(format!("Cannot create an instance of an abstract class {}", class.name))));
        }
        let instance = Arc::new(std::sync::Mutex::new(InstanceData {
            class: class.clone(),
            fields: Default::default(),
            symbol_fields: Default::default(),
            private_fields: Default::default(),
        }));
        let this = RuntimeValue::Instance(instance);
        self.init_instance_fields(class, &this)?;
        if let Some(ctor_fn) = &class.constructor {
            self.call_constructor(ctor_fn, &this, args)?;
        } else if let Some(sup) = &class.superclass {
            self.run_superclass_default_ctor(sup, &this, args)?;
        }
        Ok(this)
    }

    fn run_superclass_default_ctor(&mut self, sup: &ClassRef, this: &RuntimeValue, args: &[RuntimeValue]) -> Result<(), ExecutionResult> {
        self.init_instance_fields(sup, this)?;
        if let Some(ctor_fn) = &sup.constructor {
            self.call_constructor(ctor_fn, this, args)?;
        } else if let Some(next) = &sup.superclass {
            self.run_superclass_default_ctor(next, this, args)?;
        }
        Ok(())
    }

    pub fn call_super_constructor(
        &mut self,
        env: &crate::environment::RuntimeEnvironment,
        args: &[RuntimeValue],
    ) -> EvalResult {
        let this = self.this_value.clone().unwrap_or(RuntimeValue::Undefined);
        let RuntimeValue::Instance(inst) = &this else {
            return Err(throw(errors::syntax_error("'super' keyword is only valid inside a class constructor")));
        };
        let class = inst.lock().expect("instance lock poisoned").class.clone();
        let Some(sup) = &class.superclass else {
            return Err(throw(errors::syntax_error("'super' called outside a derived class constructor")));
        };
        let _ = env;
        self.init_instance_fields(sup, &this)?;
        if let Some(ctor_fn) = &sup.constructor {
            self.call_constructor(ctor_fn, &this, args)?;
        } else if let Some(next) = &sup.superclass {
            self.run_superclass_default_ctor(next, &this, args)?;
        }
        Ok(RuntimeValue::Undefined)
    }

    pub fn super_method(&mut self, _env: &crate::environment::RuntimeEnvironment, name: &Atom) -> EvalResult {
        let this = self.this_value.clone().unwrap_or(RuntimeValue::Undefined);
        let RuntimeValue::Instance(inst) = &this else {
            return Err(throw(errors::syntax_error("'super' keyword unexpected here")));
        };
        let class = inst.lock().expect("instance lock poisoned").class.clone();
        let Some(sup) = &class.superclass else {
            return Err(throw(errors::syntax_error("'super' keyword unexpected here")));
        };
        if let Some(m) = find_method(sup, name) {
            return Ok(RuntimeValue::Function(m));
        }
        Ok(RuntimeValue::Undefined)
    }
}

fn find_method(class: &ClassRef, name: &Atom) -> Option<crate::value::FunctionRef> {
    class.methods.get(name).cloned().or_else(|| class.superclass.as_ref().and_then(|s| find_method(s, name)))
}

fn find_accessor(class: &ClassRef, name: &Atom, getter: bool) -> Option<crate::value::FunctionRef> {
    let table = if getter { &class.getters } else { &class.setters };
    table.get(name).cloned().or_else(|| class.superclass.as_ref().and_then(|s| find_accessor(s, name, getter)))
}

fn find_private_method(class: &ClassRef, name: &Atom) -> Option<crate::value::FunctionRef> {
    class.private_methods.get(name).cloned().or_else(|| class.superclass.as_ref().and_then(|s| find_private_method(s, name)))
}

fn well_known_symbol_static(name: &Atom) -> Option<crate::symbol::SymbolId> {
    match name.as_ref() {
        "iterator" => Some(crate::symbol::SymbolId::iterator()),
        "asyncIterator" => Some(crate::symbol::SymbolId::async_iterator()),
        "dispose" => Some(crate::symbol::SymbolId::dispose()),
        "asyncDispose" => Some(crate::symbol::SymbolId::async_dispose()),
        _ => None,
    }
}

pub fn new_function(name: &str, f: impl Fn(&mut Evaluator, RuntimeValue, &[RuntimeValue]) -> EvalResult + Send + Sync + 'static) -> RuntimeValue {
    RuntimeValue::Function(FunctionData::native(name, Arc::new(f)))
}
