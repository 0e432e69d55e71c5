//! The tree-walking evaluator.
//!
//! `Evaluator` is deliberately small: almost all state lives in
//! [`RuntimeEnvironment`] (the scope chain) or in the values themselves
//! (`ClassData`'s static fields, `PromiseData`'s reactions, …). The struct
//! only tracks what is genuinely per-call-stack: the current `this`, the
//! recursion depth guard, and the channel back
//! to a driving `.next()` call when this evaluator is running a generator
//! body on its own worker thread.

pub mod calls;
pub mod classes;
pub mod coroutine;
pub mod expr;
pub mod iteration;
pub mod promises;
pub mod stmt;

use std::sync::Arc;

use sharpts_common::limits::MAX_CALL_STACK_DEPTH;
use sharpts_parser::ast::Stmt;

use crate::builtins;
use crate::environment::RuntimeEnvironment;
use crate::errors;
use crate::generator::GenChannels;
use crate::loader::ModuleLoader;
use crate::promise::MicrotaskQueue;
use crate::result::ExecutionResult;
use crate::value::RuntimeValue;

/// Evaluator-wide configuration.
#[derive(Clone)]
pub struct EvalOptions {
    pub strict: bool,
    pub max_call_depth: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        EvalOptions { strict: true, max_call_depth: MAX_CALL_STACK_DEPTH }
    }
}

pub struct Evaluator {
    pub global: RuntimeEnvironment,
    pub microtasks: MicrotaskQueue,
    pub loader: Arc<dyn ModuleLoader>,
    pub options: EvalOptions,
    pub call_depth: usize,
    /// `this` binding for the call currently executing; arrow functions
    /// never change it, ordinary calls save/restore it
    /// around the call.
    pub this_value: Option<RuntimeValue>,
    /// `Some` only while this evaluator is running a (possibly async)
    /// generator body on its own worker thread (`crate::generator`).
    pub gen_channels: Option<GenChannels>,
}

impl Evaluator {
    pub fn new(loader: Arc<dyn ModuleLoader>, options: EvalOptions) -> Self {
        let global = RuntimeEnvironment::root(options.strict);
        builtins::install(&global);
        Evaluator {
            global,
            microtasks: MicrotaskQueue::new(),
            loader,
            options,
            call_depth: 0,
            this_value: None,
            gen_channels: None,
        }
    }

    /// A fresh evaluator for a generator's worker thread: shares the
    /// global environment, loader, and microtask queue (so `await` inside
    /// a generator body still drains the same queue everything else
    /// shares), but starts with its own call-stack depth budget and no
    /// inherited `this`/`gen_channels` (the caller sets `gen_channels`
    /// once the thread starts).
    pub fn fork(&self) -> Evaluator {
        Evaluator {
            global: self.global.clone(),
            microtasks: self.microtasks.clone(),
            loader: self.loader.clone(),
            options: self.options.clone(),
            call_depth: 0,
            this_value: None,
            gen_channels: None,
        }
    }

    /// Top-level module/script entry point: hoist, execute,
    /// then drain the microtask queue to empty — a task boundary.
    pub fn run_program(&mut self, program: &[Stmt]) -> Result<RuntimeValue, RuntimeValue> {
        let env = self.global.clone();
        stmt::hoist_statements(self, &env, program);
        let result = stmt::exec_stmts(self, &env, program);
        self.drain_microtasks();
        match result {
            ExecutionResult::Throw(v) => Err(v),
            ExecutionResult::Normal(v) | ExecutionResult::Return(v) => Ok(v),
            ExecutionResult::Break(_) | ExecutionResult::Continue(_) => {
                Err(errors::syntax_error("illegal break or continue at top level"))
            }
        }
    }

    /// Runs every queued reaction job until the queue is empty, draining
    /// jobs *those* jobs themselves enqueue too (FIFO resolution order).
    pub fn drain_microtasks(&mut self) {
        while let Some(job) = self.microtasks.drain_one() {
            job();
        }
    }

    pub fn enter_call(&mut self) -> Result<(), ExecutionResult> {
        if self.call_depth >= self.options.max_call_depth {
            return Err(ExecutionResult::Throw(errors::range_error("Maximum call stack size exceeded")));
        }
        self.call_depth += 1;
        Ok(())
    }

    pub fn exit_call(&mut self) {
        self.call_depth -= 1;
    }
}
