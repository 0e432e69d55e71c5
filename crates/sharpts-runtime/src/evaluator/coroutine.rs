//! `await`, `yield`, and the thread handoff that backs generators and
//! async generators.
//!
//! `await` never needs a worker thread: there is no real external I/O in
//! this core, so every `Promise` settles through code
//! reachable synchronously or through the microtask queue. Evaluating
//! `await p` therefore just means "drain microtasks until `p` settles,
//! then unwrap it" — the calling Rust stack frame never actually
//! suspends. A (possibly async) generator body, by contrast, must be able
//! to suspend *mid-expression* at an arbitrary nesting depth and later
//! resume exactly there, which a recursive-descent interpreter can only
//! do by handing the whole call off to another OS thread
//! (`crate::generator`).

use std::sync::Arc;

use crate::environment::RuntimeEnvironment;
use crate::errors;
use crate::evaluator::{EvalOptions, Evaluator};
use crate::generator::{AsyncGeneratorHandle, GenChannels, GeneratorHandle, IteratorStep, ResumeMsg, YieldMsg};
use crate::promise::{PromiseData, SettledState};
use crate::result::ExecutionResult;
use crate::value::{Closure, RuntimeValue};

type EvalResult = Result<RuntimeValue, ExecutionResult>;

fn throw(v: RuntimeValue) -> ExecutionResult {
    ExecutionResult::Throw(v)
}

impl Evaluator {
    /// `await`: a non-promise value resolves to itself
    /// immediately (wrapped through `Promise.resolve` semantics); a
    /// pending promise blocks this call by repeatedly draining one
    /// microtask at a time until it settles.
    pub fn await_value(&mut self, value: RuntimeValue) -> EvalResult {
        let promise = match value {
            RuntimeValue::Promise(p) => p,
            other => return Ok(other),
        };
        loop {
            if let Some(state) = promise.settled_state() {
                return match state {
                    SettledState::Fulfilled(v) => Ok(v),
                    SettledState::Rejected(e) => Err(throw(e)),
                };
            }
            match self.microtasks.drain_one() {
                Some(job) => job(),
                // A pending promise with an empty queue and nothing left to
                // settle it can only happen for a promise nothing ever
                // resolves; mirrors a `setTimeout`-backed promise outliving
                // the program, which the core has no host timer to drive.
                None => return Ok(RuntimeValue::Undefined),
            }
        }
    }

    pub fn do_yield(&mut self, value: RuntimeValue) -> EvalResult {
        let Some(channels) = &self.gen_channels else {
            unreachable!("checker rejects yield outside a generator body");
        };
        channels.to_driver.send(YieldMsg::Yielded(value)).expect("generator channel closed");
        match channels.from_driver.recv().expect("generator channel closed") {
            ResumeMsg::Next(v) => Ok(v),
            ResumeMsg::Return(v) => Err(ExecutionResult::Return(v)),
            ResumeMsg::Throw(v) => Err(throw(v)),
        }
    }

    /// `yield*` delegates every `.next()`/`.return()`/`.throw()` call to
    /// the inner iterable and yields its results verbatim until it is
    /// done, per the delegation algorithm.
    pub fn yield_star(&mut self, _env: &RuntimeEnvironment, iterable: RuntimeValue) -> EvalResult {
        let mut iter = self.get_iterator(&iterable)?;
        let mut sent = RuntimeValue::Undefined;
        loop {
            let step = self.iterator_next(&mut iter, sent.clone())?;
            if step.done {
                return Ok(step.value);
            }
            match self.do_yield(step.value) {
                Ok(v) => sent = v,
                Err(abrupt) => return Err(abrupt),
            }
        }
    }

    pub fn start_generator(&mut self, closure: &Closure, this: RuntimeValue, args: &[RuntimeValue]) -> RuntimeValue {
        let closure = clone_closure(closure);
        let outer = self.fork();
        let args = args.to_vec();
        let handle = GeneratorHandle::spawn(move |channels: GenChannels| {
            run_generator_body(outer, closure, this, args, channels, false);
        });
        RuntimeValue::Generator(Arc::new(handle))
    }

    pub fn start_async_generator(&mut self, closure: &Closure, this: RuntimeValue, args: &[RuntimeValue]) -> RuntimeValue {
        let closure = clone_closure(closure);
        let outer = self.fork();
        let args = args.to_vec();
        let handle = AsyncGeneratorHandle::spawn(move |channels: GenChannels| {
            run_generator_body(outer, closure, this, args, channels, true);
        });
        RuntimeValue::AsyncGenerator(Arc::new(handle))
    }

    /// A plain `async function` runs synchronously up to its first
    /// `await` of an unsettled promise, exactly like every engine's
    /// microtask-based implementation; because `await_value` above drains
    /// microtasks inline rather than truly suspending, the whole call body
    /// can run to completion on the *caller's* thread — the wrapper just
    /// has to turn a thrown completion into a rejected promise instead of
    /// propagating it.
    pub fn start_async_call(&mut self, closure: &Closure, this: RuntimeValue, args: &[RuntimeValue]) -> RuntimeValue {
        let env = closure.env.child_function();
        if let Err(e) = self.bind_params(&env, &closure.params, args) {
            return reject_from(e);
        }
        let saved_this = self.this_value.take();
        self.this_value = if closure.is_arrow { closure.captured_this.clone() } else { Some(this) };
        let crate::value::ClosureBody::Block(body) = &closure.body;
        let outcome = self.exec_function_body(&env, body);
        self.this_value = saved_this;
        // Routed through `resolve_promise`/`reject_promise` rather than
        // `PromiseData::pending_resolved` so `return somePromise` flattens
        // instead of double-wrapping (`evaluator::promises`).
        let promise = self.new_promise();
        match outcome {
            ExecutionResult::Normal(_) => self.resolve_promise(&promise, RuntimeValue::Undefined),
            ExecutionResult::Return(v) => self.resolve_promise(&promise, v),
            ExecutionResult::Throw(v) => self.reject_promise(&promise, v),
            ExecutionResult::Break(_) | ExecutionResult::Continue(_) => {
                self.reject_promise(&promise, errors::syntax_error("illegal break or continue"))
            }
        }
        RuntimeValue::Promise(promise)
    }
}

fn reject_from(e: ExecutionResult) -> RuntimeValue {
    match e {
        ExecutionResult::Throw(v) => RuntimeValue::Promise(PromiseData::pending_rejected(v)),
        _ => RuntimeValue::Promise(PromiseData::pending_rejected(errors::type_error("unreachable abrupt completion"))),
    }
}

fn clone_closure(c: &Closure) -> Closure {
    Closure {
        name: c.name.clone(),
        params: c.params.clone(),
        body: c.body.clone(),
        env: c.env.clone(),
        captured_this: c.captured_this.clone(),
        is_arrow: c.is_arrow,
        is_async: c.is_async,
        is_generator: c.is_generator,
        modifiers: c.modifiers.clone(),
    }
}

/// Runs on the generator's dedicated worker thread. Blocks immediately on
/// the first resume message (a generator object allocates without running
/// any body statements) then executes the body with `gen_channels` set so
/// `yield` can reach back across the rendezvous.
fn run_generator_body(
    outer: Evaluator,
    closure: Closure,
    this: RuntimeValue,
    args: Vec<RuntimeValue>,
    channels: GenChannels,
    is_async: bool,
) {
    let first = match channels.from_driver.recv() {
        Ok(ResumeMsg::Next(_)) => {}
        Ok(ResumeMsg::Return(v)) => {
            let _ = channels.to_driver.send(YieldMsg::Done(v));
            return;
        }
        Ok(ResumeMsg::Throw(v)) => {
            let _ = channels.to_driver.send(YieldMsg::Threw(v));
            return;
        }
        Err(_) => return,
    };
    let _ = first;
    let mut evaluator = outer;
    evaluator.gen_channels = Some(channels);
    let _ = is_async;
    let env = closure.env.child_function();
    if let Err(e) = evaluator.bind_params(&env, &closure.params, &args) {
        finish_with(&evaluator, e);
        return;
    }
    evaluator.this_value = Some(this);
    let crate::value::ClosureBody::Block(body) = &closure.body;
    let outcome = evaluator.exec_function_body(&env, body);
    finish_with(&evaluator, outcome);
}

fn finish_with(evaluator: &Evaluator, outcome: ExecutionResult) {
    let Some(channels) = &evaluator.gen_channels else { return };
    let msg = match outcome {
        ExecutionResult::Normal(v) | ExecutionResult::Return(v) => YieldMsg::Done(v),
        ExecutionResult::Throw(v) => YieldMsg::Threw(v),
        ExecutionResult::Break(_) | ExecutionResult::Continue(_) => {
            YieldMsg::Threw(errors::syntax_error("illegal break or continue"))
        }
    };
    let _ = channels.to_driver.send(msg);
}

/// Drives a `GeneratorHandle`/`AsyncGeneratorHandle` one step and turns the
/// raw channel reply into the `{ value, done }` shape user code observes.
pub fn step_to_iterator_result(step: IteratorStep) -> RuntimeValue {
    match step {
        IteratorStep::Yielded(v) => {
            RuntimeValue::IteratorResult(Box::new(v), crate::value::IteratorResultData { done: false })
        }
        IteratorStep::Done(v) => RuntimeValue::IteratorResult(Box::new(v), crate::value::IteratorResultData { done: true }),
        IteratorStep::Threw(_) => RuntimeValue::IteratorResult(Box::new(RuntimeValue::Undefined), crate::value::IteratorResultData { done: true }),
    }
}

pub fn step_result_or_throw(step: IteratorStep) -> EvalResult {
    match step {
        IteratorStep::Threw(e) => Err(throw(e)),
        other => Ok(step_to_iterator_result(other)),
    }
}

pub fn make_eval_options_default() -> EvalOptions {
    EvalOptions::default()
}
