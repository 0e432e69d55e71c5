//! `Promise` settlement, `.then` reaction scheduling, and nested-thenable
//! flattening.
//!
//! `promise.rs` owns state and the reaction queue; this module is the one
//! place with enough context (a live `Evaluator`, able to invoke a
//! `FunctionRef`) to drive the actual algorithm: resolving a promise with
//! another promise chains onto it rather than fulfilling immediately, and
//! every reaction always runs as a fresh microtask job, never inline.

use std::sync::Arc;

use crate::evaluator::Evaluator;
use crate::promise::{MicrotaskQueue, PromiseData, Reaction, SettledState};
use crate::result::ExecutionResult;
use crate::value::{FunctionRef, RuntimeValue};

type EvalResult = Result<RuntimeValue, ExecutionResult>;

impl Evaluator {
    pub fn new_promise(&self) -> Arc<PromiseData> {
        PromiseData::pending()
    }

    /// `resolve(value)` on a promise's resolving function. A `value` that
    /// is itself a `Promise` is never double-wrapped — settlement instead
    /// chains onto it, flattening recursively if that promise in turn
    /// settles with another promise. Resolving a promise with itself is a
    /// `TypeError` rather than an infinite chain.
    pub fn resolve_promise(&mut self, promise: &Arc<PromiseData>, value: RuntimeValue) {
        if let RuntimeValue::Promise(inner) = &value {
            if Arc::ptr_eq(inner, promise) {
                self.reject_promise(promise, errors_chaining_cycle());
                return;
            }
            let inner = inner.clone();
            let target = promise.clone();
            let microtasks = self.microtasks.clone();
            let mut forked = self.fork();
            microtasks.enqueue(move || {
                chain(&mut forked, &inner, &target);
            });
            return;
        }
        if !promise.is_settled() {
            promise.settle(SettledState::Fulfilled(value));
        }
        self.drain_reactions(promise);
    }

    pub fn reject_promise(&mut self, promise: &Arc<PromiseData>, error: RuntimeValue) {
        if !promise.is_settled() {
            promise.settle(SettledState::Rejected(error));
        }
        self.drain_reactions(promise);
    }

    /// Runs every reaction currently registered on `promise` (already
    /// settled) as its own microtask job, then clears them — a promise
    /// that settles twice (impossible through `resolve_promise`/
    /// `reject_promise` themselves, but reachable if a reaction attaches
    /// after settlement) only ever drains its reactions once per attach.
    fn drain_reactions(&mut self, promise: &Arc<PromiseData>) {
        let Some(state) = promise.settled_state() else { return };
        for reaction in promise.take_reactions() {
            enqueue_reaction(&self.microtasks, self.fork(), reaction, state.clone());
        }
    }

    /// `promise.then(onFulfilled, onRejected)`: always returns a new,
    /// derived promise. If `promise` is already settled the reaction still
    /// defers to a fresh microtask (per-spec: reactions never run
    /// synchronously); if still pending it is simply queued.
    pub fn then(
        &mut self,
        promise: &Arc<PromiseData>,
        on_fulfilled: Option<FunctionRef>,
        on_rejected: Option<FunctionRef>,
    ) -> Arc<PromiseData> {
        let derived = PromiseData::pending();
        let reaction = Reaction { on_fulfilled, on_rejected, derived: derived.clone() };
        match promise.settled_state() {
            Some(state) => enqueue_reaction(&self.microtasks, self.fork(), reaction, state),
            None => promise.add_reaction(reaction),
        }
        derived
    }
}

/// Chains `target`'s settlement onto `source`: waits (via a reaction) for
/// `source` to settle, then resolves/rejects `target` with the same
/// outcome — recursing through `resolve_promise` so a `source` that
/// itself settles with a promise keeps flattening.
fn chain(evaluator: &mut Evaluator, source: &Arc<PromiseData>, target: &Arc<PromiseData>) {
    match source.settled_state() {
        Some(SettledState::Fulfilled(v)) => evaluator.resolve_promise(target, v),
        Some(SettledState::Rejected(e)) => evaluator.reject_promise(target, e),
        None => {
            let target = target.clone();
            source.add_reaction(Reaction {
                on_fulfilled: None,
                on_rejected: None,
                derived: target,
            });
        }
    }
}

/// Runs one reaction's callback (if any) against the settled state and
/// resolves/rejects its derived promise with the result — a reaction with
/// no matching callback simply passes the outcome through, which is how
/// `.then(undefined, onRejected)` and the internal flattening `chain`
/// reaction above (which carries no callbacks at all) both work.
fn run_reaction(evaluator: &mut Evaluator, reaction: Reaction, state: SettledState) {
    let outcome = match (&state, reaction.on_fulfilled, reaction.on_rejected) {
        (SettledState::Fulfilled(v), Some(cb), _) => evaluator.call_value(&RuntimeValue::Function(cb), RuntimeValue::Undefined, &[v.clone()]),
        (SettledState::Fulfilled(v), None, _) => Ok(v.clone()),
        (SettledState::Rejected(e), _, Some(cb)) => evaluator.call_value(&RuntimeValue::Function(cb), RuntimeValue::Undefined, &[e.clone()]),
        (SettledState::Rejected(e), _, None) => Err(ExecutionResult::Throw(e.clone())),
    };
    match outcome {
        Ok(v) => evaluator.resolve_promise(&reaction.derived, v),
        Err(ExecutionResult::Throw(e)) => evaluator.reject_promise(&reaction.derived, e),
        Err(_) => evaluator.reject_promise(&reaction.derived, errors_chaining_cycle()),
    }
}

fn enqueue_reaction(microtasks: &MicrotaskQueue, mut forked: Evaluator, reaction: Reaction, state: SettledState) {
    microtasks.enqueue(move || {
        run_reaction(&mut forked, reaction, state);
    });
}

fn errors_chaining_cycle() -> RuntimeValue {
    crate::errors::type_error("Chaining cycle detected for promise")
}
