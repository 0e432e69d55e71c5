//! `Promise` state and the microtask queue.
//!
//! `Promise.resolve(p)` must not double-wrap an existing promise, and
//! `.then` callbacks that return a promise flatten recursively. Both
//! only matter at *settlement* time, so the flattening logic lives in
//! the evaluator (`evaluator::promises`), which is the only place with
//! enough context (a `FunctionRef` call path) to await a nested
//! thenable; this module owns just the state machine and reaction queue.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::value::{FunctionRef, RuntimeValue};

#[derive(Clone)]
pub enum SettledState {
    Fulfilled(RuntimeValue),
    Rejected(RuntimeValue),
}

pub enum PromiseState {
    Pending,
    Settled(SettledState),
}

/// A `.then`/`.catch`/`.finally` registration awaiting settlement.
pub struct Reaction {
    pub on_fulfilled: Option<FunctionRef>,
    pub on_rejected: Option<FunctionRef>,
    pub derived: Arc<PromiseData>,
}

pub struct PromiseData {
    pub state: Mutex<PromiseState>,
    pub reactions: Mutex<Vec<Reaction>>,
}

impl PromiseData {
    pub fn pending() -> Arc<Self> {
        Arc::new(PromiseData { state: Mutex::new(PromiseState::Pending), reactions: Mutex::new(Vec::new()) })
    }

    /// Builds a promise that is already fulfilled with `value` — the
    /// common case for an `async function` that returns synchronously
    /// (`evaluator::coroutine::start_async_call`) and for
    /// `Promise.resolve`.
    pub fn pending_resolved(value: RuntimeValue) -> Arc<Self> {
        Arc::new(PromiseData {
            state: Mutex::new(PromiseState::Settled(SettledState::Fulfilled(value))),
            reactions: Mutex::new(Vec::new()),
        })
    }

    /// Builds a promise that is already rejected with `error`.
    pub fn pending_rejected(error: RuntimeValue) -> Arc<Self> {
        Arc::new(PromiseData {
            state: Mutex::new(PromiseState::Settled(SettledState::Rejected(error))),
            reactions: Mutex::new(Vec::new()),
        })
    }

    pub fn is_settled(&self) -> bool {
        !matches!(*self.state.lock().expect("promise lock poisoned"), PromiseState::Pending)
    }

    pub fn settled_state(&self) -> Option<SettledState> {
        match &*self.state.lock().expect("promise lock poisoned") {
            PromiseState::Settled(s) => Some(s.clone()),
            PromiseState::Pending => None,
        }
    }

    /// Transitions a still-pending promise to `Settled`. A promise that
    /// already settled is left untouched — ECMAScript promises settle at
    /// most once, and callers (`evaluator::promises`) only call this after
    /// checking `is_settled`.
    pub fn settle(&self, state: SettledState) {
        let mut guard = self.state.lock().expect("promise lock poisoned");
        if matches!(*guard, PromiseState::Pending) {
            *guard = PromiseState::Settled(state);
        }
    }

    /// Registers a `.then` reaction while this promise is still pending.
    pub fn add_reaction(&self, reaction: Reaction) {
        self.reactions.lock().expect("promise lock poisoned").push(reaction);
    }

    /// Drains every currently-registered reaction, e.g. right after
    /// settlement so each can be scheduled as its own microtask job.
    pub fn take_reactions(&self) -> Vec<Reaction> {
        std::mem::take(&mut *self.reactions.lock().expect("promise lock poisoned"))
    }
}

/// Shared FIFO queue of pending reaction jobs — microtask ordering
/// follows resolution order, FIFO, the sole inter-task ordering
/// guarantee this runtime makes. A job is a thunk closing over the
/// reaction and the value it settled with; running it is the
/// evaluator's job since only it can invoke a `FunctionRef`.
#[derive(Clone)]
pub struct MicrotaskQueue(Arc<Mutex<VecDeque<Box<dyn FnOnce() + Send>>>>);

impl MicrotaskQueue {
    pub fn new() -> Self {
        MicrotaskQueue(Arc::new(Mutex::new(VecDeque::new())))
    }

    pub fn enqueue(&self, job: impl FnOnce() + Send + 'static) {
        self.0.lock().expect("microtask queue lock poisoned").push_back(Box::new(job));
    }

    pub fn drain_one(&self) -> Option<Box<dyn FnOnce() + Send>> {
        self.0.lock().expect("microtask queue lock poisoned").pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().expect("microtask queue lock poisoned").is_empty()
    }
}

impl Default for MicrotaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
