//! Generator and async-generator suspension.
//!
//! A tree-walking evaluator has no free-standing "continuation" to save
//! when a generator body hits `yield` partway through an arbitrarily
//! nested statement — unlike a bytecode VM, there is no explicit program
//! counter to snapshot. The standard way to get real suspend/resume out of
//! a recursive-descent interpreter without one is a stackful coroutine: run
//! the body on its own OS thread and hand control back and forth over a
//! rendezvous channel. This preserves single-threaded cooperative
//! scheduling exactly — the driving side blocks on `recv()` the instant it
//! resumes the generator, and the generator thread blocks on `recv()` the
//! instant it yields, so only one
//! of the two is ever runnable.

use std::sync::mpsc::{Receiver, Sender};
use std::sync::Mutex;
use std::thread::JoinHandle;

use crate::value::RuntimeValue;

/// Sent from the driving side (`.next`/`.return`/`.throw`) into a
/// suspended generator body.
pub enum ResumeMsg {
    Next(RuntimeValue),
    Return(RuntimeValue),
    Throw(RuntimeValue),
}

/// Sent from a generator body back to whoever is driving it.
pub enum YieldMsg {
    Yielded(RuntimeValue),
    Done(RuntimeValue),
    Threw(RuntimeValue),
}

/// The half of the rendezvous a generator *body* holds, threaded through
/// the evaluator while it runs on the worker thread so `yield` can reach
/// it.
pub struct GenChannels {
    pub to_driver: Sender<YieldMsg>,
    pub from_driver: Receiver<ResumeMsg>,
}

/// The result of driving a generator one step.
pub enum IteratorStep {
    Yielded(RuntimeValue),
    Done(RuntimeValue),
    Threw(RuntimeValue),
}

struct Channels {
    to_gen: Sender<ResumeMsg>,
    from_gen: Receiver<YieldMsg>,
}

pub struct GeneratorHandle {
    channels: Mutex<Channels>,
    done: Mutex<bool>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl GeneratorHandle {
    /// Spawns the worker thread. `run_body` receives its half of the
    /// rendezvous and is responsible for blocking on it before executing
    /// any user code — a generator function call allocates the generator
    /// object but runs no body statements until the first `.next()`
    /// (ECMAScript generator-object semantics).
    pub fn spawn<F>(run_body: F) -> GeneratorHandle
    where
        F: FnOnce(GenChannels) + Send + 'static,
    {
        let (to_gen, from_driver) = std::sync::mpsc::channel::<ResumeMsg>();
        let (to_driver, from_gen) = std::sync::mpsc::channel::<YieldMsg>();
        let join = std::thread::Builder::new()
            .name("sharpts-generator".into())
            .spawn(move || run_body(GenChannels { to_driver, from_driver }))
            .expect("failed to spawn generator worker thread");
        GeneratorHandle {
            channels: Mutex::new(Channels { to_gen, from_gen }),
            done: Mutex::new(false),
            join: Mutex::new(Some(join)),
        }
    }

    pub fn is_done(&self) -> bool {
        *self.done.lock().expect("generator lock poisoned")
    }

    pub fn next(&self, value: RuntimeValue) -> IteratorStep {
        self.resume(ResumeMsg::Next(value))
    }

    pub fn finish(&self, value: RuntimeValue) -> IteratorStep {
        self.resume(ResumeMsg::Return(value))
    }

    pub fn throw_in(&self, value: RuntimeValue) -> IteratorStep {
        self.resume(ResumeMsg::Throw(value))
    }

    fn resume(&self, msg: ResumeMsg) -> IteratorStep {
        if self.is_done() {
            let fallback = match msg {
                ResumeMsg::Return(v) => v,
                _ => RuntimeValue::Undefined,
            };
            return IteratorStep::Done(fallback);
        }
        let channels = self.channels.lock().expect("generator lock poisoned");
        if channels.to_gen.send(msg).is_err() {
            drop(channels);
            *self.done.lock().expect("generator lock poisoned") = true;
            return IteratorStep::Done(RuntimeValue::Undefined);
        }
        let received = channels.from_gen.recv();
        drop(channels);
        match received {
            Ok(YieldMsg::Yielded(v)) => IteratorStep::Yielded(v),
            Ok(YieldMsg::Done(v)) => {
                *self.done.lock().expect("generator lock poisoned") = true;
                IteratorStep::Done(v)
            }
            Ok(YieldMsg::Threw(e)) => {
                *self.done.lock().expect("generator lock poisoned") = true;
                IteratorStep::Threw(e)
            }
            Err(_) => {
                *self.done.lock().expect("generator lock poisoned") = true;
                IteratorStep::Done(RuntimeValue::Undefined)
            }
        }
    }
}

impl Drop for GeneratorHandle {
    /// If the generator was abandoned mid-iteration (e.g. a `for-of` broke
    /// out early without exhausting it), send a synthetic `.return()` so
    /// any pending `finally` blocks inside the body still run and the
    /// worker thread exits instead of leaking, blocked forever on `recv`.
    fn drop(&mut self) {
        if !self.is_done() {
            let _ = self.finish(RuntimeValue::Undefined);
        }
        if let Some(handle) = self.join.lock().expect("generator lock poisoned").take() {
            let _ = handle.join();
        }
    }
}

/// An async generator combines both protocols: it runs
/// on the same kind of worker thread, and `await` inside its body is
/// handled the ordinary way (draining the shared microtask queue), since
/// that thread owns its own `Evaluator` with a clone of the same queue.
pub struct AsyncGeneratorHandle {
    inner: GeneratorHandle,
}

impl AsyncGeneratorHandle {
    pub fn spawn<F>(run_body: F) -> AsyncGeneratorHandle
    where
        F: FnOnce(GenChannels) + Send + 'static,
    {
        AsyncGeneratorHandle { inner: GeneratorHandle::spawn(run_body) }
    }

    pub fn next(&self, value: RuntimeValue) -> IteratorStep {
        self.inner.next(value)
    }

    pub fn finish(&self, value: RuntimeValue) -> IteratorStep {
        self.inner.finish(value)
    }

    pub fn throw_in(&self, value: RuntimeValue) -> IteratorStep {
        self.inner.throw_in(value)
    }

    pub fn is_done(&self) -> bool {
        self.inner.is_done()
    }
}
