//! Runtime value universe, dispatch-table evaluator, and the module
//! loader interface for the SharpTS core.

pub mod builtins;
pub mod environment;
pub mod errors;
pub mod evaluator;
pub mod generator;
pub mod loader;
pub mod promise;
pub mod result;
pub mod symbol;
pub mod value;

pub use environment::{AssignOutcome, BindingKind, RuntimeEnvironment};
pub use evaluator::{EvalOptions, Evaluator};
pub use result::ExecutionResult;
pub use value::RuntimeValue;

/// The evaluator's own `Result` shorthand: `Ok` for a completed value,
/// `Err` for an abrupt `ExecutionResult` still propagating up the call
/// stack.
pub type EvalResult = Result<RuntimeValue, ExecutionResult>;
