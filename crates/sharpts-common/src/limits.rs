//! Centralized limits and thresholds: magic numbers live in one place
//! rather than scattered through the checker and evaluator.

/// Cap diagnostics at 10, then short-circuit remaining checks.
pub const DEFAULT_DIAGNOSTIC_CAP: usize = 10;

/// Maximum recursion depth for structural-equality/hashing and
/// assignability walks over self-referential `TypeInfo` graphs before we
/// conclude a cycle-detection bug rather than a legitimately deep type.
pub const MAX_TYPE_RECURSION_DEPTH: usize = 256;

/// Maximum call-stack depth the tree-walking evaluator will recurse before
/// raising a `RangeError` ("Maximum call stack size exceeded"), mirroring
/// the host JS engine behavior user code may depend on.
pub const MAX_CALL_STACK_DEPTH: usize = 2_000;
