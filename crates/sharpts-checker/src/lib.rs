//! The bidirectional structural/nominal type checker:
//! hoisting, assignability, generics, and control-flow narrowing.

pub mod checker;
pub mod environment;
pub mod generics;
pub mod hoist;
pub mod narrowing;
pub mod node_id;
pub mod options;
pub mod resolve;

pub use checker::{Checker, Flow};
pub use node_id::{NodeId, TypeMap};
pub use options::CheckerOptions;
