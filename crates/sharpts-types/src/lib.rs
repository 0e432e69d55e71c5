//! The `TypeInfo` sum, its interning arena, and the assignability cache.

pub mod arena;
pub mod assignability;
pub mod builder;
pub mod info;

pub use arena::{TypeArena, TypeId};
pub use assignability::AssignabilityChecker;
pub use builder::TypeBuilder;
pub use info::*;
