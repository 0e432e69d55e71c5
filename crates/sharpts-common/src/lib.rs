//! Common types and utilities for the SharpTS core.
//!
//! This crate provides foundational types used across all SharpTS crates:
//! - String interning (`Atom`, `Interner`)
//! - Source spans (`Span`)
//! - Position/Range types for line/column source locations
//! - Diagnostics (`Diagnostic`, `DiagnosticCategory`, `DiagnosticSink`)
//! - Compiler limits and thresholds

pub mod diagnostics;
pub mod interner;
pub mod limits;
pub mod position;
pub mod span;

pub use diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSink};
pub use interner::{Atom, Interner};
pub use position::{LineMap, Position, Range};
pub use span::Span;
