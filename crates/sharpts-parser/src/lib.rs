//! AST and recursive-descent parser for the SharpTS TypeScript front end.

pub mod ast;
pub mod parser;

pub use parser::{parse_program, DecoratorMode, Parser};
