//! Lexer for the SharpTS TypeScript front end.

pub mod lexer;
pub mod token;

pub use lexer::Lexer;
pub use token::{Keyword, LiteralValue, Token, TokenKind};
