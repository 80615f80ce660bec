//! Front end: token source and parser.

pub mod diagnostics;
pub mod lexer;
pub mod parser;

pub use diagnostics::Diagnostic;
pub use lexer::{lex, LexicalError, Token, TokenKind};
pub use parser::Parser;
