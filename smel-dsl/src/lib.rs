//! SMEL DSL - Migration Script Front End
//!
//! Turns SMEL script text into the `Migration` AST defined in `smel-core`
//! and back.
//!
//! Architecture:
//! ```text
//! Script source (.smel)
//!     ↓
//! Lexer (case-insensitive keywords, spans)
//!     ↓
//! Parser (recursive descent → Migration)
//!     ↓
//! Executor (smel-engine)
//!
//! Migration → Pretty printer → canonical script (round-trip testing)
//! ```

pub mod lexer;
pub mod parser;
pub mod pretty_printer;

// Re-export key types for convenience
pub use lexer::{Lexer, Span, Token, TokenKind};
pub use parser::*;
pub use pretty_printer::{pretty_print, pretty_print_operation};
