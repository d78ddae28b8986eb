//! Lexer module for SMEL scripts

pub mod token;
pub mod scanner;

pub use token::*;
pub use scanner::*;
