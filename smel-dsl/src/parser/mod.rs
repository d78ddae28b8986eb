//! Parser module for SMEL scripts

pub mod parser;

pub use parser::*;
