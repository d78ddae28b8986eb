//! SMEL Engine - Operation Executor
//!
//! Applies a parsed sequence of schema operations to an immutable
//! [`Snapshot`](smel_core::Snapshot) and produces the next one.
//!
//! - [`Executor::check`] previews every operation without committing.
//! - [`Executor::run`] applies the batch atomically: the result is either a
//!   committed V2 or the first failure, never a half-applied schema.
//! - [`Executor::migrate`] runs a script's operations and retags the result
//!   to the script's target paradigm.

pub mod executor;
pub mod keys;
pub mod ops;

pub use executor::*;
pub use keys::KeySequencer;
pub use ops::flatten::{classify_flatten, FlattenScenario};
