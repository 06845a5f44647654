//! One-shot sponsored increment.
//!
//! Connects, reads the counter, runs the sponsored pipeline while rendering its progress and
//! prints the explorer link of the bundle transaction.

mod cmd;

pub use cmd::*;
