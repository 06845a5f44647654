//! Reads the counter. Needs neither a key nor the relay.

mod cmd;

pub use cmd::*;
