//! Resolves the counterfactual smart account of an owner key.

mod cmd;

pub use cmd::*;
