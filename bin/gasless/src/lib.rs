//! `gasless` CLI: gasless counter increments through an ERC-4337 smart account.
//!
//! The wallet key signs user operations only; every fee is covered by the paymaster.

mod cmd;
pub use cmd::*;

pub mod account;
/// Arguments, logging, key loading and notifications shared by the commands
pub mod common;
pub mod console;
pub mod count;
pub mod increment;
