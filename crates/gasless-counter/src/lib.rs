//! Gasless counter: a sponsored ERC-4337 write flow around a counter contract.
//!
//! A wallet session yields a signer, the signer resolves a counterfactual smart account, and
//! `increment()` calls are relayed through a bundler with fees covered by a paymaster.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod constants;

mod account;
pub use account::*;

mod app;
pub use app::*;

pub mod chain;

pub mod contracts;

mod counter;
pub use counter::*;

mod error;
pub use error::*;

pub mod pipeline;

pub mod rpc;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub mod user_op;

mod wallet;
pub use wallet::*;
