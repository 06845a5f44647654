//! Constants for the sponsored counter flow.
//!
//! Addresses are grouped by the component that owns them.

use alloy_primitives::{address, hex, Address};

/// Constants of the ERC-4337 entry point.
pub mod entry_point {
    use super::*;

    /// The canonical entry point v0.6 deployment, identical on every supported chain.
    pub const ENTRY_POINT_V06: Address = address!("5FF137D4b0FDCD49DcA30c7CF57E578a026d2789");
    /// The nonce key used for every operation. Sequential nonces live under key 0.
    pub const DEFAULT_NONCE_KEY: u64 = 0;
}

/// Constants of the smart-account stack (v2 account, factory and ownership module).
pub mod account {
    use super::*;

    /// The v2 account factory that deploys counterfactual accounts.
    pub const ACCOUNT_FACTORY_V2: Address = address!("000000a56Aaca3e9a4C479ea6b6CD0DbcB6634F5");
    /// The ECDSA ownership validation module.
    pub const ECDSA_OWNERSHIP_MODULE: Address =
        address!("0000001c5b32F37F5beA87BDD5374eB2aC54eA8e");
    /// The default account index passed to the factory.
    pub const DEFAULT_ACCOUNT_INDEX: u64 = 0;
    /// Name reported to the paymaster in the smart account info.
    pub const SMART_ACCOUNT_NAME: &str = "BICONOMY";
    /// Version reported to the paymaster in the smart account info.
    pub const SMART_ACCOUNT_VERSION: &str = "2.0.0";
    /// A well-formed ECDSA signature used while estimating gas. Never valid for the op hash.
    pub const DUMMY_ECDSA_SIGNATURE: [u8; 65] = hex!(
        "ffffffffffffffffffffffffffffffff000000000000000000000000000000007aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1c"
    );
}

/// Constants of the counter contract.
pub mod counter {
    use super::*;

    /// The counter contract deployed on Polygon Mumbai.
    pub const MUMBAI_COUNTER: Address = address!("c34E02663D5FFC7A1CeaC3081bF811431B096C8C");
}

/// Constants of the inclusion wait.
pub mod inclusion {
    use std::time::Duration;

    /// Interval between two `eth_getUserOperationReceipt` polls.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
    /// Upper bound on the whole inclusion wait.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
    /// Number of confirmations required before a receipt is final.
    pub const DEFAULT_CONFIRMATIONS: u64 = 1;
}
