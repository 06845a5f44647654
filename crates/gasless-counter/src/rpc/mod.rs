//! Interfaces of the external collaborators: chain RPC, bundler and paymaster.
//!
//! The pipeline only ever talks to these traits. The HTTP implementations live in [`http`];
//! in-memory doubles live in `test_utils`.

use std::future::Future;

use alloy_primitives::{Address, Bytes, B256};
use alloy_transport::TransportError;

use crate::user_op::{GasLimits, UserOperation};

mod http;
pub use http::*;

mod types;
pub use types::*;

/// Result of a call to an external collaborator.
pub type RpcResult<T> = std::result::Result<T, TransportError>;

/// Read-only access to the chain.
pub trait ChainRpc: Send + Sync {
    /// `eth_chainId`
    fn chain_id(&self) -> impl Future<Output = RpcResult<u64>> + Send;

    /// `eth_call` at the latest block.
    fn call(&self, to: Address, data: Bytes) -> impl Future<Output = RpcResult<Bytes>> + Send;

    /// `eth_getCode` at the latest block.
    fn get_code(&self, address: Address) -> impl Future<Output = RpcResult<Bytes>> + Send;

    /// `eth_gasPrice`
    fn gas_price(&self) -> impl Future<Output = RpcResult<u128>> + Send;

    /// `eth_maxPriorityFeePerGas`
    fn max_priority_fee_per_gas(&self) -> impl Future<Output = RpcResult<u128>> + Send;

    /// `eth_blockNumber`
    fn block_number(&self) -> impl Future<Output = RpcResult<u64>> + Send;
}

/// The ERC-4337 bundler.
pub trait BundlerRpc: Send + Sync {
    /// `eth_chainId`
    fn chain_id(&self) -> impl Future<Output = RpcResult<u64>> + Send;

    /// `eth_supportedEntryPoints`
    fn supported_entry_points(&self) -> impl Future<Output = RpcResult<Vec<Address>>> + Send;

    /// `eth_estimateUserOperationGas`
    fn estimate_user_operation_gas(
        &self,
        op: &UserOperation,
        entry_point: Address,
    ) -> impl Future<Output = RpcResult<GasLimits>> + Send;

    /// `eth_sendUserOperation`, returning the user operation hash.
    fn send_user_operation(
        &self,
        op: &UserOperation,
        entry_point: Address,
    ) -> impl Future<Output = RpcResult<B256>> + Send;

    /// `eth_getUserOperationReceipt`; `None` while the operation is pending.
    fn get_user_operation_receipt(
        &self,
        user_op_hash: B256,
    ) -> impl Future<Output = RpcResult<Option<UserOperationReceipt>>> + Send;
}

/// The sponsoring paymaster.
pub trait PaymasterRpc: Send + Sync {
    /// Fails only when the endpoint does not answer at all.
    fn health_check(&self) -> impl Future<Output = RpcResult<()>> + Send;

    /// `pm_sponsorUserOperation`
    fn sponsor_user_operation(
        &self,
        op: &UserOperation,
        context: &SponsorshipContext,
    ) -> impl Future<Output = RpcResult<SponsorshipResponse>> + Send;
}

/// The collaborators of one application, constructed once at start-up and passed explicitly to
/// the resolver and the pipeline.
#[derive(Debug, Clone)]
pub struct Services<C, B, P> {
    /// Chain RPC
    pub chain: C,
    /// Bundler
    pub bundler: B,
    /// Paymaster
    pub paymaster: P,
}

impl<C, B, P> Services<C, B, P> {
    /// Bundles the three collaborators.
    pub const fn new(chain: C, bundler: B, paymaster: P) -> Self {
        Self { chain, bundler, paymaster }
    }
}

/// The HTTP flavour of [`Services`].
pub type HttpServices = Services<HttpChain, HttpBundler, HttpPaymaster>;
