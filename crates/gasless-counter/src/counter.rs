//! Read path: the counter value held by the contract.

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use tracing::debug;

use crate::{contracts::ICounter, rpc::ChainRpc, GaslessError, Result};

/// Reads `getCount()` at the latest block.
///
/// Needs no signer and mutates nothing. Network failures are reported as
/// [`GaslessError::Rpc`] and are not retried.
pub async fn read_counter<C: ChainRpc>(chain: &C, contract: Address) -> Result<U256> {
    let output = chain
        .call(contract, ICounter::getCountCall {}.abi_encode().into())
        .await
        .map_err(|e| GaslessError::Rpc(format!("getCount on {contract}: {e}")))?;
    let count = ICounter::getCountCall::abi_decode_returns(&output, true)
        .map_err(|e| GaslessError::Rpc(format!("malformed getCount result: {e}")))?
        ._0;
    debug!(%contract, %count, "Counter read");
    Ok(count)
}
