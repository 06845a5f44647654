//! Bounded wait for the inclusion of a submitted user operation.

use std::time::Duration;

use alloy_primitives::B256;
use tracing::{debug, trace, warn};

use crate::{
    constants::inclusion::{DEFAULT_CONFIRMATIONS, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT},
    rpc::{BundlerRpc, ChainRpc, UserOperationReceipt},
    GaslessError, Result,
};

/// How long and how often to poll for a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InclusionPolicy {
    /// Delay between two receipt polls
    pub poll_interval: Duration,
    /// Upper bound on the whole wait
    pub timeout: Duration,
    /// Blocks on top of, and including, the inclusion block
    pub confirmations: u64,
}

impl Default for InclusionPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            confirmations: DEFAULT_CONFIRMATIONS,
        }
    }
}

impl InclusionPolicy {
    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the number of confirmations, at least one.
    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations.max(1);
        self
    }
}

/// Polls the bundler until the operation is included with the required confirmations.
///
/// Failing polls are logged and retried until the timeout elapses; the operation itself is never
/// resubmitted.
pub async fn await_inclusion<C, B>(
    chain: &C,
    bundler: &B,
    user_op_hash: B256,
    policy: &InclusionPolicy,
) -> Result<UserOperationReceipt>
where
    C: ChainRpc,
    B: BundlerRpc,
{
    let poll = async {
        loop {
            match bundler.get_user_operation_receipt(user_op_hash).await {
                Ok(Some(receipt)) => {
                    if policy.confirmations <= 1 {
                        return receipt;
                    }
                    match chain.block_number().await {
                        Ok(head) => {
                            let confirmations =
                                (head + 1).saturating_sub(receipt.receipt.block_number);
                            debug!(%user_op_hash, confirmations, "Receipt found");
                            if confirmations >= policy.confirmations {
                                return receipt;
                            }
                        }
                        Err(e) => warn!(%user_op_hash, %e, "Block number poll failed"),
                    }
                }
                Ok(None) => trace!(%user_op_hash, "User operation pending"),
                Err(e) => warn!(%user_op_hash, %e, "Receipt poll failed"),
            }
            tokio::time::sleep(policy.poll_interval).await;
        }
    };

    tokio::time::timeout(policy.timeout, poll).await.map_err(|_| {
        GaslessError::InclusionTimeout { user_op_hash, waited_secs: policy.timeout.as_secs() }
    })
}
