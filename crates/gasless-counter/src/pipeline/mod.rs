//! The sponsored transaction pipeline.
//!
//! Five sequential stages, each gated on the previous one:
//!
//! 1. populate: encode the target call;
//! 2. build: let the account assemble a nonce-stamped, gas-estimated envelope;
//! 3. sponsor: obtain `paymasterAndData` and the paymaster-signed gas limits;
//! 4. reconcile: merge those limits into the envelope;
//! 5. submit: sign, send to the bundler and wait for inclusion.
//!
//! Any failure aborts the remaining stages. Nothing reaches the bundler unless the sponsor stage
//! succeeded.

use alloy_primitives::{Address, TxHash, B256};
use tracing::{info, warn};

use crate::{
    account::AccountHandle,
    chain::ChainConfig,
    contracts::{increment_call, Call},
    rpc::{BundlerRpc, ChainRpc, PaymasterRpc, Services, SponsorshipContext, UserOperationReceipt},
    user_op::{Reconciliation, UserOperation},
    GaslessError, Result,
};

mod guard;
pub use guard::*;

mod inclusion;
pub use inclusion::*;

mod progress;
pub use progress::*;

/// Result of an included write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    /// Hash returned by the bundler
    pub user_op_hash: B256,
    /// Hash of the bundle transaction
    pub tx_hash: TxHash,
    /// The bundler receipt
    pub receipt: UserOperationReceipt,
}

impl TxOutcome {
    /// Block explorer link of the bundle transaction.
    pub fn explorer_url(&self, chain: &ChainConfig) -> String {
        chain.explorer_tx_url(self.tx_hash)
    }
}

/// One run of the pipeline against a resolved account.
#[derive(Debug)]
pub struct SponsoredPipeline<'a, C, B, P> {
    services: &'a Services<C, B, P>,
    account: &'a AccountHandle,
    context: SponsorshipContext,
    inclusion: InclusionPolicy,
    progress: Option<ProgressSender>,
    action_id: u64,
}

impl<'a, C, B, P> SponsoredPipeline<'a, C, B, P>
where
    C: ChainRpc,
    B: BundlerRpc,
    P: PaymasterRpc,
{
    /// Creates a fully sponsored pipeline with the default inclusion policy.
    pub fn new(services: &'a Services<C, B, P>, account: &'a AccountHandle) -> Self {
        Self {
            services,
            account,
            context: SponsorshipContext::default(),
            inclusion: InclusionPolicy::default(),
            progress: None,
            action_id: 0,
        }
    }

    /// Sets the sponsorship request context.
    pub fn with_context(mut self, context: SponsorshipContext) -> Self {
        self.context = context;
        self
    }

    /// Sets the inclusion policy.
    pub fn with_inclusion_policy(mut self, inclusion: InclusionPolicy) -> Self {
        self.inclusion = inclusion;
        self
    }

    /// Streams progress events, keyed by `action_id`, to `progress`.
    pub fn with_progress(mut self, progress: ProgressSender, action_id: u64) -> Self {
        self.progress = Some(progress);
        self.action_id = action_id;
        self
    }

    /// Runs `increment()` on the counter contract.
    pub async fn increment(&self, counter: Address) -> Result<TxOutcome> {
        self.run(|| {
            if counter.is_zero() {
                return Err(GaslessError::Construction(
                    "counter contract address is the zero address".to_string(),
                ));
            }
            Ok(increment_call(counter))
        })
        .await
    }

    /// Runs the pipeline for the call produced by `populate`.
    pub async fn run<F>(&self, populate: F) -> Result<TxOutcome>
    where
        F: FnOnce() -> Result<Call> + Send,
    {
        let result = self.run_stages(populate).await;
        if let Err(err) = &result {
            warn!(action_id = self.action_id, stage = ?err.stage(), %err, "Pipeline aborted");
            if err.is_aa3x() {
                warn!(action_id = self.action_id, "Entry point rejected the paymaster signature");
            }
            self.emit(ProgressEvent::Failed { stage: err.stage(), message: err.to_string() });
        }
        result
    }

    async fn run_stages<F>(&self, populate: F) -> Result<TxOutcome>
    where
        F: FnOnce() -> Result<Call> + Send,
    {
        let Services { chain, bundler, .. } = self.services;

        self.emit(ProgressEvent::Populating);
        let call = populate()?;
        info!(action_id = self.action_id, to = %call.to, data = %call.data, "Call populated");

        self.emit(ProgressEvent::BuildingUserOp);
        let mut op = self.account.build_user_op(&call, chain, bundler).await?;
        op.validate_for_sponsorship()?;

        self.emit(ProgressEvent::Sponsoring);
        self.sponsor(&mut op).await?;

        op.validate_for_submission()?;
        self.emit(ProgressEvent::Submitting);
        self.account.sign_user_op(&mut op).await?;
        let user_op_hash = bundler
            .send_user_operation(&op, self.account.entry_point())
            .await
            .map_err(|e| GaslessError::Submission(e.to_string()))?;
        info!(action_id = self.action_id, %user_op_hash, "User operation submitted");

        self.emit(ProgressEvent::AwaitingInclusion { user_op_hash });
        let receipt = await_inclusion(chain, bundler, user_op_hash, &self.inclusion).await?;
        let tx_hash = receipt.receipt.transaction_hash;
        if !receipt.success {
            return Err(GaslessError::OperationReverted {
                user_op_hash,
                tx_hash,
                reason: receipt.reason.clone().unwrap_or_default(),
            });
        }

        info!(action_id = self.action_id, %user_op_hash, %tx_hash, "User operation included");
        self.emit(ProgressEvent::Included { user_op_hash, tx_hash });
        Ok(TxOutcome { user_op_hash, tx_hash, receipt })
    }

    /// Sponsor and reconcile stages.
    async fn sponsor(&self, op: &mut UserOperation) -> Result<()> {
        let response = self
            .services
            .paymaster
            .sponsor_user_operation(op, &self.context)
            .await
            .map_err(|e| GaslessError::Sponsorship(e.to_string()))?;
        if response.paymaster_and_data.is_empty() {
            return Err(GaslessError::Sponsorship(
                "paymaster returned empty paymasterAndData".to_string(),
            ));
        }
        op.paymaster_and_data = response.paymaster_and_data;

        let reconciliation = op.reconcile(response.gas_limits);
        match &reconciliation {
            Reconciliation::Overwritten(limits) => {
                info!(action_id = self.action_id, ?limits, "Paymaster gas limits applied")
            }
            Reconciliation::KeptEstimates { returned } => warn!(
                action_id = self.action_id,
                ?returned,
                "Paymaster returned an incomplete gas limit triple, keeping estimates"
            ),
        }
        self.emit(ProgressEvent::Reconciled(reconciliation));
        Ok(())
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(progress) = &self.progress {
            // A dropped receiver only means nobody renders the status.
            let _ = progress.send(PipelineUpdate { action_id: self.action_id, event });
        }
    }
}
