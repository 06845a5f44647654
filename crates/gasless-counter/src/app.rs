//! Client state behind the presentation layer.
//!
//! Holds the one account handle of the session, the last counter value and the in-flight flag,
//! and exposes the three user actions: connect, read and increment.

use alloy_primitives::{Address, U256};
use tokio::sync::{OnceCell, RwLock};
use tracing::{info, warn};

use crate::{
    account::{resolve, AccountConfig, AccountHandle},
    chain::ChainConfig,
    counter::read_counter,
    pipeline::{
        progress_channel, InFlight, InclusionPolicy, ProgressReceiver, ProgressSender,
        SponsoredPipeline, TxOutcome,
    },
    rpc::{BundlerRpc, ChainRpc, PaymasterRpc, Services, SponsorshipContext},
    wallet::WalletConnector,
    GaslessError, Result,
};

/// The application state of one session.
#[derive(Debug)]
pub struct CounterApp<C, B, P> {
    chain: ChainConfig,
    account_config: AccountConfig,
    counter: Address,
    services: Services<C, B, P>,
    inclusion: InclusionPolicy,
    sponsorship: SponsorshipContext,
    account: OnceCell<AccountHandle>,
    count: RwLock<Option<U256>>,
    last_outcome: RwLock<Option<TxOutcome>>,
    in_flight: InFlight,
    progress: ProgressSender,
}

impl<C, B, P> CounterApp<C, B, P>
where
    C: ChainRpc,
    B: BundlerRpc,
    P: PaymasterRpc,
{
    /// Creates the application and the progress stream its writes report to.
    pub fn new(
        chain: ChainConfig,
        account_config: AccountConfig,
        counter: Address,
        services: Services<C, B, P>,
    ) -> (Self, ProgressReceiver) {
        let (progress, receiver) = progress_channel();
        let app = Self {
            chain,
            account_config,
            counter,
            services,
            inclusion: InclusionPolicy::default(),
            sponsorship: SponsorshipContext::default(),
            account: OnceCell::new(),
            count: RwLock::new(None),
            last_outcome: RwLock::new(None),
            in_flight: InFlight::new(),
            progress,
        };
        (app, receiver)
    }

    /// Sets the inclusion policy of writes.
    pub fn with_inclusion_policy(mut self, inclusion: InclusionPolicy) -> Self {
        self.inclusion = inclusion;
        self
    }

    /// Sets the sponsorship request context of writes.
    pub fn with_sponsorship(mut self, sponsorship: SponsorshipContext) -> Self {
        self.sponsorship = sponsorship;
        self
    }

    /// The chain configuration.
    pub fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    /// The counter contract.
    pub fn counter(&self) -> Address {
        self.counter
    }

    /// The collaborators.
    pub fn services(&self) -> &Services<C, B, P> {
        &self.services
    }

    /// The resolved smart account, if connected.
    pub fn account(&self) -> Option<&AccountHandle> {
        self.account.get()
    }

    /// The last counter value read.
    pub async fn count(&self) -> Option<U256> {
        *self.count.read().await
    }

    /// The last included write.
    pub async fn last_outcome(&self) -> Option<TxOutcome> {
        self.last_outcome.read().await.clone()
    }

    /// Whether a write is in flight.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_active()
    }

    /// Authenticates and resolves the smart account.
    ///
    /// The account is resolved once per session; connecting again returns the existing handle.
    /// On failure the application stays disconnected and the action may be retried.
    pub async fn connect<W: WalletConnector>(&self, wallet: &W) -> Result<&AccountHandle> {
        self.account
            .get_or_try_init(|| async {
                let session = wallet.connect().await?;
                resolve(&self.chain, &session, &self.account_config, &self.services).await
            })
            .await
    }

    /// Reads the counter and stores the value.
    pub async fn refresh_count(&self) -> Result<U256> {
        let count = read_counter(&self.services.chain, self.counter).await?;
        *self.count.write().await = Some(count);
        Ok(count)
    }

    /// Runs the sponsored `increment()` pipeline, then refreshes the counter.
    ///
    /// Fails with [`GaslessError::NotConnected`] before an account exists and with
    /// [`GaslessError::PipelineBusy`] while another write is in flight. A failed write leaves the
    /// account and the counter value untouched.
    pub async fn increment(&self) -> Result<TxOutcome> {
        let account = self.account.get().ok_or(GaslessError::NotConnected)?;
        let guard = self.in_flight.try_acquire()?;

        let outcome = SponsoredPipeline::new(&self.services, account)
            .with_context(self.sponsorship.clone())
            .with_inclusion_policy(self.inclusion)
            .with_progress(self.progress.clone(), guard.id())
            .increment(self.counter)
            .await;
        drop(guard);
        let outcome = outcome?;

        *self.last_outcome.write().await = Some(outcome.clone());
        info!(explorer = %outcome.explorer_url(&self.chain), "Increment included");

        if let Err(err) = self.refresh_count().await {
            warn!(%err, "Counter refresh after increment failed");
        }
        Ok(outcome)
    }
}
