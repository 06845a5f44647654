//! End-to-end tests of the connect, read and sponsored increment flow against in-memory doubles.

use std::time::Duration;

use alloy_primitives::{Address, U256};
use gasless_counter::{
    chain::ChainConfig,
    constants::{counter::MUMBAI_COUNTER, entry_point::ENTRY_POINT_V06},
    pipeline::{InclusionPolicy, ProgressEvent, ProgressReceiver, SponsoredPipeline, Stage},
    test_utils::{
        CancelledConnector, MockBundler, MockChain, MockNetwork, MockPaymaster,
        SponsorshipBehavior, ESTIMATED_GAS, MOCK_PAYMASTER, SPONSORED_GAS,
    },
    user_op::{GasLimits, PartialGasLimits, Reconciliation},
    AccountConfig, AccountResolutionError, AuthenticationError, CounterApp, GaslessError,
    LocalKeyConnector,
};
use rstest::rstest;

const CHAIN_ID: u64 = 80001;
const COUNTER: Address = MUMBAI_COUNTER;
const OWNER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

type MockApp = CounterApp<MockChain, MockBundler, MockPaymaster>;

fn network() -> MockNetwork {
    MockNetwork::new(CHAIN_ID).with_counter(COUNTER, 3)
}

fn app(network: &MockNetwork) -> (MockApp, ProgressReceiver) {
    let chain = ChainConfig::supported(CHAIN_ID).unwrap();
    let config = AccountConfig::for_chain(CHAIN_ID, "bundler-key", "paymaster-key").unwrap();
    let (app, progress) = CounterApp::new(chain, config, COUNTER, network.services());
    let policy = InclusionPolicy::default()
        .with_poll_interval(Duration::from_millis(10))
        .with_timeout(Duration::from_secs(5));
    (app.with_inclusion_policy(policy), progress)
}

fn wallet() -> LocalKeyConnector {
    LocalKeyConnector::from_hex(OWNER_KEY, CHAIN_ID).unwrap()
}

fn drain(progress: &mut ProgressReceiver) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(update) = progress.try_recv() {
        events.push(update.event);
    }
    events
}

#[tokio::test]
async fn test_resolution_is_deterministic() {
    let network = network();
    let (first, _) = app(&network);
    let (second, _) = app(&network);

    let a = first.connect(&wallet()).await.unwrap().address();
    let b = second.connect(&wallet()).await.unwrap().address();
    assert_eq!(a, b);

    let (other, _) = app(&network);
    let c = other.connect(&LocalKeyConnector::random(CHAIN_ID)).await.unwrap().address();
    assert_ne!(a, c);
}

#[tokio::test]
async fn test_connect_resolves_once_per_session() {
    let network = network();
    let (app, _) = app(&network);

    let first = app.connect(&wallet()).await.unwrap().address();
    let reads = network.reads();
    // A second connect, even with another key, keeps the session's account.
    let second = app.connect(&LocalKeyConnector::random(CHAIN_ID)).await.unwrap().address();
    assert_eq!(first, second);
    assert_eq!(network.reads(), reads);
}

#[tokio::test]
async fn test_cancelled_authentication_can_be_retried() {
    let network = network();
    let (app, _) = app(&network);

    let err = app.connect(&CancelledConnector).await.unwrap_err();
    assert!(matches!(err, GaslessError::Authentication(AuthenticationError::Cancelled)));
    assert!(err.is_retryable());
    assert!(app.account().is_none());

    app.connect(&wallet()).await.unwrap();
    assert!(app.account().is_some());
}

#[tokio::test]
async fn test_wallet_on_wrong_chain_is_rejected() {
    let network = network();
    let (app, _) = app(&network);
    let wallet = LocalKeyConnector::from_hex(OWNER_KEY, 1).unwrap();

    let err = app.connect(&wallet).await.unwrap_err();
    assert!(matches!(
        err,
        GaslessError::AccountResolution(AccountResolutionError::ChainMismatch {
            expected: CHAIN_ID,
            actual: 1,
            ..
        })
    ));
    assert!(!err.is_retryable());
    assert!(app.account().is_none());
}

#[tokio::test]
async fn test_unsupported_entry_point_is_rejected() {
    let network = network().with_supported_entry_points(vec![Address::repeat_byte(0x11)]);
    let (app, _) = app(&network);

    let err = app.connect(&wallet()).await.unwrap_err();
    assert!(matches!(
        err,
        GaslessError::AccountResolution(AccountResolutionError::EntryPointNotSupported(ep))
            if ep == ENTRY_POINT_V06
    ));
}

#[tokio::test]
async fn test_unreachable_bundler_is_rejected() {
    let network = network().with_bundler_down();
    let (app, _) = app(&network);

    let err = app.connect(&wallet()).await.unwrap_err();
    assert!(matches!(
        err,
        GaslessError::AccountResolution(AccountResolutionError::Unreachable {
            endpoint: "bundler",
            ..
        })
    ));
}

#[tokio::test]
async fn test_unreachable_paymaster_is_rejected() {
    let network = network().with_paymaster_down();
    let (app, _) = app(&network);

    let err = app.connect(&wallet()).await.unwrap_err();
    assert!(matches!(
        err,
        GaslessError::AccountResolution(AccountResolutionError::Unreachable {
            endpoint: "paymaster",
            ..
        })
    ));
    assert!(!err.is_retryable());
    assert!(app.account().is_none());
}

#[tokio::test]
async fn test_read_is_idempotent_and_needs_no_account() {
    let network = network();
    let (app, _) = app(&network);

    assert_eq!(app.count().await, None);
    assert_eq!(app.refresh_count().await.unwrap(), U256::from(3));
    assert_eq!(app.refresh_count().await.unwrap(), U256::from(3));
    assert_eq!(app.count().await, Some(U256::from(3)));
    assert!(network.submissions().is_empty());
}

#[tokio::test]
async fn test_failed_read_keeps_last_value() {
    let network = network();
    let (app, _) = app(&network);
    app.refresh_count().await.unwrap();

    network.set_chain_down(true);
    let err = app.refresh_count().await.unwrap_err();
    assert!(matches!(err, GaslessError::Rpc(_)));
    assert_eq!(app.count().await, Some(U256::from(3)));
}

#[tokio::test]
async fn test_increment_requires_account() {
    let network = network();
    let (app, mut progress) = app(&network);

    let err = app.increment().await.unwrap_err();
    assert!(matches!(err, GaslessError::NotConnected));
    assert_eq!(network.sponsor_calls(), 0);
    assert!(drain(&mut progress).is_empty());
}

#[tokio::test]
async fn test_sponsored_increment_end_to_end() {
    let network = network();
    let (app, mut progress) = app(&network);
    let account = app.connect(&wallet()).await.unwrap().address();
    assert_eq!(app.refresh_count().await.unwrap(), U256::from(3));
    assert!(!network.is_deployed(account));

    let outcome = app.increment().await.unwrap();

    assert_eq!(app.count().await, Some(U256::from(4)));
    assert_eq!(app.last_outcome().await, Some(outcome.clone()));
    assert!(network.is_deployed(account));
    assert!(outcome.explorer_url(app.chain()).ends_with(&outcome.tx_hash.to_string()));

    let submissions = network.submissions();
    assert_eq!(submissions.len(), 1);
    let op = &submissions[0];
    assert_eq!(op.sender, account);
    assert_eq!(op.nonce, U256::ZERO);
    assert!(op.deploys_account());
    assert_eq!(op.gas_limits(), SPONSORED_GAS);
    assert!(op.paymaster_and_data.starts_with(MOCK_PAYMASTER.as_slice()));

    let events = drain(&mut progress);
    assert_eq!(
        events,
        vec![
            ProgressEvent::Populating,
            ProgressEvent::BuildingUserOp,
            ProgressEvent::Sponsoring,
            ProgressEvent::Reconciled(Reconciliation::Overwritten(SPONSORED_GAS)),
            ProgressEvent::Submitting,
            ProgressEvent::AwaitingInclusion { user_op_hash: outcome.user_op_hash },
            ProgressEvent::Included {
                user_op_hash: outcome.user_op_hash,
                tx_hash: outcome.tx_hash,
            },
        ]
    );
    assert!(!app.is_busy());
}

#[tokio::test]
async fn test_second_increment_uses_deployed_account() {
    let network = network();
    let (app, _) = app(&network);
    app.connect(&wallet()).await.unwrap();

    app.increment().await.unwrap();
    app.increment().await.unwrap();

    assert_eq!(app.count().await, Some(U256::from(5)));
    let submissions = network.submissions();
    assert_eq!(submissions[1].nonce, U256::from(1));
    assert!(!submissions[1].deploys_account());
}

#[rstest]
#[case::complete_triple(SponsorshipBehavior::Full(SPONSORED_GAS), SPONSORED_GAS)]
#[case::missing_pre_verification_gas(
    SponsorshipBehavior::Partial(PartialGasLimits {
        call_gas_limit: Some(U256::from(70_000)),
        verification_gas_limit: Some(U256::from(130_000)),
        pre_verification_gas: None,
    }),
    ESTIMATED_GAS
)]
#[case::no_limits(SponsorshipBehavior::Partial(PartialGasLimits::default()), ESTIMATED_GAS)]
#[tokio::test]
async fn test_submitted_gas_limits(
    #[case] sponsorship: SponsorshipBehavior,
    #[case] expected: GasLimits,
) {
    let network = network().with_sponsorship(sponsorship);
    let (app, _) = app(&network);
    app.connect(&wallet()).await.unwrap();

    app.increment().await.unwrap();

    assert_eq!(network.submissions()[0].gas_limits(), expected);
    assert_eq!(app.count().await, Some(U256::from(4)));
}

#[rstest]
#[case::rejected(SponsorshipBehavior::Reject("policy exhausted".to_string()))]
#[case::no_paymaster_data(SponsorshipBehavior::NoPaymasterData)]
#[tokio::test]
async fn test_nothing_is_submitted_without_sponsorship(#[case] sponsorship: SponsorshipBehavior) {
    let network = network().with_sponsorship(sponsorship);
    let (app, mut progress) = app(&network);
    app.connect(&wallet()).await.unwrap();
    app.refresh_count().await.unwrap();

    let err = app.increment().await.unwrap_err();

    assert!(matches!(err, GaslessError::Sponsorship(_)));
    assert_eq!(network.sponsor_calls(), 1);
    assert!(network.submissions().is_empty());
    assert_eq!(network.count(COUNTER), U256::from(3));
    assert_eq!(app.count().await, Some(U256::from(3)));
    assert_eq!(app.last_outcome().await, None);

    let last = drain(&mut progress).pop().unwrap();
    assert!(matches!(last, ProgressEvent::Failed { stage: Some(Stage::Sponsor), .. }));
    assert!(!app.is_busy());

    // The action stays available once the paymaster recovers.
    network.set_sponsorship(SponsorshipBehavior::Full(SPONSORED_GAS));
    app.increment().await.unwrap();
    assert_eq!(app.count().await, Some(U256::from(4)));
}

#[tokio::test]
async fn test_concurrent_triggers_submit_once() {
    let network = network();
    let (app, mut progress) = app(&network);
    app.connect(&wallet()).await.unwrap();

    let (first, second) = tokio::join!(app.increment(), app.increment());

    assert!(first.is_ok());
    assert!(matches!(second, Err(GaslessError::PipelineBusy)));
    assert_eq!(network.submissions().len(), 1);
    assert_eq!(network.count(COUNTER), U256::from(4));

    let events = drain(&mut progress);
    assert_eq!(events.iter().filter(|e| matches!(e, ProgressEvent::Populating)).count(), 1);
    assert!(!app.is_busy());
}

#[tokio::test]
async fn test_reverted_operation_is_reported() {
    let network = network();
    let (app, mut progress) = app(&network);
    app.connect(&wallet()).await.unwrap();
    app.refresh_count().await.unwrap();
    network.revert_next();

    let err = app.increment().await.unwrap_err();

    assert!(matches!(err, GaslessError::OperationReverted { .. }));
    assert_eq!(network.count(COUNTER), U256::from(3));
    assert_eq!(app.count().await, Some(U256::from(3)));
    let last = drain(&mut progress).pop().unwrap();
    assert!(matches!(last, ProgressEvent::Failed { stage: Some(Stage::Submit), .. }));
}

#[tokio::test(start_paused = true)]
async fn test_inclusion_wait_is_bounded() {
    let network = network().with_pending_polls(usize::MAX);
    let (app, _) = app(&network);
    let app = app.with_inclusion_policy(
        InclusionPolicy::default()
            .with_poll_interval(Duration::from_millis(500))
            .with_timeout(Duration::from_secs(3)),
    );
    app.connect(&wallet()).await.unwrap();

    let err = app.increment().await.unwrap_err();

    assert!(matches!(err, GaslessError::InclusionTimeout { waited_secs: 3, .. }));
    assert_eq!(network.submissions().len(), 1);
    assert_eq!(app.last_outcome().await, None);
    assert!(!app.is_busy());
}

#[tokio::test]
async fn test_zero_counter_fails_before_build() {
    let network = network();
    let (app, mut progress) = app(&network);
    let account = app.connect(&wallet()).await.unwrap();
    let services = network.services();

    let err = SponsoredPipeline::new(&services, account)
        .increment(Address::ZERO)
        .await
        .unwrap_err();

    assert!(matches!(err, GaslessError::Construction(_)));
    assert_eq!(network.estimates(), 0);
    assert!(drain(&mut progress).is_empty());
}

/// A bundler-side failure injected into the mock network.
#[derive(Debug, Clone, Copy)]
enum BundlerFault {
    Estimation,
    Submission,
}

impl BundlerFault {
    fn set(self, network: &MockNetwork, active: bool) {
        match self {
            Self::Estimation => network.fail_estimates(active.then_some("AA21 didn't pay prefund")),
            Self::Submission => {
                network.reject_sends(active.then_some("AA31 paymaster deposit too low"))
            }
        }
    }
}

#[rstest]
#[case::estimation_fails(BundlerFault::Estimation, Stage::Build, 0)]
#[case::bundler_rejects(BundlerFault::Submission, Stage::Submit, 1)]
#[tokio::test]
async fn test_bundler_failure_aborts_the_write(
    #[case] fault: BundlerFault,
    #[case] failed_stage: Stage,
    #[case] sponsor_calls: usize,
) {
    let network = network();
    let (app, mut progress) = app(&network);
    app.connect(&wallet()).await.unwrap();
    app.refresh_count().await.unwrap();
    fault.set(&network, true);

    let err = app.increment().await.unwrap_err();

    match failed_stage {
        Stage::Build => assert!(matches!(err, GaslessError::UserOpBuild(_))),
        _ => assert!(matches!(err, GaslessError::Submission(_))),
    }
    assert_eq!(err.stage(), Some(failed_stage));
    assert!(err.is_retryable());
    assert_eq!(network.sponsor_calls(), sponsor_calls);
    assert!(network.submissions().is_empty());
    assert_eq!(network.count(COUNTER), U256::from(3));
    assert_eq!(app.count().await, Some(U256::from(3)));
    assert_eq!(app.last_outcome().await, None);

    let last = drain(&mut progress).pop().unwrap();
    assert!(matches!(
        last,
        ProgressEvent::Failed { stage: Some(stage), .. } if stage == failed_stage
    ));
    assert!(!app.is_busy());

    fault.set(&network, false);
    app.increment().await.unwrap();
    assert_eq!(app.count().await, Some(U256::from(4)));
}

#[tokio::test]
async fn test_inclusion_waits_for_confirmations() {
    let network = network().with_mining();
    let (app, _) = app(&network);
    let app = app.with_inclusion_policy(
        InclusionPolicy::default()
            .with_poll_interval(Duration::from_millis(1))
            .with_timeout(Duration::from_secs(5))
            .with_confirmations(3),
    );
    app.connect(&wallet()).await.unwrap();

    let outcome = app.increment().await.unwrap();

    // The head had to move two blocks past the inclusion block.
    assert!(network.block_number() >= outcome.receipt.receipt.block_number + 2);
    assert_eq!(app.count().await, Some(U256::from(4)));
}
