//! In-memory doubles of the chain, bundler and paymaster.
//!
//! The three doubles share one [`MockNetwork`] state so that an included operation really bumps
//! the counter the chain double reports, and so that tests can inspect every request.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use alloy_primitives::{address, keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use alloy_transport::TransportErrorKind;

use crate::{
    constants::{account::DUMMY_ECDSA_SIGNATURE, entry_point::ENTRY_POINT_V06},
    contracts::{IAccountFactory, ICounter, IEntryPoint, ISmartAccount},
    rpc::{
        BundlerRpc, ChainRpc, InclusionReceipt, PaymasterRpc, RpcResult, Services,
        SponsorshipContext, SponsorshipResponse, UserOperationReceipt,
    },
    user_op::{GasLimits, PartialGasLimits, UserOperation},
    wallet::{Session, WalletConnector},
    AuthenticationError, Result,
};

/// Address the mock paymaster puts at the head of `paymasterAndData`.
pub const MOCK_PAYMASTER: Address = address!("00000f79b7faf42eebadba19acc07cd08af44789");

/// Gas limits the mock bundler estimates.
pub const ESTIMATED_GAS: GasLimits = GasLimits {
    call_gas_limit: U256::from_limbs([50_000, 0, 0, 0]),
    verification_gas_limit: U256::from_limbs([100_000, 0, 0, 0]),
    pre_verification_gas: U256::from_limbs([45_000, 0, 0, 0]),
};

/// Gas limits the mock paymaster signs over by default.
pub const SPONSORED_GAS: GasLimits = GasLimits {
    call_gas_limit: U256::from_limbs([61_000, 0, 0, 0]),
    verification_gas_limit: U256::from_limbs([120_000, 0, 0, 0]),
    pre_verification_gas: U256::from_limbs([48_000, 0, 0, 0]),
};

/// How the mock paymaster answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SponsorshipBehavior {
    /// Sponsors and returns the complete triple it signed over.
    Full(GasLimits),
    /// Sponsors the operation as received and returns only some limits.
    Partial(PartialGasLimits),
    /// Answers without `paymasterAndData`.
    NoPaymasterData,
    /// Fails with the given message.
    Reject(String),
}

#[derive(Debug)]
struct NetworkState {
    chain_id: u64,
    block_number: u64,
    gas_price: u128,
    priority_fee: u128,
    counts: HashMap<Address, U256>,
    nonces: HashMap<Address, U256>,
    deployed: HashSet<Address>,
    supported_entry_points: Vec<Address>,
    sponsorship: SponsorshipBehavior,
    signed_limits: Option<GasLimits>,
    pending_polls: usize,
    revert_next: bool,
    chain_down: bool,
    bundler_down: bool,
    paymaster_down: bool,
    estimate_error: Option<String>,
    send_error: Option<String>,
    mining: bool,
    reads: usize,
    estimates: usize,
    sponsor_calls: usize,
    submissions: Vec<UserOperation>,
    receipts: HashMap<B256, UserOperationReceipt>,
}

/// Shared state behind the doubles.
#[derive(Debug, Clone)]
pub struct MockNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl MockNetwork {
    /// Creates a network for `chain_id` with one supported entry point and full sponsorship.
    pub fn new(chain_id: u64) -> Self {
        let state = NetworkState {
            chain_id,
            block_number: 100,
            gas_price: 2_000_000_000,
            priority_fee: 1_500_000_000,
            counts: HashMap::new(),
            nonces: HashMap::new(),
            deployed: HashSet::new(),
            supported_entry_points: vec![ENTRY_POINT_V06],
            sponsorship: SponsorshipBehavior::Full(SPONSORED_GAS),
            signed_limits: None,
            pending_polls: 0,
            revert_next: false,
            chain_down: false,
            bundler_down: false,
            paymaster_down: false,
            estimate_error: None,
            send_error: None,
            mining: false,
            reads: 0,
            estimates: 0,
            sponsor_calls: 0,
            submissions: Vec::new(),
            receipts: HashMap::new(),
        };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    fn state(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap()
    }

    /// Deploys a counter contract holding `value`.
    pub fn with_counter(self, counter: Address, value: u64) -> Self {
        self.state().counts.insert(counter, U256::from(value));
        self
    }

    /// Sets how the paymaster answers.
    pub fn with_sponsorship(self, sponsorship: SponsorshipBehavior) -> Self {
        self.set_sponsorship(sponsorship);
        self
    }

    /// Replaces the entry points the bundler advertises.
    pub fn with_supported_entry_points(self, entry_points: Vec<Address>) -> Self {
        self.state().supported_entry_points = entry_points;
        self
    }

    /// Number of receipt polls answered with `null` before the receipt shows up.
    pub fn with_pending_polls(self, polls: usize) -> Self {
        self.state().pending_polls = polls;
        self
    }

    /// Makes the bundler unreachable.
    pub fn with_bundler_down(self) -> Self {
        self.state().bundler_down = true;
        self
    }

    /// Makes the paymaster unreachable.
    pub fn with_paymaster_down(self) -> Self {
        self.state().paymaster_down = true;
        self
    }

    /// Advances the head by one block on every `eth_blockNumber` request.
    pub fn with_mining(self) -> Self {
        self.state().mining = true;
        self
    }

    /// Makes gas estimation fail with `message`, or succeed again with `None`.
    pub fn fail_estimates(&self, message: Option<&str>) {
        self.state().estimate_error = message.map(str::to_string);
    }

    /// Makes the bundler reject submissions with `message`, or accept them again with `None`.
    pub fn reject_sends(&self, message: Option<&str>) {
        self.state().send_error = message.map(str::to_string);
    }

    /// Sets how the paymaster answers.
    pub fn set_sponsorship(&self, sponsorship: SponsorshipBehavior) {
        self.state().sponsorship = sponsorship;
    }

    /// Makes every chain call fail.
    pub fn set_chain_down(&self, down: bool) {
        self.state().chain_down = down;
    }

    /// Makes the next included operation revert.
    pub fn revert_next(&self) {
        self.state().revert_next = true;
    }

    /// Current counter value.
    pub fn count(&self, counter: Address) -> U256 {
        self.state().counts.get(&counter).copied().unwrap_or_default()
    }

    /// Every operation accepted by the bundler.
    pub fn submissions(&self) -> Vec<UserOperation> {
        self.state().submissions.clone()
    }

    /// Number of `pm_sponsorUserOperation` calls.
    pub fn sponsor_calls(&self) -> usize {
        self.state().sponsor_calls
    }

    /// Number of `eth_estimateUserOperationGas` calls.
    pub fn estimates(&self) -> usize {
        self.state().estimates
    }

    /// Number of `eth_call` requests.
    pub fn reads(&self) -> usize {
        self.state().reads
    }

    /// Current head block.
    pub fn block_number(&self) -> u64 {
        self.state().block_number
    }

    /// Whether the account contract exists.
    pub fn is_deployed(&self, account: Address) -> bool {
        self.state().deployed.contains(&account)
    }

    /// The three doubles wired to this network.
    pub fn services(&self) -> Services<MockChain, MockBundler, MockPaymaster> {
        Services::new(
            MockChain { network: self.clone() },
            MockBundler { network: self.clone() },
            MockPaymaster { network: self.clone() },
        )
    }
}

fn rpc_error(message: &str) -> alloy_transport::TransportError {
    TransportErrorKind::custom_str(message)
}

/// Chain double. Answers `getCount`, `getNonce` and the factory address query.
#[derive(Debug, Clone)]
pub struct MockChain {
    network: MockNetwork,
}

impl MockChain {
    /// The address the mock factory derives. Any deterministic function of the query works.
    pub fn derive_address(factory: Address, query: &[u8]) -> Address {
        Address::from_slice(&keccak256([factory.as_slice(), query].concat())[12..])
    }
}

impl ChainRpc for MockChain {
    async fn chain_id(&self) -> RpcResult<u64> {
        Ok(self.network.state().chain_id)
    }

    async fn call(&self, to: Address, data: Bytes) -> RpcResult<Bytes> {
        let mut state = self.network.state();
        if state.chain_down {
            return Err(rpc_error("connection refused"));
        }
        state.reads += 1;
        let selector: [u8; 4] =
            data.get(..4).and_then(|s| s.try_into().ok()).ok_or_else(|| rpc_error("no selector"))?;
        match selector {
            ICounter::getCountCall::SELECTOR => {
                let count = state.counts.get(&to).ok_or_else(|| rpc_error("execution reverted"))?;
                Ok(count.abi_encode().into())
            }
            IEntryPoint::getNonceCall::SELECTOR => {
                let call = IEntryPoint::getNonceCall::abi_decode(&data, true)
                    .map_err(|e| rpc_error(&e.to_string()))?;
                Ok(state.nonces.get(&call.sender).copied().unwrap_or_default().abi_encode().into())
            }
            IAccountFactory::getAddressForCounterFactualAccountCall::SELECTOR => {
                Ok(Self::derive_address(to, &data).abi_encode().into())
            }
            _ => Err(rpc_error("execution reverted")),
        }
    }

    async fn get_code(&self, address: Address) -> RpcResult<Bytes> {
        let state = self.network.state();
        if state.chain_down {
            return Err(rpc_error("connection refused"));
        }
        let deployed = state.deployed.contains(&address) || state.counts.contains_key(&address);
        Ok(if deployed { Bytes::from_static(&[0x60, 0x80]) } else { Bytes::new() })
    }

    async fn gas_price(&self) -> RpcResult<u128> {
        Ok(self.network.state().gas_price)
    }

    async fn max_priority_fee_per_gas(&self) -> RpcResult<u128> {
        Ok(self.network.state().priority_fee)
    }

    async fn block_number(&self) -> RpcResult<u64> {
        let mut state = self.network.state();
        let head = state.block_number;
        if state.mining {
            state.block_number += 1;
        }
        Ok(head)
    }
}

/// Bundler double.
///
/// Rejects operations without paymaster data (`AA33`) or whose gas limits differ from the ones
/// the paymaster signed (`AA34`). Accepted operations execute immediately.
#[derive(Debug, Clone)]
pub struct MockBundler {
    network: MockNetwork,
}

impl BundlerRpc for MockBundler {
    async fn chain_id(&self) -> RpcResult<u64> {
        let state = self.network.state();
        if state.bundler_down {
            return Err(rpc_error("bundler unreachable"));
        }
        Ok(state.chain_id)
    }

    async fn supported_entry_points(&self) -> RpcResult<Vec<Address>> {
        let state = self.network.state();
        if state.bundler_down {
            return Err(rpc_error("bundler unreachable"));
        }
        Ok(state.supported_entry_points.clone())
    }

    async fn estimate_user_operation_gas(
        &self,
        op: &UserOperation,
        _entry_point: Address,
    ) -> RpcResult<GasLimits> {
        // Suspend once, like a network round trip.
        tokio::task::yield_now().await;
        let mut state = self.network.state();
        if let Some(message) = &state.estimate_error {
            return Err(rpc_error(message));
        }
        if op.signature.is_empty() {
            return Err(rpc_error("AA23 reverted: missing signature"));
        }
        state.estimates += 1;
        Ok(ESTIMATED_GAS)
    }

    async fn send_user_operation(
        &self,
        op: &UserOperation,
        entry_point: Address,
    ) -> RpcResult<B256> {
        let mut state = self.network.state();
        if let Some(message) = &state.send_error {
            return Err(rpc_error(message));
        }
        if op.paymaster_and_data.is_empty() {
            return Err(rpc_error("AA33 reverted: paymaster data missing"));
        }
        if let Some(signed) = state.signed_limits {
            if signed != op.gas_limits() {
                return Err(rpc_error("AA34 signature error"));
            }
        }
        let (signature, _module) = <(Bytes, Address)>::abi_decode_params(&op.signature, true)
            .map_err(|_| rpc_error("AA24 signature error"))?;
        if signature.as_ref() == DUMMY_ECDSA_SIGNATURE.as_slice() {
            return Err(rpc_error("AA24 signature error"));
        }
        let expected_nonce = state.nonces.get(&op.sender).copied().unwrap_or_default();
        if op.nonce != expected_nonce {
            return Err(rpc_error("AA25 invalid account nonce"));
        }

        let user_op_hash = op.hash(entry_point, state.chain_id);
        state.submissions.push(op.clone());
        state.nonces.insert(op.sender, expected_nonce + U256::from(1));
        if op.deploys_account() {
            state.deployed.insert(op.sender);
        }

        let success = !std::mem::take(&mut state.revert_next);
        if success {
            let call = ISmartAccount::execute_ncCCall::abi_decode(&op.call_data, true)
                .map_err(|e| rpc_error(&e.to_string()))?;
            if call.func.starts_with(ICounter::incrementCall::SELECTOR.as_slice()) {
                *state.counts.entry(call.dest).or_default() += U256::from(1);
            }
        }
        state.block_number += 1;
        let receipt = UserOperationReceipt {
            user_op_hash,
            sender: op.sender,
            nonce: op.nonce,
            success,
            reason: (!success).then(|| "execution reverted".to_string()),
            actual_gas_cost: U256::ZERO,
            actual_gas_used: op.call_gas_limit,
            receipt: InclusionReceipt {
                transaction_hash: keccak256(user_op_hash),
                block_number: state.block_number,
                block_hash: keccak256(state.block_number.to_be_bytes()),
            },
        };
        state.receipts.insert(user_op_hash, receipt);
        Ok(user_op_hash)
    }

    async fn get_user_operation_receipt(
        &self,
        user_op_hash: B256,
    ) -> RpcResult<Option<UserOperationReceipt>> {
        let mut state = self.network.state();
        if state.pending_polls > 0 {
            state.pending_polls -= 1;
            return Ok(None);
        }
        Ok(state.receipts.get(&user_op_hash).cloned())
    }
}

/// Paymaster double.
#[derive(Debug, Clone)]
pub struct MockPaymaster {
    network: MockNetwork,
}

impl PaymasterRpc for MockPaymaster {
    async fn health_check(&self) -> RpcResult<()> {
        if self.network.state().paymaster_down {
            return Err(rpc_error("paymaster unreachable"));
        }
        Ok(())
    }

    async fn sponsor_user_operation(
        &self,
        op: &UserOperation,
        _context: &SponsorshipContext,
    ) -> RpcResult<SponsorshipResponse> {
        let mut state = self.network.state();
        state.sponsor_calls += 1;
        if state.paymaster_down {
            return Err(rpc_error("paymaster unreachable"));
        }
        let paymaster_and_data: Bytes =
            [MOCK_PAYMASTER.as_slice(), keccak256(op.sender).as_slice()].concat().into();
        match state.sponsorship.clone() {
            SponsorshipBehavior::Full(limits) => {
                state.signed_limits = Some(limits);
                Ok(SponsorshipResponse { paymaster_and_data, gas_limits: limits.into() })
            }
            SponsorshipBehavior::Partial(gas_limits) => {
                state.signed_limits = Some(op.gas_limits());
                Ok(SponsorshipResponse { paymaster_and_data, gas_limits })
            }
            SponsorshipBehavior::NoPaymasterData => Ok(SponsorshipResponse::default()),
            SponsorshipBehavior::Reject(message) => Err(rpc_error(&message)),
        }
    }
}

/// A wallet whose user always abandons the flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct CancelledConnector;

impl WalletConnector for CancelledConnector {
    async fn connect(&self) -> Result<Session> {
        Err(AuthenticationError::Cancelled.into())
    }
}
