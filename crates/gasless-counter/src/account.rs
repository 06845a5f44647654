//! Smart account resolution and user operation assembly.
//!
//! The account address is counterfactual: it is derived from the factory, the validation module
//! setup data and an index, and the contract is deployed by the first operation through
//! `initCode`.

use std::sync::Arc;

use alloy_primitives::{aliases::U192, Address, Bytes, U256};
use alloy_signer::Signer;
use alloy_sol_types::{SolCall, SolValue};
use tracing::{debug, info};
use url::Url;

use crate::{
    chain::{parse_endpoint, ChainConfig},
    constants::{
        account::{
            ACCOUNT_FACTORY_V2, DEFAULT_ACCOUNT_INDEX, DUMMY_ECDSA_SIGNATURE,
            ECDSA_OWNERSHIP_MODULE,
        },
        entry_point::{DEFAULT_NONCE_KEY, ENTRY_POINT_V06},
    },
    contracts::{Call, IAccountFactory, IEcdsaOwnershipModule, IEntryPoint},
    rpc::{BundlerRpc, ChainRpc, PaymasterRpc, Services},
    user_op::UserOperation,
    wallet::Session,
    AccountResolutionError, GaslessError, Result,
};

/// How ownership of the smart account is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStrategy {
    /// A single EOA owner verified by the ECDSA ownership module.
    EcdsaOwnership {
        /// The module contract
        module: Address,
    },
}

impl Default for ValidationStrategy {
    fn default() -> Self {
        Self::EcdsaOwnership { module: ECDSA_OWNERSHIP_MODULE }
    }
}

impl ValidationStrategy {
    /// The validation module contract.
    pub fn module(&self) -> Address {
        match self {
            Self::EcdsaOwnership { module } => *module,
        }
    }

    /// Calldata the factory forwards to the module when deploying the account.
    pub fn setup_data(&self, owner: Address) -> Bytes {
        match self {
            Self::EcdsaOwnership { .. } => {
                IEcdsaOwnershipModule::initForSmartAccountCall { eoaOwner: owner }
                    .abi_encode()
                    .into()
            }
        }
    }

    /// Wraps a raw module signature the way the account's validation expects it.
    pub fn wrap_signature(&self, module_signature: &[u8]) -> Bytes {
        (Bytes::copy_from_slice(module_signature), self.module()).abi_encode_params().into()
    }

    /// A placeholder signature with the right shape, used for gas estimation.
    pub fn dummy_signature(&self) -> Bytes {
        self.wrap_signature(&DUMMY_ECDSA_SIGNATURE)
    }
}

/// Configuration of the smart account: where to relay and how ownership is validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountConfig {
    /// Bundler endpoint
    pub bundler_url: Url,
    /// Paymaster endpoint
    pub paymaster_url: Url,
    /// The ERC-4337 entry point
    pub entry_point: Address,
    /// The account factory
    pub factory: Address,
    /// Ownership validation
    pub validation: ValidationStrategy,
    /// Account index passed to the factory
    pub index: U256,
}

impl AccountConfig {
    /// Creates the default configuration for the given endpoints.
    pub fn new(bundler_url: Url, paymaster_url: Url) -> Self {
        Self {
            bundler_url,
            paymaster_url,
            entry_point: ENTRY_POINT_V06,
            factory: ACCOUNT_FACTORY_V2,
            validation: ValidationStrategy::default(),
            index: U256::from(DEFAULT_ACCOUNT_INDEX),
        }
    }

    /// Creates the default configuration of the hosted bundler and paymaster of a chain.
    pub fn for_chain(chain_id: u64, bundler_key: &str, paymaster_key: &str) -> Result<Self> {
        Ok(Self::new(
            crate::chain::bundler_url(chain_id, bundler_key)?,
            crate::chain::paymaster_url(chain_id, paymaster_key)?,
        ))
    }

    /// Sets the bundler endpoint.
    pub fn with_bundler(mut self, bundler_url: Url) -> Self {
        self.bundler_url = bundler_url;
        self
    }

    /// Sets the paymaster endpoint.
    pub fn with_paymaster(mut self, paymaster_url: Url) -> Self {
        self.paymaster_url = paymaster_url;
        self
    }

    /// Sets the ownership validation module.
    pub fn with_validation_module(mut self, module: Address) -> Self {
        self.validation = ValidationStrategy::EcdsaOwnership { module };
        self
    }

    /// Sets the entry point.
    pub fn with_entry_point(mut self, entry_point: Address) -> Self {
        self.entry_point = entry_point;
        self
    }

    /// Sets the account factory.
    pub fn with_factory(mut self, factory: Address) -> Self {
        self.factory = factory;
        self
    }

    /// Sets the account index.
    pub fn with_index(mut self, index: U256) -> Self {
        self.index = index;
        self
    }

    /// Init code deploying the account for `owner`: factory address followed by the deploy call.
    pub fn init_code(&self, owner: Address) -> Bytes {
        let deploy = IAccountFactory::deployCounterFactualAccountCall {
            moduleSetupContract: self.validation.module(),
            moduleSetupData: self.validation.setup_data(owner),
            index: self.index,
        }
        .abi_encode();
        [self.factory.as_slice(), deploy.as_slice()].concat().into()
    }
}

/// A resolved smart account. Immutable once created.
#[derive(Clone, derive_more::Debug)]
pub struct AccountHandle {
    address: Address,
    owner: Address,
    #[debug(ignore)]
    signer: Arc<dyn Signer + Send + Sync>,
    chain_id: u64,
    entry_point: Address,
    validation: ValidationStrategy,
    init_code: Bytes,
    bundler_url: Url,
    paymaster_url: Url,
}

/// Resolves the smart account of a session.
///
/// Deterministic: the same owner, chain and configuration always resolve to the same address.
/// Both the bundler and the paymaster must answer. Failures are surfaced as
/// [`AccountResolutionError`] and never retried.
pub async fn resolve<C, B, P>(
    chain: &ChainConfig,
    session: &Session,
    config: &AccountConfig,
    services: &Services<C, B, P>,
) -> Result<AccountHandle>
where
    C: ChainRpc,
    B: BundlerRpc,
    P: PaymasterRpc,
{
    if !chain.is_supported() {
        return Err(AccountResolutionError::UnsupportedChain(chain.chain_id).into());
    }
    if session.chain_id() != chain.chain_id {
        return Err(AccountResolutionError::ChainMismatch {
            expected: chain.chain_id,
            actual: session.chain_id(),
            source_name: "wallet",
        }
        .into());
    }
    // Both endpoints must be well-formed before anything is sent.
    parse_endpoint(config.bundler_url.as_str())?;
    parse_endpoint(config.paymaster_url.as_str())?;

    let unreachable_err = |endpoint: &'static str| {
        move |e: alloy_transport::TransportError| AccountResolutionError::Unreachable {
            endpoint,
            reason: e.to_string(),
        }
    };

    let bundler_chain_id = services.bundler.chain_id().await.map_err(unreachable_err("bundler"))?;
    if bundler_chain_id != chain.chain_id {
        return Err(AccountResolutionError::ChainMismatch {
            expected: chain.chain_id,
            actual: bundler_chain_id,
            source_name: "bundler",
        }
        .into());
    }
    let entry_points =
        services.bundler.supported_entry_points().await.map_err(unreachable_err("bundler"))?;
    if !entry_points.contains(&config.entry_point) {
        return Err(AccountResolutionError::EntryPointNotSupported(config.entry_point).into());
    }
    debug!(bundler = %config.bundler_url, entry_point = %config.entry_point, "Bundler checked");

    services.paymaster.health_check().await.map_err(unreachable_err("paymaster"))?;
    debug!(paymaster = %config.paymaster_url, "Paymaster reachable");

    let owner = session.owner();
    let query = IAccountFactory::getAddressForCounterFactualAccountCall {
        moduleSetupContract: config.validation.module(),
        moduleSetupData: config.validation.setup_data(owner),
        index: config.index,
    };
    let output = services
        .chain
        .call(config.factory, query.abi_encode().into())
        .await
        .map_err(unreachable_err("chain"))?;
    let address = IAccountFactory::getAddressForCounterFactualAccountCall::abi_decode_returns(
        &output, true,
    )
    .map_err(|e| AccountResolutionError::Derivation(e.to_string()))?
    ._account;
    if address.is_zero() {
        return Err(
            AccountResolutionError::Derivation("factory returned the zero address".into()).into()
        );
    }

    info!(%owner, account = %address, chain_id = chain.chain_id, "Smart account resolved");

    Ok(AccountHandle {
        address,
        owner,
        signer: session.signer(),
        chain_id: chain.chain_id,
        entry_point: config.entry_point,
        validation: config.validation,
        init_code: config.init_code(owner),
        bundler_url: config.bundler_url.clone(),
        paymaster_url: config.paymaster_url.clone(),
    })
}

impl AccountHandle {
    /// The counterfactual account address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The EOA owning the account.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// The chain the account lives on.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// The entry point operations are submitted to.
    pub fn entry_point(&self) -> Address {
        self.entry_point
    }

    /// The ownership validation strategy.
    pub fn validation(&self) -> ValidationStrategy {
        self.validation
    }

    /// The bound bundler endpoint.
    pub fn bundler_url(&self) -> &Url {
        &self.bundler_url
    }

    /// The bound paymaster endpoint.
    pub fn paymaster_url(&self) -> &Url {
        &self.paymaster_url
    }

    /// Whether the account contract exists on chain.
    pub async fn is_deployed<C: ChainRpc>(&self, chain: &C) -> Result<bool> {
        let code = chain.get_code(self.address).await?;
        Ok(!code.is_empty())
    }

    /// Assembles a nonce-stamped, gas-estimated operation for a single call.
    ///
    /// The returned operation carries a placeholder signature and no paymaster data.
    pub async fn build_user_op<C, B>(
        &self,
        call: &Call,
        chain: &C,
        bundler: &B,
    ) -> Result<UserOperation>
    where
        C: ChainRpc,
        B: BundlerRpc,
    {
        let build_err = |what: &str| {
            let what = what.to_string();
            move |e: alloy_transport::TransportError| {
                GaslessError::UserOpBuild(format!("{what}: {e}"))
            }
        };

        let nonce_query =
            IEntryPoint::getNonceCall { sender: self.address, key: U192::from(DEFAULT_NONCE_KEY) };
        let output = chain
            .call(self.entry_point, nonce_query.abi_encode().into())
            .await
            .map_err(build_err("nonce"))?;
        let nonce = IEntryPoint::getNonceCall::abi_decode_returns(&output, true)
            .map_err(|e| GaslessError::UserOpBuild(format!("nonce: {e}")))?
            .nonce;

        let deployed = !chain.get_code(self.address).await.map_err(build_err("code"))?.is_empty();
        let init_code = if deployed { Bytes::new() } else { self.init_code.clone() };

        let gas_price = chain.gas_price().await.map_err(build_err("gas price"))?;
        let priority_fee =
            chain.max_priority_fee_per_gas().await.map_err(build_err("priority fee"))?;

        let mut op = UserOperation {
            sender: self.address,
            nonce,
            init_code,
            call_data: call.to_account_call_data(),
            max_fee_per_gas: U256::from(gas_price.max(priority_fee)),
            max_priority_fee_per_gas: U256::from(priority_fee),
            signature: self.validation.dummy_signature(),
            ..Default::default()
        };

        let limits = bundler
            .estimate_user_operation_gas(&op, self.entry_point)
            .await
            .map_err(build_err("gas estimation"))?;
        op.set_gas_limits(limits);

        debug!(
            sender = %op.sender,
            nonce = %op.nonce,
            deploys_account = op.deploys_account(),
            call_gas_limit = %op.call_gas_limit,
            verification_gas_limit = %op.verification_gas_limit,
            pre_verification_gas = %op.pre_verification_gas,
            "User operation built"
        );
        Ok(op)
    }

    /// Signs the operation hash with the owner key and stores the wrapped signature.
    pub async fn sign_user_op(&self, op: &mut UserOperation) -> Result<()> {
        let hash = op.hash(self.entry_point, self.chain_id);
        let signature = self
            .signer
            .sign_message(hash.as_slice())
            .await
            .map_err(|e| GaslessError::Submission(format!("signing failed: {e}")))?;
        op.signature = self.validation.wrap_signature(&signature.as_bytes());
        debug!(user_op_hash = %hash, "User operation signed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_init_code_starts_with_factory() {
        let config = AccountConfig::for_chain(80001, "bundler", "paymaster").unwrap();
        let owner = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        let init_code = config.init_code(owner);
        assert_eq!(&init_code[..20], ACCOUNT_FACTORY_V2.as_slice());
        assert_eq!(
            &init_code[20..24],
            IAccountFactory::deployCounterFactualAccountCall::SELECTOR.as_slice()
        );
        assert_ne!(init_code, config.init_code(Address::ZERO));
    }

    #[test]
    fn test_signature_wrapping_carries_module() {
        let strategy = ValidationStrategy::default();
        let wrapped = strategy.dummy_signature();
        let (signature, module) = <(Bytes, Address)>::abi_decode_params(&wrapped, true).unwrap();
        assert_eq!(module, ECDSA_OWNERSHIP_MODULE);
        assert_eq!(signature.as_ref(), DUMMY_ECDSA_SIGNATURE.as_slice());
    }

    #[test]
    fn test_builder_overrides() {
        let module = address!("0000000000000000000000000000000000000abc");
        let config = AccountConfig::for_chain(80001, "b", "p")
            .unwrap()
            .with_validation_module(module)
            .with_index(U256::from(7));
        assert_eq!(config.validation.module(), module);
        assert_eq!(config.index, U256::from(7));
        assert_eq!(config.entry_point, ENTRY_POINT_V06);
    }
}
