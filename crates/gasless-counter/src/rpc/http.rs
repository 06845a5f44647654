//! JSON-RPC over HTTP implementations of the collaborator traits.

use alloy_eips::BlockNumberOrTag;
use alloy_primitives::{Address, Bytes, TxKind, B256, U128, U64};
use alloy_rpc_client::{ClientBuilder, RpcClient};
use alloy_rpc_types_eth::{TransactionInput, TransactionRequest};
use tracing::trace;
use url::Url;

use super::{
    BundlerRpc, ChainRpc, PaymasterRpc, RpcResult, SponsorshipContext, SponsorshipResponse,
    UserOperationReceipt,
};
use crate::user_op::{GasLimits, UserOperation};

fn http_client(url: Url) -> RpcClient {
    ClientBuilder::default().http(url)
}

/// Chain JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct HttpChain {
    client: RpcClient,
    url: Url,
}

impl HttpChain {
    /// Connects to a chain RPC endpoint.
    pub fn new(url: Url) -> Self {
        Self { client: http_client(url.clone()), url }
    }

    /// The endpoint URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl ChainRpc for HttpChain {
    async fn chain_id(&self) -> RpcResult<u64> {
        let id: U64 = self.client.request_noparams("eth_chainId").await?;
        Ok(id.to())
    }

    async fn call(&self, to: Address, data: Bytes) -> RpcResult<Bytes> {
        trace!(%to, data = %data, "eth_call");
        let tx = TransactionRequest {
            to: Some(TxKind::Call(to)),
            input: TransactionInput::both(data),
            ..Default::default()
        };
        self.client.request("eth_call", (tx, BlockNumberOrTag::Latest)).await
    }

    async fn get_code(&self, address: Address) -> RpcResult<Bytes> {
        self.client.request("eth_getCode", (address, BlockNumberOrTag::Latest)).await
    }

    async fn gas_price(&self) -> RpcResult<u128> {
        let price: U128 = self.client.request_noparams("eth_gasPrice").await?;
        Ok(price.to())
    }

    async fn max_priority_fee_per_gas(&self) -> RpcResult<u128> {
        let fee: U128 = self.client.request_noparams("eth_maxPriorityFeePerGas").await?;
        Ok(fee.to())
    }

    async fn block_number(&self) -> RpcResult<u64> {
        let number: U64 = self.client.request_noparams("eth_blockNumber").await?;
        Ok(number.to())
    }
}

/// Bundler JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct HttpBundler {
    client: RpcClient,
    url: Url,
}

impl HttpBundler {
    /// Connects to a bundler endpoint.
    pub fn new(url: Url) -> Self {
        Self { client: http_client(url.clone()), url }
    }

    /// The endpoint URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl BundlerRpc for HttpBundler {
    async fn chain_id(&self) -> RpcResult<u64> {
        let id: U64 = self.client.request_noparams("eth_chainId").await?;
        Ok(id.to())
    }

    async fn supported_entry_points(&self) -> RpcResult<Vec<Address>> {
        self.client.request_noparams("eth_supportedEntryPoints").await
    }

    async fn estimate_user_operation_gas(
        &self,
        op: &UserOperation,
        entry_point: Address,
    ) -> RpcResult<GasLimits> {
        trace!(sender = %op.sender, nonce = %op.nonce, "eth_estimateUserOperationGas");
        self.client.request("eth_estimateUserOperationGas", (op.clone(), entry_point)).await
    }

    async fn send_user_operation(
        &self,
        op: &UserOperation,
        entry_point: Address,
    ) -> RpcResult<B256> {
        trace!(sender = %op.sender, nonce = %op.nonce, "eth_sendUserOperation");
        self.client.request("eth_sendUserOperation", (op.clone(), entry_point)).await
    }

    async fn get_user_operation_receipt(
        &self,
        user_op_hash: B256,
    ) -> RpcResult<Option<UserOperationReceipt>> {
        self.client.request("eth_getUserOperationReceipt", (user_op_hash,)).await
    }
}

/// Paymaster JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct HttpPaymaster {
    client: RpcClient,
    url: Url,
}

impl HttpPaymaster {
    /// Connects to a paymaster endpoint.
    pub fn new(url: Url) -> Self {
        Self { client: http_client(url.clone()), url }
    }

    /// The endpoint URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl PaymasterRpc for HttpPaymaster {
    async fn health_check(&self) -> RpcResult<()> {
        // Paymasters only serve `pm_*` methods: a JSON-RPC error answer still proves liveness.
        match self.client.request_noparams::<U64>("eth_chainId").await {
            Ok(_) => Ok(()),
            Err(e) if e.is_error_resp() => {
                trace!(url = %self.url, %e, "Paymaster answered health check with an error");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn sponsor_user_operation(
        &self,
        op: &UserOperation,
        context: &SponsorshipContext,
    ) -> RpcResult<SponsorshipResponse> {
        trace!(sender = %op.sender, mode = ?context.mode, "pm_sponsorUserOperation");
        self.client.request("pm_sponsorUserOperation", (op.clone(), context.clone())).await
    }
}
