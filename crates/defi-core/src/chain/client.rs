//! Read and write access to an EVM JSON-RPC endpoint.
//!
//! Planners only need [`ChainReader`]; the engine needs the full
//! [`ChainClient`]. Both are handed out by a [`ClientFactory`] keyed by RPC
//! URL so tests can swap the network for an in-memory fake.

use std::fmt;
use std::sync::Arc;

use alloy::network::{Ethereum, ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::TransactionRequest;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::{DefiError, Result};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ChainReader: Send + Sync {
    /// `eth_call` against the latest block.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;
}

/// EIP-1559 fee pair in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    pub success: bool,
    pub block_number: Option<u64>,
}

#[async_trait]
pub trait ChainClient: ChainReader {
    async fn chain_id(&self) -> Result<u64>;

    /// Dry-run `tx` with `eth_call`; a revert is returned as an error.
    async fn simulate(&self, tx: &TransactionRequest) -> Result<()>;

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64>;

    async fn fee_estimate(&self) -> Result<FeeEstimate>;

    async fn pending_nonce(&self, address: Address) -> Result<u64>;

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256>;

    /// `None` while the transaction is not yet mined.
    async fn receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>>;
}

pub trait ClientFactory: Send + Sync {
    fn reader(&self, rpc_url: &str) -> Result<Arc<dyn ChainReader>>;
    fn client(&self, rpc_url: &str) -> Result<Arc<dyn ChainClient>>;
}

// ---------------------------------------------------------------------------
// Alloy HTTP implementation
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct RpcClient {
    provider: RootProvider<Ethereum>,
    url: String,
}

impl fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcClient").field("url", &self.url).finish()
    }
}

impl RpcClient {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let url: Url = rpc_url
            .trim()
            .parse()
            .map_err(|e| DefiError::usage(format!("invalid RPC URL '{rpc_url}': {e}")))?;
        Ok(Self {
            provider: RootProvider::<Ethereum>::new_http(url),
            url: rpc_url.trim().to_string(),
        })
    }

    fn rpc_error(&self, method: &str, err: impl fmt::Display) -> DefiError {
        DefiError::unavailable(format!("{method} via {} failed: {err}", self.url))
    }
}

#[async_trait]
impl ChainReader for RpcClient {
    #[instrument(level = "debug", skip(self, data), fields(url = %self.url))]
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let tx = TransactionRequest::default().with_to(to).with_input(data);
        self.provider
            .call(tx)
            .await
            .map_err(|e| self.rpc_error("eth_call", e))
    }
}

#[async_trait]
impl ChainClient for RpcClient {
    #[instrument(level = "debug", skip(self), fields(url = %self.url))]
    async fn chain_id(&self) -> Result<u64> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| self.rpc_error("eth_chainId", e))
    }

    #[instrument(level = "debug", skip(self, tx), fields(url = %self.url))]
    async fn simulate(&self, tx: &TransactionRequest) -> Result<()> {
        self.provider
            .call(tx.clone())
            .await
            .map(|_| ())
            .map_err(|e| DefiError::unavailable(format!("simulation reverted: {e}")))
    }

    #[instrument(level = "debug", skip(self, tx), fields(url = %self.url))]
    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64> {
        self.provider
            .estimate_gas(tx.clone())
            .await
            .map_err(|e| self.rpc_error("eth_estimateGas", e))
    }

    #[instrument(level = "debug", skip(self), fields(url = %self.url))]
    async fn fee_estimate(&self) -> Result<FeeEstimate> {
        let est = self
            .provider
            .estimate_eip1559_fees()
            .await
            .map_err(|e| self.rpc_error("fee estimation", e))?;
        debug!(
            max_fee = est.max_fee_per_gas,
            priority = est.max_priority_fee_per_gas,
            "node fee estimate"
        );
        Ok(FeeEstimate {
            max_fee_per_gas: est.max_fee_per_gas,
            max_priority_fee_per_gas: est.max_priority_fee_per_gas,
        })
    }

    #[instrument(level = "debug", skip(self), fields(url = %self.url))]
    async fn pending_nonce(&self, address: Address) -> Result<u64> {
        self.provider
            .get_transaction_count(address)
            .pending()
            .await
            .map_err(|e| self.rpc_error("eth_getTransactionCount", e))
    }

    #[instrument(level = "debug", skip(self, raw), fields(url = %self.url))]
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| self.rpc_error("eth_sendRawTransaction", e))?;
        Ok(*pending.tx_hash())
    }

    #[instrument(level = "debug", skip(self), fields(url = %self.url))]
    async fn receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| self.rpc_error("eth_getTransactionReceipt", e))?;
        Ok(receipt.map(|r| TxReceipt {
            success: r.status(),
            block_number: r.block_number(),
        }))
    }
}

/// Opens a fresh HTTP provider per RPC URL.
#[derive(Debug, Default, Clone)]
pub struct AlloyClientFactory;

impl ClientFactory for AlloyClientFactory {
    fn reader(&self, rpc_url: &str) -> Result<Arc<dyn ChainReader>> {
        Ok(Arc::new(RpcClient::new(rpc_url)?))
    }

    fn client(&self, rpc_url: &str) -> Result<Arc<dyn ChainClient>> {
        Ok(Arc::new(RpcClient::new(rpc_url)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_rpc_url() {
        let err = RpcClient::new("not a url").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Usage);
    }

    #[test]
    fn factory_accepts_http_urls() {
        let factory = AlloyClientFactory;
        assert!(factory.reader("http://127.0.0.1:8545").is_ok());
        assert!(factory.client("https://mainnet.base.org").is_ok());
    }
}
