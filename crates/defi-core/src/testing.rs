//! In-memory chain, signer and indexer fakes for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::{SolCall, SolValue};
use async_trait::async_trait;

use crate::chain::abi::IERC20;
use crate::chain::{ChainClient, ChainReader, ClientFactory, FeeEstimate, Signer, TxReceipt};
use crate::error::{DefiError, Result};
use crate::planner::morpho::{MorphoIndexer, MorphoMarket};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptMode {
    Success,
    Revert,
    Never,
}

struct State {
    responses: HashMap<(Address, [u8; 4]), Bytes>,
    chain_id: u64,
    simulate_error: Option<String>,
    receipt_mode: ReceiptMode,
    sent: Vec<Bytes>,
    nonce: u64,
}

/// A single-chain fake answering `eth_call` by (target, selector).
pub struct FakeChain {
    state: Mutex<State>,
    network_calls: AtomicUsize,
    after_send: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl FakeChain {
    pub fn new(chain_id: u64) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                responses: HashMap::new(),
                chain_id,
                simulate_error: None,
                receipt_mode: ReceiptMode::Success,
                sent: Vec::new(),
                nonce: 7,
            }),
            network_calls: AtomicUsize::new(0),
            after_send: Mutex::new(None),
        })
    }

    pub fn respond(&self, target: Address, selector: [u8; 4], data: impl Into<Bytes>) {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert((target, selector), data.into());
    }

    pub fn respond_allowance(&self, token: Address, allowance: U256) {
        self.respond(token, IERC20::allowanceCall::SELECTOR, allowance.abi_encode());
    }

    pub fn respond_address(&self, target: Address, selector: [u8; 4], value: Address) {
        self.respond(target, selector, value.abi_encode());
    }

    pub fn fail_simulation(&self, reason: &str) {
        self.state.lock().unwrap().simulate_error = Some(reason.to_string());
    }

    pub fn set_receipt_mode(&self, mode: ReceiptMode) {
        self.state.lock().unwrap().receipt_mode = mode;
    }

    /// Run `hook` once, right after the next broadcast is accepted.
    pub fn after_next_send(&self, hook: impl FnOnce() + Send + 'static) {
        *self.after_send.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn sent(&self) -> usize {
        self.state.lock().unwrap().sent.len()
    }

    pub fn network_calls(&self) -> usize {
        self.network_calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.network_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        self.touch();
        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| DefiError::unavailable("calldata too short"))?;
        self.state
            .lock()
            .unwrap()
            .responses
            .get(&(to, selector))
            .cloned()
            .ok_or_else(|| DefiError::unavailable(format!("no fake response for {to}")))
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn chain_id(&self) -> Result<u64> {
        self.touch();
        Ok(self.state.lock().unwrap().chain_id)
    }

    async fn simulate(&self, _tx: &TransactionRequest) -> Result<()> {
        self.touch();
        match &self.state.lock().unwrap().simulate_error {
            Some(reason) => Err(DefiError::unavailable(format!("simulation reverted: {reason}"))),
            None => Ok(()),
        }
    }

    async fn estimate_gas(&self, _tx: &TransactionRequest) -> Result<u64> {
        self.touch();
        Ok(100_000)
    }

    async fn fee_estimate(&self) -> Result<FeeEstimate> {
        self.touch();
        Ok(FeeEstimate {
            max_fee_per_gas: 30_000_000_000,
            max_priority_fee_per_gas: 1_000_000_000,
        })
    }

    async fn pending_nonce(&self, _address: Address) -> Result<u64> {
        self.touch();
        Ok(self.state.lock().unwrap().nonce)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256> {
        self.touch();
        {
            let mut state = self.state.lock().unwrap();
            state.sent.push(Bytes::copy_from_slice(raw));
            state.nonce += 1;
        }
        if let Some(hook) = self.after_send.lock().unwrap().take() {
            hook();
        }
        Ok(keccak256(raw))
    }

    async fn receipt(&self, _tx_hash: B256) -> Result<Option<TxReceipt>> {
        self.touch();
        Ok(match self.state.lock().unwrap().receipt_mode {
            ReceiptMode::Success => Some(TxReceipt {
                success: true,
                block_number: Some(100),
            }),
            ReceiptMode::Revert => Some(TxReceipt {
                success: false,
                block_number: Some(100),
            }),
            ReceiptMode::Never => None,
        })
    }
}

/// Hands out the same [`FakeChain`] for every RPC URL.
pub struct FakeFactory(pub Arc<FakeChain>);

impl ClientFactory for FakeFactory {
    fn reader(&self, _rpc_url: &str) -> Result<Arc<dyn ChainReader>> {
        Ok(self.0.clone())
    }

    fn client(&self, _rpc_url: &str) -> Result<Arc<dyn ChainClient>> {
        Ok(self.0.clone())
    }
}

/// Records signing requests and returns deterministic bytes.
pub struct FakeSigner {
    address: Address,
    signed: AtomicUsize,
    requests: Mutex<Vec<TransactionRequest>>,
}

impl FakeSigner {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            signed: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn signed(&self) -> usize {
        self.signed.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<TransactionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Signer for FakeSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_transaction(&self, tx: TransactionRequest) -> Result<Bytes> {
        let n = self.signed.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(tx);
        Ok(Bytes::from(vec![0x02, n as u8]))
    }
}

/// Serves a fixed market for every lookup.
pub struct FakeMorpho(pub Option<MorphoMarket>);

#[async_trait]
impl MorphoIndexer for FakeMorpho {
    async fn market_params(&self, _chain_id: u64, market_id: B256) -> Result<MorphoMarket> {
        self.0
            .clone()
            .ok_or_else(|| DefiError::unavailable(format!("morpho market {market_id} not found")))
    }
}
