use std::str::FromStr;

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;

use crate::error::{DefiError, Result};

/// Signs fully populated transactions for the engine.
#[async_trait]
pub trait Signer: Send + Sync {
    fn address(&self) -> Address;

    /// Return the EIP-2718 encoded signed transaction.
    async fn sign_transaction(&self, tx: TransactionRequest) -> Result<Bytes>;
}

/// In-process signer backed by a raw secp256k1 key.
#[derive(Clone)]
pub struct LocalSigner {
    wallet: EthereumWallet,
    address: Address,
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl LocalSigner {
    /// Parse a hex private key, with or without the `0x` prefix.
    pub fn from_private_key(key: &str) -> Result<Self> {
        let key = key.trim();
        if key.is_empty() {
            return Err(DefiError::signer("private key is empty"));
        }
        let inner = PrivateKeySigner::from_str(key)
            .map_err(|_| DefiError::signer("private key is not a valid 32-byte hex secret"))?;
        let address = inner.address();
        Ok(Self {
            wallet: EthereumWallet::from(inner),
            address,
        })
    }
}

#[async_trait]
impl Signer for LocalSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_transaction(&self, tx: TransactionRequest) -> Result<Bytes> {
        let envelope = tx
            .with_from(self.address)
            .build(&self.wallet)
            .await
            .map_err(|e| DefiError::signer(format!("failed to sign transaction: {e}")))?;
        Ok(Bytes::from(envelope.encoded_2718()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, U256};

    // Well-known anvil account #0.
    const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn derives_address_from_key() {
        let signer = LocalSigner::from_private_key(ANVIL_KEY).unwrap();
        assert_eq!(
            signer.address(),
            address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266")
        );
        let bare = LocalSigner::from_private_key(ANVIL_KEY.trim_start_matches("0x")).unwrap();
        assert_eq!(bare.address(), signer.address());
    }

    #[test]
    fn rejects_bad_keys() {
        let err = LocalSigner::from_private_key("0x1234").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Signer);
        assert!(LocalSigner::from_private_key("  ").is_err());
    }

    #[tokio::test]
    async fn signs_eip1559_transaction() {
        let signer = LocalSigner::from_private_key(ANVIL_KEY).unwrap();
        let tx = TransactionRequest::default()
            .with_to(Address::repeat_byte(0x42))
            .with_value(U256::from(1u64))
            .with_nonce(0)
            .with_chain_id(1)
            .with_gas_limit(21_000)
            .with_max_fee_per_gas(30_000_000_000)
            .with_max_priority_fee_per_gas(1_000_000_000);
        let raw = signer.sign_transaction(tx).await.unwrap();
        // EIP-1559 typed envelope
        assert_eq!(raw[0], 0x02);
    }
}
