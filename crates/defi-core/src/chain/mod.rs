//! Chain access: contract bindings, RPC client traits and transaction signing.

pub mod abi;
pub mod client;
pub mod signer;

pub use client::{
    AlloyClientFactory, ChainClient, ChainReader, ClientFactory, FeeEstimate, RpcClient, TxReceipt,
};
pub use signer::{LocalSigner, Signer};
