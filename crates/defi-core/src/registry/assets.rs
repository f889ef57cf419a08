use alloy::primitives::{address, Address};
use serde::Serialize;

use super::chains::Chain;
use crate::error::{DefiError, Result};

/// An ERC-20 token on a specific chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    pub symbol: String,
    pub address: Address,
    /// Unknown for raw addresses that are not in the built-in table.
    pub decimals: Option<u8>,
    pub chain_id: u64,
}

impl Asset {
    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = Some(decimals);
        self
    }
}

struct KnownToken {
    chain_id: u64,
    symbol: &'static str,
    address: Address,
    decimals: u8,
}

const fn token(chain_id: u64, symbol: &'static str, address: Address, decimals: u8) -> KnownToken {
    KnownToken {
        chain_id,
        symbol,
        address,
        decimals,
    }
}

const TOKENS: &[KnownToken] = &[
    // ethereum
    token(1, "USDC", address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"), 6),
    token(1, "USDT", address!("dac17f958d2ee523a2206206994597c13d831ec7"), 6),
    token(1, "DAI", address!("6b175474e89094c44da98b954eedeac495271d0f"), 18),
    token(1, "WETH", address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"), 18),
    token(1, "WBTC", address!("2260fac5e5542a773aa44fbcfedf7c193bc2c599"), 8),
    token(1, "AAVE", address!("7fc66500c84a76ad7e9c93437bfc5ac33e2ddae9"), 18),
    // optimism
    token(10, "USDC", address!("0b2c639c533813f4aa9d7837caf62653d097ff85"), 6),
    token(10, "WETH", address!("4200000000000000000000000000000000000006"), 18),
    token(10, "OP", address!("4200000000000000000000000000000000000042"), 18),
    // polygon
    token(137, "USDC", address!("3c499c542cef5e3811e1192ce70d8cc03d5c3359"), 6),
    token(137, "WETH", address!("7ceb23fd6bc0add59e62ac25578270cff1b9f619"), 18),
    token(137, "WPOL", address!("0d500b1d8e8ef31e21c99d1db9a6444d3adf1270"), 18),
    // base
    token(8453, "USDC", address!("833589fcd6edb6e08f4c7c32d4f71b54bda02913"), 6),
    token(8453, "WETH", address!("4200000000000000000000000000000000000006"), 18),
    // arbitrum
    token(42161, "USDC", address!("af88d065e77c8cc2239327c5edb3a432268e5831"), 6),
    token(42161, "USDT", address!("fd086bc7cd5c481dcc9c85ebe478a1c0b69fcbb9"), 6),
    token(42161, "WETH", address!("82af49447d8a07e3bd95bd0d56f35241523fbab1"), 18),
    token(42161, "ARB", address!("912ce59144191c1204e64559fe8253a0e49e6548"), 18),
    // avalanche
    token(43114, "USDC", address!("b97ef9ef8734c71904d8002f8b6bc66dd9c48a6e"), 6),
    token(43114, "WAVAX", address!("b31f66aa3c1e785363f0875a1b74e27b85fd66c7"), 18),
];

/// Resolve a symbol (case-insensitive) or `0x` address on `chain`.
pub fn resolve_asset(input: &str, chain: &Chain) -> Result<Asset> {
    let needle = input.trim();
    if needle.is_empty() {
        return Err(DefiError::usage("asset is required"));
    }

    if needle.starts_with("0x") || needle.starts_with("0X") {
        let address = parse_address("asset", needle)?;
        let known = TOKENS
            .iter()
            .find(|t| t.chain_id == chain.id && t.address == address);
        return Ok(match known {
            Some(t) => to_asset(t),
            None => Asset {
                symbol: address.to_string(),
                address,
                decimals: None,
                chain_id: chain.id,
            },
        });
    }

    TOKENS
        .iter()
        .find(|t| t.chain_id == chain.id && t.symbol.eq_ignore_ascii_case(needle))
        .map(to_asset)
        .ok_or_else(|| DefiError::UnknownAsset {
            asset: needle.to_string(),
            chain: chain.name.to_string(),
        })
}

fn to_asset(t: &KnownToken) -> Asset {
    Asset {
        symbol: t.symbol.to_string(),
        address: t.address,
        decimals: Some(t.decimals),
        chain_id: t.chain_id,
    }
}

/// Parse a hex address, reporting `field` in the usage error.
pub fn parse_address(field: &str, value: &str) -> Result<Address> {
    let v = value.trim();
    let invalid = || DefiError::InvalidAddress {
        field: field.to_string(),
        value: v.to_string(),
    };
    if v.len() != 42 || !(v.starts_with("0x") || v.starts_with("0X")) {
        return Err(invalid());
    }
    v.parse::<Address>().map_err(|_| invalid())
}
