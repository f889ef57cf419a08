use serde::Serialize;
use std::fmt;

use crate::error::{DefiError, Result};

/// An EVM chain the tool knows how to talk to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chain {
    pub name: &'static str,
    pub id: u64,
    pub native_symbol: &'static str,
    pub default_rpc_url: &'static str,
    #[serde(skip)]
    aliases: &'static [&'static str],
}

impl Chain {
    /// CAIP-2 identifier, e.g. `eip155:1`.
    pub fn caip2(&self) -> String {
        format!("eip155:{}", self.id)
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

const CHAINS: &[Chain] = &[
    Chain {
        name: "ethereum",
        id: 1,
        native_symbol: "ETH",
        default_rpc_url: "https://eth.llamarpc.com",
        aliases: &["eth", "mainnet", "ethereum-mainnet"],
    },
    Chain {
        name: "optimism",
        id: 10,
        native_symbol: "ETH",
        default_rpc_url: "https://mainnet.optimism.io",
        aliases: &["op", "op-mainnet"],
    },
    Chain {
        name: "polygon",
        id: 137,
        native_symbol: "POL",
        default_rpc_url: "https://polygon-rpc.com",
        aliases: &["matic", "polygon-pos"],
    },
    Chain {
        name: "base",
        id: 8453,
        native_symbol: "ETH",
        default_rpc_url: "https://mainnet.base.org",
        aliases: &["base-mainnet"],
    },
    Chain {
        name: "arbitrum",
        id: 42161,
        native_symbol: "ETH",
        default_rpc_url: "https://arb1.arbitrum.io/rpc",
        aliases: &["arb", "arbitrum-one"],
    },
    Chain {
        name: "avalanche",
        id: 43114,
        native_symbol: "AVAX",
        default_rpc_url: "https://api.avax.network/ext/bc/C/rpc",
        aliases: &["avax", "avalanche-c"],
    },
];

/// Resolve a chain by name, alias, decimal id or CAIP-2 string.
pub fn resolve_chain(input: &str) -> Result<Chain> {
    let needle = input.trim().to_ascii_lowercase();
    if needle.is_empty() {
        return Err(DefiError::usage("chain is required"));
    }

    let by_id = needle
        .strip_prefix("eip155:")
        .unwrap_or(&needle)
        .parse::<u64>()
        .ok();

    CHAINS
        .iter()
        .find(|c| {
            by_id == Some(c.id) || c.name == needle || c.aliases.contains(&needle.as_str())
        })
        .cloned()
        .ok_or_else(|| DefiError::UnknownChain(input.trim().to_string()))
}
