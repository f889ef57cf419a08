//! Protocol planners: user intent → persisted-ready [`Action`](crate::action::Action).
//!
//! Planners validate input, run read-only discovery calls (pool lookups,
//! allowances, indexer queries) and encode calldata. They never sign or
//! broadcast.

pub mod approval;
pub mod lend;
pub mod morpho;
pub mod rewards;

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;

use crate::chain::{AlloyClientFactory, ChainReader, ClientFactory};
use crate::config::Config;
use crate::error::{DefiError, Result};
use crate::registry::{normalize_amount, parse_address, resolve_asset, Asset, Chain};

pub use approval::ApprovalRequest;
pub use lend::{AaveLendPlanner, LendPlanner, LendRequest, MorphoLendPlanner};
pub use morpho::{MorphoApi, MorphoIndexer, MorphoMarket};
pub use rewards::{ClaimRequest, CompoundRequest};

// ---------------------------------------------------------------------------
// PlanContext
// ---------------------------------------------------------------------------

/// Everything a planner may consult, built once per process.
#[derive(Clone)]
pub struct PlanContext {
    pub clients: Arc<dyn ClientFactory>,
    pub morpho: Arc<dyn MorphoIndexer>,
    pub config: Config,
}

impl PlanContext {
    /// Live context: alloy HTTP providers and the Morpho GraphQL API.
    pub fn new(config: Config) -> Result<Self> {
        let morpho = MorphoApi::new(
            &config.providers.morpho_api_url,
            Duration::from_secs(config.providers.http_timeout_secs),
        )?;
        Ok(Self {
            clients: Arc::new(AlloyClientFactory),
            morpho: Arc::new(morpho),
            config,
        })
    }

    pub fn with_clients(
        config: Config,
        clients: Arc<dyn ClientFactory>,
        morpho: Arc<dyn MorphoIndexer>,
    ) -> Self {
        Self {
            clients,
            morpho,
            config,
        }
    }

    /// Explicit `--rpc-url`, else config, else the chain's public endpoint.
    pub fn rpc_url(&self, chain: &Chain, explicit: Option<&str>) -> String {
        explicit
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.config.rpc_url_for(chain))
    }

    pub fn reader(&self, rpc_url: &str) -> Result<Arc<dyn ChainReader>> {
        self.clients.reader(rpc_url)
    }
}

// ---------------------------------------------------------------------------
// Shared validation helpers
// ---------------------------------------------------------------------------

/// Resolve `asset` on `chain`, applying a caller-provided decimals override.
pub(crate) fn resolve_token(chain: &Chain, asset: &str, decimals: Option<u8>) -> Result<Asset> {
    let asset = resolve_asset(asset, chain)?;
    Ok(match decimals {
        Some(d) => asset.with_decimals(d),
        None => asset,
    })
}

/// Normalize the user amount for `asset` and require it to be positive.
pub(crate) fn positive_amount(
    asset: &Asset,
    amount: Option<&str>,
    amount_decimal: Option<&str>,
) -> Result<U256> {
    let value = normalize_amount(amount, amount_decimal, asset.decimals)?.value()?;
    if value.is_zero() {
        return Err(DefiError::usage("amount must be greater than zero"));
    }
    Ok(value)
}

pub(crate) fn optional_address(field: &str, value: Option<&str>) -> Result<Option<Address>> {
    match value.map(str::trim).filter(|s| !s.is_empty()) {
        Some(v) => parse_address(field, v).map(Some),
        None => Ok(None),
    }
}

/// `eth_call` a view function and decode its return value.
pub(crate) async fn read_call<C: SolCall>(
    reader: &dyn ChainReader,
    target: Address,
    call: C,
    what: &str,
) -> Result<C::Return> {
    let raw = reader.call(target, call.abi_encode().into()).await?;
    C::abi_decode_returns(&raw).map_err(|e| {
        DefiError::unavailable(format!("{what} at {target} returned undecodable data: {e}"))
    })
}

/// Lowercased token label used in deterministic step ids.
pub(crate) fn token_label(asset: &Asset) -> String {
    asset.symbol.to_ascii_lowercase()
}
