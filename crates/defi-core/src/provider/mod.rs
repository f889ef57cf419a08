//! Swap and bridge provider adapters.
//!
//! Every provider can quote. Providers that can also produce an executable
//! plan expose it through `as_executor()`; the builder registry uses that
//! capability query instead of knowing which concrete provider it holds.

pub mod across;
pub mod lifi;
pub mod oneinch;
pub mod uniswap;

use std::time::Duration;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::action::Action;
use crate::error::{DefiError, Result};
use crate::planner::{optional_address, positive_amount, resolve_token, PlanContext};
use crate::registry::{format_units, parse_address, resolve_chain, Asset, Chain};

pub use across::AcrossProvider;
pub use lifi::LifiProvider;
pub use oneinch::OneInchProvider;
pub use uniswap::UniswapProvider;

/// Default slippage tolerance when the caller does not pass one.
pub const DEFAULT_SLIPPAGE_BPS: u32 = 50;

// ---------------------------------------------------------------------------
// Requests and quotes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SwapRequest {
    pub chain: String,
    pub from_asset: String,
    pub to_asset: String,
    pub amount: Option<String>,
    pub amount_decimal: Option<String>,
    pub decimals: Option<u8>,
    pub sender: String,
    pub recipient: Option<String>,
    pub slippage_bps: Option<u32>,
    pub fee_tier: Option<u32>,
    pub rpc_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BridgeRequest {
    pub from_chain: String,
    pub to_chain: String,
    pub asset: String,
    /// Destination token; defaults to the same symbol on the destination chain.
    pub to_asset: Option<String>,
    pub amount: Option<String>,
    pub amount_decimal: Option<String>,
    pub decimals: Option<u8>,
    pub sender: String,
    pub recipient: Option<String>,
    pub slippage_bps: Option<u32>,
    pub rpc_url: Option<String>,
}

/// Plan-time options handed to executors.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub simulate: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { simulate: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapQuote {
    pub provider: String,
    pub chain_id: String,
    pub from_asset: String,
    pub to_asset: String,
    pub amount_in: String,
    pub amount_out: String,
    pub amount_out_decimal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_gas: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_tier: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeQuote {
    pub provider: String,
    pub from_chain_id: String,
    pub to_chain_id: String,
    pub from_asset: String,
    pub to_asset: String,
    pub amount_in: String,
    pub estimated_amount_out: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_duration_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
}

// ---------------------------------------------------------------------------
// Provider traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SwapProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn quote(&self, req: &SwapRequest) -> Result<SwapQuote>;

    /// Execution capability, if this provider can build transactions.
    fn as_executor(&self) -> Option<&dyn SwapExecutor> {
        None
    }
}

#[async_trait]
pub trait SwapExecutor: Send + Sync {
    async fn build_action(&self, req: &SwapRequest, opts: &BuildOptions) -> Result<Action>;
}

#[async_trait]
pub trait BridgeProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn quote(&self, req: &BridgeRequest) -> Result<BridgeQuote>;

    fn as_executor(&self) -> Option<&dyn BridgeExecutor> {
        None
    }
}

#[async_trait]
pub trait BridgeExecutor: Send + Sync {
    async fn build_action(&self, req: &BridgeRequest, opts: &BuildOptions) -> Result<Action>;
}

// ---------------------------------------------------------------------------
// Shared resolution
// ---------------------------------------------------------------------------

pub(crate) struct ResolvedSwap {
    pub chain: Chain,
    pub from: Asset,
    pub to: Asset,
    pub amount: U256,
    pub sender: Address,
    pub recipient: Address,
    pub slippage_bps: u32,
    pub rpc_url: String,
}

pub(crate) fn resolve_swap(ctx: &PlanContext, req: &SwapRequest) -> Result<ResolvedSwap> {
    let chain = resolve_chain(&req.chain)?;
    let from = resolve_token(&chain, &req.from_asset, req.decimals)?;
    let to = resolve_token(&chain, &req.to_asset, None)?;
    if from.address == to.address {
        return Err(DefiError::usage("from and to assets must differ"));
    }
    let amount = positive_amount(&from, req.amount.as_deref(), req.amount_decimal.as_deref())?;
    let sender = parse_address("sender", &req.sender)?;
    let recipient = optional_address("recipient", req.recipient.as_deref())?.unwrap_or(sender);
    Ok(ResolvedSwap {
        rpc_url: ctx.rpc_url(&chain, req.rpc_url.as_deref()),
        chain,
        from,
        to,
        amount,
        sender,
        recipient,
        slippage_bps: slippage(req.slippage_bps)?,
    })
}

pub(crate) struct ResolvedBridge {
    pub from_chain: Chain,
    pub to_chain: Chain,
    pub from: Asset,
    pub to: Asset,
    pub amount: U256,
    pub sender: Address,
    pub recipient: Address,
    pub slippage_bps: u32,
    pub rpc_url: String,
}

pub(crate) fn resolve_bridge(ctx: &PlanContext, req: &BridgeRequest) -> Result<ResolvedBridge> {
    let from_chain = resolve_chain(&req.from_chain)?;
    let to_chain = resolve_chain(&req.to_chain)?;
    if from_chain.id == to_chain.id {
        return Err(DefiError::usage(
            "source and destination chains must differ; use swap for same-chain trades",
        ));
    }
    let from = resolve_token(&from_chain, &req.asset, req.decimals)?;
    let to_input = req
        .to_asset
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(from.symbol.as_str());
    let to = resolve_token(&to_chain, to_input, None)?;
    let amount = positive_amount(&from, req.amount.as_deref(), req.amount_decimal.as_deref())?;
    let sender = parse_address("sender", &req.sender)?;
    let recipient = optional_address("recipient", req.recipient.as_deref())?.unwrap_or(sender);
    Ok(ResolvedBridge {
        rpc_url: ctx.rpc_url(&from_chain, req.rpc_url.as_deref()),
        from_chain,
        to_chain,
        from,
        to,
        amount,
        sender,
        recipient,
        slippage_bps: slippage(req.slippage_bps)?,
    })
}

fn slippage(raw: Option<u32>) -> Result<u32> {
    let bps = raw.unwrap_or(DEFAULT_SLIPPAGE_BPS);
    if bps >= 10_000 {
        return Err(DefiError::usage(format!(
            "slippage must be below 10000 bps, got {bps}"
        )));
    }
    Ok(bps)
}

/// `amount * (10000 - bps) / 10000`, rounded down.
pub fn min_amount_out(amount: U256, slippage_bps: u32) -> U256 {
    let keep = U256::from(10_000u32 - slippage_bps.min(10_000));
    amount.saturating_mul(keep) / U256::from(10_000u32)
}

pub(crate) fn decimal_label(value: U256, asset: &Asset) -> Option<String> {
    asset.decimals.map(|d| format_units(value, d))
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| DefiError::Internal(format!("failed to build HTTP client: {e}")))
}

/// GET `url` with `query`, mapping transport and status failures to Unavailable.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    provider: &str,
    url: &str,
    query: &[(&str, String)],
    bearer: Option<&str>,
) -> Result<T> {
    debug!(provider, url, "provider request");
    let mut request = client.get(url).query(query);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }
    let resp = request
        .send()
        .await
        .map_err(|e| DefiError::unavailable(format!("{provider} request failed: {e}")))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(200).collect();
        return Err(DefiError::unavailable(format!(
            "{provider} returned HTTP {status}: {snippet}"
        )));
    }
    resp.json::<T>()
        .await
        .map_err(|e| DefiError::unavailable(format!("{provider} returned malformed JSON: {e}")))
}

/// Parse a decimal or `0x` hex integer string from a provider payload.
pub(crate) fn parse_uint(provider: &str, field: &str, raw: &str) -> Result<U256> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) if hex.is_empty() => Ok(U256::ZERO),
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(raw, 10),
    };
    parsed.map_err(|_| {
        DefiError::unavailable(format!("{provider} returned an invalid {field}: '{raw}'"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_out_rounds_down() {
        assert_eq!(min_amount_out(U256::from(1_000_000u64), 50), U256::from(995_000u64));
        assert_eq!(min_amount_out(U256::from(999u64), 1), U256::from(998u64));
        assert_eq!(min_amount_out(U256::from(5u64), 0), U256::from(5u64));
    }

    #[test]
    fn slippage_must_be_below_full_range() {
        assert_eq!(slippage(None).unwrap(), DEFAULT_SLIPPAGE_BPS);
        assert!(slippage(Some(10_000)).is_err());
    }

    #[test]
    fn parses_hex_and_decimal_values() {
        assert_eq!(parse_uint("lifi", "value", "0x0").unwrap(), U256::ZERO);
        assert_eq!(parse_uint("lifi", "value", "0x10").unwrap(), U256::from(16u64));
        assert_eq!(parse_uint("lifi", "value", "42").unwrap(), U256::from(42u64));
        assert!(parse_uint("lifi", "value", "0xzz").is_err());
    }
}
