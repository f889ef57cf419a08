use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{
    decimal_label, get_json, http_client, parse_uint, resolve_swap, SwapProvider, SwapQuote,
    SwapRequest,
};
use crate::error::{DefiError, Result};
use crate::planner::PlanContext;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    dst_amount: String,
    #[serde(default)]
    gas: Option<u64>,
}

/// 1inch aggregation API. Quote only.
#[derive(Clone)]
pub struct OneInchProvider {
    ctx: PlanContext,
    client: reqwest::Client,
    base_url: String,
}

impl OneInchProvider {
    pub fn new(ctx: PlanContext) -> Result<Self> {
        let client = http_client(Duration::from_secs(ctx.config.providers.http_timeout_secs))?;
        let base_url = ctx
            .config
            .providers
            .oneinch_api_url
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            ctx,
            client,
            base_url,
        })
    }
}

#[async_trait]
impl SwapProvider for OneInchProvider {
    fn name(&self) -> &'static str {
        "1inch"
    }

    async fn quote(&self, req: &SwapRequest) -> Result<SwapQuote> {
        let swap = resolve_swap(&self.ctx, req)?;
        let key = self
            .ctx
            .config
            .providers
            .oneinch_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                DefiError::usage(
                    "1inch quotes need an API key: set providers.oneinch_api_key or DEFI_ONEINCH_API_KEY",
                )
            })?;
        let url = format!("{}/{}/quote", self.base_url, swap.chain.id);
        let query = [
            ("src", swap.from.address.to_string()),
            ("dst", swap.to.address.to_string()),
            ("amount", swap.amount.to_string()),
            ("includeGas", "true".to_string()),
        ];
        let resp: QuoteResponse = get_json(&self.client, self.name(), &url, &query, Some(key)).await?;
        let amount_out = parse_uint(self.name(), "dstAmount", &resp.dst_amount)?;
        Ok(SwapQuote {
            provider: self.name().to_string(),
            chain_id: swap.chain.caip2(),
            from_asset: swap.from.symbol.clone(),
            to_asset: swap.to.symbol.clone(),
            amount_in: swap.amount.to_string(),
            amount_out: amount_out.to_string(),
            amount_out_decimal: decimal_label(amount_out, &swap.to),
            estimated_gas: resp.gas,
            fee_tier: None,
        })
    }
}
