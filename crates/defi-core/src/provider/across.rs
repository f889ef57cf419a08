use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{
    get_json, http_client, parse_uint, resolve_bridge, BridgeProvider, BridgeQuote, BridgeRequest,
};
use crate::error::{DefiError, Result};
use crate::planner::PlanContext;
use crate::registry::format_units;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestedFees {
    total_relay_fee: RelayFee,
    #[serde(default)]
    estimated_fill_time_sec: Option<u64>,
    #[serde(default)]
    is_amount_too_low: bool,
}

#[derive(Debug, Deserialize)]
struct RelayFee {
    total: String,
}

/// Across protocol suggested-fees API. Quote only.
#[derive(Clone)]
pub struct AcrossProvider {
    ctx: PlanContext,
    client: reqwest::Client,
    base_url: String,
}

impl AcrossProvider {
    pub fn new(ctx: PlanContext) -> Result<Self> {
        let client = http_client(Duration::from_secs(ctx.config.providers.http_timeout_secs))?;
        let base_url = ctx
            .config
            .providers
            .across_api_url
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
impl BridgeProvider for AcrossProvider {
    fn name(&self) -> &'static str {
        "across"
    }

    async fn quote(&self, req: &BridgeRequest) -> Result<BridgeQuote> {
        let bridge = resolve_bridge(&self.ctx, req)?;
        let url = format!("{}/suggested-fees", self.base_url);
        let query = [
            ("inputToken", bridge.from.address.to_string()),
            ("outputToken", bridge.to.address.to_string()),
            ("originChainId", bridge.from_chain.id.to_string()),
            ("destinationChainId", bridge.to_chain.id.to_string()),
            ("amount", bridge.amount.to_string()),
        ];
        let fees: SuggestedFees = get_json(&self.client, self.name(), &url, &query, None).await?;
        if fees.is_amount_too_low {
            return Err(DefiError::usage(format!(
                "amount {} is below the across minimum for this route",
                bridge.amount
            )));
        }
        let fee = parse_uint(self.name(), "totalRelayFee.total", &fees.total_relay_fee.total)?;
        let out = bridge.amount.checked_sub(fee).ok_or_else(|| {
            DefiError::unavailable("across relay fee exceeds the bridged amount")
        })?;
        let fee_label = match bridge.from.decimals {
            Some(d) => format!("{} {}", format_units(fee, d), bridge.from.symbol),
            None => format!("{fee} (base units)"),
        };
        Ok(BridgeQuote {
            provider: self.name().to_string(),
            from_chain_id: bridge.from_chain.caip2(),
            to_chain_id: bridge.to_chain.caip2(),
            from_asset: bridge.from.symbol.clone(),
            to_asset: bridge.to.symbol.clone(),
            amount_in: bridge.amount.to_string(),
            estimated_amount_out: out.to_string(),
            fee: Some(fee_label),
            estimated_duration_secs: fees.estimated_fill_time_sec,
            tool: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::ErrorKind;
    use crate::testing::{FakeChain, FakeFactory, FakeMorpho};
    use mockito::{Matcher, Server};
    use std::sync::Arc;

    fn provider(url: &str) -> AcrossProvider {
        let mut config = Config::default();
        config.providers.across_api_url = url.to_string();
        AcrossProvider::new(PlanContext::with_clients(
            config,
            Arc::new(FakeFactory(FakeChain::new(1))),
            Arc::new(FakeMorpho(None)),
        ))
        .unwrap()
    }

    fn request() -> BridgeRequest {
        BridgeRequest {
            from_chain: "arbitrum".into(),
            to_chain: "optimism".into(),
            asset: "USDC".into(),
            amount: Some("5000000".into()),
            sender: "0x1111111111111111111111111111111111111111".into(),
            ..BridgeRequest::default()
        }
    }

    #[tokio::test]
    async fn quote_subtracts_relay_fee() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/suggested-fees")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(r#"{"totalRelayFee":{"pct":"1000000000000000","total":"5000"},"estimatedFillTimeSec":4,"isAmountTooLow":false}"#)
            .create_async()
            .await;

        let quote = provider(&server.url()).quote(&request()).await.unwrap();
        assert_eq!(quote.estimated_amount_out, "4995000");
        assert_eq!(quote.fee.as_deref(), Some("0.005 USDC"));
        assert_eq!(quote.estimated_duration_secs, Some(4));
    }

    #[tokio::test]
    async fn amount_too_low_is_usage_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/suggested-fees")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(r#"{"totalRelayFee":{"total":"0"},"isAmountTooLow":true}"#)
            .create_async()
            .await;

        let err = provider(&server.url()).quote(&request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn is_quote_only() {
        assert!(provider("http://127.0.0.1:9").as_executor().is_none());
    }
}
