use std::time::Duration;

use alloy::primitives::{address, Address, Bytes, U256};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use super::{
    get_json, http_client, parse_uint, resolve_bridge, BridgeExecutor, BridgeProvider,
    BridgeQuote, BridgeRequest, BuildOptions, ResolvedBridge,
};
use crate::action::{Action, ActionStep};
use crate::error::{DefiError, Result};
use crate::planner::approval::approval_if_needed;
use crate::planner::PlanContext;
use crate::types::{IntentType, StepType};

/// LI.FI diamond, same address on every supported EVM chain.
pub const LIFI_DIAMOND: Address = address!("1231deb6f5749ef6ce6943a275a1d3e7486f4eae");

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    #[serde(default)]
    tool: Option<String>,
    estimate: Estimate,
    transaction_request: Option<TransactionRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Estimate {
    to_amount: String,
    #[serde(default)]
    to_amount_min: Option<String>,
    #[serde(default)]
    approval_address: Option<Address>,
    #[serde(default)]
    execution_duration: Option<f64>,
    #[serde(default)]
    fee_costs: Vec<FeeCost>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeeCost {
    #[serde(default, rename = "amountUSD")]
    amount_usd: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionRequest {
    to: Address,
    data: Bytes,
    #[serde(default)]
    value: Option<String>,
}

/// LI.FI aggregator: quotes and executable cross-chain transfers.
#[derive(Clone)]
pub struct LifiProvider {
    ctx: PlanContext,
    client: reqwest::Client,
    base_url: String,
}

impl LifiProvider {
    pub fn new(ctx: PlanContext) -> Result<Self> {
        let client = http_client(Duration::from_secs(ctx.config.providers.http_timeout_secs))?;
        let base_url = ctx
            .config
            .providers
            .lifi_api_url
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            ctx,
            client,
            base_url,
        })
    }

    async fn fetch_quote(&self, bridge: &ResolvedBridge) -> Result<QuoteResponse> {
        let slippage = format!("{}", bridge.slippage_bps as f64 / 10_000.0);
        let query = [
            ("fromChain", bridge.from_chain.id.to_string()),
            ("toChain", bridge.to_chain.id.to_string()),
            ("fromToken", bridge.from.address.to_string()),
            ("toToken", bridge.to.address.to_string()),
            ("fromAmount", bridge.amount.to_string()),
            ("fromAddress", bridge.sender.to_string()),
            ("toAddress", bridge.recipient.to_string()),
            ("slippage", slippage),
        ];
        let url = format!("{}/quote", self.base_url);
        get_json(&self.client, self.name(), &url, &query, None).await
    }
}

fn fee_usd(estimate: &Estimate) -> Option<String> {
    let total: f64 = estimate
        .fee_costs
        .iter()
        .filter_map(|f| f.amount_usd.as_deref()?.parse::<f64>().ok())
        .sum();
    (!estimate.fee_costs.is_empty()).then(|| format!("{total:.2} USD"))
}

#[async_trait]
impl BridgeProvider for LifiProvider {
    fn name(&self) -> &'static str {
        "lifi"
    }

    async fn quote(&self, req: &BridgeRequest) -> Result<BridgeQuote> {
        let bridge = resolve_bridge(&self.ctx, req)?;
        let resp = self.fetch_quote(&bridge).await?;
        let out = parse_uint(self.name(), "toAmount", &resp.estimate.to_amount)?;
        Ok(BridgeQuote {
            provider: self.name().to_string(),
            from_chain_id: bridge.from_chain.caip2(),
            to_chain_id: bridge.to_chain.caip2(),
            from_asset: bridge.from.symbol.clone(),
            to_asset: bridge.to.symbol.clone(),
            amount_in: bridge.amount.to_string(),
            estimated_amount_out: out.to_string(),
            fee: fee_usd(&resp.estimate),
            estimated_duration_secs: resp.estimate.execution_duration.map(|d| d.round() as u64),
            tool: resp.tool,
        })
    }

    fn as_executor(&self) -> Option<&dyn BridgeExecutor> {
        Some(self)
    }
}

#[async_trait]
impl BridgeExecutor for LifiProvider {
    async fn build_action(&self, req: &BridgeRequest, opts: &BuildOptions) -> Result<Action> {
        let bridge = resolve_bridge(&self.ctx, req)?;
        let resp = self.fetch_quote(&bridge).await?;
        let tx = resp.transaction_request.ok_or_else(|| {
            DefiError::unavailable("lifi quote did not include a transaction request")
        })?;
        if tx.data.is_empty() {
            return Err(DefiError::unavailable("lifi returned empty calldata"));
        }
        if tx.to != LIFI_DIAMOND {
            warn!(target_contract = %tx.to, "lifi transaction targets a non-diamond contract");
        }
        let value = match tx.value.as_deref() {
            Some(v) => parse_uint(self.name(), "value", v)?,
            None => U256::ZERO,
        };
        let to_amount = parse_uint(self.name(), "toAmount", &resp.estimate.to_amount)?;

        let mut action = Action::new(
            IntentType::Bridge,
            &bridge.from_chain,
            self.name(),
            bridge.sender,
            tx.to,
            bridge.amount,
        )
        .with_meta("from_asset", &bridge.from.symbol)
        .with_meta("to_asset", &bridge.to.symbol)
        .with_meta("to_chain_id", bridge.to_chain.caip2())
        .with_meta("recipient", bridge.recipient)
        .with_meta("quote_amount_out", to_amount);
        if let Some(min) = &resp.estimate.to_amount_min {
            action = action.with_meta("min_amount_out", min);
        }
        if let Some(tool) = &resp.tool {
            action = action.with_meta("tool", tool);
        }
        action.constraints.simulate = opts.simulate;
        action.constraints.slippage_bps = Some(bridge.slippage_bps);
        action.constraints.allowed_targets = vec![LIFI_DIAMOND];

        if let Some(spender) = resp.estimate.approval_address.filter(|a| !a.is_zero()) {
            let reader = self.ctx.reader(&bridge.rpc_url)?;
            if let Some(step) = approval_if_needed(
                reader.as_ref(),
                &bridge.from_chain,
                &bridge.rpc_url,
                &bridge.from,
                bridge.sender,
                spender,
                bridge.amount,
            )
            .await?
            {
                action.push_step(step);
            }
        }

        action.push_step(
            ActionStep::new(
                "bridge",
                StepType::Bridge,
                &bridge.from_chain,
                &bridge.rpc_url,
                tx.to,
                tx.data,
            )
            .with_value(value)
            .with_description(format!(
                "Bridge {} {} from {} to {} via lifi",
                bridge.amount, bridge.from.symbol, bridge.from_chain, bridge.to_chain
            )),
        );
        info!(action_id = %action.action_id, "planned lifi bridge");
        Ok(action)
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

    const SENDER: &str = "0x1111111111111111111111111111111111111111";
    const USDC_ETH: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");

    const QUOTE_RESP: &str = r#"{
        "tool": "across",
        "estimate": {
            "toAmount": "998000",
            "toAmountMin": "993010",
            "approvalAddress": "0x1231DEB6f5749EF6cE6943a275A1D3E7486F4EaE",
            "executionDuration": 62.4,
            "feeCosts": [{ "amountUSD": "0.85" }, { "amountUSD": "0.15" }]
        },
        "transactionRequest": {
            "to": "0x1231DEB6f5749EF6cE6943a275A1D3E7486F4EaE",
            "data": "0xdeadbeef",
            "value": "0x0",
            "chainId": 1
        }
    }"#;

    fn provider(url: &str, fake: Arc<FakeChain>) -> LifiProvider {
        let mut config = Config::default();
        config.providers.lifi_api_url = url.to_string();
        LifiProvider::new(PlanContext::with_clients(
            config,
            Arc::new(FakeFactory(fake)),
            Arc::new(FakeMorpho(None)),
        ))
        .unwrap()
    }

    fn request() -> BridgeRequest {
        BridgeRequest {
            from_chain: "ethereum".into(),
            to_chain: "base".into(),
            asset: "USDC".into(),
            amount: Some("1000000".into()),
            sender: SENDER.into(),
            ..BridgeRequest::default()
        }
    }

    #[tokio::test]
    async fn quote_parses_estimate() {
        let mut server = Server::new_async().await;
        let mocked = server
            .mock("GET", "/quote")
            .match_query(Matcher::UrlEncoded("fromAmount".into(), "1000000".into()))
            .with_header("content-type", "application/json")
            .with_body(QUOTE_RESP)
            .create_async()
            .await;

        let quote = provider(&server.url(), FakeChain::new(1))
            .quote(&request())
            .await
            .unwrap();
        mocked.assert_async().await;
        assert_eq!(quote.estimated_amount_out, "998000");
        assert_eq!(quote.to_asset, "USDC");
        assert_eq!(quote.to_chain_id, "eip155:8453");
        assert_eq!(quote.estimated_duration_secs, Some(62));
        assert_eq!(quote.fee.as_deref(), Some("1.00 USD"));
    }

    #[tokio::test]
    async fn build_adds_approval_and_allowlists_diamond() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/quote")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(QUOTE_RESP)
            .create_async()
            .await;
        let fake = FakeChain::new(1);
        fake.respond_allowance(USDC_ETH, U256::ZERO);

        let p = provider(&server.url(), fake);
        let action = p
            .as_executor()
            .unwrap()
            .build_action(&request(), &BuildOptions::default())
            .await
            .unwrap();
        assert_eq!(action.intent_type, IntentType::Bridge);
        assert_eq!(action.chain_id, "eip155:1");
        assert_eq!(action.constraints.allowed_targets, vec![LIFI_DIAMOND]);
        let types: Vec<StepType> = action.steps.iter().map(|s| s.step_type).collect();
        assert_eq!(types, vec![StepType::Approval, StepType::Bridge]);
        assert_eq!(action.steps[1].data.as_ref(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(action.metadata["tool"], "across");
    }

    #[tokio::test]
    async fn same_chain_bridge_is_usage_error() {
        let p = provider("http://127.0.0.1:9", FakeChain::new(1));
        let mut req = request();
        req.to_chain = "eth".into();
        assert_eq!(p.quote(&req).await.unwrap_err().kind(), ErrorKind::Usage);
    }

    #[tokio::test]
    async fn upstream_error_is_unavailable() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/quote")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"message":"No available quotes for the requested transfer"}"#)
            .create_async()
            .await;
        let err = provider(&server.url(), FakeChain::new(1))
            .quote(&request())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(err.to_string().contains("No available quotes"));
    }
}
