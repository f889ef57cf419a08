use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use tracing::debug;

use super::{positive_amount, read_call, resolve_token, token_label, PlanContext};
use crate::action::{Action, ActionStep};
use crate::chain::abi::IERC20;
use crate::chain::ChainReader;
use crate::error::Result;
use crate::registry::{parse_address, resolve_chain, Asset, Chain};
use crate::types::{IntentType, StepType};

#[derive(Debug, Clone, Default)]
pub struct ApprovalRequest {
    pub chain: String,
    pub asset: String,
    pub spender: String,
    pub sender: String,
    pub amount: Option<String>,
    pub amount_decimal: Option<String>,
    pub decimals: Option<u8>,
    pub rpc_url: Option<String>,
    pub simulate: bool,
}

/// Plan a single `approve(spender, amount)` transaction. No network access.
pub fn build(ctx: &PlanContext, req: &ApprovalRequest) -> Result<Action> {
    let chain = resolve_chain(&req.chain)?;
    let token = resolve_token(&chain, &req.asset, req.decimals)?;
    let sender = parse_address("sender", &req.sender)?;
    let spender = parse_address("spender", &req.spender)?;
    let amount = positive_amount(&token, req.amount.as_deref(), req.amount_decimal.as_deref())?;
    let rpc_url = ctx.rpc_url(&chain, req.rpc_url.as_deref());

    let mut action = Action::new(IntentType::Approve, &chain, "erc20", sender, spender, amount)
        .with_meta("asset", &token.symbol)
        .with_meta("asset_address", token.address)
        .with_meta("spender", spender);
    action.constraints.simulate = req.simulate;
    action.push_step(approval_step(&chain, &rpc_url, &token, spender, amount));
    Ok(action)
}

/// An `approval` step letting `spender` pull `amount` of `token`.
pub(crate) fn approval_step(
    chain: &Chain,
    rpc_url: &str,
    token: &Asset,
    spender: Address,
    amount: U256,
) -> ActionStep {
    let data = IERC20::approveCall { spender, amount }.abi_encode();
    ActionStep::new(
        format!("approve-{}", token_label(token)),
        StepType::Approval,
        chain,
        rpc_url,
        token.address,
        data,
    )
    .with_description(format!(
        "Approve {spender} to spend {amount} {} (base units)",
        token.symbol
    ))
}

pub async fn read_allowance(
    reader: &dyn ChainReader,
    token: Address,
    owner: Address,
    spender: Address,
) -> Result<U256> {
    read_call(
        reader,
        token,
        IERC20::allowanceCall { owner, spender },
        "allowance",
    )
    .await
}

/// Approval step if the live allowance of `owner` towards `spender` is short.
pub(crate) async fn approval_if_needed(
    reader: &dyn ChainReader,
    chain: &Chain,
    rpc_url: &str,
    token: &Asset,
    owner: Address,
    spender: Address,
    amount: U256,
) -> Result<Option<ActionStep>> {
    let allowance = read_allowance(reader, token.address, owner, spender).await?;
    debug!(token = %token.symbol, %allowance, %amount, "allowance check");
    if allowance >= amount {
        return Ok(None);
    }
    Ok(Some(approval_step(chain, rpc_url, token, spender, amount)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::ErrorKind;
    use crate::testing::{FakeChain, FakeFactory, FakeMorpho};
    use std::sync::Arc;

    const SENDER: &str = "0x1111111111111111111111111111111111111111";
    const SPENDER: &str = "0x2222222222222222222222222222222222222222";

    fn ctx(chain: Arc<FakeChain>) -> PlanContext {
        PlanContext::with_clients(
            Config::default(),
            Arc::new(FakeFactory(chain)),
            Arc::new(FakeMorpho(None)),
        )
    }

    fn request(amount: &str) -> ApprovalRequest {
        ApprovalRequest {
            chain: "base".into(),
            asset: "USDC".into(),
            spender: SPENDER.into(),
            sender: SENDER.into(),
            amount: Some(amount.into()),
            simulate: true,
            ..ApprovalRequest::default()
        }
    }

    #[test]
    fn builds_single_approval_step() {
        let fake = FakeChain::new(8453);
        let action = build(&ctx(fake.clone()), &request("1000000")).unwrap();
        assert_eq!(action.intent_type, IntentType::Approve);
        assert_eq!(action.input_amount, U256::from(1_000_000u64));
        assert_eq!(action.steps.len(), 1);
        let step = &action.steps[0];
        assert_eq!(step.step_id, "approve-usdc");
        assert_eq!(step.step_type, StepType::Approval);
        let decoded = IERC20::approveCall::abi_decode(&step.data).unwrap();
        assert_eq!(decoded.amount, U256::from(1_000_000u64));
        assert_eq!(fake.network_calls(), 0);
    }

    #[test]
    fn zero_amount_produces_no_action() {
        let err = build(&ctx(FakeChain::new(8453)), &request("0")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn malformed_spender_is_usage_error() {
        let mut req = request("1");
        req.spender = "0xdeadbeef".into();
        let err = build(&ctx(FakeChain::new(8453)), &req).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.to_string().contains("spender"));
    }

    #[tokio::test]
    async fn approval_only_when_allowance_is_short() {
        let fake = FakeChain::new(1);
        let chain = resolve_chain("ethereum").unwrap();
        let usdc = resolve_token(&chain, "USDC", None).unwrap();
        let owner = Address::repeat_byte(0x11);
        let spender = Address::repeat_byte(0x22);

        fake.respond_allowance(usdc.address, U256::from(10u64));
        let step = approval_if_needed(fake.as_ref(), &chain, "http://rpc", &usdc, owner, spender, U256::from(11u64))
            .await
            .unwrap();
        assert!(step.is_some());

        let step = approval_if_needed(fake.as_ref(), &chain, "http://rpc", &usdc, owner, spender, U256::from(10u64))
            .await
            .unwrap();
        assert!(step.is_none());
    }
}
