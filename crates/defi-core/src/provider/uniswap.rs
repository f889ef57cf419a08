use alloy::primitives::aliases::{U160, U24};
use alloy::primitives::{address, Address, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use tracing::info;

use super::{
    decimal_label, min_amount_out, resolve_swap, BuildOptions, ResolvedSwap, SwapExecutor,
    SwapProvider, SwapQuote, SwapRequest,
};
use crate::action::{Action, ActionStep};
use crate::chain::abi::{
    ExactInputSingleParams, IQuoterV2, ISwapRouter02, QuoteExactInputSingleParams,
};
use crate::error::{DefiError, Result};
use crate::planner::approval::approval_if_needed;
use crate::planner::{read_call, PlanContext};
use crate::registry::Chain;
use crate::types::{IntentType, StepType};

pub const DEFAULT_FEE_TIER: u32 = 3000;
const FEE_TIERS: &[u32] = &[100, 500, 3000, 10_000];

/// SwapRouter02 and QuoterV2 deployments.
pub fn deployment(chain: &Chain) -> Option<(Address, Address)> {
    match chain.id {
        1 | 10 | 137 | 42161 => Some((
            address!("68b3465833fb72a70ecdf485e0e4c7bd8665fc45"),
            address!("61ffe014ba17989e743c5f6cb21bf9697530b21e"),
        )),
        8453 => Some((
            address!("2626664c2603336e57b271c5c0b26f421741e481"),
            address!("3d4e44eb1374240ce5f1b871ab261cd16335b76a"),
        )),
        43114 => Some((
            address!("bb00ff08d01d300023c629e8ffffcb65a5a578ce"),
            address!("be0f5544ec67e9b3b2d979aaa43f18fd87e6257f"),
        )),
        _ => None,
    }
}

fn fee_tier(raw: Option<u32>) -> Result<u32> {
    let fee = raw.unwrap_or(DEFAULT_FEE_TIER);
    if !FEE_TIERS.contains(&fee) {
        return Err(DefiError::usage(format!(
            "fee tier must be one of 100, 500, 3000, 10000, got {fee}"
        )));
    }
    Ok(fee)
}

/// Uniswap v3 single-pool swaps through SwapRouter02.
#[derive(Clone)]
pub struct UniswapProvider {
    ctx: PlanContext,
}

impl UniswapProvider {
    pub fn new(ctx: PlanContext) -> Self {
        Self { ctx }
    }

    async fn quote_resolved(&self, swap: &ResolvedSwap, fee: u32) -> Result<(Address, U256, u64)> {
        let (router, quoter) = deployment(&swap.chain).ok_or_else(|| {
            DefiError::unsupported(format!("uniswap is not deployed on {}", swap.chain))
        })?;
        let reader = self.ctx.reader(&swap.rpc_url)?;
        let quote = read_call(
            reader.as_ref(),
            quoter,
            IQuoterV2::quoteExactInputSingleCall {
                params: QuoteExactInputSingleParams {
                    tokenIn: swap.from.address,
                    tokenOut: swap.to.address,
                    amountIn: swap.amount,
                    fee: U24::from(fee),
                    sqrtPriceLimitX96: U160::ZERO,
                },
            },
            "QuoterV2.quoteExactInputSingle",
        )
        .await?;
        if quote.amountOut.is_zero() {
            return Err(DefiError::unavailable(format!(
                "uniswap quoted zero output for {} -> {} at fee tier {fee}",
                swap.from.symbol, swap.to.symbol
            )));
        }
        Ok((router, quote.amountOut, quote.gasEstimate.saturating_to::<u64>()))
    }
}

#[async_trait]
impl SwapProvider for UniswapProvider {
    fn name(&self) -> &'static str {
        "uniswap"
    }

    async fn quote(&self, req: &SwapRequest) -> Result<SwapQuote> {
        let swap = resolve_swap(&self.ctx, req)?;
        let fee = fee_tier(req.fee_tier)?;
        let (_, amount_out, gas) = self.quote_resolved(&swap, fee).await?;
        Ok(SwapQuote {
            provider: self.name().to_string(),
            chain_id: swap.chain.caip2(),
            from_asset: swap.from.symbol.clone(),
            to_asset: swap.to.symbol.clone(),
            amount_in: swap.amount.to_string(),
            amount_out: amount_out.to_string(),
            amount_out_decimal: decimal_label(amount_out, &swap.to),
            estimated_gas: Some(gas),
            fee_tier: Some(fee),
        })
    }

    fn as_executor(&self) -> Option<&dyn SwapExecutor> {
        Some(self)
    }
}

#[async_trait]
impl SwapExecutor for UniswapProvider {
    async fn build_action(&self, req: &SwapRequest, opts: &BuildOptions) -> Result<Action> {
        let swap = resolve_swap(&self.ctx, req)?;
        let fee = fee_tier(req.fee_tier)?;
        let (router, amount_out, _) = self.quote_resolved(&swap, fee).await?;
        let min_out = min_amount_out(amount_out, swap.slippage_bps);

        let mut action = Action::new(
            IntentType::Swap,
            &swap.chain,
            self.name(),
            swap.sender,
            router,
            swap.amount,
        )
        .with_meta("from_asset", &swap.from.symbol)
        .with_meta("to_asset", &swap.to.symbol)
        .with_meta("to_asset_address", swap.to.address)
        .with_meta("fee_tier", fee)
        .with_meta("quote_amount_out", amount_out)
        .with_meta("min_amount_out", min_out)
        .with_meta("recipient", swap.recipient);
        action.constraints.simulate = opts.simulate;
        action.constraints.slippage_bps = Some(swap.slippage_bps);
        action.constraints.allowed_targets = vec![router];

        let reader = self.ctx.reader(&swap.rpc_url)?;
        if let Some(step) = approval_if_needed(
            reader.as_ref(),
            &swap.chain,
            &swap.rpc_url,
            &swap.from,
            swap.sender,
            router,
            swap.amount,
        )
        .await?
        {
            action.push_step(step);
        }

        let data = ISwapRouter02::exactInputSingleCall {
            params: ExactInputSingleParams {
                tokenIn: swap.from.address,
                tokenOut: swap.to.address,
                fee: U24::from(fee),
                recipient: swap.recipient,
                amountIn: swap.amount,
                amountOutMinimum: min_out,
                sqrtPriceLimitX96: U160::ZERO,
            },
        }
        .abi_encode();
        action.push_step(
            ActionStep::new("swap", StepType::Swap, &swap.chain, &swap.rpc_url, router, data)
                .with_description(format!(
                    "Swap {} {} for at least {min_out} {} (base units) on uniswap",
                    swap.amount, swap.from.symbol, swap.to.symbol
                )),
        );
        info!(action_id = %action.action_id, %min_out, "planned uniswap swap");
        Ok(action)
    }
}
