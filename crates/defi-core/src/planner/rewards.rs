//! Aave incentives: claim rewards, or claim and re-supply them.

use alloy::primitives::{keccak256, Address, U256};
use alloy::sol_types::SolCall;
use tracing::{debug, info};

use super::approval::approval_if_needed;
use super::lend::{aave_address_provider, resolve_aave_pool};
use super::{optional_address, read_call, PlanContext};
use crate::action::{Action, ActionStep};
use crate::chain::abi::{IAavePool, IPoolAddressesProvider, IRewardsController};
use crate::chain::ChainReader;
use crate::error::{DefiError, Result};
use crate::registry::{parse_address, parse_base_units, resolve_asset, resolve_chain, Chain};
use crate::types::{IntentType, StepType};

#[derive(Debug, Clone, Default)]
pub struct ClaimRequest {
    pub protocol: String,
    pub chain: String,
    pub sender: String,
    pub recipient: Option<String>,
    /// Incentivized asset addresses or symbols (aTokens / debt tokens).
    pub assets: Vec<String>,
    pub reward_token: String,
    /// Base units, or `max` for everything accrued.
    pub amount: String,
    pub controller_address: Option<String>,
    pub pool_address_provider: Option<String>,
    pub rpc_url: Option<String>,
    pub simulate: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CompoundRequest {
    pub claim: ClaimRequest,
    pub pool_address: Option<String>,
    pub on_behalf_of: Option<String>,
}

fn is_max(amount: &str) -> bool {
    amount.trim().eq_ignore_ascii_case("max")
}

fn claim_amount(raw: &str) -> Result<U256> {
    if is_max(raw) {
        return Ok(U256::MAX);
    }
    let value = parse_base_units("amount", raw)?;
    if value.is_zero() {
        return Err(DefiError::usage("amount must be greater than zero or 'max'"));
    }
    Ok(value)
}

/// Parse, normalize and de-duplicate the asset list, keeping first-seen order.
fn claim_assets(chain: &Chain, raw: &[String]) -> Result<Vec<Address>> {
    let mut out: Vec<Address> = Vec::new();
    for entry in raw.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let address = resolve_asset(entry, chain)?.address;
        if !out.contains(&address) {
            out.push(address);
        }
    }
    if out.is_empty() {
        return Err(DefiError::usage("at least one asset is required (--assets)"));
    }
    Ok(out)
}

async fn resolve_controller(
    ctx: &PlanContext,
    chain: &Chain,
    reader: &dyn ChainReader,
    explicit: Option<Address>,
    provider_override: Option<Address>,
) -> Result<Address> {
    if let Some(c) =
        explicit.or_else(|| ctx.config.chain(chain).and_then(|c| c.aave_incentives_controller))
    {
        return Ok(c);
    }
    let provider = aave_address_provider(ctx, chain, provider_override)?;
    let id = keccak256("INCENTIVES_CONTROLLER");
    let controller = read_call(
        reader,
        provider,
        IPoolAddressesProvider::getAddressCall { id },
        "PoolAddressesProvider.getAddress",
    )
    .await?;
    if controller.is_zero() {
        return Err(DefiError::unavailable(format!(
            "no incentives controller registered in {provider} on {chain}"
        )));
    }
    debug!(%controller, "resolved incentives controller");
    Ok(controller)
}

/// Plan `claimRewards(assets, amount, to, reward)`.
pub async fn build_claim(ctx: &PlanContext, req: &ClaimRequest) -> Result<Action> {
    let chain = resolve_chain(&req.chain)?;
    let sender = parse_address("sender", &req.sender)?;
    let recipient = optional_address("recipient", req.recipient.as_deref())?.unwrap_or(sender);
    let assets = claim_assets(&chain, &req.assets)?;
    let reward = resolve_asset(&req.reward_token, &chain)?;
    let amount = claim_amount(&req.amount)?;
    let explicit = optional_address("controller", req.controller_address.as_deref())?;
    let provider_override = optional_address(
        "pool address provider",
        req.pool_address_provider.as_deref(),
    )?;
    let rpc_url = ctx.rpc_url(&chain, req.rpc_url.as_deref());

    let reader = ctx.reader(&rpc_url)?;
    let controller =
        resolve_controller(ctx, &chain, reader.as_ref(), explicit, provider_override).await?;

    let data = IRewardsController::claimRewardsCall {
        assets: assets.clone(),
        amount,
        to: recipient,
        reward: reward.address,
    }
    .abi_encode();

    let amount_label = if amount == U256::MAX {
        "all accrued".to_string()
    } else {
        amount.to_string()
    };
    let mut action = Action::new(
        IntentType::ClaimRewards,
        &chain,
        "aave",
        sender,
        controller,
        amount,
    )
    .with_meta("controller", controller)
    .with_meta("reward_token", &reward.symbol)
    .with_meta("reward_token_address", reward.address)
    .with_meta("recipient", recipient)
    .with_meta(
        "assets",
        assets
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(","),
    );
    action.constraints.simulate = req.simulate;
    action.push_step(
        ActionStep::new(
            "claim-rewards",
            StepType::Claim,
            &chain,
            &rpc_url,
            controller,
            data,
        )
        .with_description(format!(
            "Claim {amount_label} {} rewards from {} assets",
            reward.symbol,
            assets.len()
        )),
    );
    info!(action_id = %action.action_id, "planned rewards claim");
    Ok(action)
}

/// Claim rewards into the sender's wallet and supply them to the Aave pool.
pub async fn build_compound(ctx: &PlanContext, req: &CompoundRequest) -> Result<Action> {
    if is_max(&req.claim.amount) {
        return Err(DefiError::usage(
            "compound needs a concrete amount; 'max' is only valid for claim",
        ));
    }
    let sender = parse_address("sender", &req.claim.sender)?;
    if let Some(recipient) = optional_address("recipient", req.claim.recipient.as_deref())? {
        if recipient != sender {
            return Err(DefiError::usage(
                "compound requires the recipient to be the sender",
            ));
        }
    }
    let on_behalf_of =
        optional_address("on-behalf-of", req.on_behalf_of.as_deref())?.unwrap_or(sender);
    let pool_override = optional_address("pool", req.pool_address.as_deref())?;
    let provider_override = optional_address(
        "pool address provider",
        req.claim.pool_address_provider.as_deref(),
    )?;

    let mut action = build_claim(ctx, &req.claim).await?;
    action.intent_type = IntentType::CompoundRewards;

    let chain = resolve_chain(&req.claim.chain)?;
    let reward = resolve_asset(&req.claim.reward_token, &chain)?;
    let rpc_url = ctx.rpc_url(&chain, req.claim.rpc_url.as_deref());
    let reader = ctx.reader(&rpc_url)?;
    let pool = resolve_aave_pool(
        ctx,
        &chain,
        reader.as_ref(),
        pool_override,
        provider_override,
    )
    .await?;
    let amount = action.input_amount;

    if let Some(step) =
        approval_if_needed(reader.as_ref(), &chain, &rpc_url, &reward, sender, pool, amount)
            .await?
    {
        action.push_step(step);
    }
    let data = IAavePool::supplyCall {
        asset: reward.address,
        amount,
        onBehalfOf: on_behalf_of,
        referralCode: 0,
    }
    .abi_encode();
    action.push_step(
        ActionStep::new(
            "compound-supply",
            StepType::LendCall,
            &chain,
            &rpc_url,
            pool,
            data,
        )
        .with_description(format!(
            "Supply {amount} {} (base units) to Aave v3 on {chain}",
            reward.symbol
        )),
    );
    action = action
        .with_meta("pool", pool)
        .with_meta("on_behalf_of", on_behalf_of);
    info!(action_id = %action.action_id, steps = action.steps.len(), "planned rewards compound");
    Ok(action)
}
