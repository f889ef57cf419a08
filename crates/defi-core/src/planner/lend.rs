//! Lending planners for Aave v3 and Morpho Blue.
//!
//! Both share input validation and the allowance check; they differ in how
//! the target contract is discovered and how calls are encoded. Supply and
//! repay pull tokens from the sender, so an `approval` step is inserted ahead
//! of the `lend_call` whenever the live allowance is short.

use alloy::primitives::{address, Address, Bytes, B256, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use tracing::{debug, info};

use super::approval::approval_if_needed;
use super::{optional_address, positive_amount, read_call, resolve_token, PlanContext};
use crate::action::{Action, ActionStep};
use crate::chain::abi::{IAavePool, IMorpho, IPoolAddressesProvider};
use crate::chain::ChainReader;
use crate::error::{DefiError, Result};
use crate::registry::{parse_address, resolve_chain, Asset, Chain};
use crate::types::{LendVerb, StepType};

// ---------------------------------------------------------------------------
// Request / trait
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LendRequest {
    pub protocol: String,
    pub verb: LendVerb,
    pub chain: String,
    pub asset: String,
    pub amount: Option<String>,
    pub amount_decimal: Option<String>,
    pub decimals: Option<u8>,
    pub sender: String,
    pub recipient: Option<String>,
    pub on_behalf_of: Option<String>,
    pub interest_rate_mode: Option<u8>,
    pub market_id: Option<String>,
    /// Aave pool or Morpho Blue contract override.
    pub pool_address: Option<String>,
    pub pool_address_provider: Option<String>,
    pub rpc_url: Option<String>,
    pub simulate: bool,
}

impl LendRequest {
    pub fn new(protocol: &str, verb: LendVerb, chain: &str, asset: &str, sender: &str) -> Self {
        Self {
            protocol: protocol.to_string(),
            verb,
            chain: chain.to_string(),
            asset: asset.to_string(),
            amount: None,
            amount_decimal: None,
            decimals: None,
            sender: sender.to_string(),
            recipient: None,
            on_behalf_of: None,
            interest_rate_mode: None,
            market_id: None,
            pool_address: None,
            pool_address_provider: None,
            rpc_url: None,
            simulate: true,
        }
    }
}

#[async_trait]
pub trait LendPlanner: Send + Sync {
    fn protocol(&self) -> &'static str;
    async fn build(&self, req: &LendRequest) -> Result<Action>;
}

/// Validated inputs common to every lending protocol.
struct LendInputs {
    chain: Chain,
    asset: Asset,
    amount: U256,
    sender: Address,
    recipient: Address,
    on_behalf_of: Address,
    rpc_url: String,
}

fn validate(ctx: &PlanContext, req: &LendRequest) -> Result<LendInputs> {
    let chain = resolve_chain(&req.chain)?;
    let asset = resolve_token(&chain, &req.asset, req.decimals)?;
    let sender = parse_address("sender", &req.sender)?;
    let recipient = optional_address("recipient", req.recipient.as_deref())?.unwrap_or(sender);
    let on_behalf_of =
        optional_address("on-behalf-of", req.on_behalf_of.as_deref())?.unwrap_or(sender);
    let amount = positive_amount(&asset, req.amount.as_deref(), req.amount_decimal.as_deref())?;
    let rpc_url = ctx.rpc_url(&chain, req.rpc_url.as_deref());
    Ok(LendInputs {
        chain,
        asset,
        amount,
        sender,
        recipient,
        on_behalf_of,
        rpc_url,
    })
}

/// Interest rate mode for Aave borrow/repay: 1 stable, 2 variable (default).
fn rate_mode(raw: Option<u8>) -> Result<u8> {
    match raw.unwrap_or(2) {
        m @ (1 | 2) => Ok(m),
        other => Err(DefiError::usage(format!(
            "interest rate mode must be 1 (stable) or 2 (variable), got {other}"
        ))),
    }
}

async fn finish(
    mut action: Action,
    reader: &dyn ChainReader,
    inputs: &LendInputs,
    verb: LendVerb,
    target: Address,
    data: Vec<u8>,
    label: &str,
) -> Result<Action> {
    if verb.needs_allowance() {
        if let Some(step) = approval_if_needed(
            reader,
            &inputs.chain,
            &inputs.rpc_url,
            &inputs.asset,
            inputs.sender,
            target,
            inputs.amount,
        )
        .await?
        {
            action.push_step(step);
        }
    }
    action.push_step(
        ActionStep::new(
            format!("lend-{verb}"),
            StepType::LendCall,
            &inputs.chain,
            &inputs.rpc_url,
            target,
            data,
        )
        .with_description(format!(
            "{label} {verb} {} {} (base units) on {}",
            inputs.amount, inputs.asset.symbol, inputs.chain
        )),
    );
    info!(
        action_id = %action.action_id,
        steps = action.steps.len(),
        "planned {label} {verb}"
    );
    Ok(action)
}

// ---------------------------------------------------------------------------
// Aave v3
// ---------------------------------------------------------------------------

/// Built-in `PoolAddressesProvider` per chain.
pub fn default_aave_address_provider(chain: &Chain) -> Option<Address> {
    match chain.id {
        1 => Some(address!("2f39d218133afab8f2b819b1066c7e434ad94e9e")),
        8453 => Some(address!("e20fcbdbffc4dd138ce8b2e6fbb6cb49777ad64d")),
        10 | 137 | 42161 | 43114 => Some(address!("a97684ead0e402dc232d5a977953df7ecbab3cdb")),
        _ => None,
    }
}

/// Provider from override, config, or the built-in table.
pub(crate) fn aave_address_provider(
    ctx: &PlanContext,
    chain: &Chain,
    explicit: Option<Address>,
) -> Result<Address> {
    explicit
        .or_else(|| ctx.config.chain(chain).and_then(|c| c.aave_pool_address_provider))
        .or_else(|| default_aave_address_provider(chain))
        .ok_or_else(|| {
            DefiError::unsupported(format!(
                "no Aave v3 deployment known on {chain}; pass --pool-address-provider"
            ))
        })
}

/// Pool from override, config, or `PoolAddressesProvider.getPool()`.
pub(crate) async fn resolve_aave_pool(
    ctx: &PlanContext,
    chain: &Chain,
    reader: &dyn ChainReader,
    pool_override: Option<Address>,
    provider_override: Option<Address>,
) -> Result<Address> {
    if let Some(pool) =
        pool_override.or_else(|| ctx.config.chain(chain).and_then(|c| c.aave_pool_address))
    {
        return Ok(pool);
    }
    let provider = aave_address_provider(ctx, chain, provider_override)?;
    let pool = read_call(
        reader,
        provider,
        IPoolAddressesProvider::getPoolCall {},
        "PoolAddressesProvider.getPool",
    )
    .await?;
    if pool.is_zero() {
        return Err(DefiError::unavailable(format!(
            "PoolAddressesProvider {provider} on {chain} returned the zero address"
        )));
    }
    debug!(%provider, %pool, "resolved aave pool");
    Ok(pool)
}

#[derive(Clone)]
pub struct AaveLendPlanner {
    ctx: PlanContext,
}

impl AaveLendPlanner {
    pub fn new(ctx: PlanContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl LendPlanner for AaveLendPlanner {
    fn protocol(&self) -> &'static str {
        "aave"
    }

    async fn build(&self, req: &LendRequest) -> Result<Action> {
        let inputs = validate(&self.ctx, req)?;
        let mode = match req.verb {
            LendVerb::Borrow | LendVerb::Repay => Some(rate_mode(req.interest_rate_mode)?),
            _ => None,
        };
        let pool_override = optional_address("pool", req.pool_address.as_deref())?;
        let provider_override = optional_address(
            "pool address provider",
            req.pool_address_provider.as_deref(),
        )?;

        let reader = self.ctx.reader(&inputs.rpc_url)?;
        let pool = resolve_aave_pool(
            &self.ctx,
            &inputs.chain,
            reader.as_ref(),
            pool_override,
            provider_override,
        )
        .await?;

        let asset = inputs.asset.address;
        let amount = inputs.amount;
        let data = match req.verb {
            LendVerb::Supply => IAavePool::supplyCall {
                asset,
                amount,
                onBehalfOf: inputs.on_behalf_of,
                referralCode: 0,
            }
            .abi_encode(),
            LendVerb::Withdraw => IAavePool::withdrawCall {
                asset,
                amount,
                to: inputs.recipient,
            }
            .abi_encode(),
            LendVerb::Borrow => IAavePool::borrowCall {
                asset,
                amount,
                interestRateMode: U256::from(mode.unwrap_or(2)),
                referralCode: 0,
                onBehalfOf: inputs.on_behalf_of,
            }
            .abi_encode(),
            LendVerb::Repay => IAavePool::repayCall {
                asset,
                amount,
                interestRateMode: U256::from(mode.unwrap_or(2)),
                onBehalfOf: inputs.on_behalf_of,
            }
            .abi_encode(),
        };

        let mut action = Action::new(
            req.verb.intent(),
            &inputs.chain,
            self.protocol(),
            inputs.sender,
            pool,
            amount,
        )
        .with_meta("pool", pool)
        .with_meta("asset", &inputs.asset.symbol)
        .with_meta("asset_address", asset)
        .with_meta("recipient", inputs.recipient)
        .with_meta("on_behalf_of", inputs.on_behalf_of);
        if let Some(m) = mode {
            action = action.with_meta("interest_rate_mode", m);
        }
        action.constraints.simulate = req.simulate;

        finish(action, reader.as_ref(), &inputs, req.verb, pool, data, "Aave v3").await
    }
}

// ---------------------------------------------------------------------------
// Morpho Blue
// ---------------------------------------------------------------------------

pub fn default_morpho_address(chain: &Chain) -> Option<Address> {
    match chain.id {
        1 | 8453 => Some(address!("bbbbbbbbbb9cc5e90e3b3af64bdaf62c37eeffcb")),
        _ => None,
    }
}

#[derive(Clone)]
pub struct MorphoLendPlanner {
    ctx: PlanContext,
}

impl MorphoLendPlanner {
    pub fn new(ctx: PlanContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl LendPlanner for MorphoLendPlanner {
    fn protocol(&self) -> &'static str {
        "morpho"
    }

    async fn build(&self, req: &LendRequest) -> Result<Action> {
        let inputs = validate(&self.ctx, req)?;
        let raw_market = req
            .market_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DefiError::usage("--market-id is required for morpho"))?;
        let market_id: B256 = raw_market.parse().map_err(|_| {
            DefiError::usage(format!(
                "market id must be a 32-byte 0x-prefixed hex string, got '{raw_market}'"
            ))
        })?;

        let morpho = match optional_address("morpho", req.pool_address.as_deref())? {
            Some(a) => a,
            None => self
                .ctx
                .config
                .chain(&inputs.chain)
                .and_then(|c| c.morpho_address)
                .or_else(|| default_morpho_address(&inputs.chain))
                .ok_or_else(|| {
                    DefiError::unsupported(format!(
                        "no Morpho Blue deployment known on {}; pass --pool-address",
                        inputs.chain
                    ))
                })?,
        };

        let market = self
            .ctx
            .morpho
            .market_params(inputs.chain.id, market_id)
            .await?;
        if market.loan_token != inputs.asset.address {
            return Err(DefiError::usage(format!(
                "market {market_id} lends {}, not {} ({})",
                market.loan_token, inputs.asset.symbol, inputs.asset.address
            )));
        }

        let params = market.to_params();
        let amount = inputs.amount;
        let data = match req.verb {
            LendVerb::Supply => IMorpho::supplyCall {
                marketParams: params,
                assets: amount,
                shares: U256::ZERO,
                onBehalf: inputs.on_behalf_of,
                data: Bytes::new(),
            }
            .abi_encode(),
            LendVerb::Withdraw => IMorpho::withdrawCall {
                marketParams: params,
                assets: amount,
                shares: U256::ZERO,
                onBehalf: inputs.on_behalf_of,
                receiver: inputs.recipient,
            }
            .abi_encode(),
            LendVerb::Borrow => IMorpho::borrowCall {
                marketParams: params,
                assets: amount,
                shares: U256::ZERO,
                onBehalf: inputs.on_behalf_of,
                receiver: inputs.recipient,
            }
            .abi_encode(),
            LendVerb::Repay => IMorpho::repayCall {
                marketParams: params,
                assets: amount,
                shares: U256::ZERO,
                onBehalf: inputs.on_behalf_of,
                data: Bytes::new(),
            }
            .abi_encode(),
        };

        let mut action = Action::new(
            req.verb.intent(),
            &inputs.chain,
            self.protocol(),
            inputs.sender,
            morpho,
            amount,
        )
        .with_meta("morpho", morpho)
        .with_meta("market_id", market_id)
        .with_meta("asset", &inputs.asset.symbol)
        .with_meta("asset_address", inputs.asset.address)
        .with_meta("collateral_token", market.collateral_token)
        .with_meta("recipient", inputs.recipient)
        .with_meta("on_behalf_of", inputs.on_behalf_of);
        action.constraints.simulate = req.simulate;

        let reader = self.ctx.reader(&inputs.rpc_url)?;
        finish(action, reader.as_ref(), &inputs, req.verb, morpho, data, "Morpho Blue").await
    }
}
