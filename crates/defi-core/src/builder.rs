//! Action builder registry.
//!
//! One `ActionBuilder` is constructed per process from a [`PlanContext`]. It
//! owns every lending planner and swap/bridge provider keyed by normalized
//! name, and routes each request after collapsing protocol aliases.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::action::Action;
use crate::error::{DefiError, Result};
use crate::planner::{
    approval, rewards, AaveLendPlanner, ApprovalRequest, ClaimRequest, CompoundRequest,
    LendPlanner, LendRequest, MorphoLendPlanner, PlanContext,
};
use crate::provider::{
    AcrossProvider, BridgeProvider, BridgeQuote, BridgeRequest, BuildOptions, LifiProvider,
    OneInchProvider, SwapProvider, SwapQuote, SwapRequest, UniswapProvider,
};

/// Whether a swap is being planned or planned-and-executed, for error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Plan,
    Execute,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationKind::Plan => "planning",
            OperationKind::Execute => "execution",
        })
    }
}

/// Trim, lowercase and collapse protocol-family aliases.
pub fn normalize_name(raw: &str) -> String {
    let name = raw.trim().to_ascii_lowercase();
    match name.as_str() {
        "aave-v3" | "aavev3" | "aave_v3" | "aave3" => "aave".to_string(),
        "morpho-blue" | "morphoblue" | "morpho_blue" => "morpho".to_string(),
        "uniswap-v3" | "uniswapv3" | "uniswap_v3" | "univ3" => "uniswap".to_string(),
        "li.fi" | "li-fi" | "li_fi" => "lifi".to_string(),
        "oneinch" | "one-inch" | "1-inch" => "1inch".to_string(),
        "across-protocol" | "across_protocol" => "across".to_string(),
        _ => name,
    }
}

pub struct ActionBuilder {
    ctx: PlanContext,
    lend: BTreeMap<String, Arc<dyn LendPlanner>>,
    swap: BTreeMap<String, Arc<dyn SwapProvider>>,
    bridge: BTreeMap<String, Arc<dyn BridgeProvider>>,
}

impl ActionBuilder {
    /// Register every built-in planner and provider.
    pub fn new(ctx: PlanContext) -> Result<Self> {
        let mut builder = Self {
            ctx: ctx.clone(),
            lend: BTreeMap::new(),
            swap: BTreeMap::new(),
            bridge: BTreeMap::new(),
        };
        builder.register_lend(Arc::new(AaveLendPlanner::new(ctx.clone())));
        builder.register_lend(Arc::new(MorphoLendPlanner::new(ctx.clone())));
        builder.register_swap(Arc::new(UniswapProvider::new(ctx.clone())));
        builder.register_swap(Arc::new(OneInchProvider::new(ctx.clone())?));
        builder.register_bridge(Arc::new(LifiProvider::new(ctx.clone())?));
        builder.register_bridge(Arc::new(AcrossProvider::new(ctx)?));
        Ok(builder)
    }

    pub fn register_lend(&mut self, planner: Arc<dyn LendPlanner>) {
        self.lend.insert(planner.protocol().to_string(), planner);
    }

    pub fn register_swap(&mut self, provider: Arc<dyn SwapProvider>) {
        self.swap.insert(provider.name().to_string(), provider);
    }

    pub fn register_bridge(&mut self, provider: Arc<dyn BridgeProvider>) {
        self.bridge.insert(provider.name().to_string(), provider);
    }

    pub fn context(&self) -> &PlanContext {
        &self.ctx
    }

    // -----------------------------------------------------------------------
    // Lending, rewards, approvals
    // -----------------------------------------------------------------------

    pub async fn build_lend(&self, req: &LendRequest) -> Result<Action> {
        let name = normalize_name(&req.protocol);
        let planner = self
            .lend
            .get(&name)
            .ok_or_else(|| DefiError::UnsupportedProtocol(req.protocol.trim().to_string()))?;
        planner.build(req).await
    }

    pub async fn build_rewards_claim(&self, req: &ClaimRequest) -> Result<Action> {
        require_aave(&req.protocol)?;
        rewards::build_claim(&self.ctx, req).await
    }

    pub async fn build_rewards_compound(&self, req: &CompoundRequest) -> Result<Action> {
        require_aave(&req.claim.protocol)?;
        rewards::build_compound(&self.ctx, req).await
    }

    pub fn build_approval(&self, req: &ApprovalRequest) -> Result<Action> {
        approval::build(&self.ctx, req)
    }

    // -----------------------------------------------------------------------
    // Swaps and bridges
    // -----------------------------------------------------------------------

    fn swap_provider(&self, raw: &str) -> Result<&Arc<dyn SwapProvider>> {
        self.swap
            .get(&normalize_name(raw))
            .ok_or_else(|| DefiError::UnsupportedProtocol(raw.trim().to_string()))
    }

    fn bridge_provider(&self, raw: &str) -> Result<&Arc<dyn BridgeProvider>> {
        self.bridge
            .get(&normalize_name(raw))
            .ok_or_else(|| DefiError::UnsupportedProtocol(raw.trim().to_string()))
    }

    pub fn swap_executors(&self) -> Vec<&str> {
        self.swap
            .iter()
            .filter(|(_, p)| p.as_executor().is_some())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn bridge_executors(&self) -> Vec<&str> {
        self.bridge
            .iter()
            .filter(|(_, p)| p.as_executor().is_some())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub async fn quote_swap(&self, provider: &str, req: &SwapRequest) -> Result<SwapQuote> {
        self.swap_provider(provider)?.quote(req).await
    }

    pub async fn quote_bridge(&self, provider: &str, req: &BridgeRequest) -> Result<BridgeQuote> {
        self.bridge_provider(provider)?.quote(req).await
    }

    pub async fn build_swap(
        &self,
        provider: &str,
        kind: OperationKind,
        req: &SwapRequest,
        opts: &BuildOptions,
    ) -> Result<Action> {
        let p = self.swap_provider(provider)?;
        let executor = p.as_executor().ok_or_else(|| {
            let verb = match kind {
                OperationKind::Plan => "cannot plan",
                OperationKind::Execute => "cannot execute",
            };
            DefiError::unsupported(format!(
                "swap provider '{}' is quote-only and {verb} swaps; {kind} is supported by: {}",
                p.name(),
                self.swap_executors().join(", ")
            ))
        })?;
        executor.build_action(req, opts).await
    }

    pub async fn build_bridge(
        &self,
        provider: &str,
        req: &BridgeRequest,
        opts: &BuildOptions,
    ) -> Result<Action> {
        let p = self.bridge_provider(provider)?;
        let executor = p.as_executor().ok_or_else(|| {
            DefiError::unsupported(format!(
                "bridge provider '{}' is quote-only; executable bridge providers: {}",
                p.name(),
                self.bridge_executors().join(", ")
            ))
        })?;
        executor.build_action(req, opts).await
    }
}

fn require_aave(protocol: &str) -> Result<()> {
    let name = if protocol.trim().is_empty() {
        "aave".to_string()
    } else {
        normalize_name(protocol)
    };
    if name != "aave" {
        return Err(DefiError::UnsupportedProtocol(protocol.trim().to_string()));
    }
    Ok(())
}
