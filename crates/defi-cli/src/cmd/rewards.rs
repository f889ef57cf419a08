use clap::{Args, Subcommand};
use defi_core::planner::{ClaimRequest, CompoundRequest};

use super::exec::{self, ActionIdArg, ExecArgs, PlanArgs, SignerArgs};
use super::{block_on, Session};

const CLAIM_FAMILY: &str = "rewards claim";
const COMPOUND_FAMILY: &str = "rewards compound";

#[derive(Args, Debug, Clone)]
pub struct ClaimArgs {
    #[arg(long, default_value = "aave")]
    pub protocol: String,

    #[arg(long)]
    pub chain: String,

    /// Incentivized assets (aTokens or debt tokens), comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    pub assets: Vec<String>,

    /// Reward token symbol or address
    #[arg(long)]
    pub reward_token: String,

    /// Base units to claim, or `max`
    #[arg(long, default_value = "max")]
    pub amount: String,

    /// Claimer; defaults to the signer's address on `run`
    #[arg(long)]
    pub from_address: Option<String>,

    /// Receiver of the claimed rewards
    #[arg(long)]
    pub recipient: Option<String>,

    /// RewardsController override
    #[arg(long)]
    pub controller_address: Option<String>,

    /// Aave PoolAddressesProvider override
    #[arg(long)]
    pub pool_address_provider: Option<String>,

    #[arg(long)]
    pub rpc_url: Option<String>,
}

impl ClaimArgs {
    fn request(&self, sender: String, simulate: bool) -> ClaimRequest {
        ClaimRequest {
            protocol: self.protocol.clone(),
            chain: self.chain.clone(),
            sender,
            recipient: self.recipient.clone(),
            assets: self.assets.clone(),
            reward_token: self.reward_token.clone(),
            amount: self.amount.clone(),
            controller_address: self.controller_address.clone(),
            pool_address_provider: self.pool_address_provider.clone(),
            rpc_url: self.rpc_url.clone(),
            simulate,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct CompoundArgs {
    #[command(flatten)]
    pub claim: ClaimArgs,

    /// Aave pool override for the re-supply
    #[arg(long)]
    pub pool_address: Option<String>,

    /// Position owner credited with the re-supplied rewards
    #[arg(long)]
    pub on_behalf_of: Option<String>,
}

impl CompoundArgs {
    fn request(&self, sender: String, simulate: bool) -> CompoundRequest {
        CompoundRequest {
            claim: self.claim.request(sender, simulate),
            pool_address: self.pool_address.clone(),
            on_behalf_of: self.on_behalf_of.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum RewardsSubcommand {
    /// Claim accrued incentives
    Claim {
        #[command(subcommand)]
        subcommand: ClaimSubcommand,
    },
    /// Claim a fixed amount and supply it back to the pool
    Compound {
        #[command(subcommand)]
        subcommand: CompoundSubcommand,
    },
}

#[derive(Subcommand)]
pub enum ClaimSubcommand {
    /// Build and persist a claim without broadcasting
    Plan {
        #[command(flatten)]
        args: ClaimArgs,
        #[command(flatten)]
        plan: PlanArgs,
    },
    /// Plan and execute in one step
    Run {
        #[command(flatten)]
        args: ClaimArgs,
        #[command(flatten)]
        exec: ExecArgs,
        #[command(flatten)]
        signer: SignerArgs,
    },
    /// Execute (or resume) a persisted claim
    Submit {
        #[command(flatten)]
        id: ActionIdArg,
        #[command(flatten)]
        exec: ExecArgs,
        #[command(flatten)]
        signer: SignerArgs,
    },
    /// Show a persisted claim
    Status {
        #[command(flatten)]
        id: ActionIdArg,
    },
}

#[derive(Subcommand)]
pub enum CompoundSubcommand {
    /// Build and persist a compound without broadcasting
    Plan {
        #[command(flatten)]
        args: CompoundArgs,
        #[command(flatten)]
        plan: PlanArgs,
    },
    /// Plan and execute in one step
    Run {
        #[command(flatten)]
        args: CompoundArgs,
        #[command(flatten)]
        exec: ExecArgs,
        #[command(flatten)]
        signer: SignerArgs,
    },
    /// Execute (or resume) a persisted compound
    Submit {
        #[command(flatten)]
        id: ActionIdArg,
        #[command(flatten)]
        exec: ExecArgs,
        #[command(flatten)]
        signer: SignerArgs,
    },
    /// Show a persisted compound
    Status {
        #[command(flatten)]
        id: ActionIdArg,
    },
}

pub fn run(session: &Session, subcmd: RewardsSubcommand) -> anyhow::Result<()> {
    match subcmd {
        RewardsSubcommand::Claim { subcommand } => claim(session, subcommand),
        RewardsSubcommand::Compound { subcommand } => compound(session, subcommand),
    }
}

fn claim(session: &Session, subcmd: ClaimSubcommand) -> anyhow::Result<()> {
    match subcmd {
        ClaimSubcommand::Plan { args, plan } => {
            let sender = exec::plan_sender(args.from_address.as_deref())?;
            let req = args.request(sender, plan.simulate(&session.config));
            let builder = session.builder()?;
            let store = session.store()?;
            let action = block_on(session.default_timeout(), async {
                Ok(builder.build_rewards_claim(&req).await?)
            })?;
            exec::finish_plan(session, &store, action)
        }
        ClaimSubcommand::Run { args, exec, signer } => {
            let signer = exec::resolve_signer(&signer)?;
            let (opts, limit) = exec.bounded_options(session);
            let req = args.request(
                exec::run_sender(args.from_address.as_deref(), &signer),
                opts.simulate,
            );
            let builder = session.builder()?;
            let store = session.store()?;
            block_on(limit, async {
                let action = builder.build_rewards_claim(&req).await?;
                exec::persist_and_execute(session, &store, action, &signer, &opts).await
            })
        }
        ClaimSubcommand::Submit { id, exec, signer } => {
            exec::submit(session, CLAIM_FAMILY, &id, &exec, &signer)
        }
        ClaimSubcommand::Status { id } => exec::status(session, CLAIM_FAMILY, &id),
    }
}

fn compound(session: &Session, subcmd: CompoundSubcommand) -> anyhow::Result<()> {
    match subcmd {
        CompoundSubcommand::Plan { args, plan } => {
            let sender = exec::plan_sender(args.claim.from_address.as_deref())?;
            let req = args.request(sender, plan.simulate(&session.config));
            let builder = session.builder()?;
            let store = session.store()?;
            let action = block_on(session.default_timeout(), async {
                Ok(builder.build_rewards_compound(&req).await?)
            })?;
            exec::finish_plan(session, &store, action)
        }
        CompoundSubcommand::Run { args, exec, signer } => {
            let signer = exec::resolve_signer(&signer)?;
            let (opts, limit) = exec.bounded_options(session);
            let req = args.request(
                exec::run_sender(args.claim.from_address.as_deref(), &signer),
                opts.simulate,
            );
            let builder = session.builder()?;
            let store = session.store()?;
            block_on(limit, async {
                let action = builder.build_rewards_compound(&req).await?;
                exec::persist_and_execute(session, &store, action, &signer, &opts).await
            })
        }
        CompoundSubcommand::Submit { id, exec, signer } => {
            exec::submit(session, COMPOUND_FAMILY, &id, &exec, &signer)
        }
        CompoundSubcommand::Status { id } => exec::status(session, COMPOUND_FAMILY, &id),
    }
}
