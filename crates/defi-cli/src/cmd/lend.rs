use clap::{Args, Subcommand};
use defi_core::planner::LendRequest;
use defi_core::types::LendVerb;
use defi_core::DefiError;

use super::exec::{self, ActionIdArg, AmountArgs, ExecArgs, PlanArgs, SignerArgs};
use super::{block_on, Session};

const FAMILY: &str = "lend";

#[derive(Args, Debug, Clone)]
pub struct LendArgs {
    /// Lending protocol: aave or morpho
    #[arg(long, default_value = "aave")]
    pub protocol: String,

    /// supply, withdraw, borrow or repay
    #[arg(long)]
    pub verb: String,

    #[arg(long)]
    pub chain: String,

    /// Asset symbol or token address
    #[arg(long)]
    pub asset: String,

    #[command(flatten)]
    pub amount: AmountArgs,

    /// Sender; defaults to the signer's address on `run`
    #[arg(long)]
    pub from_address: Option<String>,

    /// Receiver of withdrawn or borrowed funds
    #[arg(long)]
    pub recipient: Option<String>,

    /// Position owner for supply, borrow and repay
    #[arg(long)]
    pub on_behalf_of: Option<String>,

    /// Aave interest rate mode (2 = variable)
    #[arg(long)]
    pub interest_rate_mode: Option<u8>,

    /// Morpho Blue market id (32-byte hex)
    #[arg(long)]
    pub market_id: Option<String>,

    /// Aave pool or Morpho Blue contract override
    #[arg(long)]
    pub pool_address: Option<String>,

    /// Aave PoolAddressesProvider override
    #[arg(long)]
    pub pool_address_provider: Option<String>,

    #[arg(long)]
    pub rpc_url: Option<String>,
}

impl LendArgs {
    fn request(&self, sender: String, simulate: bool) -> Result<LendRequest, DefiError> {
        let verb: LendVerb = self.verb.parse()?;
        let mut req = LendRequest::new(&self.protocol, verb, &self.chain, &self.asset, &sender);
        req.amount = self.amount.amount.clone();
        req.amount_decimal = self.amount.amount_decimal.clone();
        req.decimals = self.amount.decimals;
        req.recipient = self.recipient.clone();
        req.on_behalf_of = self.on_behalf_of.clone();
        req.interest_rate_mode = self.interest_rate_mode;
        req.market_id = self.market_id.clone();
        req.pool_address = self.pool_address.clone();
        req.pool_address_provider = self.pool_address_provider.clone();
        req.rpc_url = self.rpc_url.clone();
        req.simulate = simulate;
        Ok(req)
    }
}

#[derive(Subcommand)]
pub enum LendSubcommand {
    /// Build and persist a lending action without broadcasting
    Plan {
        #[command(flatten)]
        args: LendArgs,
        #[command(flatten)]
        plan: PlanArgs,
    },
    /// Plan and execute in one step
    Run {
        #[command(flatten)]
        args: LendArgs,
        #[command(flatten)]
        exec: ExecArgs,
        #[command(flatten)]
        signer: SignerArgs,
    },
    /// Execute (or resume) a persisted lending action
    Submit {
        #[command(flatten)]
        id: ActionIdArg,
        #[command(flatten)]
        exec: ExecArgs,
        #[command(flatten)]
        signer: SignerArgs,
    },
    /// Show a persisted lending action
    Status {
        #[command(flatten)]
        id: ActionIdArg,
    },
}

pub fn run(session: &Session, subcmd: LendSubcommand) -> anyhow::Result<()> {
    match subcmd {
        LendSubcommand::Plan { args, plan } => {
            let sender = exec::plan_sender(args.from_address.as_deref())?;
            let req = args.request(sender, plan.simulate(&session.config))?;
            let builder = session.builder()?;
            let store = session.store()?;
            let action = block_on(session.default_timeout(), async {
                Ok(builder.build_lend(&req).await?)
            })?;
            exec::finish_plan(session, &store, action)
        }
        LendSubcommand::Run { args, exec, signer } => {
            let signer = exec::resolve_signer(&signer)?;
            let (opts, limit) = exec.bounded_options(session);
            let req = args.request(
                exec::run_sender(args.from_address.as_deref(), &signer),
                opts.simulate,
            )?;
            let builder = session.builder()?;
            let store = session.store()?;
            block_on(limit, async {
                let action = builder.build_lend(&req).await?;
                exec::persist_and_execute(session, &store, action, &signer, &opts).await
            })
        }
        LendSubcommand::Submit { id, exec, signer } => {
            exec::submit(session, FAMILY, &id, &exec, &signer)
        }
        LendSubcommand::Status { id } => exec::status(session, FAMILY, &id),
    }
}
