use clap::{Args, Subcommand};
use defi_core::planner::ApprovalRequest;

use super::exec::{self, ActionIdArg, AmountArgs, ExecArgs, PlanArgs, SignerArgs};
use super::{block_on, Session};

const FAMILY: &str = "approvals";

#[derive(Args, Debug, Clone)]
pub struct ApprovalArgs {
    #[arg(long)]
    pub chain: String,

    /// Asset symbol or token address
    #[arg(long)]
    pub asset: String,

    /// Contract allowed to spend the tokens
    #[arg(long)]
    pub spender: String,

    #[command(flatten)]
    pub amount: AmountArgs,

    /// Token owner; defaults to the signer's address on `run`
    #[arg(long)]
    pub from_address: Option<String>,

    #[arg(long)]
    pub rpc_url: Option<String>,
}

impl ApprovalArgs {
    fn request(&self, sender: String, simulate: bool) -> ApprovalRequest {
        ApprovalRequest {
            chain: self.chain.clone(),
            asset: self.asset.clone(),
            spender: self.spender.clone(),
            sender,
            amount: self.amount.amount.clone(),
            amount_decimal: self.amount.amount_decimal.clone(),
            decimals: self.amount.decimals,
            rpc_url: self.rpc_url.clone(),
            simulate,
        }
    }
}

#[derive(Subcommand)]
pub enum ApprovalsSubcommand {
    /// Build and persist an ERC-20 approval without broadcasting
    Plan {
        #[command(flatten)]
        args: ApprovalArgs,
        #[command(flatten)]
        plan: PlanArgs,
    },
    /// Plan and execute in one step
    Run {
        #[command(flatten)]
        args: ApprovalArgs,
        #[command(flatten)]
        exec: ExecArgs,
        #[command(flatten)]
        signer: SignerArgs,
    },
    /// Execute (or resume) a persisted approval
    Submit {
        #[command(flatten)]
        id: ActionIdArg,
        #[command(flatten)]
        exec: ExecArgs,
        #[command(flatten)]
        signer: SignerArgs,
    },
    /// Show a persisted approval
    Status {
        #[command(flatten)]
        id: ActionIdArg,
    },
}

pub fn run(session: &Session, subcmd: ApprovalsSubcommand) -> anyhow::Result<()> {
    match subcmd {
        ApprovalsSubcommand::Plan { args, plan } => {
            let sender = exec::plan_sender(args.from_address.as_deref())?;
            let req = args.request(sender, plan.simulate(&session.config));
            let action = session.builder()?.build_approval(&req)?;
            let store = session.store()?;
            exec::finish_plan(session, &store, action)
        }
        ApprovalsSubcommand::Run { args, exec, signer } => {
            let signer = exec::resolve_signer(&signer)?;
            let (opts, limit) = exec.bounded_options(session);
            let req = args.request(
                exec::run_sender(args.from_address.as_deref(), &signer),
                opts.simulate,
            );
            let action = session.builder()?.build_approval(&req)?;
            let store = session.store()?;
            block_on(limit, async {
                exec::persist_and_execute(session, &store, action, &signer, &opts).await
            })
        }
        ApprovalsSubcommand::Submit { id, exec, signer } => {
            exec::submit(session, FAMILY, &id, &exec, &signer)
        }
        ApprovalsSubcommand::Status { id } => exec::status(session, FAMILY, &id),
    }
}
