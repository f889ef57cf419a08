use clap::{Args, Subcommand};
use defi_cli::output::print_fields;
use defi_core::provider::{BridgeQuote, BridgeRequest, BuildOptions};

use super::exec::{self, ActionIdArg, AmountArgs, ExecArgs, PlanArgs, SignerArgs};
use super::{block_on, Session};

const FAMILY: &str = "bridge";

#[derive(Args, Debug, Clone)]
pub struct BridgeArgs {
    /// Bridge provider: lifi or across
    #[arg(long, default_value = "lifi")]
    pub provider: String,

    #[arg(long)]
    pub from_chain: String,

    #[arg(long)]
    pub to_chain: String,

    /// Asset on the source chain
    #[arg(long)]
    pub asset: String,

    /// Asset on the destination chain (default: same symbol)
    #[arg(long)]
    pub to_asset: Option<String>,

    #[command(flatten)]
    pub amount: AmountArgs,

    /// Sender; defaults to the signer's address on `run`
    #[arg(long)]
    pub from_address: Option<String>,

    #[arg(long)]
    pub recipient: Option<String>,

    /// Maximum slippage in basis points
    #[arg(long)]
    pub slippage_bps: Option<u32>,

    /// RPC for the source chain
    #[arg(long)]
    pub rpc_url: Option<String>,
}

impl BridgeArgs {
    fn request(&self, sender: String) -> BridgeRequest {
        BridgeRequest {
            from_chain: self.from_chain.clone(),
            to_chain: self.to_chain.clone(),
            asset: self.asset.clone(),
            to_asset: self.to_asset.clone(),
            amount: self.amount.amount.clone(),
            amount_decimal: self.amount.amount_decimal.clone(),
            decimals: self.amount.decimals,
            sender,
            recipient: self.recipient.clone(),
            slippage_bps: self.slippage_bps,
            rpc_url: self.rpc_url.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum BridgeSubcommand {
    /// Price a transfer without building a transaction
    Quote {
        #[command(flatten)]
        args: BridgeArgs,
    },
    /// Build and persist a bridge transfer without broadcasting
    Plan {
        #[command(flatten)]
        args: BridgeArgs,
        #[command(flatten)]
        plan: PlanArgs,
    },
    /// Plan and execute in one step
    Run {
        #[command(flatten)]
        args: BridgeArgs,
        #[command(flatten)]
        exec: ExecArgs,
        #[command(flatten)]
        signer: SignerArgs,
    },
    /// Execute (or resume) a persisted bridge transfer
    Submit {
        #[command(flatten)]
        id: ActionIdArg,
        #[command(flatten)]
        exec: ExecArgs,
        #[command(flatten)]
        signer: SignerArgs,
    },
    /// Show a persisted bridge transfer
    Status {
        #[command(flatten)]
        id: ActionIdArg,
    },
}

pub fn run(session: &Session, subcmd: BridgeSubcommand) -> anyhow::Result<()> {
    match subcmd {
        BridgeSubcommand::Quote { args } => {
            let req = args.request(exec::quote_sender(args.from_address.as_deref()));
            let builder = session.builder()?;
            let quote = block_on(session.default_timeout(), async {
                Ok(builder.quote_bridge(&args.provider, &req).await?)
            })?;
            session.emit(&quote, print_quote)
        }
        BridgeSubcommand::Plan { args, plan } => {
            let req = args.request(exec::plan_sender(args.from_address.as_deref())?);
            let opts = BuildOptions {
                simulate: plan.simulate(&session.config),
            };
            let builder = session.builder()?;
            let store = session.store()?;
            let action = block_on(session.default_timeout(), async {
                Ok(builder.build_bridge(&args.provider, &req, &opts).await?)
            })?;
            exec::finish_plan(session, &store, action)
        }
        BridgeSubcommand::Run { args, exec, signer } => {
            let signer = exec::resolve_signer(&signer)?;
            let (opts, limit) = exec.bounded_options(session);
            let req = args.request(exec::run_sender(args.from_address.as_deref(), &signer));
            let build = BuildOptions {
                simulate: opts.simulate,
            };
            let builder = session.builder()?;
            let store = session.store()?;
            block_on(limit, async {
                let action = builder.build_bridge(&args.provider, &req, &build).await?;
                exec::persist_and_execute(session, &store, action, &signer, &opts).await
            })
        }
        BridgeSubcommand::Submit { id, exec, signer } => {
            exec::submit(session, FAMILY, &id, &exec, &signer)
        }
        BridgeSubcommand::Status { id } => exec::status(session, FAMILY, &id),
    }
}

fn print_quote(quote: &BridgeQuote) {
    let mut fields = vec![
        ("provider", quote.provider.clone()),
        ("from", format!("{} on {}", quote.from_asset, quote.from_chain_id)),
        ("to", format!("{} on {}", quote.to_asset, quote.to_chain_id)),
        ("amount in", quote.amount_in.clone()),
        ("estimated out", quote.estimated_amount_out.clone()),
    ];
    if let Some(fee) = &quote.fee {
        fields.push(("fee", fee.clone()));
    }
    if let Some(secs) = quote.estimated_duration_secs {
        fields.push(("duration", format!("{secs}s")));
    }
    if let Some(tool) = &quote.tool {
        fields.push(("tool", tool.clone()));
    }
    print_fields(&fields);
}
