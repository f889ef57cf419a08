use clap::{Args, Subcommand};
use defi_cli::output::print_fields;
use defi_core::builder::OperationKind;
use defi_core::provider::{BuildOptions, SwapQuote, SwapRequest};

use super::exec::{self, ActionIdArg, AmountArgs, ExecArgs, PlanArgs, SignerArgs};
use super::{block_on, Session};

const FAMILY: &str = "swap";

#[derive(Args, Debug, Clone)]
pub struct SwapArgs {
    /// Swap provider: uniswap or 1inch
    #[arg(long, default_value = "uniswap")]
    pub provider: String,

    #[arg(long)]
    pub chain: String,

    #[arg(long)]
    pub from_asset: String,

    #[arg(long)]
    pub to_asset: String,

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

    /// Uniswap v3 pool fee tier (100, 500, 3000, 10000)
    #[arg(long)]
    pub fee_tier: Option<u32>,

    #[arg(long)]
    pub rpc_url: Option<String>,
}

impl SwapArgs {
    fn request(&self, sender: String) -> SwapRequest {
        SwapRequest {
            chain: self.chain.clone(),
            from_asset: self.from_asset.clone(),
            to_asset: self.to_asset.clone(),
            amount: self.amount.amount.clone(),
            amount_decimal: self.amount.amount_decimal.clone(),
            decimals: self.amount.decimals,
            sender,
            recipient: self.recipient.clone(),
            slippage_bps: self.slippage_bps,
            fee_tier: self.fee_tier,
            rpc_url: self.rpc_url.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum SwapSubcommand {
    /// Price a swap without building a transaction
    Quote {
        #[command(flatten)]
        args: SwapArgs,
    },
    /// Build and persist a swap without broadcasting
    Plan {
        #[command(flatten)]
        args: SwapArgs,
        #[command(flatten)]
        plan: PlanArgs,
    },
    /// Plan and execute in one step
    Run {
        #[command(flatten)]
        args: SwapArgs,
        #[command(flatten)]
        exec: ExecArgs,
        #[command(flatten)]
        signer: SignerArgs,
    },
    /// Execute (or resume) a persisted swap
    Submit {
        #[command(flatten)]
        id: ActionIdArg,
        #[command(flatten)]
        exec: ExecArgs,
        #[command(flatten)]
        signer: SignerArgs,
    },
    /// Show a persisted swap
    Status {
        #[command(flatten)]
        id: ActionIdArg,
    },
}

pub fn run(session: &Session, subcmd: SwapSubcommand) -> anyhow::Result<()> {
    match subcmd {
        SwapSubcommand::Quote { args } => {
            let req = args.request(exec::quote_sender(args.from_address.as_deref()));
            let builder = session.builder()?;
            let quote = block_on(session.default_timeout(), async {
                Ok(builder.quote_swap(&args.provider, &req).await?)
            })?;
            session.emit(&quote, print_quote)
        }
        SwapSubcommand::Plan { args, plan } => {
            let req = args.request(exec::plan_sender(args.from_address.as_deref())?);
            let opts = BuildOptions {
                simulate: plan.simulate(&session.config),
            };
            let builder = session.builder()?;
            let store = session.store()?;
            let action = block_on(session.default_timeout(), async {
                Ok(builder
                    .build_swap(&args.provider, OperationKind::Plan, &req, &opts)
                    .await?)
            })?;
            exec::finish_plan(session, &store, action)
        }
        SwapSubcommand::Run { args, exec, signer } => {
            let signer = exec::resolve_signer(&signer)?;
            let (opts, limit) = exec.bounded_options(session);
            let req = args.request(exec::run_sender(args.from_address.as_deref(), &signer));
            let build = BuildOptions {
                simulate: opts.simulate,
            };
            let builder = session.builder()?;
            let store = session.store()?;
            block_on(limit, async {
                let action = builder
                    .build_swap(&args.provider, OperationKind::Execute, &req, &build)
                    .await?;
                exec::persist_and_execute(session, &store, action, &signer, &opts).await
            })
        }
        SwapSubcommand::Submit { id, exec, signer } => {
            exec::submit(session, FAMILY, &id, &exec, &signer)
        }
        SwapSubcommand::Status { id } => exec::status(session, FAMILY, &id),
    }
}

fn print_quote(quote: &SwapQuote) {
    let mut fields = vec![
        ("provider", quote.provider.clone()),
        ("chain", quote.chain_id.clone()),
        ("from", quote.from_asset.clone()),
        ("to", quote.to_asset.clone()),
        ("amount in", quote.amount_in.clone()),
        ("amount out", quote.amount_out.clone()),
    ];
    if let Some(d) = &quote.amount_out_decimal {
        fields.push(("amount out (decimal)", d.clone()));
    }
    if let Some(gas) = quote.estimated_gas {
        fields.push(("estimated gas", gas.to_string()));
    }
    if let Some(tier) = quote.fee_tier {
        fields.push(("fee tier", tier.to_string()));
    }
    print_fields(&fields);
}
