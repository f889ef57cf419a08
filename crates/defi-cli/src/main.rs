mod cmd;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cmd::{
    actions::ActionsSubcommand, approvals::ApprovalsSubcommand, bridge::BridgeSubcommand,
    config::ConfigSubcommand, lend::LendSubcommand, rewards::RewardsSubcommand,
    swap::SwapSubcommand, Session,
};
use defi_cli::output;
use defi_core::{DefiError, ErrorKind};

#[derive(Parser)]
#[command(
    name = "defi",
    about = "Plan, persist and execute DeFi actions across EVM chains",
    version,
    propagate_version = true
)]
struct Cli {
    /// State directory holding config.yaml and the action store (default: ~/.defi)
    #[arg(long, global = true, env = "DEFI_HOME")]
    store: Option<PathBuf>,

    /// Config file (default: <store>/config.yaml)
    #[arg(long, global = true, env = "DEFI_CONFIG")]
    config: Option<PathBuf>,

    /// Output as a JSON envelope
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log progress at info level
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Supply, withdraw, borrow or repay on a lending market
    Lend {
        #[command(subcommand)]
        subcommand: LendSubcommand,
    },

    /// Claim or compound protocol incentives
    Rewards {
        #[command(subcommand)]
        subcommand: RewardsSubcommand,
    },

    /// Grant an ERC-20 allowance
    Approvals {
        #[command(subcommand)]
        subcommand: ApprovalsSubcommand,
    },

    /// Quote or execute a same-chain swap
    Swap {
        #[command(subcommand)]
        subcommand: SwapSubcommand,
    },

    /// Quote or execute a cross-chain transfer
    Bridge {
        #[command(subcommand)]
        subcommand: BridgeSubcommand,
    },

    /// Inspect persisted actions
    Actions {
        #[command(subcommand)]
        subcommand: ActionsSubcommand,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let json = cli.json;
    let result = Session::load(cli.store.as_deref(), cli.config.as_deref(), json).and_then(
        |session| match cli.command {
            Commands::Lend { subcommand } => cmd::lend::run(&session, subcommand),
            Commands::Rewards { subcommand } => cmd::rewards::run(&session, subcommand),
            Commands::Approvals { subcommand } => cmd::approvals::run(&session, subcommand),
            Commands::Swap { subcommand } => cmd::swap::run(&session, subcommand),
            Commands::Bridge { subcommand } => cmd::bridge::run(&session, subcommand),
            Commands::Actions { subcommand } => cmd::actions::run(&session, subcommand),
            Commands::Config { subcommand } => cmd::config::run(&session, subcommand),
        },
    );

    if let Err(e) = result {
        let kind = error_kind(&e);
        if json {
            let _ = output::print_error(kind.as_str(), kind.exit_code(), &format!("{e:#}"));
        } else {
            // Print the full error chain (anyhow's alternate Display)
            eprintln!("error: {e:#}");
        }
        std::process::exit(kind.exit_code());
    }
}

/// Classify by the first `DefiError` in the chain; anything else is internal.
fn error_kind(e: &anyhow::Error) -> ErrorKind {
    e.chain()
        .find_map(|cause| cause.downcast_ref::<DefiError>())
        .map(DefiError::kind)
        .unwrap_or(ErrorKind::Internal)
}
