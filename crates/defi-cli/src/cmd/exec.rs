//! Flags and helpers shared by every `plan | run | submit | status` family.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, ValueEnum};
use defi_core::action::{Action, ActionStore};
use defi_core::chain::{AlloyClientFactory, LocalSigner, Signer};
use defi_core::config::Config;
use defi_core::engine::{ExecutionOptions, Executor};
use defi_core::DefiError;
use tracing::info;

use super::{block_on, print_action, Session};

pub const PRIVATE_KEY_ENV: &str = "DEFI_PRIVATE_KEY";

// ---------------------------------------------------------------------------
// Shared argument groups
// ---------------------------------------------------------------------------

#[derive(Args, Debug, Clone, Default)]
pub struct AmountArgs {
    /// Amount in base units (integer)
    #[arg(long, conflicts_with = "amount_decimal")]
    pub amount: Option<String>,

    /// Amount in human decimal form, e.g. 1.5
    #[arg(long)]
    pub amount_decimal: Option<String>,

    /// Token decimals, for assets the registry does not know
    #[arg(long)]
    pub decimals: Option<u8>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PlanArgs {
    /// Require a preflight eth_call of every step at execution time
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub simulate: Option<bool>,
}

impl PlanArgs {
    pub fn simulate(&self, config: &Config) -> bool {
        self.simulate.unwrap_or(config.execution.simulate)
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ExecArgs {
    /// Simulate each step with eth_call before signing
    #[arg(long, value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub simulate: Option<bool>,

    /// Receipt polling interval, e.g. 2s
    #[arg(long)]
    pub poll_interval: Option<humantime::Duration>,

    /// Maximum wait for one step's receipt, e.g. 2m
    #[arg(long)]
    pub step_timeout: Option<humantime::Duration>,

    /// Multiplier applied to estimated gas (must be greater than 1)
    #[arg(long)]
    pub gas_multiplier: Option<f64>,

    /// EIP-1559 max fee per gas, in gwei
    #[arg(long)]
    pub max_fee_gwei: Option<String>,

    /// EIP-1559 max priority fee per gas, in gwei
    #[arg(long)]
    pub max_priority_fee_gwei: Option<String>,

    /// Permit approval steps larger than the action amount
    #[arg(long)]
    pub allow_max_approval: bool,

    /// Skip target and calldata checks on provider-built transactions
    #[arg(long)]
    pub unsafe_provider_tx: bool,

    /// Bound on the whole command, e.g. 10m
    #[arg(long)]
    pub timeout: Option<humantime::Duration>,
}

impl ExecArgs {
    pub fn options(&self, config: &Config) -> ExecutionOptions {
        let mut opts = ExecutionOptions::from_defaults(&config.execution);
        if let Some(simulate) = self.simulate {
            opts.simulate = simulate;
        }
        if let Some(d) = self.poll_interval {
            opts.poll_interval = d.into();
        }
        if let Some(d) = self.step_timeout {
            opts.step_timeout = d.into();
        }
        if let Some(m) = self.gas_multiplier {
            opts.gas_multiplier = m;
        }
        opts.max_fee_gwei = self.max_fee_gwei.clone();
        opts.max_priority_fee_gwei = self.max_priority_fee_gwei.clone();
        opts.allow_max_approval = self.allow_max_approval;
        opts.unsafe_provider_tx = self.unsafe_provider_tx;
        opts
    }

    pub fn timeout(&self, session: &Session) -> Duration {
        self.timeout
            .map(Duration::from)
            .unwrap_or_else(|| session.default_timeout())
    }

    /// Options whose deadline matches the command timeout, plus that timeout.
    pub fn bounded_options(&self, session: &Session) -> (ExecutionOptions, Duration) {
        let limit = self.timeout(session);
        let mut opts = self.options(&session.config);
        opts.deadline = Some(tokio::time::Instant::now() + limit);
        (opts, limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum KeySource {
    #[default]
    Env,
    File,
    Flag,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SignerArgs {
    /// Signer backend
    #[arg(long, default_value = "local")]
    pub signer: String,

    /// Where the local signer reads its private key
    #[arg(long, value_enum, default_value_t = KeySource::Env)]
    pub key_source: KeySource,

    /// Hex private key (with --key-source flag)
    #[arg(long)]
    pub private_key: Option<String>,

    /// File holding a hex private key (with --key-source file)
    #[arg(long, env = "DEFI_PRIVATE_KEY_FILE")]
    pub key_file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ActionIdArg {
    /// Id of a persisted action
    #[arg(long)]
    pub action_id: String,
}

// ---------------------------------------------------------------------------
// Signer resolution
// ---------------------------------------------------------------------------

pub fn resolve_signer(args: &SignerArgs) -> Result<LocalSigner, DefiError> {
    if !args.signer.trim().eq_ignore_ascii_case("local") {
        return Err(DefiError::unsupported(format!(
            "signer backend '{}' is not supported; use --signer local",
            args.signer.trim()
        )));
    }
    let key = match args.key_source {
        KeySource::Env => std::env::var(PRIVATE_KEY_ENV)
            .map_err(|_| DefiError::signer(format!("{PRIVATE_KEY_ENV} is not set")))?,
        KeySource::File => {
            let path = args.key_file.as_ref().ok_or_else(|| {
                DefiError::signer("--key-source file needs --key-file or DEFI_PRIVATE_KEY_FILE")
            })?;
            std::fs::read_to_string(path).map_err(|e| {
                DefiError::signer(format!("cannot read key file {}: {e}", path.display()))
            })?
        }
        KeySource::Flag => args
            .private_key
            .clone()
            .ok_or_else(|| DefiError::signer("--key-source flag needs --private-key"))?,
    };
    LocalSigner::from_private_key(&key)
}

/// Sender for planning: the explicit flag, required when there is no signer.
pub fn plan_sender(from_address: Option<&str>) -> Result<String, DefiError> {
    from_address
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DefiError::usage("--from-address is required to plan"))
}

/// Sender for quotes, which never sign: the explicit flag or the zero address.
pub fn quote_sender(from_address: Option<&str>) -> String {
    from_address
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("0x0000000000000000000000000000000000000000")
        .to_string()
}

/// Sender for `run`: the explicit flag, else the signer's address.
pub fn run_sender(from_address: Option<&str>, signer: &dyn Signer) -> String {
    from_address
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| signer.address().to_string())
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Persist a freshly planned action and print it.
pub fn finish_plan(session: &Session, store: &ActionStore, mut action: Action) -> anyhow::Result<()> {
    store
        .save(&mut action)
        .context("failed to persist planned action")?;
    info!(action_id = %action.action_id, intent = %action.intent_type, "planned action");
    session.emit(&action, print_action)
}

/// Persist `action`, execute it and print the final state.
pub async fn persist_and_execute(
    session: &Session,
    store: &ActionStore,
    mut action: Action,
    signer: &dyn Signer,
    opts: &ExecutionOptions,
) -> anyhow::Result<()> {
    store
        .save(&mut action)
        .context("failed to persist planned action")?;
    let executor = Executor::new(Arc::new(AlloyClientFactory), store.clone());
    let family = action.intent_type.family();
    let id = action.action_id.clone();
    executor
        .execute(&mut action, signer, opts)
        .await
        .with_context(|| format!("action {id} did not complete; resume with `defi {family} submit --action-id {id}`"))?;
    session.emit(&action, print_action)
}

fn load_family(store: &ActionStore, family: &str, id: &str) -> anyhow::Result<Action> {
    let action = store.get(id)?;
    let owner = action.intent_type.family();
    if owner != family {
        return Err(DefiError::usage(format!(
            "action {} is a {} action; use `defi {owner}` instead of `defi {family}`",
            action.action_id, action.intent_type
        ))
        .into());
    }
    Ok(action)
}

/// `submit --action-id`: load, check the family, then execute.
pub fn submit(
    session: &Session,
    family: &str,
    id: &ActionIdArg,
    exec: &ExecArgs,
    signer: &SignerArgs,
) -> anyhow::Result<()> {
    let store = session.store()?;
    let action = load_family(&store, family, &id.action_id)?;
    let signer = resolve_signer(signer)?;
    let (opts, limit) = exec.bounded_options(session);
    block_on(limit, async {
        let executor = Executor::new(Arc::new(AlloyClientFactory), store.clone());
        let mut action = action;
        let action_id = action.action_id.clone();
        executor
            .execute(&mut action, &signer, &opts)
            .await
            .with_context(|| format!("action {action_id} did not complete"))?;
        session.emit(&action, print_action)
    })
}

/// `status --action-id`: print the persisted action.
pub fn status(session: &Session, family: &str, id: &ActionIdArg) -> anyhow::Result<()> {
    let store = session.store()?;
    let action = load_family(&store, family, &id.action_id)?;
    session.emit(&action, print_action)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn flag_key_source_resolves_signer() {
        let args = SignerArgs {
            signer: "local".into(),
            key_source: KeySource::Flag,
            private_key: Some(ANVIL_KEY.into()),
            key_file: None,
        };
        let signer = resolve_signer(&args).unwrap();
        assert_eq!(
            signer.address().to_string(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
    }

    #[test]
    fn missing_flag_key_is_signer_error() {
        let args = SignerArgs {
            signer: "local".into(),
            key_source: KeySource::Flag,
            ..SignerArgs::default()
        };
        let err = resolve_signer(&args).unwrap_err();
        assert_eq!(err.kind(), defi_core::ErrorKind::Signer);
    }

    #[test]
    fn unknown_backend_is_unsupported() {
        let args = SignerArgs {
            signer: "ledger".into(),
            ..SignerArgs::default()
        };
        let err = resolve_signer(&args).unwrap_err();
        assert_eq!(err.kind(), defi_core::ErrorKind::Unsupported);
    }

    #[test]
    fn key_file_is_trimmed() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("key");
        std::fs::write(&path, format!("{ANVIL_KEY}\n")).unwrap();
        let args = SignerArgs {
            signer: "local".into(),
            key_source: KeySource::File,
            private_key: None,
            key_file: Some(path),
        };
        assert!(resolve_signer(&args).is_ok());
    }

    #[test]
    fn exec_flags_override_config() {
        let config = Config::default();
        let args = ExecArgs {
            simulate: Some(false),
            gas_multiplier: Some(1.5),
            step_timeout: Some("5m".parse().unwrap()),
            ..ExecArgs::default()
        };
        let opts = args.options(&config);
        assert!(!opts.simulate);
        assert_eq!(opts.gas_multiplier, 1.5);
        assert_eq!(opts.step_timeout, Duration::from_secs(300));
        assert_eq!(opts.poll_interval, Duration::from_secs(2));
    }

    #[derive(clap::Parser)]
    struct ExecOnly {
        #[command(flatten)]
        exec: ExecArgs,
    }

    #[test]
    fn simulate_flag_value_is_optional() {
        use clap::Parser;
        let parse = |args: &[&str]| {
            ExecOnly::try_parse_from(std::iter::once("defi").chain(args.iter().copied()))
                .unwrap()
                .exec
                .simulate
        };
        assert_eq!(parse(&[]), None);
        assert_eq!(parse(&["--simulate"]), Some(true));
        assert_eq!(parse(&["--simulate", "false"]), Some(false));
        assert_eq!(parse(&["--simulate", "--allow-max-approval"]), Some(true));
    }

    #[test]
    fn plan_requires_sender() {
        assert!(plan_sender(None).is_err());
        assert!(plan_sender(Some("  ")).is_err());
        assert_eq!(plan_sender(Some(" 0xabc ")).unwrap(), "0xabc");
    }
}
