pub mod actions;
pub mod approvals;
pub mod bridge;
pub mod config;
pub mod exec;
pub mod lend;
pub mod rewards;
pub mod swap;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use defi_cli::output::{print_fields, print_success, print_table};
use defi_core::action::{Action, ActionStore};
use defi_core::builder::ActionBuilder;
use defi_core::config::Config;
use defi_core::paths;
use defi_core::planner::PlanContext;
use defi_core::DefiError;
use serde::Serialize;

pub const ONEINCH_KEY_ENV: &str = "DEFI_ONEINCH_API_KEY";

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Per-invocation state resolved from the global flags.
pub struct Session {
    pub home: PathBuf,
    pub config_path: PathBuf,
    pub config: Config,
    pub json: bool,
}

impl Session {
    pub fn load(store: Option<&Path>, config: Option<&Path>, json: bool) -> anyhow::Result<Self> {
        let home = paths::resolve_home(store)?;
        let config_path = config
            .map(Path::to_path_buf)
            .unwrap_or_else(|| paths::config_path(&home));
        let mut config = Config::load_from(&config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?;
        if let Some(key) = std::env::var(ONEINCH_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
        {
            config.providers.oneinch_api_key = Some(key);
        }
        Ok(Self {
            home,
            config_path,
            config,
            json,
        })
    }

    pub fn store(&self) -> anyhow::Result<ActionStore> {
        ActionStore::open(&self.home)
            .with_context(|| format!("failed to open action store in {}", self.home.display()))
    }

    pub fn builder(&self) -> anyhow::Result<ActionBuilder> {
        let ctx = PlanContext::new(self.config.clone())?;
        Ok(ActionBuilder::new(ctx)?)
    }

    /// Default bound on a whole command when `--timeout` is not given.
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.config.execution.timeout_secs)
    }

    /// Print `data` as a JSON envelope, or run `human` for text output.
    pub fn emit<T: Serialize>(&self, data: &T, human: impl FnOnce(&T)) -> anyhow::Result<()> {
        if self.json {
            print_success(data)
        } else {
            human(data);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Async bridge
// ---------------------------------------------------------------------------

/// Run `fut` on a fresh runtime, failing with a timeout error after `limit`.
pub fn block_on<T, F>(limit: Duration, fut: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    rt.block_on(async move {
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(DefiError::Timeout(limit.as_secs()).into()),
        }
    })
}

// ---------------------------------------------------------------------------
// Action rendering
// ---------------------------------------------------------------------------

pub fn print_action(action: &Action) {
    let mut fields = vec![
        ("action", action.action_id.clone()),
        ("intent", action.intent_type.to_string()),
        ("status", action.status.to_string()),
        ("chain", action.chain_id.clone()),
        ("provider", action.provider.clone()),
        ("from", action.from_address.to_string()),
        ("to", action.to_address.to_string()),
        ("amount", action.input_amount.to_string()),
    ];
    for (key, value) in &action.metadata {
        fields.push((key.as_str(), value.clone()));
    }
    if let Some(err) = &action.error {
        fields.push(("error", err.clone()));
    }
    print_fields(&fields);
    println!();

    let rows = action
        .steps
        .iter()
        .enumerate()
        .map(|(i, s)| {
            vec![
                (i + 1).to_string(),
                s.step_id.clone(),
                s.step_type.to_string(),
                s.status.to_string(),
                s.target.to_string(),
                s.tx_hash.map(|h| h.to_string()).unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["#", "STEP", "TYPE", "STATUS", "TARGET", "TX"], rows);
}
