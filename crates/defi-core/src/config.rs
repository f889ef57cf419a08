use crate::error::Result;
use crate::registry::{resolve_chain, Chain};
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ChainConfig
// ---------------------------------------------------------------------------

/// Per-chain overrides, keyed by canonical chain name in `chains:`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aave_pool_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aave_pool_address_provider: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aave_incentives_controller: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub morpho_address: Option<Address>,
}

// ---------------------------------------------------------------------------
// ExecutionDefaults
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionDefaults {
    #[serde(default = "default_simulate")]
    pub simulate: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,
    #[serde(default = "default_gas_multiplier")]
    pub gas_multiplier: f64,
    /// Outer bound on a whole command.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_simulate() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    2
}

fn default_step_timeout() -> u64 {
    120
}

fn default_gas_multiplier() -> f64 {
    1.2
}

fn default_timeout() -> u64 {
    600
}

impl Default for ExecutionDefaults {
    fn default() -> Self {
        Self {
            simulate: default_simulate(),
            poll_interval_secs: default_poll_interval(),
            step_timeout_secs: default_step_timeout(),
            gas_multiplier: default_gas_multiplier(),
            timeout_secs: default_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProviderConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oneinch_api_key: Option<String>,
    #[serde(default = "default_morpho_api_url")]
    pub morpho_api_url: String,
    #[serde(default = "default_lifi_api_url")]
    pub lifi_api_url: String,
    #[serde(default = "default_across_api_url")]
    pub across_api_url: String,
    #[serde(default = "default_oneinch_api_url")]
    pub oneinch_api_url: String,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

fn default_morpho_api_url() -> String {
    "https://blue-api.morpho.org/graphql".to_string()
}

fn default_lifi_api_url() -> String {
    "https://li.quest/v1".to_string()
}

fn default_across_api_url() -> String {
    "https://app.across.to/api".to_string()
}

fn default_oneinch_api_url() -> String {
    "https://api.1inch.dev/swap/v6.0".to_string()
}

fn default_http_timeout() -> u64 {
    20
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            oneinch_api_key: None,
            morpho_api_url: default_morpho_api_url(),
            lifi_api_url: default_lifi_api_url(),
            across_api_url: default_across_api_url(),
            oneinch_api_url: default_oneinch_api_url(),
            http_timeout_secs: default_http_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chains: BTreeMap<String, ChainConfig>,
    #[serde(default)]
    pub execution: ExecutionDefaults,
    #[serde(default)]
    pub providers: ProviderConfig,
}

impl Config {
    /// Load a config file. A missing or empty file yields the built-in
    /// defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    /// Overrides for `chain`, if any were configured.
    pub fn chain(&self, chain: &Chain) -> Option<&ChainConfig> {
        self.chains.get(chain.name)
    }

    /// RPC endpoint for `chain`: configured URL, else the built-in public one.
    pub fn rpc_url_for(&self, chain: &Chain) -> String {
        self.chain(chain)
            .and_then(|c| c.rpc_url.clone())
            .unwrap_or_else(|| chain.default_rpc_url.to_string())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        for name in self.chains.keys() {
            match resolve_chain(name) {
                Ok(chain) if chain.name != name.as_str() => warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!(
                        "chains.{name}: use the canonical name '{}' as the key",
                        chain.name
                    ),
                }),
                Ok(_) => {}
                Err(_) => warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("chains.{name}: unknown chain"),
                }),
            }
        }

        if self.execution.gas_multiplier <= 1.0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "execution.gas_multiplier must be greater than 1, got {}",
                    self.execution.gas_multiplier
                ),
            });
        }
        if self.execution.poll_interval_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "execution.poll_interval_secs is 0; receipts will be polled in a tight loop"
                    .to_string(),
            });
        }
        if self.execution.step_timeout_secs > self.execution.timeout_secs {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "execution.step_timeout_secs exceeds execution.timeout_secs".to_string(),
            });
        }

        warnings
    }
}

/// Contents written by `defi config init`.
pub fn starter_config() -> Config {
    let mut cfg = Config::default();
    cfg.chains.insert(
        "ethereum".to_string(),
        ChainConfig {
            rpc_url: Some("https://eth.llamarpc.com".to_string()),
            ..ChainConfig::default()
        },
    );
    cfg
}
