use anyhow::Context;
use clap::Subcommand;
use defi_cli::output::print_success;
use defi_core::config::{starter_config, Config, WarnLevel};
use defi_core::io::write_if_missing;

use super::Session;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Write a starter config.yaml into the state directory
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration and any validation warnings
    Show,

    /// Validate the config for common mistakes
    Validate,
}

pub fn run(session: &Session, subcmd: ConfigSubcommand) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Init { force } => init(session, force),
        ConfigSubcommand::Show => show(session),
        ConfigSubcommand::Validate => validate(session),
    }
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn init(session: &Session, force: bool) -> anyhow::Result<()> {
    let path = &session.config_path;
    let starter = starter_config();
    let written = if force {
        starter.save(path)?;
        true
    } else {
        let data = serde_yaml::to_string(&starter)?;
        write_if_missing(path, data.as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?
    };

    let value = serde_json::json!({
        "path": path.display().to_string(),
        "created": written,
    });
    if session.json {
        print_success(&value)
    } else {
        if written {
            println!("Wrote {}", path.display());
        } else {
            println!("{} already exists (use --force to overwrite)", path.display());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

/// Copy of `config` safe to print.
fn redacted(config: &Config) -> Config {
    let mut out = config.clone();
    if out.providers.oneinch_api_key.is_some() {
        out.providers.oneinch_api_key = Some("***".to_string());
    }
    out
}

fn show(session: &Session) -> anyhow::Result<()> {
    let config = redacted(&session.config);
    let warnings = session.config.validate();

    if session.json {
        let value = serde_json::json!({
            "path": session.config_path.display().to_string(),
            "home": session.home.display().to_string(),
            "config": config,
            "warnings": warnings,
        });
        return print_success(&value);
    }

    println!("# {}", session.config_path.display());
    print!("{}", serde_yaml::to_string(&config)?);
    for w in &warnings {
        let prefix = match w.level {
            WarnLevel::Warning => "warning",
            WarnLevel::Error => "error",
        };
        eprintln!("[{prefix}] {}", w.message);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(session: &Session) -> anyhow::Result<()> {
    let warnings = session.config.validate();

    if session.json {
        print_success(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        return Err(defi_core::DefiError::usage("config validation found errors").into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redaction_hides_api_key() {
        let mut config = Config::default();
        config.providers.oneinch_api_key = Some("secret".into());
        let shown = redacted(&config);
        assert_eq!(shown.providers.oneinch_api_key.as_deref(), Some("***"));
        assert!(redacted(&Config::default()).providers.oneinch_api_key.is_none());
    }
}
