use clap::Subcommand;
use defi_cli::output::{print_success, print_table};
use defi_core::types::ActionStatus;

use super::{print_action, Session};

#[derive(Subcommand)]
pub enum ActionsSubcommand {
    /// List persisted actions, newest first
    List {
        /// Only actions in this status: planned, running, completed or failed
        #[arg(long)]
        status: Option<String>,

        /// Maximum rows (0 = all)
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show one persisted action
    Show { action_id: String },
}

pub fn run(session: &Session, subcmd: ActionsSubcommand) -> anyhow::Result<()> {
    match subcmd {
        ActionsSubcommand::List { status, limit } => list(session, status.as_deref(), limit),
        ActionsSubcommand::Show { action_id } => {
            let action = session.store()?.get(&action_id)?;
            session.emit(&action, print_action)
        }
    }
}

fn list(session: &Session, status: Option<&str>, limit: usize) -> anyhow::Result<()> {
    let status = status.map(str::parse::<ActionStatus>).transpose()?;
    let actions = session.store()?.list(status, limit)?;

    if session.json {
        return print_success(&actions);
    }
    if actions.is_empty() {
        println!("No actions.");
        return Ok(());
    }
    let rows = actions
        .iter()
        .map(|a| {
            vec![
                a.action_id.clone(),
                a.intent_type.to_string(),
                a.status.to_string(),
                a.chain_id.clone(),
                a.provider.clone(),
                format!("{}/{}", a.confirmed_steps(), a.steps.len()),
                a.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]
        })
        .collect();
    print_table(
        &["ID", "INTENT", "STATUS", "CHAIN", "PROVIDER", "STEPS", "CREATED"],
        rows,
    );
    Ok(())
}
