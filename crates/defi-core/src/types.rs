use crate::error::DefiError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// IntentType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    LendSupply,
    LendWithdraw,
    LendBorrow,
    LendRepay,
    ClaimRewards,
    CompoundRewards,
    Approve,
    Swap,
    Bridge,
}

impl IntentType {
    pub fn as_str(self) -> &'static str {
        match self {
            IntentType::LendSupply => "lend_supply",
            IntentType::LendWithdraw => "lend_withdraw",
            IntentType::LendBorrow => "lend_borrow",
            IntentType::LendRepay => "lend_repay",
            IntentType::ClaimRewards => "claim_rewards",
            IntentType::CompoundRewards => "compound_rewards",
            IntentType::Approve => "approve",
            IntentType::Swap => "swap",
            IntentType::Bridge => "bridge",
        }
    }

    /// The command family that owns actions of this intent.
    pub fn family(self) -> &'static str {
        match self {
            IntentType::LendSupply
            | IntentType::LendWithdraw
            | IntentType::LendBorrow
            | IntentType::LendRepay => "lend",
            IntentType::ClaimRewards => "rewards claim",
            IntentType::CompoundRewards => "rewards compound",
            IntentType::Approve => "approvals",
            IntentType::Swap => "swap",
            IntentType::Bridge => "bridge",
        }
    }
}

impl fmt::Display for IntentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ActionStatus
// ---------------------------------------------------------------------------

/// Persisted lifecycle of an action.
///
/// Transitions: `Planned → Running → Completed | Failed`, and `Failed → Running`
/// when a later `submit` resumes the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Planned,
    Running,
    Completed,
    Failed,
}

impl ActionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionStatus::Planned => "planned",
            ActionStatus::Running => "running",
            ActionStatus::Completed => "completed",
            ActionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionStatus {
    type Err = DefiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "planned" => Ok(ActionStatus::Planned),
            "running" | "executing" => Ok(ActionStatus::Running),
            "completed" => Ok(ActionStatus::Completed),
            "failed" => Ok(ActionStatus::Failed),
            other => Err(DefiError::usage(format!(
                "unknown action status '{other}' (valid values: planned, running, completed, failed)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// StepType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Approval,
    LendCall,
    Claim,
    Swap,
    Bridge,
}

impl StepType {
    pub fn as_str(self) -> &'static str {
        match self {
            StepType::Approval => "approval",
            StepType::LendCall => "lend_call",
            StepType::Claim => "claim",
            StepType::Swap => "swap",
            StepType::Bridge => "bridge",
        }
    }

    /// Steps whose calldata comes from a third-party provider rather than
    /// from our own encoders.
    pub fn is_provider_built(self) -> bool {
        matches!(self, StepType::Swap | StepType::Bridge)
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StepStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Submitted,
    Confirmed,
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Submitted => "submitted",
            StepStatus::Confirmed => "confirmed",
            StepStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// LendVerb
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LendVerb {
    Supply,
    Withdraw,
    Borrow,
    Repay,
}

impl LendVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            LendVerb::Supply => "supply",
            LendVerb::Withdraw => "withdraw",
            LendVerb::Borrow => "borrow",
            LendVerb::Repay => "repay",
        }
    }

    pub fn intent(self) -> IntentType {
        match self {
            LendVerb::Supply => IntentType::LendSupply,
            LendVerb::Withdraw => IntentType::LendWithdraw,
            LendVerb::Borrow => IntentType::LendBorrow,
            LendVerb::Repay => IntentType::LendRepay,
        }
    }

    /// Verbs that pull tokens from the sender and therefore need an allowance.
    pub fn needs_allowance(self) -> bool {
        matches!(self, LendVerb::Supply | LendVerb::Repay)
    }
}

impl fmt::Display for LendVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LendVerb {
    type Err = DefiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supply" | "deposit" => Ok(LendVerb::Supply),
            "withdraw" => Ok(LendVerb::Withdraw),
            "borrow" => Ok(LendVerb::Borrow),
            "repay" => Ok(LendVerb::Repay),
            other => Err(DefiError::usage(format!(
                "unknown lend verb '{other}' (valid values: supply, withdraw, borrow, repay)"
            ))),
        }
    }
}
