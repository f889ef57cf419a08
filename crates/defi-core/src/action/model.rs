//! Action data model.
//!
//! An `Action` is one user intent compiled into an ordered list of on-chain
//! transactions (`ActionStep`s). It is persisted as soon as it is planned and
//! re-persisted by the engine after every step transition, so the stored copy
//! is always a resumable record of how far execution got.

use std::collections::BTreeMap;

use alloy::primitives::{Address, Bytes, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::registry::Chain;
use crate::types::{ActionStatus, IntentType, StepStatus, StepType};

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

/// Execution policy captured at plan time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    /// Require a preflight `eth_call` of every step before it is signed.
    #[serde(default = "default_simulate")]
    pub simulate: bool,
    #[serde(default)]
    pub slippage_bps: Option<u32>,
    /// Contracts that provider-built steps may target. Empty means no allowlist.
    #[serde(default)]
    pub allowed_targets: Vec<Address>,
}

fn default_simulate() -> bool {
    true
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            simulate: default_simulate(),
            slippage_bps: None,
            allowed_targets: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionStep
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    pub step_id: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub status: StepStatus,
    pub chain_id: String,
    pub rpc_url: String,
    pub target: Address,
    pub data: Bytes,
    #[serde(serialize_with = "serialize_u256", deserialize_with = "deserialize_u256")]
    pub value: U256,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionStep {
    /// Create a pending zero-value call bound to `chain` via `rpc_url`.
    pub fn new(
        step_id: impl Into<String>,
        step_type: StepType,
        chain: &Chain,
        rpc_url: impl Into<String>,
        target: Address,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            step_type,
            status: StepStatus::Pending,
            chain_id: chain.caip2(),
            rpc_url: rpc_url.into(),
            target,
            data: data.into(),
            value: U256::ZERO,
            description: String::new(),
            tx_hash: None,
            error: None,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == StepStatus::Confirmed
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub action_id: String,
    pub intent_type: IntentType,
    pub status: ActionStatus,
    pub chain_id: String,
    pub provider: String,
    pub from_address: Address,
    pub to_address: Address,
    #[serde(serialize_with = "serialize_u256", deserialize_with = "deserialize_u256")]
    pub input_amount: U256,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub constraints: Constraints,
    pub steps: Vec<ActionStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Action {
    /// Create a new action in `Planned` state with a fresh id and no steps.
    pub fn new(
        intent_type: IntentType,
        chain: &Chain,
        provider: impl Into<String>,
        from_address: Address,
        to_address: Address,
        input_amount: U256,
    ) -> Self {
        let now = Utc::now();
        Self {
            action_id: new_action_id(),
            intent_type,
            status: ActionStatus::Planned,
            chain_id: chain.caip2(),
            provider: provider.into(),
            from_address,
            to_address,
            input_amount,
            metadata: BTreeMap::new(),
            constraints: Constraints::default(),
            steps: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }

    pub fn push_step(&mut self, step: ActionStep) {
        self.steps.push(step);
    }

    pub fn confirmed_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.is_confirmed()).count()
    }

    pub fn is_completed(&self) -> bool {
        self.status == ActionStatus::Completed
    }
}

pub fn new_action_id() -> String {
    format!("act_{}", Uuid::new_v4().simple())
}

// ---------------------------------------------------------------------------
// Serde helpers for U256 (serialized as a base-10 string)
// ---------------------------------------------------------------------------

fn serialize_u256<S>(v: &U256, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&v.to_string())
}

fn deserialize_u256<'de, D>(d: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(d)?;
    U256::from_str_radix(raw.trim(), 10).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::resolve_chain;

    fn sample() -> Action {
        let chain = resolve_chain("base").unwrap();
        let mut action = Action::new(
            IntentType::Approve,
            &chain,
            "erc20",
            Address::repeat_byte(0x11),
            Address::repeat_byte(0x22),
            U256::from(1_000_000u64),
        );
        action.push_step(
            ActionStep::new(
                "approve-x",
                StepType::Approval,
                &chain,
                "http://localhost:8545",
                Address::repeat_byte(0x33),
                vec![0x09, 0x5e, 0xa7, 0xb3],
            )
            .with_description("approve"),
        );
        action
    }

    #[test]
    fn amounts_serialize_as_decimal_strings() {
        let action = sample();
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["input_amount"], "1000000");
        assert_eq!(json["steps"][0]["value"], "0");
        assert_eq!(json["steps"][0]["type"], "approval");
        assert_eq!(json["steps"][0]["data"], "0x095ea7b3");
        assert_eq!(json["chain_id"], "eip155:8453");
    }

    #[test]
    fn json_round_trip_is_lossless() {
        let action = sample().with_meta("spender", "0xabc");
        let bytes = serde_json::to_vec(&action).unwrap();
        let back: Action = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn action_ids_are_unique() {
        assert_ne!(new_action_id(), new_action_id());
        assert!(new_action_id().starts_with("act_"));
    }

    #[test]
    fn confirmed_steps_counts_confirmed() {
        let mut action = sample();
        assert_eq!(action.confirmed_steps(), 0);
        action.steps[0].status = StepStatus::Confirmed;
        assert_eq!(action.confirmed_steps(), 1);
    }
}
