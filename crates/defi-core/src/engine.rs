//! Execution engine.
//!
//! Drives a planned [`Action`] to completion: policy checks up front, then
//! each step is simulated, priced, signed, broadcast and polled until its
//! receipt arrives. The action is persisted after every step transition so a
//! crash or timeout can be resumed by calling [`Executor::execute`] again.

use std::sync::Arc;
use std::time::Duration;

use alloy::network::TransactionBuilder;
use alloy::primitives::B256;
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::SolCall;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::action::{Action, ActionStore};
use crate::chain::abi::IERC20;
use crate::chain::{ChainClient, ClientFactory, Signer};
use crate::config::ExecutionDefaults;
use crate::error::{DefiError, Result};
use crate::registry::parse_units;
use crate::types::{ActionStatus, StepStatus, StepType};

// ---------------------------------------------------------------------------
// ExecutionOptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    pub simulate: bool,
    pub poll_interval: Duration,
    pub step_timeout: Duration,
    /// Safety factor on estimated gas; must be greater than 1.
    pub gas_multiplier: f64,
    /// EIP-1559 overrides in gwei, as decimal strings.
    pub max_fee_gwei: Option<String>,
    pub max_priority_fee_gwei: Option<String>,
    pub allow_max_approval: bool,
    pub unsafe_provider_tx: bool,
    /// Bound on the whole execution; a step still running at this instant is
    /// abandoned and the action persisted as failed.
    pub deadline: Option<Instant>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self::from_defaults(&ExecutionDefaults::default())
    }
}

impl ExecutionOptions {
    pub fn from_defaults(d: &ExecutionDefaults) -> Self {
        Self {
            simulate: d.simulate,
            poll_interval: Duration::from_secs(d.poll_interval_secs),
            step_timeout: Duration::from_secs(d.step_timeout_secs),
            gas_multiplier: d.gas_multiplier,
            max_fee_gwei: None,
            max_priority_fee_gwei: None,
            allow_max_approval: false,
            unsafe_provider_tx: false,
            deadline: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FeeOverrides {
    max_fee: Option<u128>,
    priority: Option<u128>,
}

fn gwei_to_wei(field: &str, raw: &str) -> Result<u128> {
    let wei = parse_units(raw, 9)
        .map_err(|_| DefiError::usage(format!("{field} must be a decimal gwei amount, got '{raw}'")))?;
    u128::try_from(wei).map_err(|_| DefiError::usage(format!("{field} is too large")))
}

fn parse_fee_overrides(opts: &ExecutionOptions) -> Result<FeeOverrides> {
    let max_fee = opts
        .max_fee_gwei
        .as_deref()
        .map(|v| gwei_to_wei("--max-fee-gwei", v))
        .transpose()?;
    let priority = opts
        .max_priority_fee_gwei
        .as_deref()
        .map(|v| gwei_to_wei("--max-priority-fee-gwei", v))
        .transpose()?;
    if let (Some(max), Some(prio)) = (max_fee, priority) {
        if prio > max {
            return Err(DefiError::usage(
                "--max-priority-fee-gwei must not exceed --max-fee-gwei",
            ));
        }
    }
    Ok(FeeOverrides { max_fee, priority })
}

fn chain_number(caip2: &str) -> Result<u64> {
    caip2
        .strip_prefix("eip155:")
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| DefiError::Internal(format!("malformed chain id '{caip2}' in action")))
}

// ---------------------------------------------------------------------------
// Preflight policy
// ---------------------------------------------------------------------------

/// Checks that must pass before anything is signed or persisted.
fn preflight(action: &Action, signer: &dyn Signer, opts: &ExecutionOptions) -> Result<FeeOverrides> {
    if !opts.gas_multiplier.is_finite() || opts.gas_multiplier <= 1.0 {
        return Err(DefiError::usage(format!(
            "gas multiplier must be greater than 1, got {}",
            opts.gas_multiplier
        )));
    }

    let signer_address = signer.address();
    if signer_address != action.from_address {
        return Err(DefiError::SignerMismatch {
            signer: signer_address.to_string(),
            expected: action.from_address.to_string(),
        });
    }

    for step in action.steps.iter().filter(|s| !s.is_confirmed()) {
        if step.step_type == StepType::Approval && !opts.allow_max_approval {
            let approve = IERC20::approveCall::abi_decode(&step.data).map_err(|e| {
                DefiError::Encoding(format!(
                    "approval step '{}' has undecodable calldata: {e}",
                    step.step_id
                ))
            })?;
            if approve.amount > action.input_amount {
                return Err(DefiError::usage(format!(
                    "approval step '{}' authorizes {} which exceeds the action amount {}; \
                     pass --allow-max-approval to permit it",
                    step.step_id, approve.amount, action.input_amount
                )));
            }
        }

        if step.step_type.is_provider_built() && !opts.unsafe_provider_tx {
            if step.data.is_empty() {
                return Err(DefiError::usage(format!(
                    "provider step '{}' has empty calldata; pass --unsafe-provider-tx to override",
                    step.step_id
                )));
            }
            let allowed = &action.constraints.allowed_targets;
            if !allowed.is_empty() && !allowed.contains(&step.target) {
                return Err(DefiError::usage(format!(
                    "provider step '{}' targets {} which is not in the allowed targets; \
                     pass --unsafe-provider-tx to override",
                    step.step_id, step.target
                )));
            }
            if step.step_type == StepType::Swap && step.chain_id != action.chain_id {
                return Err(DefiError::usage(format!(
                    "swap step '{}' runs on {} but the action is on {}",
                    step.step_id, step.chain_id, action.chain_id
                )));
            }
        }
    }

    parse_fee_overrides(opts)
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct Executor {
    clients: Arc<dyn ClientFactory>,
    store: ActionStore,
}

impl Executor {
    pub fn new(clients: Arc<dyn ClientFactory>, store: ActionStore) -> Self {
        Self { clients, store }
    }

    pub fn store(&self) -> &ActionStore {
        &self.store
    }

    /// Execute every non-confirmed step of `action` in order.
    ///
    /// Returns the first step error after persisting the action as `failed`.
    /// Calling again resumes from the first step that is not confirmed.
    pub async fn execute(
        &self,
        action: &mut Action,
        signer: &dyn Signer,
        opts: &ExecutionOptions,
    ) -> Result<()> {
        if action.is_completed() {
            warn!(action_id = %action.action_id, "action already completed; nothing to do");
            return Ok(());
        }

        let fees = preflight(action, signer, opts)?;

        action.status = ActionStatus::Running;
        action.error = None;
        self.store.save(action)?;
        info!(
            action_id = %action.action_id,
            steps = action.steps.len(),
            confirmed = action.confirmed_steps(),
            "executing action"
        );

        for index in 0..action.steps.len() {
            if action.steps[index].is_confirmed() {
                continue;
            }
            let step_id = action.steps[index].step_id.clone();
            let step = self.run_step(action, index, signer, opts, fees);
            let outcome = match opts.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, step)
                    .await
                    .unwrap_or_else(|_| Err(DefiError::DeadlineExceeded { step_id })),
                None => step.await,
            };
            if let Err(e) = outcome {
                return Err(self.persist_failure(action, e));
            }
        }

        action.status = ActionStatus::Completed;
        action.error = None;
        self.store.save(action)?;
        info!(action_id = %action.action_id, "action completed");
        Ok(())
    }

    /// Mark `action` failed with `err` and save it. A save failure is attached
    /// to `err` rather than replacing it.
    fn persist_failure(&self, action: &mut Action, err: DefiError) -> DefiError {
        action.status = ActionStatus::Failed;
        action.error = Some(err.to_string());
        match self.store.save(action) {
            Ok(()) => err,
            Err(persist) => {
                warn!(action_id = %action.action_id, error = %persist, "failed to persist failed action");
                DefiError::NotPersisted {
                    cause: Box::new(err),
                    persist: Box::new(persist),
                }
            }
        }
    }

    async fn run_step(
        &self,
        action: &mut Action,
        index: usize,
        signer: &dyn Signer,
        opts: &ExecutionOptions,
        fees: FeeOverrides,
    ) -> Result<()> {
        let step = action.steps[index].clone();
        let client = self.clients.client(&step.rpc_url)?;

        if step.status == StepStatus::Submitted {
            if let Some(hash) = step.tx_hash {
                info!(step = %step.step_id, tx = %hash, "resuming submitted step");
                return self
                    .await_receipt(action, index, client.as_ref(), hash, opts)
                    .await;
            }
        }

        let expected_chain = chain_number(&step.chain_id)?;
        let actual_chain = client.chain_id().await?;
        if actual_chain != expected_chain {
            return Err(DefiError::usage(format!(
                "RPC {} serves chain {actual_chain} but step '{}' targets chain {expected_chain}",
                step.rpc_url, step.step_id
            )));
        }

        let mut tx = TransactionRequest::default()
            .with_from(action.from_address)
            .with_to(step.target)
            .with_input(step.data.clone())
            .with_value(step.value);

        if opts.simulate && action.constraints.simulate {
            if let Err(e) = client.simulate(&tx).await {
                action.steps[index].error = Some(e.to_string());
                return Err(DefiError::unavailable(format!(
                    "step '{}' failed simulation, nothing was broadcast: {e}",
                    step.step_id
                )));
            }
        }

        let estimated = client.estimate_gas(&tx).await?;
        let gas_limit = (estimated as f64 * opts.gas_multiplier).ceil() as u64;

        let (max_fee, priority) = match (fees.max_fee, fees.priority) {
            (Some(max), Some(prio)) => (max, prio),
            (max, prio) => {
                let est = client.fee_estimate().await?;
                match (max, prio) {
                    (Some(max), None) => (max, est.max_priority_fee_per_gas.min(max)),
                    (None, Some(prio)) => (est.max_fee_per_gas.max(prio), prio),
                    _ => (est.max_fee_per_gas, est.max_priority_fee_per_gas),
                }
            }
        };

        let nonce = client.pending_nonce(action.from_address).await?;
        tx = tx
            .with_chain_id(expected_chain)
            .with_nonce(nonce)
            .with_gas_limit(gas_limit)
            .with_max_fee_per_gas(max_fee)
            .with_max_priority_fee_per_gas(priority);

        let raw = signer.sign_transaction(tx).await?;
        let hash = client.send_raw_transaction(&raw).await?;
        info!(
            step = %step.step_id,
            tx = %hash,
            nonce,
            gas_limit,
            "broadcast step"
        );

        {
            let s = &mut action.steps[index];
            s.status = StepStatus::Submitted;
            s.tx_hash = Some(hash);
            s.error = None;
        }
        if let Err(e) = self.store.save(action) {
            warn!(
                step = %step.step_id,
                tx = %hash,
                error = %e,
                "broadcast step could not be recorded"
            );
            return Err(DefiError::Unrecorded {
                step_id: step.step_id.clone(),
                tx_hash: hash.to_string(),
                cause: Box::new(e),
            });
        }

        self.await_receipt(action, index, client.as_ref(), hash, opts)
            .await
    }

    async fn await_receipt(
        &self,
        action: &mut Action,
        index: usize,
        client: &dyn ChainClient,
        hash: B256,
        opts: &ExecutionOptions,
    ) -> Result<()> {
        let deadline = Instant::now() + opts.step_timeout;
        let step_id = action.steps[index].step_id.clone();

        loop {
            match client.receipt(hash).await {
                Ok(Some(receipt)) if receipt.success => {
                    action.steps[index].status = StepStatus::Confirmed;
                    action.steps[index].error = None;
                    self.store.save(action)?;
                    info!(step = %step_id, tx = %hash, block = ?receipt.block_number, "step confirmed");
                    return Ok(());
                }
                Ok(Some(_)) => {
                    let msg = format!("step '{step_id}' reverted on-chain (tx {hash})");
                    action.steps[index].status = StepStatus::Failed;
                    action.steps[index].error = Some(msg.clone());
                    self.store.save(action)?;
                    return Err(DefiError::unavailable(msg));
                }
                Ok(None) => {}
                Err(e) => warn!(step = %step_id, error = %e, "receipt poll failed"),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(DefiError::StepTimeout {
                    step_id,
                    tx_hash: hash.to_string(),
                    secs: opts.step_timeout.as_secs(),
                });
            }
            tokio::time::sleep(opts.poll_interval.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionStep;
    use crate::error::ErrorKind;
    use crate::registry::resolve_chain;
    use crate::testing::{FakeChain, FakeFactory, FakeSigner, ReceiptMode};
    use crate::types::IntentType;
    use alloy::primitives::{Address, U256};
    use tempfile::TempDir;

    const TOKEN: Address = Address::repeat_byte(0xaa);
    const SPENDER: Address = Address::repeat_byte(0xbb);
    const SENDER: Address = Address::repeat_byte(0x11);

    struct Harness {
        dir: TempDir,
        fake: Arc<FakeChain>,
        executor: Executor,
    }

    fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        let store = ActionStore::open(dir.path()).unwrap();
        let fake = FakeChain::new(8453);
        let executor = Executor::new(Arc::new(FakeFactory(fake.clone())), store);
        Harness {
            dir,
            fake,
            executor,
        }
    }

    fn fast() -> ExecutionOptions {
        ExecutionOptions {
            poll_interval: Duration::from_millis(5),
            step_timeout: Duration::from_millis(60),
            ..ExecutionOptions::default()
        }
    }

    fn approval_action(approve_amount: U256, input: U256) -> Action {
        let chain = resolve_chain("base").unwrap();
        let mut action = Action::new(IntentType::Approve, &chain, "erc20", SENDER, SPENDER, input);
        action.push_step(ActionStep::new(
            "approve-tkn",
            StepType::Approval,
            &chain,
            "http://rpc",
            TOKEN,
            IERC20::approveCall {
                spender: SPENDER,
                amount: approve_amount,
            }
            .abi_encode(),
        ));
        action.push_step(ActionStep::new(
            "lend-supply",
            StepType::LendCall,
            &chain,
            "http://rpc",
            SPENDER,
            vec![0x61, 0x7b, 0xa0, 0x37],
        ));
        action
    }

    fn swap_action(target: Address, allowed: Vec<Address>) -> Action {
        let chain = resolve_chain("base").unwrap();
        let mut action = Action::new(IntentType::Swap, &chain, "uniswap", SENDER, target, U256::from(5u64));
        action.constraints.allowed_targets = allowed;
        action.push_step(ActionStep::new(
            "swap",
            StepType::Swap,
            &chain,
            "http://rpc",
            target,
            vec![0x04, 0xe4, 0x5a, 0xaf],
        ));
        action
    }

    #[tokio::test]
    async fn runs_all_steps_and_persists_completion() {
        let h = harness();
        let signer = FakeSigner::new(SENDER);
        let mut action = approval_action(U256::from(100u64), U256::from(100u64));

        h.executor.execute(&mut action, &signer, &fast()).await.unwrap();

        assert_eq!(action.status, ActionStatus::Completed);
        assert!(action.steps.iter().all(|s| s.status == StepStatus::Confirmed));
        assert!(action.steps.iter().all(|s| s.tx_hash.is_some()));
        assert_eq!(signer.signed(), 2);
        assert_eq!(h.fake.sent(), 2);

        let stored = h.executor.store().get(&action.action_id).unwrap();
        assert_eq!(stored.status, ActionStatus::Completed);
        assert_eq!(stored.steps, action.steps);
    }

    #[tokio::test]
    async fn applies_gas_multiplier_and_node_fees() {
        let h = harness();
        let signer = FakeSigner::new(SENDER);
        let mut action = approval_action(U256::from(1u64), U256::from(1u64));
        action.steps.truncate(1);

        h.executor.execute(&mut action, &signer, &fast()).await.unwrap();

        let tx = signer.last_request().unwrap();
        assert_eq!(tx.gas, Some(120_000));
        assert_eq!(tx.max_fee_per_gas, Some(30_000_000_000));
        assert_eq!(tx.max_priority_fee_per_gas, Some(1_000_000_000));
        assert_eq!(tx.nonce, Some(7));
        assert_eq!(tx.chain_id, Some(8453));
    }

    #[tokio::test]
    async fn fee_overrides_replace_node_estimate() {
        let h = harness();
        let signer = FakeSigner::new(SENDER);
        let mut action = approval_action(U256::from(1u64), U256::from(1u64));
        action.steps.truncate(1);
        let opts = ExecutionOptions {
            max_fee_gwei: Some("12.5".into()),
            max_priority_fee_gwei: Some("0.1".into()),
            ..fast()
        };

        h.executor.execute(&mut action, &signer, &opts).await.unwrap();

        let tx = signer.last_request().unwrap();
        assert_eq!(tx.max_fee_per_gas, Some(12_500_000_000));
        assert_eq!(tx.max_priority_fee_per_gas, Some(100_000_000));
    }

    #[tokio::test]
    async fn priority_above_max_fee_is_rejected() {
        let h = harness();
        let signer = FakeSigner::new(SENDER);
        let mut action = approval_action(U256::from(1u64), U256::from(1u64));
        let opts = ExecutionOptions {
            max_fee_gwei: Some("1".into()),
            max_priority_fee_gwei: Some("2".into()),
            ..fast()
        };
        let err = h.executor.execute(&mut action, &signer, &opts).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(signer.signed(), 0);
    }

    #[tokio::test]
    async fn completed_action_makes_no_network_calls() {
        let h = harness();
        let signer = FakeSigner::new(Address::repeat_byte(0x99));
        let mut action = approval_action(U256::from(1u64), U256::from(1u64));
        action.status = ActionStatus::Completed;

        h.executor.execute(&mut action, &signer, &fast()).await.unwrap();

        assert_eq!(h.fake.network_calls(), 0);
        assert_eq!(signer.signed(), 0);
    }

    #[tokio::test]
    async fn over_approval_rejected_before_signing() {
        let h = harness();
        let signer = FakeSigner::new(SENDER);
        let mut action = approval_action(U256::MAX, U256::from(100u64));

        let err = h.executor.execute(&mut action, &signer, &fast()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.to_string().contains("--allow-max-approval"));
        assert_eq!(signer.signed(), 0);
        assert_eq!(h.fake.network_calls(), 0);
        assert!(h.executor.store().get(&action.action_id).is_err());
    }

    #[tokio::test]
    async fn over_approval_allowed_with_flag() {
        let h = harness();
        let signer = FakeSigner::new(SENDER);
        let mut action = approval_action(U256::MAX, U256::from(100u64));
        let opts = ExecutionOptions {
            allow_max_approval: true,
            ..fast()
        };
        h.executor.execute(&mut action, &signer, &opts).await.unwrap();
        assert_eq!(action.status, ActionStatus::Completed);
    }

    #[tokio::test]
    async fn signer_mismatch_submits_nothing() {
        let h = harness();
        let signer = FakeSigner::new(Address::repeat_byte(0x99));
        let mut action = approval_action(U256::from(1u64), U256::from(1u64));

        let err = h.executor.execute(&mut action, &signer, &fast()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Signer);
        assert!(matches!(err, DefiError::SignerMismatch { .. }));
        assert_eq!(h.fake.sent(), 0);
        assert_eq!(action.status, ActionStatus::Planned);
    }

    #[tokio::test]
    async fn provider_guard_blocks_unlisted_target() {
        let h = harness();
        let signer = FakeSigner::new(SENDER);
        let router = Address::repeat_byte(0xcc);
        let mut action = swap_action(Address::repeat_byte(0xdd), vec![router]);

        let err = h.executor.execute(&mut action, &signer, &fast()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.to_string().contains("allowed targets"));
        assert_eq!(signer.signed(), 0);

        let opts = ExecutionOptions {
            unsafe_provider_tx: true,
            ..fast()
        };
        h.executor.execute(&mut action, &signer, &opts).await.unwrap();
        assert_eq!(action.status, ActionStatus::Completed);
    }

    #[tokio::test]
    async fn provider_guard_rejects_empty_calldata() {
        let h = harness();
        let signer = FakeSigner::new(SENDER);
        let mut action = swap_action(Address::repeat_byte(0xcc), vec![]);
        action.steps[0].data = Default::default();
        let err = h.executor.execute(&mut action, &signer, &fast()).await.unwrap_err();
        assert!(err.to_string().contains("empty calldata"));
    }

    #[tokio::test]
    async fn simulation_failure_broadcasts_nothing() {
        let h = harness();
        h.fake.fail_simulation("ERC20: transfer amount exceeds balance");
        let signer = FakeSigner::new(SENDER);
        let mut action = approval_action(U256::from(1u64), U256::from(1u64));

        let err = h.executor.execute(&mut action, &signer, &fast()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(h.fake.sent(), 0);
        assert_eq!(action.status, ActionStatus::Failed);
        assert_eq!(action.steps[0].status, StepStatus::Pending);

        let stored = h.executor.store().get(&action.action_id).unwrap();
        assert_eq!(stored.status, ActionStatus::Failed);
        assert!(stored.error.unwrap().contains("simulation"));
    }

    #[tokio::test]
    async fn simulate_flag_off_skips_preflight_call() {
        let h = harness();
        h.fake.fail_simulation("would revert");
        let signer = FakeSigner::new(SENDER);
        let mut action = approval_action(U256::from(1u64), U256::from(1u64));
        let opts = ExecutionOptions {
            simulate: false,
            ..fast()
        };
        h.executor.execute(&mut action, &signer, &opts).await.unwrap();
        assert_eq!(h.fake.sent(), 2);
    }

    #[tokio::test]
    async fn timeout_leaves_step_submitted_and_resume_polls_same_hash() {
        let h = harness();
        h.fake.set_receipt_mode(ReceiptMode::Never);
        let signer = FakeSigner::new(SENDER);
        let mut action = approval_action(U256::from(1u64), U256::from(1u64));

        let err = h.executor.execute(&mut action, &signer, &fast()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        let stored = h.executor.store().get(&action.action_id).unwrap();
        assert_eq!(stored.status, ActionStatus::Failed);
        assert_eq!(stored.steps[0].status, StepStatus::Submitted);
        let hash = stored.steps[0].tx_hash.unwrap();
        assert_eq!(h.fake.sent(), 1);

        h.fake.set_receipt_mode(ReceiptMode::Success);
        let mut resumed = stored;
        h.executor.execute(&mut resumed, &signer, &fast()).await.unwrap();
        assert_eq!(resumed.status, ActionStatus::Completed);
        assert_eq!(resumed.steps[0].tx_hash, Some(hash));
        // only the second step was broadcast on resume
        assert_eq!(h.fake.sent(), 2);
    }

    #[tokio::test]
    async fn deadline_persists_failure_with_submitted_step() {
        let h = harness();
        h.fake.set_receipt_mode(ReceiptMode::Never);
        let signer = FakeSigner::new(SENDER);
        let mut action = approval_action(U256::from(1u64), U256::from(1u64));
        let opts = ExecutionOptions {
            step_timeout: Duration::from_secs(5),
            deadline: Some(Instant::now() + Duration::from_millis(100)),
            ..fast()
        };

        let err = h.executor.execute(&mut action, &signer, &opts).await.unwrap_err();
        assert!(matches!(err, DefiError::DeadlineExceeded { ref step_id } if step_id == "approve-tkn"));
        assert_eq!(err.kind(), ErrorKind::Timeout);

        let stored = h.executor.store().get(&action.action_id).unwrap();
        assert_eq!(stored.status, ActionStatus::Failed);
        assert!(stored.error.unwrap().contains("deadline"));
        assert_eq!(stored.steps[0].status, StepStatus::Submitted);
        let hash = stored.steps[0].tx_hash.unwrap();

        h.fake.set_receipt_mode(ReceiptMode::Success);
        let mut resumed = h.executor.store().get(&action.action_id).unwrap();
        h.executor.execute(&mut resumed, &signer, &fast()).await.unwrap();
        assert_eq!(resumed.steps[0].tx_hash, Some(hash));
        assert_eq!(h.fake.sent(), 2);
    }

    #[tokio::test]
    async fn unrecorded_broadcast_reports_hash_and_keeps_cause() {
        let h = harness();
        let signer = FakeSigner::new(SENDER);
        let mut action = approval_action(U256::from(1u64), U256::from(1u64));
        let home = h.dir.path().to_path_buf();
        h.fake
            .after_next_send(move || std::fs::remove_dir_all(home).unwrap());

        let err = h.executor.execute(&mut action, &signer, &fast()).await.unwrap_err();
        assert_eq!(h.fake.sent(), 1);
        let hash = action.steps[0].tx_hash.unwrap();
        assert_eq!(action.status, ActionStatus::Failed);
        match &err {
            DefiError::NotPersisted { cause, .. } => match cause.as_ref() {
                DefiError::Unrecorded { step_id, tx_hash, .. } => {
                    assert_eq!(step_id, "approve-tkn");
                    assert_eq!(tx_hash, &hash.to_string());
                }
                other => panic!("unexpected cause: {other}"),
            },
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().contains(&hash.to_string()));
    }

    #[tokio::test]
    async fn revert_marks_step_failed_and_resume_skips_confirmed() {
        let h = harness();
        let signer = FakeSigner::new(SENDER);
        let mut action = approval_action(U256::from(1u64), U256::from(1u64));
        action.steps[0].status = StepStatus::Confirmed;
        h.fake.set_receipt_mode(ReceiptMode::Revert);

        let err = h.executor.execute(&mut action, &signer, &fast()).await.unwrap_err();
        assert!(err.to_string().contains("reverted"));
        assert_eq!(action.steps[1].status, StepStatus::Failed);
        assert_eq!(signer.signed(), 1);

        h.fake.set_receipt_mode(ReceiptMode::Success);
        h.executor.execute(&mut action, &signer, &fast()).await.unwrap();
        assert_eq!(action.status, ActionStatus::Completed);
        assert_eq!(signer.signed(), 2);
    }

    #[tokio::test]
    async fn wrong_rpc_chain_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = ActionStore::open(dir.path()).unwrap();
        let executor = Executor::new(Arc::new(FakeFactory(FakeChain::new(1))), store);
        let signer = FakeSigner::new(SENDER);
        let mut action = approval_action(U256::from(1u64), U256::from(1u64));

        let err = executor.execute(&mut action, &signer, &fast()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(signer.signed(), 0);
    }

    #[test]
    fn gwei_parsing() {
        assert_eq!(gwei_to_wei("f", "1").unwrap(), 1_000_000_000);
        assert_eq!(gwei_to_wei("f", "0.000000001").unwrap(), 1);
        assert!(gwei_to_wei("f", "0.0000000001").is_err());
        assert!(gwei_to_wei("f", "abc").is_err());
    }
}
