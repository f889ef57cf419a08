//! Persistent storage for actions using redb.
//!
//! # Table design
//!
//! A single `ACTIONS` table keyed by `action_id` with the JSON-encoded
//! `Action` as value. Listing is a full scan; the store holds one record per
//! user intent so it stays small.
//!
//! # Locking
//!
//! redb holds an exclusive file lock while a `Database` is open, so the store
//! opens the database per operation instead of keeping it for the process
//! lifetime: a long `submit` must not block a concurrent `status`. Writers
//! additionally take an advisory lock on `actions.lock` so read-modify-write
//! sequences from separate processes serialize. Both kinds of contention are
//! retried with a bounded exponential backoff.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use backoff::{exponential::ExponentialBackoffBuilder, ExponentialBackoff};
use chrono::Utc;
use fs4::FileExt;
use redb::{Database, DatabaseError, ReadableTable, TableDefinition};
use tracing::{debug, warn};

use crate::error::{DefiError, Result};
use crate::io::ensure_dir;
use crate::paths;
use crate::types::ActionStatus;

use super::model::Action;

/// Key: action id. Value: JSON-encoded Action.
const ACTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("actions");

fn store_err(e: impl std::fmt::Display) -> DefiError {
    DefiError::Store(e.to_string())
}

// ---------------------------------------------------------------------------
// ActionStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ActionStore {
    db_path: PathBuf,
    lock_path: PathBuf,
    retry: ExponentialBackoff,
}

impl ActionStore {
    /// Open (creating if needed) the store under the `home` state directory.
    pub fn open(home: &Path) -> Result<Self> {
        ensure_dir(home)?;
        let store = Self {
            db_path: paths::store_path(home),
            lock_path: paths::lock_path(home),
            retry: default_retry(),
        };
        // Create the database and table up front so readers never see a
        // missing table.
        let _guard = store.lock()?;
        let db = store.open_db()?;
        let wt = db.begin_write().map_err(store_err)?;
        wt.open_table(ACTIONS).map_err(store_err)?;
        wt.commit().map_err(store_err)?;
        Ok(store)
    }

    /// Insert or replace the action under its id, stamping `updated_at`.
    pub fn save(&self, action: &mut Action) -> Result<()> {
        action.updated_at = Utc::now();
        let value = serde_json::to_vec(action)?;

        let _guard = self.lock()?;
        let db = self.open_db()?;
        let wt = db.begin_write().map_err(store_err)?;
        {
            let mut table = wt.open_table(ACTIONS).map_err(store_err)?;
            table
                .insert(action.action_id.as_str(), value.as_slice())
                .map_err(store_err)?;
        }
        wt.commit().map_err(store_err)?;
        debug!(action_id = %action.action_id, status = %action.status, "saved action");
        Ok(())
    }

    pub fn get(&self, action_id: &str) -> Result<Action> {
        let id = action_id.trim();
        let db = self.open_db()?;
        let rt = db.begin_read().map_err(store_err)?;
        let table = rt.open_table(ACTIONS).map_err(store_err)?;
        let entry = table
            .get(id)
            .map_err(store_err)?
            .ok_or_else(|| DefiError::ActionNotFound(id.to_string()))?;
        Ok(serde_json::from_slice(entry.value())?)
    }

    /// List actions newest first, optionally filtered by status.
    /// A `limit` of zero means no limit.
    pub fn list(&self, status: Option<ActionStatus>, limit: usize) -> Result<Vec<Action>> {
        let db = self.open_db()?;
        let rt = db.begin_read().map_err(store_err)?;
        let table = rt.open_table(ACTIONS).map_err(store_err)?;

        let mut result = Vec::new();
        for entry in table.iter().map_err(store_err)? {
            let (_, v) = entry.map_err(store_err)?;
            let action: Action = serde_json::from_slice(v.value())?;
            if status.is_none_or(|s| action.status == s) {
                result.push(action);
            }
        }
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if limit > 0 {
            result.truncate(limit);
        }
        Ok(result)
    }

    fn open_db(&self) -> Result<Database> {
        backoff::retry(self.retry.clone(), || {
            Database::create(&self.db_path).map_err(|e| match e {
                DatabaseError::DatabaseAlreadyOpen => {
                    debug!(path = %self.db_path.display(), "action store busy, retrying");
                    backoff::Error::transient(DefiError::StoreLocked)
                }
                other => backoff::Error::permanent(store_err(other)),
            })
        })
        .map_err(flatten_retry)
    }

    fn lock(&self) -> Result<LockGuard> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        backoff::retry(self.retry.clone(), || {
            file.try_lock_exclusive().map_err(|e| {
                debug!(error = %e, "action store lock contended, retrying");
                backoff::Error::transient(DefiError::StoreLocked)
            })
        })
        .map_err(|e| {
            warn!(path = %self.lock_path.display(), "gave up waiting for action store lock");
            flatten_retry(e)
        })?;
        Ok(LockGuard { file })
    }
}

/// Releases the advisory lock when dropped.
struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(error = %e, "failed to release action store lock");
        }
    }
}

fn default_retry() -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(25))
        .with_multiplier(1.5)
        .with_max_interval(Duration::from_millis(500))
        .with_max_elapsed_time(Some(Duration::from_secs(5)))
        .build()
}

fn flatten_retry(e: backoff::Error<DefiError>) -> DefiError {
    match e {
        backoff::Error::Permanent(err) => err,
        backoff::Error::Transient { err, .. } => err,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::model::ActionStep;
    use crate::registry::resolve_chain;
    use crate::types::{IntentType, StepStatus, StepType};
    use alloy::primitives::{Address, U256};
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, ActionStore) {
        let dir = TempDir::new().unwrap();
        let store = ActionStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn planned(n: u8) -> Action {
        let chain = resolve_chain("ethereum").unwrap();
        let mut action = Action::new(
            IntentType::LendSupply,
            &chain,
            "aave",
            Address::repeat_byte(n),
            Address::repeat_byte(0xaa),
            U256::from(1_000_000u64),
        );
        for id in ["approve-token", "lend-supply"] {
            action.push_step(ActionStep::new(
                id,
                StepType::LendCall,
                &chain,
                "http://localhost:8545",
                Address::repeat_byte(0xbb),
                vec![1, 2, 3],
            ));
        }
        action
    }

    #[test]
    fn save_then_get_round_trips() {
        let (_dir, store) = open_tmp();
        let mut action = planned(1);
        store.save(&mut action).unwrap();

        let loaded = store.get(&action.action_id).unwrap();
        assert_eq!(loaded, action);
        assert_eq!(loaded.steps[0].step_id, "approve-token");
        assert_eq!(loaded.steps[1].step_id, "lend-supply");
    }

    #[test]
    fn save_overwrites_previous_status() {
        let (_dir, store) = open_tmp();
        let mut action = planned(1);
        store.save(&mut action).unwrap();

        action.steps[0].status = StepStatus::Confirmed;
        action.status = ActionStatus::Running;
        store.save(&mut action).unwrap();
        store.save(&mut action).unwrap();

        let loaded = store.get(&action.action_id).unwrap();
        assert_eq!(loaded.status, ActionStatus::Running);
        assert_eq!(loaded.steps[0].status, StepStatus::Confirmed);
        assert_eq!(store.list(None, 0).unwrap().len(), 1);
    }

    #[test]
    fn get_unknown_is_not_found() {
        let (_dir, store) = open_tmp();
        let err = store.get("act_missing").unwrap_err();
        assert!(matches!(err, DefiError::ActionNotFound(ref id) if id == "act_missing"));
    }

    #[test]
    fn list_filters_by_status() {
        let (_dir, store) = open_tmp();
        let mut done = planned(1);
        let mut pending = planned(2);
        store.save(&mut done).unwrap();
        store.save(&mut pending).unwrap();

        done.status = ActionStatus::Completed;
        store.save(&mut done).unwrap();

        let completed = store.list(Some(ActionStatus::Completed), 10).unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].action_id, done.action_id);

        let planned_only = store.list(Some(ActionStatus::Planned), 10).unwrap();
        assert_eq!(planned_only.len(), 1);
        assert_eq!(planned_only[0].action_id, pending.action_id);
    }

    #[test]
    fn list_respects_limit_newest_first() {
        let (_dir, store) = open_tmp();
        let mut older = planned(1);
        older.created_at = Utc::now() - chrono::Duration::minutes(5);
        let mut newer = planned(2);
        store.save(&mut older).unwrap();
        store.save(&mut newer).unwrap();

        let listed = store.list(None, 1).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].action_id, newer.action_id);
    }

    #[test]
    fn reopening_store_sees_previous_writes() {
        let dir = TempDir::new().unwrap();
        let mut action = planned(3);
        ActionStore::open(dir.path()).unwrap().save(&mut action).unwrap();

        let reopened = ActionStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get(&action.action_id).unwrap().action_id, action.action_id);
    }
}
