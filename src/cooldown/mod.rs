//! Per-user reward state with scoped read-modify-write transactions.
//!
//! Each user owns a tiny record: whether a vote credit is pending and the
//! earliest time a further claim may be credited. Mutations go through
//! [`CooldownStore::begin`], which serializes writers per key; different
//! users never contend. Dropping a transaction without committing discards
//! its changes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, warn};

use crate::UserId;

/// Per-user reward tracking. Created lazily with defaults, never deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRewardState {
    /// True once a vote has been credited and not yet consumed by a claim.
    pub has_voted_pending: bool,
    /// Unix timestamp before which claims are rejected. 0 = eligible now.
    pub next_claim_at: i64,
}

/// Durable per-user state store.
///
/// Entries live in memory; when a snapshot path is configured the whole map
/// is persisted as JSON on every commit (temp-file rename, best effort - a
/// failed write is logged and does not poison in-memory state).
pub struct CooldownStore {
    entries: RwLock<HashMap<UserId, Arc<Mutex<UserRewardState>>>>,
    snapshot_path: Option<PathBuf>,
}

impl CooldownStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            snapshot_path: None,
        }
    }

    /// Open a store backed by a JSON snapshot file, loading any prior state.
    pub fn with_snapshot(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut entries = HashMap::new();
        if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read cooldown snapshot {}", path.display()))?;
            let loaded: HashMap<UserId, UserRewardState> = serde_json::from_str(&raw)
                .with_context(|| format!("invalid cooldown snapshot {}", path.display()))?;
            for (user, state) in loaded {
                entries.insert(user, Arc::new(Mutex::new(state)));
            }
            debug!(users = entries.len(), "Loaded cooldown snapshot");
        }
        Ok(Self {
            entries: RwLock::new(entries),
            snapshot_path: Some(path),
        })
    }

    async fn entry(&self, user: UserId) -> Arc<Mutex<UserRewardState>> {
        {
            let entries = self.entries.read().await;
            if let Some(cell) = entries.get(&user) {
                return cell.clone();
            }
        }
        let mut entries = self.entries.write().await;
        entries
            .entry(user)
            .or_insert_with(|| Arc::new(Mutex::new(UserRewardState::default())))
            .clone()
    }

    /// Snapshot of a user's state (default if never seen).
    pub async fn get(&self, user: UserId) -> UserRewardState {
        *self.entry(user).await.lock().await
    }

    /// Begin a per-user transaction. Holds the user's lock until the
    /// returned [`StateTxn`] is committed or dropped; at most one writer per
    /// user at a time.
    pub async fn begin(&self, user: UserId) -> StateTxn<'_> {
        let cell = self.entry(user).await;
        let guard = cell.lock_owned().await;
        let state = *guard;
        StateTxn {
            store: self,
            user,
            guard,
            state,
        }
    }

    /// Users whose vote credit has not yet been consumed by a claim.
    pub async fn users_with_pending_vote(&self) -> Vec<UserId> {
        let cells: Vec<(UserId, Arc<Mutex<UserRewardState>>)> = {
            let entries = self.entries.read().await;
            entries.iter().map(|(u, c)| (*u, c.clone())).collect()
        };
        let mut pending = Vec::new();
        for (user, cell) in cells {
            if cell.lock().await.has_voted_pending {
                pending.push(user);
            }
        }
        pending
    }

    async fn persist(&self) {
        let Some(path) = &self.snapshot_path else {
            return;
        };
        let cells: Vec<(UserId, Arc<Mutex<UserRewardState>>)> = {
            let entries = self.entries.read().await;
            entries.iter().map(|(u, c)| (*u, c.clone())).collect()
        };
        let mut snapshot = HashMap::with_capacity(cells.len());
        for (user, cell) in cells {
            snapshot.insert(user, *cell.lock().await);
        }
        if let Err(e) = write_snapshot(path, &snapshot) {
            warn!(path = %path.display(), error = %e, "Failed to persist cooldown snapshot");
        }
    }
}

impl Default for CooldownStore {
    fn default() -> Self {
        Self::new()
    }
}

fn write_snapshot(path: &Path, snapshot: &HashMap<UserId, UserRewardState>) -> Result<()> {
    let raw = serde_json::to_string_pretty(snapshot)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, raw)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Scoped transaction over one user's state.
///
/// Mutate [`StateTxn::state`] freely; `commit` writes it back atomically and
/// persists. Dropping without commit releases the lock with nothing applied.
pub struct StateTxn<'a> {
    store: &'a CooldownStore,
    user: UserId,
    guard: OwnedMutexGuard<UserRewardState>,
    /// Working copy of the user's state.
    pub state: UserRewardState,
}

impl StateTxn<'_> {
    pub fn user(&self) -> UserId {
        self.user
    }

    pub async fn commit(mut self) {
        *self.guard = self.state;
        drop(self.guard);
        self.store.persist().await;
    }
}
