//! Durable record of completed items
//!
//! A JSON file mapping item id to the completion record. All writes use an
//! atomic temp-file + rename so a crash mid-write leaves the previous version
//! intact. A tokio Mutex serializes concurrent writers: two workers recording
//! different items never lose each other's entry.
//!
//! The ledger only grows. Nothing in a sweep deletes an entry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// One completed item.
///
/// `completed_at` is a unix timestamp in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub completed_at: u64,
    #[serde(default)]
    pub bytes_before: u64,
    #[serde(default)]
    pub bytes_after: u64,
}

impl Completion {
    /// Completion stamped with the current time.
    pub fn now(bytes_before: u64, bytes_after: u64) -> Self {
        let completed_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            completed_at,
            bytes_before,
            bytes_after,
        }
    }
}

/// Thread-safe ledger file manager.
pub struct Ledger {
    path: PathBuf,
    state: Mutex<BTreeMap<String, Completion>>,
}

impl Ledger {
    /// Open the ledger at `path`.
    ///
    /// If the file doesn't exist, creates it as `{}`. Creating it up front
    /// means an unwritable location is reported before any work starts.
    pub async fn open(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::LedgerIo(format!("reading ledger: {e}")))?;
            let entries: BTreeMap<String, Completion> = serde_json::from_str(&contents)
                .map_err(|e| Error::LedgerParse(format!("parsing ledger: {e}")))?;
            info!(path = %path.display(), completed = entries.len(), "loaded ledger");
            entries
        } else {
            info!(path = %path.display(), "ledger not found, starting empty");
            let entries = BTreeMap::new();
            write_atomic(&path, &entries).await?;
            entries
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Whether `id` has been recorded as completed.
    pub async fn is_completed(&self, id: &str) -> bool {
        self.state.lock().await.contains_key(id)
    }

    /// Record `id` as completed and persist.
    ///
    /// Returns `Ok(false)` without touching disk if `id` is already recorded.
    /// On a failed write the entry is kept in memory (so `is_completed` never
    /// flips back) and `Error::StoreWrite` is returned; the next successful
    /// write persists it along with everything else.
    pub async fn mark_completed(&self, id: &str, completion: Completion) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.contains_key(id) {
            debug!(item = id, "already recorded");
            return Ok(false);
        }
        state.insert(id.to_string(), completion);
        write_atomic(&self.path, &state)
            .await
            .map_err(|e| Error::StoreWrite {
                id: id.to_string(),
                message: e.to_string(),
            })?;
        debug!(item = id, "recorded completion");
        Ok(true)
    }

    /// Completion record for `id`, if any.
    pub async fn get(&self, id: &str) -> Option<Completion> {
        self.state.lock().await.get(id).cloned()
    }

    /// All recorded ids, sorted.
    pub async fn completed_ids(&self) -> Vec<String> {
        self.state.lock().await.keys().cloned().collect()
    }

    /// Number of recorded items.
    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    /// Whether nothing has been recorded yet.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Persist the ledger with mode 0600, replacing the file atomically.
async fn write_atomic(path: &Path, data: &BTreeMap<String, Completion>) -> Result<()> {
    let json = serde_json::to_vec_pretty(data)
        .map_err(|e| Error::LedgerParse(format!("serializing ledger: {e}")))?;

    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || common::fs::write_atomic(&target, &json, Some(0o600)))
        .await
        .map_err(|e| Error::LedgerIo(format!("ledger write task failed: {e}")))?
        .map_err(|e| Error::LedgerIo(format!("writing {}: {e}", path.display())))?;

    debug!(path = %path.display(), entries = data.len(), "persisted ledger");
    Ok(())
}
