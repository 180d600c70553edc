//! Key pool state and checkout protocol
//!
//! All three sets (available, checked out, discarded) live behind a single
//! mutex, so a `discard` is visible to every subsequent `take`. Waiting takers
//! park on a `Notify` that fires whenever a key comes back or is discarded.

use std::collections::{HashSet, VecDeque};

use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};
use transform::Credential;

use crate::error::{Error, Result};

/// Point-in-time counts for logging and the end-of-run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub total: usize,
    pub available: usize,
    pub checked_out: usize,
    pub discarded: usize,
}

impl PoolSnapshot {
    /// Keys not yet discarded.
    pub fn remaining(&self) -> usize {
        self.available + self.checked_out
    }

    /// Status label: all keys usable → healthy, some discarded → degraded,
    /// none left → exhausted.
    pub fn status(&self) -> &'static str {
        if self.remaining() == 0 {
            "exhausted"
        } else if self.discarded == 0 {
            "healthy"
        } else {
            "degraded"
        }
    }
}

#[derive(Debug, Default)]
struct PoolState {
    available: VecDeque<Credential>,
    checked_out: HashSet<Credential>,
    discarded: HashSet<Credential>,
}

impl PoolState {
    fn is_exhausted(&self) -> bool {
        self.available.is_empty() && self.checked_out.is_empty()
    }
}

/// Shared pool of API keys.
///
/// Keys are handed out FIFO and returned to the back of the queue, so
/// successful keys rotate across workers.
#[derive(Debug)]
pub struct KeyPool {
    state: Mutex<PoolState>,
    changed: Notify,
    total: usize,
}

impl KeyPool {
    /// Create a pool from the fetched key list.
    ///
    /// Duplicate keys collapse into one entry (keys are compared by value).
    /// Returns `Error::Empty` when there is nothing to hand out.
    pub fn new(credentials: Vec<Credential>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut available = VecDeque::with_capacity(credentials.len());
        for credential in credentials {
            if seen.insert(credential.clone()) {
                available.push_back(credential);
            } else {
                debug!(key = %credential.fingerprint(), "dropping duplicate key");
            }
        }

        if available.is_empty() {
            return Err(Error::Empty);
        }

        let total = available.len();
        info!(keys = total, "key pool initialized");
        Ok(Self {
            state: Mutex::new(PoolState {
                available,
                ..PoolState::default()
            }),
            changed: Notify::new(),
            total,
        })
    }

    /// Check out the next available key.
    ///
    /// When every remaining key is checked out by other workers, waits until
    /// one of them is returned or discarded. Returns `None` once the pool is
    /// exhausted, including for callers that were already waiting.
    pub async fn take(&self) -> Option<Credential> {
        loop {
            // Register interest before inspecting state so a wakeup between
            // the check and the await is not lost.
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                if let Some(credential) = state.available.pop_front() {
                    state.checked_out.insert(credential.clone());
                    debug!(key = %credential.fingerprint(), "key checked out");
                    return Some(credential);
                }
                if state.is_exhausted() {
                    return None;
                }
                debug!(
                    checked_out = state.checked_out.len(),
                    "all remaining keys in use, waiting"
                );
            }

            notified.await;
        }
    }

    /// Check out a key only if one is available right now.
    pub async fn try_take(&self) -> Option<Credential> {
        let mut state = self.state.lock().await;
        let credential = state.available.pop_front()?;
        state.checked_out.insert(credential.clone());
        Some(credential)
    }

    /// Return a key after a successful call.
    ///
    /// Only keys currently checked out are accepted. A discarded key stays
    /// discarded and an unknown key is ignored.
    pub async fn give_back(&self, credential: Credential) {
        let mut state = self.state.lock().await;
        if state.discarded.contains(&credential) {
            warn!(key = %credential.fingerprint(), "refusing to return a discarded key");
            return;
        }
        if !state.checked_out.remove(&credential) {
            warn!(key = %credential.fingerprint(), "returned key was not checked out, ignoring");
            return;
        }
        debug!(key = %credential.fingerprint(), "key returned");
        state.available.push_back(credential);
        drop(state);
        self.changed.notify_waiters();
    }

    /// Permanently remove a key after a failed call.
    ///
    /// Idempotent: returns `true` only the first time a key is discarded.
    pub async fn discard(&self, credential: &Credential) -> bool {
        let mut state = self.state.lock().await;
        state.checked_out.remove(credential);
        state.available.retain(|c| c != credential);
        let newly = state.discarded.insert(credential.clone());
        let remaining = state.available.len() + state.checked_out.len();
        let exhausted = state.is_exhausted();
        drop(state);

        if newly {
            warn!(key = %credential.fingerprint(), remaining, "key discarded");
            if exhausted {
                warn!("key pool exhausted");
            }
        }
        self.changed.notify_waiters();
        newly
    }

    /// True once no key is available or checked out.
    pub async fn is_exhausted(&self) -> bool {
        self.state.lock().await.is_exhausted()
    }

    /// Number of keys waiting in the queue.
    pub async fn available(&self) -> usize {
        self.state.lock().await.available.len()
    }

    /// Number of keys not yet discarded (available + checked out).
    pub async fn remaining(&self) -> usize {
        let state = self.state.lock().await;
        state.available.len() + state.checked_out.len()
    }

    /// Number of distinct keys the pool started with.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Counts for logging and summaries.
    pub async fn snapshot(&self) -> PoolSnapshot {
        let state = self.state.lock().await;
        PoolSnapshot {
            total: self.total,
            available: state.available.len(),
            checked_out: state.checked_out.len(),
            discarded: state.discarded.len(),
        }
    }
}
