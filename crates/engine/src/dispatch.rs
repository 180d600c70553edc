//! Work dispatch: filter discovered items and hand them to workers

use std::collections::VecDeque;

use tokio::sync::Mutex;
use tracing::debug;
use transform::WorkItem;

use crate::ledger::Ledger;

/// Items left to process after filtering, with counts of what was skipped.
#[derive(Debug, Default, Clone)]
pub struct DispatchPlan {
    pub pending: Vec<WorkItem>,
    /// Skipped because the ledger already records them
    pub already_completed: usize,
    /// Skipped by the eligibility predicate (not recorded; re-checked next run)
    pub ineligible: usize,
}

/// Build the dispatch plan for a run.
///
/// Ledger hits are counted first, so an item that is both completed and
/// ineligible counts as completed. `pending` keeps discovery order.
pub async fn plan<F>(items: Vec<WorkItem>, ledger: &Ledger, eligible: F) -> DispatchPlan
where
    F: Fn(&WorkItem) -> bool,
{
    let mut plan = DispatchPlan::default();
    for item in items {
        if ledger.is_completed(&item.id).await {
            plan.already_completed += 1;
            continue;
        }
        if !eligible(&item) {
            debug!(item = %item.id, size = item.size, "skipping ineligible item");
            plan.ineligible += 1;
            continue;
        }
        plan.pending.push(item);
    }
    plan
}

/// Shared FIFO of items waiting for a worker.
///
/// Each `pop` hands an item to exactly one caller.
#[derive(Debug, Default)]
pub struct WorkQueue {
    items: Mutex<VecDeque<WorkItem>>,
}

impl WorkQueue {
    pub fn new(items: Vec<WorkItem>) -> Self {
        Self {
            items: Mutex::new(items.into()),
        }
    }

    /// Take the next item, if any.
    pub async fn pop(&self) -> Option<WorkItem> {
        self.items.lock().await.pop_front()
    }

    /// Items not yet handed out.
    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove and return everything not yet handed out.
    pub async fn drain_remaining(&self) -> Vec<WorkItem> {
        self.items.lock().await.drain(..).collect()
    }
}
