//! Worker pool
//!
//! A fixed number of tokio tasks share one `WorkQueue`, one `KeyPool` and one
//! `Ledger`. Each worker takes one item at a time and drives it to a terminal
//! state before taking the next. Workers stop pulling items as soon as the
//! pool is exhausted; an item already mid-call is allowed to finish.

use std::sync::Arc;
use std::time::Instant;

use key_pool::KeyPool;
use tokio::task::JoinSet;
use tracing::{Instrument, debug, error, info, info_span, warn};
use transform::{Credential, Preprocessor, TransformReport, Transformer, WorkItem};

use crate::dispatch::{DispatchPlan, WorkQueue};
use crate::item::{AbandonReason, ItemAction, ItemEvent, ItemState, handle_event};
use crate::ledger::{Completion, Ledger};
use crate::summary::{RunSummary, WorkerTally};
use crate::telemetry;

/// Engine tuning.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    /// Number of concurrent workers; 0 means one per available CPU.
    pub workers: usize,
}

impl EngineOptions {
    /// Worker count with 0 resolved to the machine's parallelism.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Everything a worker needs, shared by all workers.
struct Shared {
    pool: Arc<KeyPool>,
    ledger: Arc<Ledger>,
    transformer: Arc<dyn Transformer>,
    preprocessor: Arc<dyn Preprocessor>,
    queue: WorkQueue,
}

/// Execution engine for one run.
pub struct Engine {
    pool: Arc<KeyPool>,
    ledger: Arc<Ledger>,
    transformer: Arc<dyn Transformer>,
    preprocessor: Arc<dyn Preprocessor>,
    options: EngineOptions,
}

impl Engine {
    pub fn new(
        pool: Arc<KeyPool>,
        ledger: Arc<Ledger>,
        transformer: Arc<dyn Transformer>,
        preprocessor: Arc<dyn Preprocessor>,
        options: EngineOptions,
    ) -> Self {
        Self {
            pool,
            ledger,
            transformer,
            preprocessor,
            options,
        }
    }

    /// Process every pending item in `plan` and report what happened.
    ///
    /// Never fails: per-item problems are counted in the summary.
    pub async fn run(&self, plan: DispatchPlan) -> RunSummary {
        let started = Instant::now();
        let pending = plan.pending.len();
        let workers = self.options.effective_workers().min(pending.max(1));

        let mut summary = RunSummary {
            pending,
            already_completed: plan.already_completed,
            ineligible: plan.ineligible,
            ..RunSummary::default()
        };

        info!(
            pending,
            workers,
            transformer = self.transformer.id(),
            keys = self.pool.total(),
            "starting sweep"
        );

        let shared = Arc::new(Shared {
            pool: self.pool.clone(),
            ledger: self.ledger.clone(),
            transformer: self.transformer.clone(),
            preprocessor: self.preprocessor.clone(),
            queue: WorkQueue::new(plan.pending),
        });

        let mut join_set: JoinSet<WorkerTally> = JoinSet::new();
        for worker_id in 0..workers {
            let shared = shared.clone();
            join_set.spawn(
                async move { worker_loop(&shared).await }
                    .instrument(info_span!("worker", worker_id)),
            );
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(tally) => summary.absorb(tally),
                Err(join_err) => {
                    error!(error = %join_err, "worker task failed");
                }
            }
        }

        let leftover = shared.queue.drain_remaining().await;
        if !leftover.is_empty() {
            warn!(
                items = leftover.len(),
                "key pool exhausted, leaving items for the next run"
            );
            for item in &leftover {
                debug!(item = %item.id, "never dispatched");
                telemetry::record_item("abandoned");
            }
        }
        summary.never_dispatched = leftover.len();
        summary.abandoned += leftover.len();

        let snapshot = self.pool.snapshot().await;
        summary.keys_remaining = snapshot.remaining();
        summary.keys_discarded = snapshot.discarded;
        summary.elapsed = started.elapsed();
        summary
    }
}

/// Pull items until the queue is empty or the pool is exhausted.
async fn worker_loop(shared: &Shared) -> WorkerTally {
    let mut tally = WorkerTally::default();
    loop {
        // No new items once the pool is gone
        if shared.pool.is_exhausted().await {
            break;
        }
        let Some(item) = shared.queue.pop().await else {
            break;
        };
        drive_item(shared, &item, &mut tally)
            .instrument(info_span!("item", item = %item.id))
            .await;
    }
    tally
}

/// The key an item currently holds.
///
/// Dropping a lease that still holds a key (a worker unwinding from a panic)
/// hands the key back on a spawned task so takers parked in `KeyPool::take`
/// still wake up.
struct KeyLease {
    pool: Arc<KeyPool>,
    held: Option<Credential>,
}

impl KeyLease {
    fn new(pool: Arc<KeyPool>) -> Self {
        Self { pool, held: None }
    }

    fn hold(&mut self, credential: Credential) {
        self.held = Some(credential);
    }

    fn get(&self) -> Option<&Credential> {
        self.held.as_ref()
    }

    fn release(&mut self) -> Option<Credential> {
        self.held.take()
    }
}

impl Drop for KeyLease {
    fn drop(&mut self) {
        let Some(credential) = self.held.take() else {
            return;
        };
        warn!(key = %credential.fingerprint(), "returning key from an interrupted item");
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let pool = self.pool.clone();
            handle.spawn(async move { pool.give_back(credential).await });
        }
    }
}

/// Check the pool and translate the answer into an event.
async fn pool_event(pool: &KeyPool) -> ItemEvent {
    if pool.is_exhausted().await {
        ItemEvent::PoolExhausted
    } else {
        ItemEvent::PoolOpen
    }
}

/// Run one item through the state machine to a terminal state.
async fn drive_item(shared: &Shared, item: &WorkItem, tally: &mut WorkerTally) {
    let mut state = ItemState::dispatched();
    let mut event = pool_event(&shared.pool).await;
    let mut lease = KeyLease::new(shared.pool.clone());
    let mut report = TransformReport::default();

    loop {
        let (next, action) = handle_event(state, event);
        state = next;

        event = match action {
            ItemAction::Preprocess => match shared.preprocessor.preprocess(item).await {
                Ok(()) => ItemEvent::Prepared,
                Err(e) => {
                    warn!(error = %e, "preprocess failed, abandoning item");
                    ItemEvent::PreprocessFailed(e.to_string())
                }
            },

            ItemAction::TakeCredential => match shared.pool.take().await {
                Some(credential) => {
                    lease.hold(credential);
                    ItemEvent::CredentialTaken
                }
                None => ItemEvent::NoCredential,
            },

            ItemAction::Transform => {
                let Some(credential) = lease.get() else {
                    // Unreachable through the state machine; treat as failure
                    // so the item is not recorded.
                    error!("transform requested without a key");
                    break;
                };
                let attempt_started = Instant::now();
                let result = shared.transformer.transform(item, credential).await;
                let duration = attempt_started.elapsed().as_secs_f64();
                match result {
                    Ok(r) => {
                        telemetry::record_attempt("success", duration);
                        report = r;
                        ItemEvent::TransformSucceeded
                    }
                    Err(e) => {
                        let label = e.failure_kind().map(|k| k.label()).unwrap_or("other");
                        telemetry::record_attempt(label, duration);
                        warn!(
                            key = %credential.fingerprint(),
                            kind = label,
                            error = %e,
                            "transform failed, discarding key"
                        );
                        tally.transform_failures += 1;
                        ItemEvent::TransformFailed(e.to_string())
                    }
                }
            }

            ItemAction::ReturnAndRecord => {
                if let Some(credential) = lease.release() {
                    shared.pool.give_back(credential).await;
                }
                let completion = Completion::now(report.bytes_before, report.bytes_after);
                match shared.ledger.mark_completed(&item.id, completion).await {
                    Ok(_) => ItemEvent::Recorded,
                    Err(e) => {
                        error!(
                            error = %e,
                            "item transformed but not recorded; it will be redone next run"
                        );
                        ItemEvent::RecordFailed(e.to_string())
                    }
                }
            }

            ItemAction::Discard => {
                if let Some(credential) = lease.release() {
                    if shared.pool.discard(&credential).await {
                        telemetry::record_key_discarded();
                    }
                }
                pool_event(&shared.pool).await
            }

            ItemAction::Finish => break,
        };
    }

    // A key is only ever held between Transform and ReturnAndRecord/Discard;
    // put it back if the loop broke out early.
    if let Some(credential) = lease.release() {
        shared.pool.give_back(credential).await;
    }

    if state.attempts() > 0 {
        tally.attempted += 1;
    }

    match state {
        ItemState::Done { attempts, recorded } => {
            tally.bytes_before += report.bytes_before;
            tally.bytes_after += report.bytes_after;
            if recorded {
                tally.completed += 1;
                telemetry::record_item("completed");
            } else {
                telemetry::record_item("unrecorded");
                tally.unrecorded.push(item.id.clone());
            }
            info!(
                attempts,
                recorded,
                bytes_before = report.bytes_before,
                bytes_after = report.bytes_after,
                "item done"
            );
        }
        ItemState::Abandoned { attempts, reason } => {
            tally.abandoned += 1;
            if matches!(reason, AbandonReason::Preprocess(_)) {
                tally.preprocess_failures += 1;
            }
            telemetry::record_item("abandoned");
            info!(attempts, reason = reason.label(), "item abandoned");
        }
        other => {
            tally.abandoned += 1;
            telemetry::record_item("abandoned");
            error!(state = ?other, "item stopped in a non-terminal state");
        }
    }
}
