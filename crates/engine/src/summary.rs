//! End-of-run summary

use std::time::Duration;

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Items handed to the engine after filtering
    pub pending: usize,
    /// Transformed and recorded
    pub completed: usize,
    /// Not transformed this run (includes `never_dispatched`)
    pub abandoned: usize,
    /// Still queued when the pool ran out
    pub never_dispatched: usize,
    /// Items that reached at least one transform call
    pub attempted: usize,
    /// Transform calls that failed (one key discarded each)
    pub transform_failures: usize,
    /// Items abandoned because preprocessing failed
    pub preprocess_failures: usize,
    /// Items transformed but not recorded; a rerun will redo them
    pub unrecorded: Vec<String>,
    /// Skipped because the ledger already had them
    pub already_completed: usize,
    /// Skipped by the eligibility predicate
    pub ineligible: usize,
    /// Keys not discarded at the end of the run
    pub keys_remaining: usize,
    /// Keys discarded during the run
    pub keys_discarded: usize,
    /// Bytes before/after over transformed items, recorded or not
    pub bytes_before: u64,
    pub bytes_after: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    /// True when the run ended with no usable keys.
    pub fn is_exhausted(&self) -> bool {
        self.keys_remaining == 0
    }

    /// Bytes saved over transformed items.
    pub fn bytes_saved(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }

    /// Fold one worker's tally into the run total.
    pub(crate) fn absorb(&mut self, tally: WorkerTally) {
        self.completed += tally.completed;
        self.abandoned += tally.abandoned;
        self.attempted += tally.attempted;
        self.transform_failures += tally.transform_failures;
        self.preprocess_failures += tally.preprocess_failures;
        self.unrecorded.extend(tally.unrecorded);
        self.bytes_before += tally.bytes_before;
        self.bytes_after += tally.bytes_after;
    }
}

/// Per-worker counters, merged into `RunSummary` when the worker exits.
#[derive(Debug, Default)]
pub(crate) struct WorkerTally {
    pub completed: usize,
    pub abandoned: usize,
    pub attempted: usize,
    pub transform_failures: usize,
    pub preprocess_failures: usize,
    pub unrecorded: Vec<String>,
    pub bytes_before: u64,
    pub bytes_after: u64,
}
