//! Per-item state machine
//!
//! Pure state machine: receives events, returns (new_state, action).
//! The worker (`runner.rs`) executes the I/O implied by each action and feeds
//! the result back as the next event.
//!
//! ```text
//! Dispatched --PoolOpen--> Preparing --Prepared--> Preparing --CredentialTaken--> Attempting
//! Attempting --TransformSucceeded--> Recording --Recorded|RecordFailed--> Done
//! Attempting --TransformFailed--> Dispatched (key discarded, pool re-checked)
//! Dispatched --PoolExhausted--> Abandoned
//! Preparing --PreprocessFailed|NoCredential--> Abandoned
//! ```

/// Why an item ended without being transformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbandonReason {
    /// No keys left in the pool
    Exhausted,
    /// The preprocess step failed; no key was spent
    Preprocess(String),
    /// An event arrived that the current state does not accept
    InvalidTransition,
}

impl AbandonReason {
    pub fn label(&self) -> &'static str {
        match self {
            AbandonReason::Exhausted => "exhausted",
            AbandonReason::Preprocess(_) => "preprocess",
            AbandonReason::InvalidTransition => "invalid_transition",
        }
    }
}

/// Item states. `attempts` counts transform calls made so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemState {
    /// Waiting to start (or restart after a failed attempt)
    Dispatched { attempts: u32 },
    /// Preprocessing, then waiting for a key
    Preparing { attempt: u32 },
    /// Transform call in flight with a checked-out key
    Attempting { attempt: u32 },
    /// Transform succeeded, key returned, writing the ledger
    Recording { attempts: u32 },
    /// Terminal: transformed. `recorded` is false when the ledger write failed.
    Done { attempts: u32, recorded: bool },
    /// Terminal: not transformed in this run
    Abandoned { attempts: u32, reason: AbandonReason },
}

impl ItemState {
    /// Initial state for a freshly dispatched item.
    pub fn dispatched() -> Self {
        ItemState::Dispatched { attempts: 0 }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemState::Done { .. } | ItemState::Abandoned { .. })
    }

    /// Transform calls made so far.
    pub fn attempts(&self) -> u32 {
        match self {
            ItemState::Dispatched { attempts }
            | ItemState::Recording { attempts }
            | ItemState::Done { attempts, .. }
            | ItemState::Abandoned { attempts, .. } => *attempts,
            // The attempt in progress is not finished yet
            ItemState::Preparing { attempt } | ItemState::Attempting { attempt } => {
                attempt.saturating_sub(1)
            }
        }
    }
}

/// Events produced by executing an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemEvent {
    /// Pool checked: keys remain
    PoolOpen,
    /// Pool checked: exhausted
    PoolExhausted,
    /// Preprocess finished
    Prepared,
    /// Preprocess failed
    PreprocessFailed(String),
    /// A key was checked out
    CredentialTaken,
    /// `take` reported the pool exhausted
    NoCredential,
    /// Transform call succeeded
    TransformSucceeded,
    /// Transform call failed
    TransformFailed(String),
    /// Ledger write succeeded
    Recorded,
    /// Ledger write failed
    RecordFailed(String),
}

/// Actions the worker should execute after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    /// Run the preprocess step
    Preprocess,
    /// Check out a key
    TakeCredential,
    /// Call the transformer with the held key
    Transform,
    /// Return the held key, then write the ledger
    ReturnAndRecord,
    /// Discard the held key, then check the pool
    Discard,
    /// Terminal state reached
    Finish,
}

/// Handle a state transition. Pure function: no I/O.
pub fn handle_event(state: ItemState, event: ItemEvent) -> (ItemState, ItemAction) {
    match (state, event) {
        // --- Dispatched ---
        (ItemState::Dispatched { attempts }, ItemEvent::PoolOpen) => (
            ItemState::Preparing {
                attempt: attempts + 1,
            },
            ItemAction::Preprocess,
        ),

        (ItemState::Dispatched { attempts }, ItemEvent::PoolExhausted) => (
            ItemState::Abandoned {
                attempts,
                reason: AbandonReason::Exhausted,
            },
            ItemAction::Finish,
        ),

        // --- Preparing ---
        (ItemState::Preparing { attempt }, ItemEvent::Prepared) => {
            (ItemState::Preparing { attempt }, ItemAction::TakeCredential)
        }

        (ItemState::Preparing { attempt }, ItemEvent::PreprocessFailed(message)) => (
            ItemState::Abandoned {
                attempts: attempt.saturating_sub(1),
                reason: AbandonReason::Preprocess(message),
            },
            ItemAction::Finish,
        ),

        (ItemState::Preparing { attempt }, ItemEvent::CredentialTaken) => {
            (ItemState::Attempting { attempt }, ItemAction::Transform)
        }

        (ItemState::Preparing { attempt }, ItemEvent::NoCredential) => (
            ItemState::Abandoned {
                attempts: attempt.saturating_sub(1),
                reason: AbandonReason::Exhausted,
            },
            ItemAction::Finish,
        ),

        // --- Attempting ---
        (ItemState::Attempting { attempt }, ItemEvent::TransformSucceeded) => (
            ItemState::Recording { attempts: attempt },
            ItemAction::ReturnAndRecord,
        ),

        (ItemState::Attempting { attempt }, ItemEvent::TransformFailed(_)) => (
            ItemState::Dispatched { attempts: attempt },
            ItemAction::Discard,
        ),

        // --- Recording ---
        (ItemState::Recording { attempts }, ItemEvent::Recorded) => (
            ItemState::Done {
                attempts,
                recorded: true,
            },
            ItemAction::Finish,
        ),

        (ItemState::Recording { attempts }, ItemEvent::RecordFailed(_)) => (
            ItemState::Done {
                attempts,
                recorded: false,
            },
            ItemAction::Finish,
        ),

        // --- Terminal states absorb everything ---
        (state, _) if state.is_terminal() => (state, ItemAction::Finish),

        // --- Invalid transition: give up on the item ---
        (state, _event) => (
            ItemState::Abandoned {
                attempts: state.attempts(),
                reason: AbandonReason::InvalidTransition,
            },
            ItemAction::Finish,
        ),
    }
}
