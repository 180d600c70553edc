//! Sweep execution engine
//!
//! Runs work items through a `Transformer` using keys drawn from a shared
//! `KeyPool`, recording each success in a durable `Ledger` so reruns skip it.
//!
//! Flow for one run:
//! 1. `dispatch::plan` drops items already in the ledger or failing the
//!    eligibility predicate
//! 2. `Engine::run` starts a fixed number of workers over the remaining items
//! 3. Each worker drives one item at a time through the `item` state machine:
//!    preprocess, take a key, transform, then return the key and record the
//!    item, or discard the key and retry with the next one
//! 4. Once the pool is exhausted no further items are started; whatever is
//!    left is abandoned and will be picked up by the next run

pub mod dispatch;
pub mod error;
pub mod item;
pub mod ledger;
pub mod runner;
pub mod summary;
pub mod telemetry;

pub use dispatch::{DispatchPlan, WorkQueue, plan};
pub use error::{Error, Result};
pub use item::{AbandonReason, ItemAction, ItemEvent, ItemState, handle_event};
pub use ledger::{Completion, Ledger};
pub use runner::{Engine, EngineOptions};
pub use summary::RunSummary;
