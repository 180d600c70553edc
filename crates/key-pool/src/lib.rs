//! Shared key pool for a sweep run
//!
//! Holds the API keys fetched at startup and hands them out to workers one at
//! a time. A key is always in exactly one of three places:
//!
//! 1. Available: queued, eligible for `take`
//! 2. Checked out: held by exactly one worker for the duration of one call
//! 3. Discarded: removed after a failed call, never handed out again
//!
//! Keys that succeed go back to the end of the queue (`give_back`) and are
//! reused by any worker. The pool is exhausted once nothing is available and
//! nothing is checked out; no keys are added mid-run, so exhaustion is final.

pub mod error;
pub mod pool;

pub use error::{Error, Result};
pub use pool::{KeyPool, PoolSnapshot};
