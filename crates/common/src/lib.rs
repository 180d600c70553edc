//! Common types shared by the tinysweep crates

mod error;
pub mod fs;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
