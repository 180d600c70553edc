//! Tinify (TinyPNG) API client
//!
//! Covers the two HTTP interactions a sweep needs:
//! 1. `client::Client::shrink` uploads an image and gets back an output URL
//! 2. `client::Client::download` fetches the compressed bytes from that URL
//!
//! Plus fetching the key list from a remote text file (`keys`) and mapping
//! API responses onto `transform::FailureKind` (`classify`). This crate knows
//! nothing about pools or ledgers; it can be tested against a local server.

pub mod classify;
pub mod client;
pub mod constants;
pub mod error;
pub mod keys;

pub use classify::classify_status;
pub use client::{Client, Shrunk};
pub use constants::*;
pub use error::{Error, Result};
pub use keys::{fetch_key_list, parse_key_list};
