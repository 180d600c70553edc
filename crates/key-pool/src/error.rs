//! Error types for pool operations

/// Errors from pool operations.
///
/// Running out of keys mid-run is not an error: `take` returns `None` and
/// `is_exhausted` reports it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("key pool cannot start empty")]
    Empty,
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
