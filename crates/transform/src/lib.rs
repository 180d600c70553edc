//! Collaborator contracts for the sweep engine
//!
//! Defines the traits that decouple the execution engine from the concrete
//! image pipeline. The engine only needs to know whether a step succeeded:
//! - `CredentialSource` yields the keys for one run
//! - `Preprocessor` normalizes an item before any key is spent on it
//! - `Transformer` performs the chargeable call with one key
//!
//! Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
//! (`Arc<dyn Transformer>`), the same shape across all three traits.

pub mod item;
pub mod passthrough;

pub use item::{Credential, WorkItem};
pub use passthrough::{PassthroughPreprocessor, StaticSource};

use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Why a transform attempt failed.
///
/// The engine handles every kind the same way (discard the key, retry the
/// item with the next one). The kind exists for logs and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Key refused by the service (401/403)
    Rejected,
    /// Key hit its usage limit (429 / monthly limit)
    QuotaExceeded,
    /// Network error, timeout, or 5xx
    Transient,
    /// The service refused the input itself (bad or unsupported image)
    Input,
    /// Reading or writing the local file failed
    Local,
}

impl FailureKind {
    /// Label for logging and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::Rejected => "rejected",
            FailureKind::QuotaExceeded => "quota_exceeded",
            FailureKind::Transient => "transient",
            FailureKind::Input => "input",
            FailureKind::Local => "local",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors surfaced by collaborators.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No keys could be obtained; the run must not start.
    #[error("credential source unavailable: {0}")]
    CredentialSource(String),

    /// One transform attempt failed; the key used for it is discarded.
    #[error("transform failed ({kind}): {message}")]
    Transform { kind: FailureKind, message: String },

    /// Normalization failed before any key was taken.
    #[error("preprocess failed: {0}")]
    Preprocess(String),
}

impl Error {
    /// Shorthand for a transform failure.
    pub fn transform(kind: FailureKind, message: impl Into<String>) -> Self {
        Error::Transform {
            kind,
            message: message.into(),
        }
    }

    /// Failure kind for transform errors, `None` otherwise.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Error::Transform { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Result alias for collaborator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Byte counts reported by a successful transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransformReport {
    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// Boxed future returned by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Source of the keys used for one run.
pub trait CredentialSource: Send + Sync {
    /// Identifier for logging (e.g. "env", "file", "url")
    fn id(&self) -> &str;

    /// Fetch the ordered key list.
    ///
    /// Must fail with `Error::CredentialSource` when the source is unreachable
    /// or yields no keys.
    fn fetch(&self) -> BoxFuture<'_, Result<Vec<Credential>>>;
}

/// Idempotent normalization step run before each attempt.
///
/// Runs before a key is taken, so a failure here never costs a key.
pub trait Preprocessor: Send + Sync {
    fn preprocess<'a>(&'a self, item: &'a WorkItem) -> BoxFuture<'a, Result<()>>;
}

/// The chargeable operation: transform one item with one key.
pub trait Transformer: Send + Sync {
    /// Identifier for logging (e.g. "tinify")
    fn id(&self) -> &str;

    fn transform<'a>(
        &'a self,
        item: &'a WorkItem,
        credential: &'a Credential,
    ) -> BoxFuture<'a, Result<TransformReport>>;
}
