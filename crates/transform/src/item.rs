//! Work items and credentials

use std::fmt;
use std::path::PathBuf;

use common::Secret;
use sha2::{Digest, Sha256};

/// One file to process.
///
/// `id` is the stable identity used as the ledger key; `path` is where the
/// bytes live right now; `size` is the byte count observed at discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: String,
    pub path: PathBuf,
    pub size: u64,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            size,
        }
    }
}

/// An API key.
///
/// Compared and hashed by its literal value. `Debug` prints a fingerprint
/// only, so a credential can be logged without leaking the key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(Secret<String>);

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(Secret::new(key.into()))
    }

    /// The raw key, for building the request.
    pub fn expose(&self) -> &str {
        self.0.expose()
    }

    /// First 8 hex chars of the key's SHA-256.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.expose().as_bytes());
        digest[..4].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.fingerprint())
    }
}
