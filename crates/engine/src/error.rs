//! Error types for engine operations

/// Errors from the ledger and engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("ledger I/O error: {0}")]
    LedgerIo(String),

    #[error("ledger parse error: {0}")]
    LedgerParse(String),

    /// The item was transformed but its completion could not be persisted.
    /// A later run may transform it again.
    #[error("failed to record completion of {id}: {message}")]
    StoreWrite { id: String, message: String },
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_write_names_the_item() {
        let err = Error::StoreWrite {
            id: "photos/cat.png".into(),
            message: "disk full".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to record completion of photos/cat.png: disk full"
        );
    }
}
