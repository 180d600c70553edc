//! Service-specific error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop the binary before a sweep starts.
///
/// Per-item failures never surface here; the engine counts them in the run
/// summary instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("usage: tinysweep [--config <path>] <root>")]
    MissingRoot,

    #[error("unexpected argument {0:?}; usage: tinysweep [--config <path>] <root>")]
    UnexpectedArgument(String),

    #[error("root {} is not a readable directory: {reason}", path.display())]
    InvalidRoot { path: PathBuf, reason: String },
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages_are_descriptive() {
        assert!(Error::MissingRoot.to_string().starts_with("usage: tinysweep"));

        let msg = Error::UnexpectedArgument("/other".into()).to_string();
        assert!(msg.contains("\"/other\""), "got: {msg}");
        assert!(msg.contains("usage: tinysweep"), "got: {msg}");

        let err = Error::InvalidRoot {
            path: PathBuf::from("/photos"),
            reason: "not a directory".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/photos"), "got: {msg}");
        assert!(msg.contains("not a directory"), "got: {msg}");
    }
}
