//! Trivial collaborators: a preprocessor that leaves files untouched and a
//! credential source backed by an in-memory key list.

use tracing::debug;

use crate::{BoxFuture, Credential, CredentialSource, Error, Preprocessor, Result, WorkItem};

/// Preprocessor that does nothing. Used when resizing is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughPreprocessor;

impl Preprocessor for PassthroughPreprocessor {
    fn preprocess<'a>(&'a self, item: &'a WorkItem) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            debug!(item = %item.id, "preprocess skipped");
            Ok(())
        })
    }
}

/// Credential source over a fixed list of keys (env var, tests).
#[derive(Debug, Clone)]
pub struct StaticSource {
    id: &'static str,
    keys: Vec<Credential>,
}

impl StaticSource {
    pub fn new(id: &'static str, keys: Vec<Credential>) -> Self {
        Self { id, keys }
    }
}

impl CredentialSource for StaticSource {
    fn id(&self) -> &str {
        self.id
    }

    fn fetch(&self) -> BoxFuture<'_, Result<Vec<Credential>>> {
        Box::pin(async move {
            if self.keys.is_empty() {
                return Err(Error::CredentialSource(format!(
                    "{} source has no keys",
                    self.id
                )));
            }
            Ok(self.keys.clone())
        })
    }
}
