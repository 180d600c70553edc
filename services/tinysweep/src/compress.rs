//! Tinify-backed transformer: upload, download, overwrite.
//!
//! Implements the Transformer trait on top of `tinify::Client`. The file is
//! only replaced after the compressed bytes are fully downloaded, and then
//! via temp file + rename, so a failed attempt leaves the original intact
//! and the item can be retried with the next key.

use tinify::Client;
use tracing::debug;
use transform::{
    BoxFuture, Credential, Error, FailureKind, Result, TransformReport, Transformer, WorkItem,
};

use crate::resize::sibling_temp_path;

/// Compresses images in place through the Tinify API.
pub struct TinifyTransformer {
    client: Client,
}

impl TinifyTransformer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn api_failure(e: tinify::Error) -> Error {
    Error::transform(e.kind(), e.to_string())
}

fn local_failure(context: &str, e: std::io::Error) -> Error {
    Error::transform(FailureKind::Local, format!("{context}: {e}"))
}

impl Transformer for TinifyTransformer {
    fn id(&self) -> &str {
        "tinify"
    }

    fn transform<'a>(
        &'a self,
        item: &'a WorkItem,
        credential: &'a Credential,
    ) -> BoxFuture<'a, Result<TransformReport>> {
        Box::pin(async move {
            let original = tokio::fs::read(&item.path)
                .await
                .map_err(|e| local_failure("reading image", e))?;
            let bytes_before = original.len() as u64;

            let shrunk = self
                .client
                .shrink(credential.expose(), original)
                .await
                .map_err(api_failure)?;
            let compressed = self
                .client
                .download(credential.expose(), &shrunk)
                .await
                .map_err(api_failure)?;
            let bytes_after = compressed.len() as u64;

            let tmp = sibling_temp_path(&item.path);
            if let Err(e) = tokio::fs::write(&tmp, &compressed).await {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(local_failure("writing compressed image", e));
            }
            tokio::fs::rename(&tmp, &item.path)
                .await
                .map_err(|e| local_failure("replacing image", e))?;

            debug!(
                item = %item.id,
                key = %credential.fingerprint(),
                bytes_before,
                bytes_after,
                compression_count = shrunk.compression_count,
                "compressed"
            );

            Ok(TransformReport {
                bytes_before,
                bytes_after,
            })
        })
    }
}
