//! Key list parsing and remote fetching
//!
//! A key list is plain text: one key per line (commas also separate keys, so
//! the same parser serves an env var). Whitespace is trimmed, blank entries
//! dropped, and repeated keys kept only once in first-seen order.

use std::collections::HashSet;

use tracing::info;

use crate::error::{Error, Result};

/// Split a key list into distinct, trimmed keys.
pub fn parse_key_list(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split(['\n', '\r', ','])
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.to_string()))
        .map(str::to_string)
        .collect()
}

/// Download and parse a key list.
///
/// Returns an error if the URL is unreachable, answers non-2xx, or contains
/// no keys.
pub async fn fetch_key_list(client: &reqwest::Client, url: &str) -> Result<Vec<String>> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Http(format!("key list request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::InvalidResponse(format!(
            "key list endpoint returned {status}"
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| Error::Http(format!("reading key list: {e}")))?;
    let keys = parse_key_list(&body);
    if keys.is_empty() {
        return Err(Error::InvalidResponse("key list is empty".into()));
    }
    info!(keys = keys.len(), "fetched key list");
    Ok(keys)
}
