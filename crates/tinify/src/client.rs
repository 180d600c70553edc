//! Shrink and download calls
//!
//! Both calls authenticate with HTTP basic auth, username `api` and the key
//! as password. A shrink answers `201 Created` with a JSON body whose
//! `output.url` points at the compressed image; downloading that URL returns
//! the bytes.

use serde::Deserialize;
use tracing::debug;

use crate::classify::classify_status;
use crate::constants::{AUTH_USER, COMPRESSION_COUNT_HEADER, SHRINK_PATH};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct ShrinkResponse {
    input: ImageSide,
    output: OutputSide,
}

#[derive(Debug, Deserialize)]
struct ImageSide {
    size: u64,
}

#[derive(Debug, Deserialize)]
struct OutputSide {
    size: u64,
    url: String,
}

/// Result of a successful shrink call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shrunk {
    /// Size of the compressed image the download must match
    pub output_size: u64,
    pub url: String,
    /// Compressions made with this key this month, when the API reports it
    pub compression_count: Option<u64>,
}

/// Tinify API client bound to one base URL.
///
/// Cheap to clone; the underlying `reqwest::Client` is reference-counted.
/// Timeouts are a property of the `reqwest::Client` passed in.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    endpoint: String,
}

impl Client {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self { http, endpoint }
    }

    /// Upload image bytes for compression.
    pub async fn shrink(&self, key: &str, body: Vec<u8>) -> Result<Shrunk> {
        let url = format!("{}{}", self.endpoint, SHRINK_PATH);
        let response = self
            .http
            .post(&url)
            .basic_auth(AUTH_USER, Some(key))
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Http(format!("shrink request failed: {e}")))?;

        let status = response.status();
        let compression_count = response
            .headers()
            .get(COMPRESSION_COUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        if status.as_u16() != 201 {
            return Err(api_error(response).await);
        }

        let parsed = response
            .json::<ShrinkResponse>()
            .await
            .map_err(|e| Error::InvalidResponse(format!("shrink response: {e}")))?;

        debug!(
            input_size = parsed.input.size,
            output_size = parsed.output.size,
            compression_count,
            "shrink accepted"
        );

        Ok(Shrunk {
            output_size: parsed.output.size,
            url: parsed.output.url,
            compression_count,
        })
    }

    /// Fetch the compressed bytes for a shrink result.
    ///
    /// A body whose length differs from `shrunk.output_size` is treated as a
    /// truncated transfer.
    pub async fn download(&self, key: &str, shrunk: &Shrunk) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(&shrunk.url)
            .basic_auth(AUTH_USER, Some(key))
            .send()
            .await
            .map_err(|e| Error::Http(format!("download request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Http(format!("reading download body: {e}")))?;
        if bytes.is_empty() {
            return Err(Error::InvalidResponse("download returned no bytes".into()));
        }
        if bytes.len() as u64 != shrunk.output_size {
            return Err(Error::InvalidResponse(format!(
                "download returned {} bytes, expected {}",
                bytes.len(),
                shrunk.output_size
            )));
        }
        Ok(bytes.to_vec())
    }
}

/// Turn a non-success response into a classified `Error::Api`.
async fn api_error(response: reqwest::Response) -> Error {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<no body>"));
    let kind = classify_status(status, &body);
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["message"].as_str().map(str::to_string))
        .unwrap_or(body);
    Error::Api {
        status,
        kind,
        message,
    }
}
