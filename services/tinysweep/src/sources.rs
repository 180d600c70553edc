//! Key sources: where a run gets its API keys
//!
//! Resolution order: TINIFY_KEYS env var, then `keys.file`, then `keys.url`.
//! All three use the same list format (one key per line, commas allowed,
//! blank lines ignored, duplicates dropped).

use std::path::PathBuf;

use tinify::parse_key_list;
use tracing::info;
use transform::{BoxFuture, Credential, CredentialSource, Error, Result, StaticSource};

use crate::config::KeysConfig;

/// Pick the key source named by the configuration.
pub fn from_config(
    keys: &KeysConfig,
    http: &reqwest::Client,
) -> Result<Box<dyn CredentialSource>> {
    if let Some(env) = &keys.env {
        return Ok(Box::new(StaticSource::new(
            "env",
            to_credentials(parse_key_list(env.expose())),
        )));
    }
    if let Some(path) = &keys.file {
        return Ok(Box::new(FileSource { path: path.clone() }));
    }
    if let Some(url) = &keys.url {
        return Ok(Box::new(UrlSource {
            http: http.clone(),
            url: url.clone(),
        }));
    }
    Err(Error::CredentialSource(
        "no key source configured: set TINIFY_KEYS, keys.file or keys.url".into(),
    ))
}

fn to_credentials(keys: Vec<String>) -> Vec<Credential> {
    keys.into_iter().map(Credential::new).collect()
}

/// Keys read from a local file.
pub struct FileSource {
    path: PathBuf,
}

impl CredentialSource for FileSource {
    fn id(&self) -> &str {
        "file"
    }

    fn fetch(&self) -> BoxFuture<'_, Result<Vec<Credential>>> {
        Box::pin(async move {
            let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
                Error::CredentialSource(format!("reading {}: {e}", self.path.display()))
            })?;
            let keys = parse_key_list(&text);
            if keys.is_empty() {
                return Err(Error::CredentialSource(format!(
                    "{} contains no keys",
                    self.path.display()
                )));
            }
            info!(path = %self.path.display(), keys = keys.len(), "loaded keys from file");
            Ok(to_credentials(keys))
        })
    }
}

/// Keys downloaded from a plain-text URL.
pub struct UrlSource {
    http: reqwest::Client,
    url: String,
}

impl CredentialSource for UrlSource {
    fn id(&self) -> &str {
        "url"
    }

    fn fetch(&self) -> BoxFuture<'_, Result<Vec<Credential>>> {
        Box::pin(async move {
            let keys = tinify::fetch_key_list(&self.http, &self.url)
                .await
                .map_err(|e| Error::CredentialSource(e.to_string()))?;
            info!(keys = keys.len(), "loaded keys from url");
            Ok(to_credentials(keys))
        })
    }
}
