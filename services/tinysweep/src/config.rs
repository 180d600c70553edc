//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! API keys are never stored in the TOML directly: they come from the
//! TINIFY_KEYS env var, a key file, or a remote key list URL.

use common::Secret;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file name looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "tinysweep.toml";

/// Ledger file name used when `sweep.ledger_path` is not set.
pub const DEFAULT_LEDGER_FILE: &str = ".tinysweep-ledger.json";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub keys: KeysConfig,
    pub sweep: SweepConfig,
    pub tinify: TinifyConfig,
    pub metrics: MetricsConfig,
}

/// Where API keys come from. The first configured source wins:
/// TINIFY_KEYS env, then `file`, then `url`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Remote plain-text list, one key per line
    pub url: Option<String>,
    /// Local file, one key per line
    pub file: Option<PathBuf>,
    /// Raw TINIFY_KEYS value (comma or newline separated)
    #[serde(skip)]
    pub env: Option<Secret<String>>,
}

/// Sweep behavior
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Files smaller than this are left alone
    pub min_bytes: u64,
    /// Longest side after resizing; 0 disables resizing
    pub max_dimension: u32,
    /// Concurrent workers; 0 means one per CPU
    pub workers: usize,
    /// Ledger location; defaults to `<root>/.tinysweep-ledger.json`
    pub ledger_path: Option<PathBuf>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            min_bytes: 200 * 1024,
            max_dimension: 2000,
            workers: 0,
            ledger_path: None,
        }
    }
}

impl SweepConfig {
    /// Ledger path for a sweep over `root`.
    pub fn ledger_path_for(&self, root: &Path) -> PathBuf {
        self.ledger_path
            .clone()
            .unwrap_or_else(|| root.join(DEFAULT_LEDGER_FILE))
    }
}

/// Tinify API settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TinifyConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for TinifyConfig {
    fn default() -> Self {
        Self {
            endpoint: tinify::DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 60,
        }
    }
}

/// Metrics output
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Write Prometheus text format here at the end of a run
    pub textfile: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.finish()
    }

    /// Defaults plus environment, for runs without a config file.
    pub fn from_env() -> common::Result<Self> {
        Config::default().finish()
    }

    fn finish(mut self) -> common::Result<Self> {
        if let Ok(keys) = std::env::var("TINIFY_KEYS") {
            if !keys.trim().is_empty() {
                self.keys.env = Some(Secret::new(keys));
            }
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> common::Result<()> {
        if !is_http_url(&self.tinify.endpoint) {
            return Err(common::Error::Config(format!(
                "tinify.endpoint must start with http:// or https://, got: {}",
                self.tinify.endpoint
            )));
        }

        if self.tinify.timeout_secs == 0 {
            return Err(common::Error::Config(
                "tinify.timeout_secs must be greater than 0".into(),
            ));
        }

        if let Some(url) = &self.keys.url {
            if !is_http_url(url) {
                return Err(common::Error::Config(format!(
                    "keys.url must start with http:// or https://, got: {url}"
                )));
            }
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    ///
    /// Returns the path and whether it was asked for explicitly. Only an
    /// explicit path has to exist.
    pub fn resolve_path(cli_path: Option<&str>) -> (PathBuf, bool) {
        if let Some(p) = cli_path {
            return (PathBuf::from(p), true);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return (PathBuf::from(p), true);
        }
        (PathBuf::from(DEFAULT_CONFIG_FILE), false)
    }
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}
