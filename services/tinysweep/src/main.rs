//! tinysweep
//!
//! Single-binary tool that:
//! 1. Walks a directory for PNG/JPEG files above a size threshold
//! 2. Downsizes images larger than the configured maximum dimension
//! 3. Compresses each one through the Tinify API, rotating through a pool of
//!    API keys and dropping any key that fails
//! 4. Records finished files in a ledger next to the images so reruns skip them
//!
//! The run stops starting new files as soon as every key has failed; whatever
//! is left is picked up by the next run.

mod compress;
mod config;
mod discover;
mod error;
mod metrics;
mod resize;
mod sources;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use engine::{Engine, EngineOptions, Ledger, RunSummary};
use key_pool::KeyPool;
use tracing::{Instrument, error, info, info_span, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transform::{PassthroughPreprocessor, Preprocessor};

use crate::compress::TinifyTransformer;
use crate::config::Config;
use crate::resize::ResizePreprocessor;

/// Parsed command line: `tinysweep [--config <path>] <root>`
#[derive(Debug, Default, PartialEq, Eq)]
struct CliArgs {
    config: Option<String>,
    root: Option<PathBuf>,
}

impl CliArgs {
    fn parse(args: impl IntoIterator<Item = String>) -> error::Result<Self> {
        let mut parsed = CliArgs::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            if arg == "--config" {
                let path = args
                    .next()
                    .ok_or_else(|| error::Error::UnexpectedArgument(arg.clone()))?;
                parsed.config = Some(path);
            } else if let Some(path) = arg.strip_prefix("--config=") {
                if path.is_empty() {
                    return Err(error::Error::UnexpectedArgument(arg));
                }
                parsed.config = Some(path.to_string());
            } else if arg.starts_with("--") || parsed.root.is_some() {
                return Err(error::Error::UnexpectedArgument(arg));
            } else {
                parsed.root = Some(PathBuf::from(arg));
            }
        }
        Ok(parsed)
    }
}

/// Check that `root` is a directory and return its canonical form.
fn resolve_root(root: Option<&Path>) -> error::Result<PathBuf> {
    let root = root.ok_or(error::Error::MissingRoot)?;
    let invalid = |reason: String| error::Error::InvalidRoot {
        path: root.to_path_buf(),
        reason,
    };
    let canonical = std::fs::canonicalize(root).map_err(|e| invalid(e.to_string()))?;
    if !canonical.is_dir() {
        return Err(invalid("not a directory".into()));
    }
    Ok(canonical)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting tinysweep");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder()?;

    let args = CliArgs::parse(std::env::args().skip(1))?;

    let (config_path, explicit) = Config::resolve_path(args.config.as_deref());
    let config = if explicit || config_path.exists() {
        info!(path = %config_path.display(), "loading configuration");
        Config::load(&config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?
    } else {
        info!("no config file, using defaults");
        Config::from_env().context("invalid configuration")?
    };

    let root = resolve_root(args.root.as_deref())?;

    info!(
        root = %root.display(),
        endpoint = %config.tinify.endpoint,
        min_bytes = config.sweep.min_bytes,
        max_dimension = config.sweep.max_dimension,
        workers = config.sweep.workers,
        "configuration loaded"
    );

    let run_id = format!("run_{}", uuid::Uuid::new_v4().as_simple());
    let summary = sweep(&config, &root)
        .instrument(info_span!("run", run_id = %run_id))
        .await?;

    log_summary(&run_id, &summary);

    if let Some(textfile) = &config.metrics.textfile {
        match metrics::write_textfile(&prometheus_handle, textfile) {
            Ok(()) => info!(path = %textfile.display(), "metrics written"),
            Err(e) => warn!(error = %format!("{e:#}"), "failed to write metrics textfile"),
        }
    }

    Ok(())
}

/// Run one sweep over `root`.
///
/// Fails only before dispatch (no keys, unusable ledger). Once items are
/// dispatched every outcome is reported through the summary.
async fn sweep(config: &Config, root: &Path) -> Result<RunSummary> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.tinify.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    let source = sources::from_config(&config.keys, &http)?;
    let keys = source
        .fetch()
        .await
        .with_context(|| format!("failed to load keys from {} source", source.id()))?;
    let pool = Arc::new(KeyPool::new(keys)?);
    info!(source = source.id(), keys = pool.total(), "key pool ready");

    let ledger_path = config.sweep.ledger_path_for(root);
    let ledger = Arc::new(
        Ledger::open(ledger_path.clone())
            .await
            .with_context(|| format!("failed to open ledger {}", ledger_path.display()))?,
    );

    let walk_root = root.to_path_buf();
    let items = tokio::task::spawn_blocking(move || discover::discover(&walk_root))
        .await
        .context("discovery task failed")?;
    let discovered = items.len();

    let min_bytes = config.sweep.min_bytes;
    let plan = engine::plan(items, &ledger, |item| item.size >= min_bytes).await;
    info!(
        discovered,
        pending = plan.pending.len(),
        already_completed = plan.already_completed,
        ineligible = plan.ineligible,
        "dispatch plan ready"
    );

    let preprocessor: Arc<dyn Preprocessor> = if config.sweep.max_dimension > 0 {
        Arc::new(ResizePreprocessor::new(config.sweep.max_dimension))
    } else {
        Arc::new(PassthroughPreprocessor)
    };
    let transformer = Arc::new(TinifyTransformer::new(tinify::Client::new(
        http,
        config.tinify.endpoint.as_str(),
    )));

    let engine = Engine::new(
        pool,
        ledger,
        transformer,
        preprocessor,
        EngineOptions {
            workers: config.sweep.workers,
        },
    );
    Ok(engine.run(plan).await)
}

fn log_summary(run_id: &str, summary: &RunSummary) {
    info!(
        run_id,
        completed = summary.completed,
        unrecorded = summary.unrecorded.len(),
        abandoned = summary.abandoned,
        never_dispatched = summary.never_dispatched,
        already_completed = summary.already_completed,
        ineligible = summary.ineligible,
        transform_failures = summary.transform_failures,
        preprocess_failures = summary.preprocess_failures,
        keys_remaining = summary.keys_remaining,
        keys_discarded = summary.keys_discarded,
        bytes_saved = summary.bytes_saved(),
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "sweep finished"
    );
    if summary.is_exhausted() && summary.abandoned > 0 {
        warn!(
            remaining = summary.abandoned,
            "all keys exhausted; rerun with fresh keys to finish"
        );
    }
    if !summary.unrecorded.is_empty() {
        error!(
            items = ?summary.unrecorded,
            "compressed but not recorded in the ledger; these will be uploaded again next run"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KeysConfig, MetricsConfig, SweepConfig, TinifyConfig};
    use axum::Router;
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode, header};
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use common::Secret;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    /// `Basic base64("api:good-key")`
    const GOOD_AUTH: &str = "Basic YXBpOmdvb2Qta2V5";

    #[derive(Clone)]
    struct MockApi {
        base: String,
        shrinks: Arc<AtomicUsize>,
    }

    async fn shrink(State(api): State<MockApi>, headers: HeaderMap, body: Bytes) -> Response {
        api.shrinks.fetch_add(1, Ordering::SeqCst);
        let auth = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        if auth != Some(GOOD_AUTH) {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                r#"{"error":"TooManyRequests","message":"Your monthly limit has been exceeded"}"#,
            )
                .into_response();
        }
        let json = format!(
            r#"{{"input":{{"size":{}}},"output":{{"size":4,"url":"{}/output/1"}}}}"#,
            body.len(),
            api.base
        );
        (StatusCode::CREATED, json).into_response()
    }

    async fn output() -> &'static str {
        "tiny"
    }

    async fn start_mock_api() -> MockApi {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api = MockApi {
            base: format!("http://{}", listener.local_addr().unwrap()),
            shrinks: Arc::new(AtomicUsize::new(0)),
        };
        let app = Router::new()
            .route("/shrink", post(shrink))
            .route("/output/{id}", get(output))
            .with_state(api.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        api
    }

    fn test_config(api: &MockApi, keys: &str) -> Config {
        Config {
            keys: KeysConfig {
                env: Some(Secret::new(keys.to_string())),
                ..KeysConfig::default()
            },
            sweep: SweepConfig {
                min_bytes: 100,
                max_dimension: 0,
                workers: 2,
                ledger_path: None,
            },
            tinify: TinifyConfig {
                endpoint: api.base.clone(),
                timeout_secs: 5,
            },
            metrics: MetricsConfig::default(),
        }
    }

    fn photo_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("album")).unwrap();
        for name in ["a.png", "b.jpg", "album/c.jpeg"] {
            std::fs::write(dir.path().join(name), vec![7u8; 500]).unwrap();
        }
        // Below min_bytes
        std::fs::write(dir.path().join("icon.png"), vec![7u8; 10]).unwrap();
        std::fs::write(dir.path().join("notes.txt"), vec![7u8; 500]).unwrap();
        dir
    }

    #[test]
    fn cli_parses_config_and_root() {
        let args = |v: &[&str]| CliArgs::parse(v.iter().map(|s| s.to_string())).unwrap();
        assert_eq!(
            args(&["--config", "/etc/tinysweep.toml", "/photos"]),
            CliArgs {
                config: Some("/etc/tinysweep.toml".into()),
                root: Some(PathBuf::from("/photos")),
            }
        );
        assert_eq!(
            args(&["/photos", "--config=x.toml"]),
            CliArgs {
                config: Some("x.toml".into()),
                root: Some(PathBuf::from("/photos")),
            }
        );
        assert_eq!(args(&[]), CliArgs::default());
    }

    #[test]
    fn cli_rejects_extra_and_incomplete_arguments() {
        let parse = |v: &[&str]| CliArgs::parse(v.iter().map(|s| s.to_string()));
        for bad in [
            &["/photos", "/other"][..],
            &["/photos", "--config"][..],
            &["--config=", "/photos"][..],
            &["--verbose", "/photos"][..],
        ] {
            match parse(bad) {
                Err(error::Error::UnexpectedArgument(_)) => {}
                other => panic!("{bad:?} should be rejected, got {other:?}"),
            }
        }
        assert!(matches!(
            parse(&["/photos", "/other"]),
            Err(error::Error::UnexpectedArgument(arg)) if arg == "/other"
        ));
    }

    #[test]
    fn missing_root_is_rejected() {
        assert!(matches!(resolve_root(None), Err(error::Error::MissingRoot)));
    }

    #[test]
    fn nonexistent_root_is_rejected() {
        let err = resolve_root(Some(Path::new("/nonexistent/photos"))).unwrap_err();
        assert!(matches!(err, error::Error::InvalidRoot { .. }));
    }

    #[test]
    fn file_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.png");
        std::fs::write(&file, b"x").unwrap();
        let err = resolve_root(Some(file.as_path())).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[tokio::test]
    async fn sweep_compresses_eligible_images_and_records_them() {
        let api = start_mock_api().await;
        let tree = photo_tree();
        let config = test_config(&api, "good-key");

        let summary = sweep(&config, tree.path()).await.unwrap();
        assert_eq!(summary.completed, 3);
        assert_eq!(summary.ineligible, 1);
        assert_eq!(summary.keys_remaining, 1);
        assert_eq!(summary.bytes_saved(), 3 * (500 - 4));
        assert_eq!(std::fs::read(tree.path().join("album/c.jpeg")).unwrap(), b"tiny");
        assert_eq!(std::fs::read(tree.path().join("icon.png")).unwrap().len(), 10);

        let ledger = Ledger::open(tree.path().join(config::DEFAULT_LEDGER_FILE))
            .await
            .unwrap();
        assert_eq!(
            ledger.completed_ids().await,
            vec!["a.png", "album/c.jpeg", "b.jpg"]
        );
    }

    #[tokio::test]
    async fn rerun_skips_recorded_images() {
        let api = start_mock_api().await;
        let tree = photo_tree();
        let config = test_config(&api, "good-key");

        sweep(&config, tree.path()).await.unwrap();
        let calls_after_first = api.shrinks.load(Ordering::SeqCst);

        let summary = sweep(&config, tree.path()).await.unwrap();
        assert_eq!(summary.already_completed, 3);
        assert_eq!(summary.completed, 0);
        assert_eq!(api.shrinks.load(Ordering::SeqCst), calls_after_first);
    }

    #[tokio::test]
    async fn spent_key_is_dropped_and_work_continues() {
        let api = start_mock_api().await;
        let tree = photo_tree();
        let config = test_config(&api, "spent-key,good-key");

        let summary = sweep(&config, tree.path()).await.unwrap();
        assert_eq!(summary.completed, 3);
        assert_eq!(summary.keys_discarded, 1);
        assert_eq!(summary.keys_remaining, 1);
    }

    #[tokio::test]
    async fn all_keys_spent_leaves_files_and_ledger_untouched() {
        let api = start_mock_api().await;
        let tree = photo_tree();
        let config = test_config(&api, "spent-1\nspent-2");

        let summary = sweep(&config, tree.path()).await.unwrap();
        assert_eq!(summary.completed, 0);
        assert_eq!(summary.abandoned, 3);
        assert!(summary.is_exhausted());
        assert_eq!(api.shrinks.load(Ordering::SeqCst), 2);
        assert_eq!(std::fs::read(tree.path().join("a.png")).unwrap(), vec![7u8; 500]);

        let ledger = Ledger::open(tree.path().join(config::DEFAULT_LEDGER_FILE))
            .await
            .unwrap();
        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn unusable_key_source_fails_before_dispatch() {
        let api = start_mock_api().await;
        let tree = photo_tree();
        let mut config = test_config(&api, "unused");
        config.keys = KeysConfig {
            file: Some(tree.path().join("missing-keys.txt")),
            ..KeysConfig::default()
        };

        assert!(sweep(&config, tree.path()).await.is_err());
        assert_eq!(api.shrinks.load(Ordering::SeqCst), 0);
        assert!(!tree.path().join(config::DEFAULT_LEDGER_FILE).exists());
    }
}
