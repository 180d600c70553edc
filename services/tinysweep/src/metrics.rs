//! Prometheus metrics output
//!
//! The engine records through the `metrics` facade (see `engine::telemetry`).
//! This module installs the Prometheus recorder that collects them and writes
//! the rendered text to a node-exporter textfile at the end of a run.

use std::path::Path;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Bucket boundaries for per-call transform duration, 50ms to 2min.
/// Uploads of large images to a remote API dominate this range.
const TRANSFORM_BUCKETS: &[f64] = &[
    0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0,
];

fn builder() -> Result<PrometheusBuilder> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(engine::telemetry::TRANSFORM_DURATION.to_string()),
            TRANSFORM_BUCKETS,
        )
        .context("failed to set histogram buckets")
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// The duration histogram gets explicit buckets so it renders with `_bucket`
/// lines rather than as a summary.
pub fn install_recorder() -> Result<PrometheusHandle> {
    builder()?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Render current metrics into `path`, replacing it atomically.
///
/// node-exporter may read the file at any moment, so it must never see a
/// partial write.
pub fn write_textfile(handle: &PrometheusHandle, path: &Path) -> Result<()> {
    common::fs::write_atomic(path, handle.render().as_bytes(), None)
        .with_context(|| format!("writing metrics textfile {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;

    /// Isolated recorder/handle pair; only one global recorder can exist per
    /// process.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = builder().unwrap().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn duration_histogram_renders_configured_buckets() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        engine::telemetry::record_attempt("success", 0.03);

        let output = handle.render();
        assert!(output.contains("sweep_transform_duration_seconds_bucket"));
        assert!(output.contains("le=\"0.05\""), "50ms bucket must exist");
        assert!(output.contains("le=\"120\""), "2min bucket must exist");
        assert!(output.contains("le=\"+Inf\""));
    }

    #[test]
    fn textfile_contains_rendered_metrics() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        engine::telemetry::record_item("completed");
        engine::telemetry::record_key_discarded();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tinysweep.prom");
        write_textfile(&handle, &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("sweep_items_total{outcome=\"completed\"} 1"));
        assert!(contents.contains("sweep_keys_discarded_total 1"));

        // No temp file left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn textfile_in_missing_directory_fails() {
        let (_recorder, handle) = isolated_recorder();
        let err = write_textfile(&handle, Path::new("/nonexistent/dir/tinysweep.prom"));
        assert!(err.is_err());
    }
}
