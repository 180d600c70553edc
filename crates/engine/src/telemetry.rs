//! Metric recording for sweep runs
//!
//! Emits through the `metrics` facade; whichever recorder the binary installs
//! (Prometheus in `tinysweep`) receives them. Without a recorder these calls
//! are no-ops.
//!
//! - `sweep_items_total` (counter): label `outcome`
//! - `sweep_attempts_total` (counter): label `result`
//! - `sweep_keys_discarded_total` (counter)
//! - `sweep_transform_duration_seconds` (histogram): label `result`

/// Histogram name, exported so the binary can configure its buckets.
pub const TRANSFORM_DURATION: &str = "sweep_transform_duration_seconds";

/// Record an item reaching a terminal state.
pub fn record_item(outcome: &str) {
    metrics::counter!("sweep_items_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record one transform call and how long it took.
pub fn record_attempt(result: &str, duration_secs: f64) {
    metrics::counter!("sweep_attempts_total", "result" => result.to_string()).increment(1);
    metrics::histogram!(TRANSFORM_DURATION, "result" => result.to_string()).record(duration_secs);
}

/// Record a key leaving the pool for good.
pub fn record_key_discarded() {
    metrics::counter!("sweep_keys_discarded_total").increment(1);
}
