//! Failure classification for Tinify API responses
//!
//! Tinify reports a spent monthly allowance either as 429 or as an error body
//! naming `TooManyRequests`; both mean the key is done for the month. Invalid
//! keys come back as 401. Rejected uploads (corrupt or unsupported files) are
//! 400/415 and say nothing about the key.

use transform::FailureKind;

/// Error body phrases that mean the key's allowance is used up.
const QUOTA_PATTERNS: &[&str] = &[
    "toomanyrequests",
    "monthly limit",
    "limit has been exceeded",
];

/// Error body phrases that mean the key itself is bad.
const REJECTED_PATTERNS: &[&str] = &["unauthorized", "credentials are invalid"];

/// Classify a non-success API response by status code and body.
pub fn classify_status(status: u16, body: &str) -> FailureKind {
    let lower = body.to_lowercase();
    if QUOTA_PATTERNS.iter().any(|p| lower.contains(p)) {
        return FailureKind::QuotaExceeded;
    }
    match status {
        429 => FailureKind::QuotaExceeded,
        401 | 403 => FailureKind::Rejected,
        _ if REJECTED_PATTERNS.iter().any(|p| lower.contains(p)) => FailureKind::Rejected,
        400 | 413 | 415 => FailureKind::Input,
        _ => FailureKind::Transient,
    }
}
