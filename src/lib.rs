pub mod bundle;
pub mod canonical;
pub mod config;
pub mod constitution;
pub mod crypto;
pub mod dbl;
pub mod envelope;
pub mod error;
pub mod logger;
pub mod report;
pub mod signer;
pub mod transcript;

/// Get current Unix timestamp in milliseconds
pub fn current_timestamp_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
