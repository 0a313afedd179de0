use chrono::Local;
use std::time::{SystemTime, UNIX_EPOCH};

/// Local calendar date (`YYYY-MM-DD`) used as the per-day bucket identifier.
pub fn today_str() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Milliseconds since the Unix epoch, or 0 if the system clock reports a
/// pre-epoch time.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
