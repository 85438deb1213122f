use chrono::Utc;

/// Current unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
    Utc::now().timestamp() as u64
}
