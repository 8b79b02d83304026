/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Returns the current Unix timestamp in seconds.
pub fn current_unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Returns true when strictly more than `threshold_ms` has passed since
/// `last_activity_unix_ms`. A record sitting exactly on its deadline is not
/// yet expired.
pub fn is_past_activity_deadline(last_activity_unix_ms: u64, threshold_ms: u64, now_ms: u64) -> bool {
    now_ms > last_activity_unix_ms.saturating_add(threshold_ms)
}
