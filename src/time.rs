//! Time utilities.
//!
//! All persisted timestamps are Unix milliseconds so that `date_modified`
//! ordering has enough resolution for history eviction.

/// Returns the current Unix timestamp in seconds.
pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Returns the current Unix timestamp in milliseconds.
pub fn now_timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_are_current_era() {
        // A clock stuck at the epoch (or running in the far future) would
        // silently break history ordering, so sanity-bound it
        let ts = now_timestamp();
        assert!(ts > 1_735_689_600, "clock reads before 2025: {ts}");
        assert!(ts < 4_102_444_800, "clock reads after 2100: {ts}");
    }

    #[test]
    fn test_units_agree() {
        let seconds = now_timestamp();
        let millis = now_timestamp_millis();
        assert!((millis / 1000 - seconds).abs() <= 1);
    }
}
