//! Nanosecond timestamps

use chrono::Utc;

/// Nanoseconds since the Unix epoch
pub type Timestamp = i64;

/// Current wall-clock time in nanoseconds.
///
/// Saturates at `i64::MAX` past the year 2262.
pub fn now_nanos() -> Timestamp {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_after_2024() {
        // 2024-01-01T00:00:00Z
        assert!(now_nanos() > 1_704_067_200_000_000_000);
    }
}
