//! Host real clock.

use chrono::Utc;

/// Milliseconds since the Unix epoch according to the host clock.
///
/// Pre-epoch host clocks clamp to zero.
pub fn real_now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(real_now_ms() > 1_577_836_800_000);
    }

    #[test]
    fn real_clock_does_not_go_backwards_between_reads() {
        let a = real_now_ms();
        let b = real_now_ms();
        assert!(b >= a);
    }
}
