use std::time::Duration;

/// Delay to wait after failed attempt `attempt` before trying again.
///
/// The schedule is `base * 2^attempt` with `attempt` zero-indexed, so with a
/// one second base the waits after the first, second and third failures are
/// 1s, 2s and 4s.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use harbor_fetch::core::retry_delay;
///
/// let base = Duration::from_secs(1);
/// assert_eq!(retry_delay(0, base), Duration::from_secs(1));
/// assert_eq!(retry_delay(1, base), Duration::from_secs(2));
/// assert_eq!(retry_delay(2, base), Duration::from_secs(4));
/// ```
pub fn retry_delay(attempt: u32, base: Duration) -> Duration {
    // Saturate instead of overflowing for absurd retry ceilings.
    let multiplier = 2_u32.saturating_pow(attempt);
    base.saturating_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubles_per_attempt() {
        let base = Duration::from_millis(250);
        let delays: Vec<Duration> = (0..5).map(|i| retry_delay(i, base)).collect();

        assert_eq!(delays[0], base);
        for pair in delays.windows(2) {
            assert_eq!(pair[1], pair[0] * 2);
        }
    }

    #[test]
    fn test_zero_base_never_waits() {
        assert_eq!(retry_delay(0, Duration::ZERO), Duration::ZERO);
        assert_eq!(retry_delay(12, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_saturates_instead_of_panicking() {
        let delay = retry_delay(64, Duration::from_secs(u64::MAX / 2));
        assert_eq!(delay, Duration::MAX);
    }
}
