//! Exponential backoff schedule

use podium_core::RetryConfig;
use std::time::Duration;

/// Capped exponential backoff: `delay(n) = min(base * 2^n, max)`.
///
/// `n` is the 0-based index of the attempt that just failed, so the sleep
/// before the second attempt is `base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.base_delay(), config.max_delay())
    }

    /// Delay to wait after the given failed attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .unwrap_or(self.max)
            .min(self.max)
    }

    /// The first `count` delays of the schedule.
    pub fn schedule(&self, count: u32) -> Vec<Duration> {
        (0..count).map(|attempt| self.delay(attempt)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_schedule_doubles_then_caps() {
        let backoff = Backoff::new(Duration::from_secs(2), Duration::from_secs(60));
        let secs: Vec<u64> = backoff.schedule(8).iter().map(Duration::as_secs).collect();
        assert_eq!(secs, vec![2, 4, 8, 16, 32, 60, 60, 60]);
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(30));
        assert_eq!(backoff.delay(200), Duration::from_secs(30));
    }

    #[test]
    fn test_from_config() {
        let backoff = Backoff::from_config(&RetryConfig {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 250,
        });
        assert_eq!(
            backoff.schedule(3),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(250)
            ]
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Delays never decrease and never exceed the cap.
        #[test]
        fn prop_schedule_monotone_and_capped(
            base_ms in 1u64..5_000,
            extra_ms in 0u64..120_000,
            attempts in 1u32..40,
        ) {
            let max = Duration::from_millis(base_ms + extra_ms);
            let backoff = Backoff::new(Duration::from_millis(base_ms), max);
            let schedule = backoff.schedule(attempts);
            for pair in schedule.windows(2) {
                prop_assert!(pair[0] <= pair[1]);
            }
            for delay in &schedule {
                prop_assert!(*delay <= max);
            }
        }
    }
}
