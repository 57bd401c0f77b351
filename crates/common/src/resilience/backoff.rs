//! Exponential backoff calculation

use std::time::Duration;

use rand::Rng;

/// Jitter applied on top of the exponential delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Jitter {
    /// Deterministic delays
    #[default]
    None,
    /// Uniform in `[0, delay]`
    Full,
    /// Uniform in `[delay / 2, delay]`
    Equal,
}

impl Jitter {
    /// Apply jitter to the calculated delay
    pub fn apply(self, delay: Duration) -> Duration {
        let millis = delay.as_millis() as u64;
        match self {
            Self::None => delay,
            Self::Full if millis == 0 => delay,
            Self::Full => Duration::from_millis(rand::thread_rng().gen_range(0..=millis)),
            Self::Equal => {
                let half = millis / 2;
                Duration::from_millis(half + rand::thread_rng().gen_range(0..=millis - half))
            }
        }
    }
}

/// Exponential backoff: `initial * 2^(retry - 1)`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    jitter: Jitter,
}

impl Backoff {
    /// Exponential backoff without jitter.
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self { initial, max: max.max(initial), jitter: Jitter::None }
    }

    /// Replace the jitter strategy.
    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retry number `retry` (1-based). Retry 0 has no delay.
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let shift = retry.saturating_sub(1).min(16);
        let raw = self.initial.saturating_mul(1u32 << shift);
        self.jitter.apply(raw.min(self.max))
    }

    /// Upper bound for any delay produced by this backoff.
    pub fn max_delay(&self) -> Duration {
        self.max
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::exponential(Duration::from_millis(200), Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_until_capped() {
        let backoff = Backoff::exponential(Duration::from_millis(100), Duration::from_millis(500));

        assert_eq!(backoff.delay_for(0), Duration::ZERO);
        assert_eq!(backoff.delay_for(1), Duration::from_millis(100));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(200));
        assert_eq!(backoff.delay_for(3), Duration::from_millis(400));
        assert_eq!(backoff.delay_for(4), Duration::from_millis(500));
        assert_eq!(backoff.delay_for(40), Duration::from_millis(500));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let backoff = Backoff::exponential(Duration::from_millis(100), Duration::from_secs(10))
            .with_jitter(Jitter::Equal);

        for _ in 0..50 {
            let delay = backoff.delay_for(3);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(400));
        }

        let full = backoff.with_jitter(Jitter::Full);
        for _ in 0..50 {
            assert!(full.delay_for(2) <= Duration::from_millis(200));
        }
    }

    #[test]
    fn max_is_never_below_initial() {
        let backoff = Backoff::exponential(Duration::from_secs(2), Duration::from_secs(1));
        assert_eq!(backoff.max_delay(), Duration::from_secs(2));
    }
}
