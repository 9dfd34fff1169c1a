//! Backoff policy for recovery attempts.
//!
//! [`BackoffPolicy`] controls how the delay between recovery attempts grows
//! after repeated failures. The delay for attempt index `n` (0-based) is
//! `first × factor^n`, clamped to `max`, with jitter applied last. The base
//! is derived purely from the attempt index, so jitter never feeds back into
//! later delays.
//!
//! The recovery coordinator passes `attempt - 1` for 1-based attempt
//! numbers, producing the `base × 2^(attempt-1)` schedule.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use healvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_secs(2),
//!     max: Duration::from_secs(300),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_secs(2));
//! assert_eq!(backoff.next(1), Duration::from_secs(4));
//! assert_eq!(backoff.next(2), Duration::from_secs(8));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Delay schedule between recovery attempts.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay after the first failed attempt.
    pub first: Duration,
    /// Cap for every computed delay.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` expected).
    pub factor: f64,
    /// Randomization applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 2s`, `factor = 2.0`, `max = 300s`, no jitter: the doubling
    /// schedule 2s, 4s, 8s, ...
    fn default() -> Self {
        Self {
            first: Duration::from_secs(2),
            max: Duration::from_secs(300),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given attempt index (0-based).
    ///
    /// Overflowing or non-finite intermediate values clamp to `max`.
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = attempt.min(i32::MAX as u32) as i32;
        let raw_secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !raw_secs.is_finite() || raw_secs < 0.0 || raw_secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(raw_secs)
        };

        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doubling(first_ms: u64, max: Duration) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(first_ms),
            max,
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn attempt_zero_returns_first() {
        let policy = doubling(100, Duration::from_secs(30));
        assert_eq!(policy.next(0), Duration::from_millis(100));
    }

    #[test]
    fn doubles_per_attempt_and_is_strictly_increasing() {
        let policy = doubling(100, Duration::from_secs(30));
        let mut prev = Duration::ZERO;
        for (i, want_ms) in [100u64, 200, 400, 800, 1600].into_iter().enumerate() {
            let d = policy.next(i as u32);
            assert_eq!(d, Duration::from_millis(want_ms));
            assert!(d > prev);
            prev = d;
        }
    }

    #[test]
    fn clamps_to_max() {
        let policy = doubling(100, Duration::from_secs(1));
        assert_eq!(policy.next(10), Duration::from_secs(1));
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn first_exceeding_max_clamps() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(10),
            max: Duration::from_secs(5),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(0), Duration::from_secs(5));
    }

    #[test]
    fn constant_factor_keeps_delay_flat() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(500),
            max: Duration::from_secs(30),
            factor: 1.0,
            jitter: JitterPolicy::None,
        };
        for attempt in 0..8 {
            assert_eq!(policy.next(attempt), Duration::from_millis(500));
        }
    }

    #[test]
    fn full_jitter_never_exceeds_base() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(1000),
            max: Duration::from_secs(30),
            factor: 1.0,
            jitter: JitterPolicy::Full,
        };
        for attempt in 0..50 {
            assert!(policy.next(attempt) <= Duration::from_millis(1000));
        }
    }
}
