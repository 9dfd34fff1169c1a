//! Jitter policy for recovery delays.
//!
//! [`JitterPolicy`] randomizes backoff delays so that many services whose
//! checks fail at the same moment (a shared upstream outage) do not schedule
//! their recovery attempts in lockstep.
//!
//! - [`JitterPolicy::None`]: exact delays, predictable (default; keeps the
//!   backoff schedule deterministic for operators and tests)
//! - [`JitterPolicy::Full`]: random delay in `[0, delay]`
//! - [`JitterPolicy::Equal`]: `delay/2 + random[0, delay/2]`

use rand::Rng;
use std::time::Duration;

/// Randomization applied to a computed backoff delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Use the exact computed delay.
    None,
    /// Random delay in `[0, delay]`; most aggressive spreading.
    Full,
    /// `delay/2 + random[0, delay/2]`; preserves most of the schedule while
    /// still de-correlating services.
    Equal,
}

impl Default for JitterPolicy {
    fn default() -> Self {
        JitterPolicy::None
    }
}

impl JitterPolicy {
    /// Applies this policy to `delay`.
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => {
                if delay.is_zero() {
                    return delay;
                }
                let nanos = delay.as_nanos().min(u128::from(u64::MAX)) as u64;
                Duration::from_nanos(rand::thread_rng().gen_range(0..=nanos))
            }
            JitterPolicy::Equal => {
                if delay.is_zero() {
                    return delay;
                }
                let half = delay / 2;
                let nanos = half.as_nanos().min(u128::from(u64::MAX)) as u64;
                half + Duration::from_nanos(rand::thread_rng().gen_range(0..=nanos))
            }
        }
    }
}
