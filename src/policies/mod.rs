//! Recovery scheduling policies: exponential [`BackoffPolicy`] and the
//! [`JitterPolicy`] randomization applied on top of it.

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
