//! Job-level retry delay schedule.
//!
//! When a collection run fails with a transient error, the job is
//! re-delivered after an exponential delay with jitter, governed by the
//! worker's [`BackoffPolicy`]. This is deliberately separate from the API
//! client's per-call retry: a whole run is re-delivered here, minutes apart,
//! while the client retries one HTTP call, seconds apart.

use crate::config::BackoffPolicy;
use rand::Rng;
use std::time::Duration;

/// Delay before re-delivering a job that has failed `attempt` times
///
/// `attempt` is 1-based: after the first failed attempt the delay is
/// `base_delay`, doubling (by `multiplier`) per further failure, capped at
/// `max_delay`. With jitter enabled the result is scaled by a random factor
/// in 0.5..=1.5 (and re-capped) so re-deliveries spread out.
pub(crate) fn delay_for_attempt(policy: &BackoffPolicy, attempt: u32) -> Duration {
    // powi on a small clamped exponent; 30 doublings already overshoot any max_delay
    let exponent = attempt.saturating_sub(1).min(30) as i32;
    let raw = policy.base_delay.as_secs_f64() * policy.multiplier.powi(exponent);
    let capped = Duration::from_secs_f64(raw.max(0.0)).min(policy.max_delay);

    if policy.jitter {
        let factor: f64 = rand::thread_rng().gen_range(0.5..=1.5);
        Duration::from_secs_f64(capped.as_secs_f64() * factor).min(policy.max_delay)
    } else {
        capped
    }
}
