//! Per-engine request-rate gate.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;
use std::time::Duration;

type DirectLimiter = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token-interval gate bounding outbound request frequency.
///
/// One instance is owned per engine, so engines never throttle each other.
/// `acquire` blocks the calling task until at least `1/rate` seconds have
/// elapsed since the previous grant on the same instance; a rate of zero
/// never blocks.
#[derive(Debug)]
pub struct RateLimiter {
    inner: Option<DirectLimiter>,
}

impl RateLimiter {
    /// Create a limiter for `per_second` requests per second (0 = unlimited)
    pub fn new(per_second: f32) -> Self {
        if per_second <= 0.0 {
            return Self { inner: None };
        }

        // Clamp absurdly high rates to a 1ms interval; a zero period would
        // make the quota unrepresentable.
        let period =
            Duration::from_secs_f64(1.0 / f64::from(per_second)).max(Duration::from_millis(1));
        match Quota::with_period(period) {
            Some(quota) => Self {
                inner: Some(governor::RateLimiter::direct(quota)),
            },
            None => Self { inner: None },
        }
    }

    /// Unlimited limiter that never blocks
    pub fn unlimited() -> Self {
        Self { inner: None }
    }

    /// Wait until the next request is allowed
    pub async fn acquire(&self) {
        if let Some(limiter) = &self.inner {
            limiter.until_ready().await;
        }
    }
}
