use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

/// Process-wide gate on outbound profile calls.
///
/// Unlike the API middleware, which rejects excess requests, the gate makes
/// callers wait until a slot frees up. The bucket holds a single cell, so
/// calls are spaced `1/calls` seconds apart with no initial burst. Clones
/// share one bucket.
#[derive(Clone)]
pub struct RateGate {
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl RateGate {
    /// Allow `calls` per second. Zero is treated as one.
    #[must_use]
    pub fn per_second(calls: u32) -> Self {
        let calls = NonZeroU32::new(calls).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(calls).allow_burst(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Wait for a slot.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_first_call_does_not_wait() {
        let gate = RateGate::per_second(10);
        let started = Instant::now();
        gate.wait().await;
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_back_to_back_calls_are_spaced() {
        let gate = RateGate::per_second(10);
        gate.wait().await;

        let started = Instant::now();
        gate.wait().await;
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_no_burst_up_to_the_quota() {
        let gate = RateGate::per_second(5);
        let started = Instant::now();
        for _ in 0..5 {
            gate.wait().await;
        }
        // Four gaps of 200ms after the free first call.
        assert!(started.elapsed() >= Duration::from_millis(700));
    }

    #[tokio::test]
    async fn test_clones_share_the_bucket() {
        let gate = RateGate::per_second(2);
        let other = gate.clone();
        gate.wait().await;

        let started = Instant::now();
        other.wait().await;
        assert!(started.elapsed() >= Duration::from_millis(400));
    }
}
