//! Rate limiting middleware.

use axum::{extract::Request, middleware::Next, response::Response};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

use super::error::ApiError;

/// Shared rate limiter type.
pub type SharedRateLimiter = Arc<DefaultDirectRateLimiter>;

/// Fallback quota when the configured one is zero.
const FALLBACK_RPM: NonZeroU32 = NonZeroU32::MIN.saturating_add(59);

/// Create a process-wide rate limiter with the given per-minute quota.
#[must_use]
pub fn create_rate_limiter(requests_per_minute: u32) -> SharedRateLimiter {
    let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(FALLBACK_RPM);
    Arc::new(RateLimiter::direct(Quota::per_minute(rpm)))
}

/// Rate limiting middleware.
///
/// # Errors
///
/// Returns [`ApiError::RateLimitExceeded`] once the quota is spent.
pub async fn rate_limit(
    limiter: SharedRateLimiter,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match limiter.check() {
        Ok(()) => Ok(next.run(request).await),
        Err(_) => Err(ApiError::RateLimitExceeded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_is_enforced() {
        let limiter = create_rate_limiter(2);
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }

    #[test]
    fn test_zero_rpm_falls_back() {
        assert_eq!(FALLBACK_RPM.get(), 60);
        let limiter = create_rate_limiter(0);
        assert!(limiter.check().is_ok());
    }
}
