use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter configuration for outbound API calls
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum requests per minute
    pub requests_per_minute: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 100,
        }
    }
}

/// Limiter shared by every request a client makes
pub type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Create a new rate limiter. A zero rate is clamped to one request per minute.
pub fn create_rate_limiter(config: &RateLimiterConfig) -> SharedRateLimiter {
    let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)))
}
