//! Outbound request pacing using governor.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

type DirectRateLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Paces calls to an external API under a per-minute quota.
///
/// The public verdict service tier allows four requests a minute; uploads
/// and polls share the budget.
///
/// # Example
///
/// ```rust,ignore
/// let throttle = ApiThrottle::per_minute(4).expect("non-zero quota");
/// throttle.acquire().await;
/// // make the request
/// ```
#[derive(Debug, Clone)]
pub struct ApiThrottle {
    limiter: Arc<DirectRateLimiter>,
    per_minute: u32,
}

impl ApiThrottle {
    /// Throttle allowing `per_minute` calls a minute. Returns `None` for zero,
    /// which callers treat as unthrottled.
    pub fn per_minute(per_minute: u32) -> Option<Self> {
        NonZeroU32::new(per_minute).map(|n| Self {
            limiter: Arc::new(GovernorRateLimiter::direct(Quota::per_minute(n))),
            per_minute,
        })
    }

    /// Configured quota.
    pub fn quota(&self) -> u32 {
        self.per_minute
    }

    /// Wait until the quota admits one more call.
    pub async fn acquire(&self) {
        if self.limiter.check().is_err() {
            debug!(per_minute = self.per_minute, "Waiting for API quota");
            self.limiter.until_ready().await;
        }
    }
}
