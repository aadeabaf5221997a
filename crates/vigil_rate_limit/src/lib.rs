//! Rate limiting for Vigil.
//!
//! - [`SlidingWindowLimiter`]: per-user scan windows
//! - [`CooldownTracker`]: per-user ticket creation cooldowns
//! - [`ApiThrottle`]: governor-backed pacing of verdict service calls

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod cooldown;
mod throttle;
mod window;

pub use cooldown::CooldownTracker;
pub use throttle::ApiThrottle;
pub use window::{RateLimitExceeded, SlidingWindowLimiter};
