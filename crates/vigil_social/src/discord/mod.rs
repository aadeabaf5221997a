//! Discord adapter.
//!
//! [`SerenityPlatform`] implements the chat platform trait over serenity's
//! HTTP client and [`VigilHandler`] turns gateway events into the
//! platform-neutral events the routers consume.

mod convert;
mod handler;
mod platform;

pub use handler::{VigilHandler, intents};
pub use platform::SerenityPlatform;
