//! Administrator commands and chat platform integration for Vigil.
//!
//! The ticket and scan cores only see the platform through
//! [`ChatPlatform`](vigil_interface::ChatPlatform). This crate supplies the
//! pieces that sit on the outside of that seam:
//!
//! - [`AdminCommands`] parses `!ticket ...` and `!scan ...` text commands
//!   (and the matching slash commands) and applies them to the cores.
//! - `discord` (requires the `discord` feature) implements
//!   `ChatPlatform` on serenity and routes gateway events to the
//!   interaction routers and the command router.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod commands;

#[cfg(feature = "discord")]
mod discord;

pub use commands::{
    AdminCommands, Args, CommandContext, CommandReply, DEFAULT_PREFIX, Invocation, Subsystem,
    parse_id_list, parse_invocation, parse_snowflake, parse_switch, tokenize,
};

#[cfg(feature = "discord")]
pub use discord::{SerenityPlatform, VigilHandler, intents};
