//! Per-guild persisted configuration.

use crate::TicketConfig;
use serde::{Deserialize, Serialize};

/// Everything persisted for one guild in `tickets/<guild_id>.json`.
///
/// Top-level keys this version does not know are kept in `extra` and written
/// back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildConfig {
    /// Owning guild
    #[serde(default)]
    pub guild_id: u64,
    /// Ticket settings and records
    #[serde(default)]
    pub ticket: TicketConfig,
    /// Unrecognized fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GuildConfig {
    /// Default configuration for `guild_id`.
    pub fn new(guild_id: u64) -> Self {
        Self {
            guild_id,
            ticket: TicketConfig::default(),
            extra: serde_json::Map::new(),
        }
    }
}
