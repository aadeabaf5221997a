//! Configuration changes and reporting for ticket administrators.

use crate::TicketCore;
use tracing::{info, instrument};
use vigil_core::{ActiveTicket, ClosedTicket, TicketConfig, TicketStats};
use vigil_error::TicketResult;
use vigil_storage::{ExportFormat, export_closed_tickets};

/// Tickets bearing a tag.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TagSearch {
    /// Open tickets, oldest first
    pub active: Vec<ActiveTicket>,
    /// Closed tickets, most recently closed first
    pub closed: Vec<ClosedTicket>,
}

impl TagSearch {
    /// Total matches.
    pub fn len(&self) -> usize {
        self.active.len() + self.closed.len()
    }

    /// No matches.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TicketCore {
    /// Change guild settings under the guild lock.
    ///
    /// Nothing changes if `f` fails or the write fails.
    #[instrument(skip(self, f))]
    pub async fn update_settings<R>(
        &self,
        guild_id: u64,
        f: impl FnOnce(&mut TicketConfig) -> TicketResult<R>,
    ) -> TicketResult<R> {
        let handle = self.store().guild(guild_id).await?;
        let mut guild = handle.lock().await;
        let value = self.commit(&mut guild, f).await?;
        info!("Ticket settings updated");
        Ok(value)
    }

    /// Counters and averages for a guild.
    pub async fn stats(&self, guild_id: u64) -> TicketResult<TicketStats> {
        Ok(self.config(guild_id).await?.stats)
    }

    /// Closed tickets as JSON or CSV, oldest close first.
    #[instrument(skip(self))]
    pub async fn export_closed(&self, guild_id: u64, format: ExportFormat) -> TicketResult<Vec<u8>> {
        let config = self.config(guild_id).await?;
        let mut closed: Vec<ClosedTicket> = config.closed_tickets.into_values().collect();
        closed.sort_by_key(|t| t.closed_at);
        Ok(export_closed_tickets(&closed, format)?)
    }

    /// Open and closed tickets carrying `tag`.
    pub async fn search_by_tag(&self, guild_id: u64, tag: &str) -> TicketResult<TagSearch> {
        let tag = tag.trim().to_lowercase();
        let config = self.config(guild_id).await?;
        let mut active: Vec<ActiveTicket> = config
            .active_tickets
            .into_values()
            .filter(|t| t.tags.contains(&tag))
            .collect();
        active.sort_by_key(|t| t.number);
        let mut closed: Vec<ClosedTicket> = config
            .closed_tickets
            .into_values()
            .filter(|t| t.ticket.tags.contains(&tag))
            .collect();
        closed.sort_by(|a, b| b.closed_at.cmp(&a.closed_at));
        Ok(TagSearch { active, closed })
    }
}
