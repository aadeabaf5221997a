//! Periodic auto-close of idle tickets.

use crate::{CloseActor, TicketCore};
use derive_getters::Getters;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use vigil_error::TicketErrorKind;

/// Time between sweeps.
pub const REAPER_INTERVAL: Duration = Duration::from_secs(3600);

/// Close reason recorded on reaped tickets.
pub const INACTIVITY_REASON: &str = "Inactivity";

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Getters)]
pub struct SweepReport {
    /// Open tickets looked at
    examined: usize,
    /// Tickets closed for inactivity
    closed: usize,
    /// Tickets that saw activity before their close started
    skipped: usize,
    /// Closes that failed
    failed: usize,
}

/// Closes tickets idle longer than their guild's `auto_close_hours`.
#[derive(Debug, Clone)]
pub struct Reaper {
    core: Arc<TicketCore>,
    interval: Duration,
}

impl Reaper {
    /// Reaper sweeping every [`REAPER_INTERVAL`].
    pub fn new(core: Arc<TicketCore>) -> Self {
        Self {
            core,
            interval: REAPER_INTERVAL,
        }
    }

    /// Override the sweep interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run one pass over every loaded guild.
    ///
    /// A failed close is logged and counted; the sweep carries on. Each
    /// close re-checks idleness, so a ticket that saw activity after the
    /// snapshot is skipped rather than closed.
    #[instrument(skip(self))]
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        if !self.core.enabled() {
            return report;
        }
        let now = self.core.clock().now();

        for guild_id in self.core.store().loaded_guilds().await {
            let Some(handle) = self.core.store().loaded(guild_id).await else {
                continue;
            };
            let idle: Vec<String> = {
                let guild = handle.lock().await;
                let hours = guild.ticket.auto_close_hours;
                if !guild.ticket.enabled || hours == 0 {
                    continue;
                }
                report.examined += guild.ticket.active_tickets.len();
                guild
                    .ticket
                    .active_tickets
                    .values()
                    .filter(|t| t.idle_hours(now) >= hours as f64)
                    .map(|t| t.id.clone())
                    .collect()
            };

            for ticket_id in idle {
                match self
                    .core
                    .close_ticket(
                        guild_id,
                        &ticket_id,
                        CloseActor::Auto,
                        Some(INACTIVITY_REASON.to_string()),
                    )
                    .await
                {
                    Ok(closed) => {
                        debug!(guild_id, number = closed.ticket.number, "Idle ticket closed");
                        report.closed += 1;
                    }
                    Err(e) if matches!(e.kind, TicketErrorKind::NotIdle { .. }) => {
                        debug!(guild_id, ticket_id = %ticket_id, "Ticket active again, kept open");
                        report.skipped += 1;
                    }
                    Err(e) => {
                        warn!(guild_id, ticket_id = %ticket_id, error = %e, "Auto-close failed");
                        report.failed += 1;
                    }
                }
            }
        }

        if report.closed > 0 || report.failed > 0 {
            info!(
                closed = report.closed,
                failed = report.failed,
                skipped = report.skipped,
                "Inactivity sweep finished"
            );
        }
        report
    }

    /// Sweep on a timer until the task is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = tokio::time::interval(self.interval);
            // First tick fires immediately; skip it so startup is quiet.
            timer.tick().await;
            loop {
                timer.tick().await;
                self.sweep().await;
            }
        })
    }
}
