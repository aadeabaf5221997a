//! Wiring of stores, cores and routers.

use crate::VigilConfig;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, instrument};
use vigil_core::{Clock, SystemClock};
use vigil_error::VigilResult;
use vigil_interface::{ChatPlatform, VerdictService};
use vigil_scan::{ScanCore, ScanInteractions, VirusTotalClient};
use vigil_social::AdminCommands;
use vigil_storage::{ConfigStore, HistoryLog, ScanConfigStore};
use vigil_ticket::{Reaper, TicketCore, TicketInteractions};

struct Stores {
    tickets: Arc<ConfigStore>,
    scan_config: Arc<ScanConfigStore>,
    history: Arc<HistoryLog>,
}

impl Stores {
    async fn open(config: &VigilConfig) -> VigilResult<Self> {
        let root = config.data_dir();
        let tickets = Arc::new(ConfigStore::new(root));
        let loaded = tickets.load_all().await;
        info!(guilds = loaded.len(), "Ticket configs loaded");
        let scan_config = Arc::new(ScanConfigStore::open(root).await?);
        let history = Arc::new(HistoryLog::open(root).await?);
        Ok(Self {
            tickets,
            scan_config,
            history,
        })
    }
}

/// Everything the event handler and background tasks need.
#[derive(Clone)]
pub struct Services {
    tickets: Arc<TicketCore>,
    scans: Arc<ScanCore>,
    commands: AdminCommands,
    config: VigilConfig,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Services {
    /// Open the stores under the data directory and build both cores
    /// against the VirusTotal API.
    ///
    /// # Errors
    ///
    /// Returns error if a store cannot be read or the HTTP client cannot be
    /// built.
    #[instrument(skip_all, fields(data_dir = %config.data_dir().display()))]
    pub async fn build(config: VigilConfig, platform: Arc<dyn ChatPlatform>) -> VigilResult<Self> {
        let stores = Stores::open(&config).await?;
        let api_base = match config.scan().api_base() {
            Some(base) => base.clone(),
            None => stores.scan_config.snapshot().await.api_base,
        };
        let verdicts = VirusTotalClient::new(&api_base, *config.scan().requests_per_minute())?;
        info!(api_base = %api_base, "Verdict service ready");
        Ok(Self::assemble(
            config,
            platform,
            Arc::new(verdicts),
            stores,
            Arc::new(SystemClock),
        ))
    }

    /// Like [`Services::build`] with a caller-supplied verdict service and
    /// clock.
    ///
    /// # Errors
    ///
    /// Returns error if a store cannot be read.
    pub async fn build_with(
        config: VigilConfig,
        platform: Arc<dyn ChatPlatform>,
        verdicts: Arc<dyn VerdictService>,
        clock: Arc<dyn Clock>,
    ) -> VigilResult<Self> {
        let stores = Stores::open(&config).await?;
        Ok(Self::assemble(config, platform, verdicts, stores, clock))
    }

    fn assemble(
        config: VigilConfig,
        platform: Arc<dyn ChatPlatform>,
        verdicts: Arc<dyn VerdictService>,
        stores: Stores,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tickets = Arc::new(
            TicketCore::new(Arc::clone(&platform), stores.tickets, Arc::clone(&clock))
                .with_enabled(*config.tickets().enabled()),
        );
        let scans = Arc::new(
            ScanCore::new(
                platform,
                verdicts,
                stores.scan_config,
                stores.history,
                clock,
            )
            .with_enabled(*config.scan().enabled()),
        );
        let commands = AdminCommands::new(config.prefix().clone())
            .with_tickets(Arc::clone(&tickets))
            .with_scans(Arc::clone(&scans));
        Self {
            tickets,
            scans,
            commands,
            config,
        }
    }

    /// Ticket core.
    pub fn tickets(&self) -> &Arc<TicketCore> {
        &self.tickets
    }

    /// Scan core.
    pub fn scans(&self) -> &Arc<ScanCore> {
        &self.scans
    }

    /// Administrator command router.
    pub fn commands(&self) -> &AdminCommands {
        &self.commands
    }

    /// Ticket widget router.
    pub fn ticket_interactions(&self) -> TicketInteractions {
        TicketInteractions::new(Arc::clone(&self.tickets))
    }

    /// Scan widget and upload router.
    pub fn scan_interactions(&self) -> ScanInteractions {
        ScanInteractions::new(Arc::clone(&self.scans))
    }

    /// Inactivity sweeper at the configured interval.
    pub fn reaper(&self) -> Reaper {
        Reaper::new(Arc::clone(&self.tickets)).with_interval(self.config.reaper_interval())
    }

    /// Start the inactivity sweeper.
    pub fn spawn_reaper(&self) -> JoinHandle<()> {
        info!(
            interval_secs = self.config.reaper_interval().as_secs(),
            "Starting inactivity sweeper"
        );
        self.reaper().spawn()
    }

    /// Gateway handler routing to both subsystems.
    #[cfg(feature = "discord")]
    pub fn handler(&self) -> vigil_social::VigilHandler {
        vigil_social::VigilHandler::new(
            Arc::clone(self.tickets.platform()),
            self.commands.clone(),
        )
        .with_tickets(self.ticket_interactions())
        .with_scans(self.scan_interactions())
    }
}
