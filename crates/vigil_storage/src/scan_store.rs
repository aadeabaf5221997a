//! Process-wide scan configuration store.

use crate::{Loaded, read_json, write_json_atomic};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use vigil_core::{GuildScanConfig, ScanGlobalConfig};
use vigil_error::StorageResult;

/// `scan/config.json`, holding the API key and every guild's scan settings.
#[derive(Debug)]
pub struct ScanConfigStore {
    path: PathBuf,
    config: RwLock<ScanGlobalConfig>,
}

impl ScanConfigStore {
    /// Load `<root>/scan/config.json`, creating it with defaults if absent.
    #[instrument(skip(root))]
    pub async fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let path = root.as_ref().join("scan").join("config.json");
        let config = match read_json::<ScanGlobalConfig>(&path).await? {
            Loaded::Found(config) => config,
            Loaded::Missing => {
                info!("Creating default scan configuration");
                let config = ScanGlobalConfig::default();
                write_json_atomic(&path, &config).await?;
                config
            }
            Loaded::Quarantined(aside) => {
                warn!(aside = %aside.display(), "Replacing corrupt scan configuration with defaults");
                let config = ScanGlobalConfig::default();
                write_json_atomic(&path, &config).await?;
                config
            }
        };
        Ok(Self {
            path,
            config: RwLock::new(config),
        })
    }

    /// Snapshot of the whole configuration.
    pub async fn snapshot(&self) -> ScanGlobalConfig {
        self.config.read().await.clone()
    }

    /// Settings for one guild.
    pub async fn guild(&self, guild_id: u64) -> GuildScanConfig {
        self.config.read().await.guild(guild_id)
    }

    /// Mutate the configuration and persist it.
    ///
    /// The change is applied in memory only if the write succeeds.
    #[instrument(skip(self, change))]
    pub async fn update<R>(
        &self,
        change: impl FnOnce(&mut ScanGlobalConfig) -> R,
    ) -> StorageResult<R> {
        let mut config = self.config.write().await;
        let mut next = config.clone();
        let result = change(&mut next);
        write_json_atomic(&self.path, &next).await?;
        *config = next;
        Ok(result)
    }

    /// Mutate one guild's settings and persist.
    pub async fn update_guild<R>(
        &self,
        guild_id: u64,
        change: impl FnOnce(&mut GuildScanConfig) -> R,
    ) -> StorageResult<R> {
        self.update(|config| change(config.guild_mut(guild_id))).await
    }
}
