//! Per-guild ticket configuration store.

use crate::{Loaded, read_json, write_json_atomic};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use vigil_core::GuildConfig;
use vigil_error::StorageResult;

/// Shared handle to one guild's configuration.
///
/// Holding the lock is the guild's critical section: read-modify-write
/// sequences on ticket records happen under it.
pub type GuildHandle = Arc<Mutex<GuildConfig>>;

/// Lazily loaded guild configurations backed by `<root>/tickets/<id>.json`.
#[derive(Debug)]
pub struct ConfigStore {
    dir: PathBuf,
    guilds: Mutex<HashMap<u64, GuildHandle>>,
}

impl ConfigStore {
    /// Store reading and writing files in `<root>/tickets`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            dir: root.as_ref().join("tickets"),
            guilds: Mutex::new(HashMap::new()),
        }
    }

    /// Directory holding the guild files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, guild_id: u64) -> PathBuf {
        self.dir.join(format!("{}.json", guild_id))
    }

    /// Handle to the guild configuration, loading or creating it on first use.
    ///
    /// A guild seen for the first time gets defaults written to disk
    /// immediately, so the first read is stable across restarts.
    #[instrument(skip(self))]
    pub async fn guild(&self, guild_id: u64) -> StorageResult<GuildHandle> {
        let mut guilds = self.guilds.lock().await;
        if let Some(handle) = guilds.get(&guild_id) {
            return Ok(Arc::clone(handle));
        }

        let config = self.load_from_disk(guild_id).await?;
        let handle = Arc::new(Mutex::new(config));
        guilds.insert(guild_id, Arc::clone(&handle));
        Ok(handle)
    }

    /// Snapshot of the guild configuration.
    pub async fn get(&self, guild_id: u64) -> StorageResult<GuildConfig> {
        let handle = self.guild(guild_id).await?;
        let config = handle.lock().await;
        Ok(config.clone())
    }

    /// Persist `config` to its guild file.
    #[instrument(skip(self, config), fields(guild_id = config.guild_id))]
    pub async fn save(&self, config: &GuildConfig) -> StorageResult<()> {
        write_json_atomic(&self.path_for(config.guild_id), config).await
    }

    /// Load every guild file in the directory.
    ///
    /// Returns the IDs that loaded. A file that fails is logged and skipped;
    /// it never prevents the others from loading.
    #[instrument(skip(self))]
    pub async fn load_all(&self) -> Vec<u64> {
        let mut loaded = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No guild directory yet");
                return loaded;
            }
            Err(e) => {
                error!(error = %e, "Cannot list guild directory");
                return loaded;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "Error while listing guild directory");
                    break;
                }
            };
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(guild_id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok())
            else {
                continue;
            };
            match self.guild(guild_id).await {
                Ok(_) => loaded.push(guild_id),
                Err(e) => error!(guild_id, error = %e, "Failed to load guild configuration"),
            }
        }

        info!(count = loaded.len(), "Guild configurations loaded");
        loaded
    }

    /// Handle to a guild already in memory, without touching disk.
    pub async fn loaded(&self, guild_id: u64) -> Option<GuildHandle> {
        self.guilds.lock().await.get(&guild_id).map(Arc::clone)
    }

    /// IDs of guilds currently in memory.
    pub async fn loaded_guilds(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.guilds.lock().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    async fn load_from_disk(&self, guild_id: u64) -> StorageResult<GuildConfig> {
        let path = self.path_for(guild_id);
        match read_json::<GuildConfig>(&path).await? {
            Loaded::Found(mut config) => {
                if config.guild_id != guild_id {
                    warn!(
                        guild_id,
                        stored = config.guild_id,
                        "Guild file carried a different id; using the file name"
                    );
                    config.guild_id = guild_id;
                }
                debug!(guild_id, "Guild configuration loaded");
                Ok(config)
            }
            Loaded::Missing => {
                info!(guild_id, "Creating default guild configuration");
                let config = GuildConfig::new(guild_id);
                write_json_atomic(&path, &config).await?;
                Ok(config)
            }
            Loaded::Quarantined(aside) => {
                warn!(guild_id, aside = %aside.display(), "Replacing corrupt guild configuration with defaults");
                let config = GuildConfig::new(guild_id);
                write_json_atomic(&path, &config).await?;
                Ok(config)
            }
        }
    }
}
