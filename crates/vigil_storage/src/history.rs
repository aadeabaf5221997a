//! Bounded scan history.

use crate::{ExportFormat, Loaded, export_scan_records, read_json, write_json_atomic};
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use vigil_core::ScanRecord;
use vigil_error::StorageResult;

/// Records retained across all guilds.
pub const HISTORY_CAPACITY: usize = 1000;

/// Per-guild scan totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, derive_getters::Getters)]
pub struct ScanStats {
    /// Records in the log for the guild
    total_scans: usize,
    /// Records with at least one malicious detection
    malicious: usize,
    /// Records with suspicious detections only
    suspicious: usize,
    /// Records with no detections
    clean: usize,
    /// Distinct users who scanned
    unique_users: usize,
}

/// Append-only ring of completed scans persisted to `scan/scan_history.json`.
///
/// Appending past capacity drops the oldest record.
#[derive(Debug)]
pub struct HistoryLog {
    path: PathBuf,
    capacity: usize,
    records: Mutex<VecDeque<ScanRecord>>,
}

impl HistoryLog {
    /// Load `<root>/scan/scan_history.json`.
    #[instrument(skip(root))]
    pub async fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open_with_capacity(root, HISTORY_CAPACITY).await
    }

    /// Load with a custom capacity.
    pub async fn open_with_capacity(root: impl AsRef<Path>, capacity: usize) -> StorageResult<Self> {
        let path = root.as_ref().join("scan").join("scan_history.json");
        let mut records: VecDeque<ScanRecord> = match read_json::<Vec<ScanRecord>>(&path).await? {
            Loaded::Found(records) => records.into(),
            Loaded::Missing => VecDeque::new(),
            Loaded::Quarantined(aside) => {
                warn!(aside = %aside.display(), "Starting with empty scan history");
                VecDeque::new()
            }
        };
        while records.len() > capacity {
            records.pop_front();
        }
        debug!(count = records.len(), "Scan history loaded");
        Ok(Self {
            path,
            capacity,
            records: Mutex::new(records),
        })
    }

    /// Append a record, trim to capacity and persist.
    #[instrument(skip(self, record), fields(guild_id = record.guild_id, sha = record.sha_prefix()))]
    pub async fn append(&self, record: ScanRecord) -> StorageResult<()> {
        let mut records = self.records.lock().await;
        records.push_back(record);
        while records.len() > self.capacity {
            records.pop_front();
        }
        self.persist(&records).await
    }

    /// Number of records held.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Whether the log is empty.
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Every record, oldest first.
    pub async fn all(&self) -> Vec<ScanRecord> {
        self.records.lock().await.iter().cloned().collect()
    }

    /// Records for a guild, newest first.
    pub async fn filter_by_guild(&self, guild_id: u64) -> Vec<ScanRecord> {
        self.records
            .lock()
            .await
            .iter()
            .rev()
            .filter(|r| r.guild_id == guild_id)
            .cloned()
            .collect()
    }

    /// Records for one user in a guild, newest first.
    pub async fn filter_by_user(&self, guild_id: u64, user_id: u64) -> Vec<ScanRecord> {
        self.records
            .lock()
            .await
            .iter()
            .rev()
            .filter(|r| r.guild_id == guild_id && r.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Most recent record in a guild whose digest starts with `sha_prefix`.
    pub async fn find(&self, guild_id: u64, sha_prefix: &str) -> Option<ScanRecord> {
        self.records
            .lock()
            .await
            .iter()
            .rev()
            .find(|r| r.guild_id == guild_id && r.sha256.starts_with(sha_prefix))
            .cloned()
    }

    /// Encode a guild's records, oldest first.
    pub async fn export(&self, guild_id: u64, format: ExportFormat) -> StorageResult<Vec<u8>> {
        let mut records = self.filter_by_guild(guild_id).await;
        records.reverse();
        export_scan_records(&records, format)
    }

    /// Drop a guild's records older than `days` days before `now`.
    ///
    /// Returns the number removed.
    #[instrument(skip(self))]
    pub async fn cleanup_older_than(
        &self,
        guild_id: u64,
        days: u32,
        now: DateTime<Utc>,
    ) -> StorageResult<usize> {
        let cutoff = now - Duration::days(i64::from(days));
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|r| r.guild_id != guild_id || r.timestamp >= cutoff);
        let removed = before - records.len();
        if removed > 0 {
            self.persist(&records).await?;
        }
        info!(removed, "Scan history cleaned up");
        Ok(removed)
    }

    /// Totals for a guild.
    pub async fn stats(&self, guild_id: u64) -> ScanStats {
        let records = self.records.lock().await;
        let mut stats = ScanStats::default();
        let mut users = std::collections::BTreeSet::new();
        for record in records.iter().filter(|r| r.guild_id == guild_id) {
            stats.total_scans += 1;
            users.insert(record.user_id);
            match record.verdict_snapshot.stats.severity() {
                vigil_core::Severity::Malicious => stats.malicious += 1,
                vigil_core::Severity::Suspicious => stats.suspicious += 1,
                vigil_core::Severity::Clean => stats.clean += 1,
            }
        }
        stats.unique_users = users.len();
        stats
    }

    async fn persist(&self, records: &VecDeque<ScanRecord>) -> StorageResult<()> {
        write_json_atomic(&self.path, records).await
    }
}
