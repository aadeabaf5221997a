//! Scan configuration, verdicts and history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Bytes per megabyte as used by the size gate.
pub const BYTES_PER_MB: u64 = 1_048_576;

/// Process-wide scan configuration persisted in `scan/config.json`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanGlobalConfig {
    /// Verdict service API key
    #[serde(default)]
    pub api_key: Option<String>,
    /// Global switch
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Upload ceiling in megabytes
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    /// Verdict service base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Per-guild settings
    #[serde(default)]
    pub guilds: BTreeMap<u64, GuildScanConfig>,
}

// Hand-written so the key can never reach a log line.
impl std::fmt::Debug for ScanGlobalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanGlobalConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("enabled", &self.enabled)
            .field("max_file_size_mb", &self.max_file_size_mb)
            .field("api_base", &self.api_base)
            .field("guilds", &self.guilds)
            .finish()
    }
}

impl Default for ScanGlobalConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            enabled: true,
            max_file_size_mb: default_max_file_size_mb(),
            api_base: default_api_base(),
            guilds: BTreeMap::new(),
        }
    }
}

impl ScanGlobalConfig {
    /// Size ceiling in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(BYTES_PER_MB)
    }

    /// True when a non-blank API key is stored.
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Guild settings, or defaults when the guild has none yet.
    pub fn guild(&self, guild_id: u64) -> GuildScanConfig {
        self.guilds.get(&guild_id).cloned().unwrap_or_default()
    }

    /// Mutable guild settings, inserting defaults first.
    pub fn guild_mut(&mut self, guild_id: u64) -> &mut GuildScanConfig {
        self.guilds.entry(guild_id).or_default()
    }
}

/// Sliding-window parameters for scan requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRateLimit {
    /// Scans allowed per window
    #[serde(default = "default_per_user")]
    pub per_user: u32,
    /// Window length in minutes
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u64,
}

impl Default for ScanRateLimit {
    fn default() -> Self {
        Self {
            per_user: default_per_user(),
            window_minutes: default_window_minutes(),
        }
    }
}

/// Scan settings for one guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildScanConfig {
    /// Guild switch
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Channels where manual scans are accepted; empty means anywhere
    #[serde(default)]
    pub allowed_channels: BTreeSet<u64>,
    /// Channels whose attachments are scanned automatically
    #[serde(default)]
    pub auto_scan_channels: BTreeSet<u64>,
    /// Roles allowed to scan when `require_role` is set
    #[serde(default)]
    pub allowed_roles: BTreeSet<u64>,
    /// Roles allowed to run scan admin commands
    #[serde(default)]
    pub admin_roles: BTreeSet<u64>,
    /// Users barred from scanning
    #[serde(default)]
    pub blacklisted_user_ids: BTreeSet<u64>,
    /// Per-user request window
    #[serde(default)]
    pub rate_limit: ScanRateLimit,
    /// Post alerts for detections
    #[serde(default = "default_true")]
    pub alerts_enabled: bool,
    /// Alert destination
    #[serde(default)]
    pub alert_channel_id: Option<u64>,
    /// Only members with `allowed_roles` may scan
    #[serde(default)]
    pub require_role: bool,
}

impl Default for GuildScanConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_channels: BTreeSet::new(),
            auto_scan_channels: BTreeSet::new(),
            allowed_roles: BTreeSet::new(),
            admin_roles: BTreeSet::new(),
            blacklisted_user_ids: BTreeSet::new(),
            rate_limit: ScanRateLimit::default(),
            alerts_enabled: true,
            alert_channel_id: None,
            require_role: false,
        }
    }
}

/// Aggregate engine counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VerdictStats {
    /// Engines flagging the file as malicious
    #[serde(default)]
    pub malicious: u32,
    /// Engines flagging the file as suspicious
    #[serde(default)]
    pub suspicious: u32,
    /// Engines reporting harmless
    #[serde(default)]
    pub harmless: u32,
    /// Engines with no detection
    #[serde(default)]
    pub undetected: u32,
}

impl VerdictStats {
    /// Sum of all four counters.
    pub fn total(&self) -> u32 {
        self.malicious + self.suspicious + self.harmless + self.undetected
    }

    /// Overall classification.
    pub fn severity(&self) -> Severity {
        if self.malicious > 0 {
            Severity::Malicious
        } else if self.suspicious > 0 {
            Severity::Suspicious
        } else {
            Severity::Clean
        }
    }

    /// True when an alert should be raised.
    pub fn is_threat(&self) -> bool {
        self.malicious > 0 || self.suspicious > 0
    }
}

/// Overall classification of a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum Severity {
    /// At least one malicious detection
    #[display("Malicious")]
    Malicious,
    /// Suspicious detections only
    #[display("Suspicious")]
    Suspicious,
    /// Nothing detected
    #[display("Clean")]
    Clean,
}

impl Severity {
    /// Card color.
    pub fn color(&self) -> u32 {
        match self {
            Severity::Malicious => 0xE74C3C,
            Severity::Suspicious => 0xE67E22,
            Severity::Clean => 0x2ECC71,
        }
    }

    /// Status label with emoji.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Malicious => "🔴 Malicious",
            Severity::Suspicious => "🟠 Suspicious",
            Severity::Clean => "🟢 Clean",
        }
    }
}

/// One engine's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineVerdict {
    /// Engine category such as `malicious` or `undetected`
    pub category: String,
    /// Threat name, absent when nothing was found
    #[serde(default)]
    pub result: Option<String>,
}

/// Terminal analysis result as returned by the verdict service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VerdictSnapshot {
    /// Aggregate counts
    #[serde(default)]
    pub stats: VerdictStats,
    /// Per-engine results
    #[serde(default)]
    pub engines: BTreeMap<String, EngineVerdict>,
    /// Analysis time as Unix seconds
    #[serde(default)]
    pub date: Option<i64>,
}

impl VerdictSnapshot {
    /// Up to `limit` `(engine, threat)` pairs for engines that flagged the
    /// file, malicious first.
    pub fn top_threats(&self, limit: usize) -> Vec<(String, String)> {
        let mut flagged: Vec<(&String, &EngineVerdict)> = self
            .engines
            .iter()
            .filter(|(_, v)| v.category == "malicious" || v.category == "suspicious")
            .collect();
        flagged.sort_by_key(|(name, v)| (v.category != "malicious", (*name).clone()));
        flagged
            .into_iter()
            .take(limit)
            .map(|(name, v)| {
                let threat = v.result.clone().unwrap_or_else(|| v.category.clone());
                (name.clone(), threat)
            })
            .collect()
    }

    /// Analysis time as a UTC timestamp.
    pub fn analyzed_at(&self) -> Option<DateTime<Utc>> {
        self.date.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// A completed scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    /// When the scan completed
    pub timestamp: DateTime<Utc>,
    /// Guild the scan ran in
    pub guild_id: u64,
    /// Requesting user
    pub user_id: u64,
    /// Originating channel
    #[serde(default)]
    pub channel_id: u64,
    /// Submitted file name
    pub filename: String,
    /// Submitted size
    #[serde(default)]
    pub size_bytes: u64,
    /// Lowercase hex SHA-256 of the content
    pub sha256: String,
    /// Verdict at completion
    pub verdict_snapshot: VerdictSnapshot,
}

impl ScanRecord {
    /// First 16 hex characters of the digest.
    pub fn sha_prefix(&self) -> &str {
        let end = self.sha256.len().min(16);
        &self.sha256[..end]
    }
}

fn default_true() -> bool {
    true
}

fn default_max_file_size_mb() -> u64 {
    32
}

fn default_api_base() -> String {
    "https://www.virustotal.com/api/v3".to_string()
}

fn default_per_user() -> u32 {
    5
}

fn default_window_minutes() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ScanGlobalConfig {
            api_key: Some("super-secret-key".to_string()),
            ..ScanGlobalConfig::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret-key"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_severity_colors() {
        let stats = VerdictStats {
            malicious: 3,
            suspicious: 1,
            harmless: 40,
            undetected: 20,
        };
        assert_eq!(stats.severity(), Severity::Malicious);
        assert_eq!(stats.severity().color(), 0xE74C3C);
        assert_eq!(stats.total(), 64);

        let suspicious = VerdictStats {
            suspicious: 2,
            ..VerdictStats::default()
        };
        assert_eq!(suspicious.severity().color(), 0xE67E22);
        assert_eq!(VerdictStats::default().severity().color(), 0x2ECC71);
    }

    #[test]
    fn test_top_threats_malicious_first() {
        let mut snapshot = VerdictSnapshot::default();
        snapshot.engines.insert(
            "Zeta".to_string(),
            EngineVerdict {
                category: "malicious".to_string(),
                result: Some("Trojan.Gen".to_string()),
            },
        );
        snapshot.engines.insert(
            "Alpha".to_string(),
            EngineVerdict {
                category: "suspicious".to_string(),
                result: None,
            },
        );
        snapshot.engines.insert(
            "Beta".to_string(),
            EngineVerdict {
                category: "undetected".to_string(),
                result: None,
            },
        );
        let threats = snapshot.top_threats(5);
        assert_eq!(
            threats,
            vec![
                ("Zeta".to_string(), "Trojan.Gen".to_string()),
                ("Alpha".to_string(), "suspicious".to_string()),
            ]
        );
    }

    #[test]
    fn test_guild_keys_round_trip_as_strings() {
        let mut config = ScanGlobalConfig::default();
        config.guild_mut(123).require_role = true;
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"123\""));
        let back: ScanGlobalConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
