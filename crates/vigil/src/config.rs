//! Process configuration.
//!
//! Per-guild settings live in the data directory and are edited through
//! commands; this file only covers what applies to the whole process.

use config::{Config, Environment, File, FileFormat};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};
use vigil_error::ConfigError;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_NAME: &str = "vigil";

/// Prefix for environment overrides, e.g. `VIGIL_SCAN__ENABLED=false`.
pub const ENV_PREFIX: &str = "VIGIL";

/// Top-level process configuration (`vigil.toml`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct VigilConfig {
    /// Root of the persisted ticket and scan files
    data_dir: PathBuf,
    /// Text command prefix
    prefix: String,
    /// Seconds between inactivity sweeps
    reaper_interval_secs: u64,
    /// Ticket subsystem switches
    tickets: TicketSettings,
    /// Scan subsystem switches and verdict service access
    scan: ScanSettings,
    /// Log output
    log: LogSettings,
}

impl Default for VigilConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            prefix: vigil_social::DEFAULT_PREFIX.to_string(),
            reaper_interval_secs: vigil_ticket::REAPER_INTERVAL.as_secs(),
            tickets: TicketSettings::default(),
            scan: ScanSettings::default(),
            log: LogSettings::default(),
        }
    }
}

/// Process-wide ticket settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct TicketSettings {
    /// When false no guild can open tickets
    enabled: bool,
}

impl Default for TicketSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Process-wide scan settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct ScanSettings {
    /// When false no guild can scan
    enabled: bool,
    /// Overrides the verdict API base URL stored with the scan config
    api_base: Option<String>,
    /// Verdict API quota; zero disables client-side pacing
    requests_per_minute: u32,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_base: None,
            // Public API tier.
            requests_per_minute: 4,
        }
    }
}

/// Log output format.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Logging settings. `RUST_LOG` still controls the filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(default)]
pub struct LogSettings {
    /// Output format
    format: LogFormat,
}

impl VigilConfig {
    /// Load from `path` (or `./vigil.toml` if present) plus `VIGIL_`
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit file is missing, a value has the wrong
    /// type, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_environment(path, Self::environment())
    }

    /// Environment source for overrides. Nested keys use `__`.
    pub fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// Load from `path` and an explicit environment source.
    ///
    /// # Errors
    ///
    /// Same as [`VigilConfig::load`].
    #[instrument(skip(environment))]
    pub fn load_with_environment(
        path: Option<&Path>,
        environment: Environment,
    ) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).format(FileFormat::Toml).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME)
                .format(FileFormat::Toml)
                .required(false),
        };
        let loaded: Self = Config::builder()
            .add_source(file)
            .add_source(environment)
            .build()
            .map_err(|e| ConfigError::new(format!("Failed to read config: {}", e)))?
            .try_deserialize()
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        loaded.validate()?;
        debug!(
            data_dir = %loaded.data_dir.display(),
            prefix = %loaded.prefix,
            tickets = loaded.tickets.enabled,
            scan = loaded.scan.enabled,
            "Configuration loaded"
        );
        Ok(loaded)
    }

    /// Check values the type system cannot.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid("data_dir", "must not be empty"));
        }
        if self.prefix.is_empty() || self.prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::invalid(
                "prefix",
                "must be non-empty and contain no whitespace",
            ));
        }
        if self.reaper_interval_secs == 0 {
            return Err(ConfigError::invalid("reaper_interval_secs", "must be positive"));
        }
        if let Some(base) = &self.scan.api_base
            && !(base.starts_with("https://") || base.starts_with("http://"))
        {
            return Err(ConfigError::invalid(
                "scan.api_base",
                format!("must be an http(s) URL, got '{}'", base),
            ));
        }
        Ok(())
    }

    /// Replace the data directory, e.g. from `--data-dir`.
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Time between inactivity sweeps.
    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }

    /// Render as TOML, suitable for a starting `vigil.toml`.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::new(format!("Failed to serialize config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = VigilConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.prefix(), "!");
        assert_eq!(config.reaper_interval(), Duration::from_secs(3600));
        assert_eq!(*config.scan().requests_per_minute(), 4);
    }

    #[test]
    fn test_whitespace_prefix_rejected() {
        let config = VigilConfig {
            prefix: "! ".to_string(),
            ..VigilConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.key.as_deref(), Some("prefix"));
    }

    #[test]
    fn test_rendered_toml_reads_back() {
        let config = VigilConfig::default().with_data_dir("/srv/vigil");
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("[scan]"));
        let parsed: VigilConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_log_format_parses() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::Pretty.to_string(), "pretty");
    }
}
