//! Whole-file JSON persistence with atomic replacement.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};
use vigil_error::{StorageError, StorageErrorKind, StorageResult};

/// Result of reading a state file.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded<T> {
    /// File parsed
    Found(T),
    /// File did not exist
    Missing,
    /// File was unreadable and has been moved to the contained path
    Quarantined(PathBuf),
}

/// Serialize `value` and replace `path` atomically.
///
/// The JSON is written to a sibling `.tmp` file, flushed to disk and renamed
/// over the target, so readers see either the old or the new content.
#[instrument(skip(value), fields(path = %path.display()))]
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| StorageError::new(StorageErrorKind::Serialization(e.to_string())))?;

    let tmp = temp_path(path);
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(&json).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&tmp, path).await?;
    debug!(bytes = json.len(), "State file written");
    Ok(())
}

/// Read and parse `path`.
///
/// A file that exists but does not parse is renamed to `<name>.corrupt` so
/// the caller can start from defaults without losing the original bytes.
#[instrument(fields(path = %path.display()))]
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<Loaded<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Loaded::Missing),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(Loaded::Found(value)),
        Err(e) => {
            let aside = quarantine_path(path);
            warn!(error = %e, aside = %aside.display(), "Corrupt state file moved aside");
            tokio::fs::rename(path, &aside).await?;
            Ok(Loaded::Quarantined(aside))
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn quarantine_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".corrupt-{}", chrono::Utc::now().format("%Y%m%d%H%M%S")));
    path.with_file_name(name)
}
