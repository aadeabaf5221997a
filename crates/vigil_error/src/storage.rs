//! Storage error types.

/// Kinds of storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum StorageErrorKind {
    /// I/O error while reading or writing a state file
    #[display("I/O error: {}", _0)]
    Io(String),
    /// State file exists but could not be parsed
    #[display("Corrupt state file {}: {}", path, reason)]
    Corrupt {
        /// Path of the unreadable file
        path: String,
        /// Parser message
        reason: String,
    },
    /// Value could not be serialized
    #[display("Serialization error: {}", _0)]
    Serialization(String),
    /// Export to an external format failed
    #[display("Export failed: {}", _0)]
    Export(String),
}

/// Storage error with location tracking.
///
/// # Examples
///
/// ```
/// use vigil_error::{StorageError, StorageErrorKind};
///
/// let err = StorageError::new(StorageErrorKind::Io("disk full".to_string()));
/// assert!(format!("{}", err).contains("disk full"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Storage Error: {} at line {} in {}", kind, line, file)]
pub struct StorageError {
    /// The kind of error that occurred
    pub kind: StorageErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl StorageError {
    /// Create a new storage error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: StorageErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl From<std::io::Error> for StorageError {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        StorageError::new(StorageErrorKind::Io(err.to_string()))
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
