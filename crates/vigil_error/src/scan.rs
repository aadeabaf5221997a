//! File-scan subsystem error types.

use crate::StorageError;

/// Kinds of scan errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ScanErrorKind {
    /// Scanning disabled globally or for the guild
    #[display("File scanning is disabled")]
    Disabled,
    /// User is on the scan blacklist
    #[display("You are not allowed to use the file scanner")]
    Blacklisted,
    /// A scanner role is required and the user holds none
    #[display("You need a scanner role to scan files")]
    NoRole,
    /// Scanning is restricted to other channels
    #[display("Scanning is not allowed in this channel")]
    ChannelNotAllowed,
    /// Sliding-window limit reached
    #[display("Scan limit reached, try again in {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds until a slot frees
        retry_after_secs: u64,
    },
    /// File exceeds the configured size ceiling
    #[display("File is too large ({size_bytes} bytes, limit {limit_bytes} bytes)")]
    TooLarge {
        /// Submitted size
        size_bytes: u64,
        /// Configured ceiling
        limit_bytes: u64,
    },
    /// No API key configured
    #[display("The file scanner is not configured")]
    NotConfigured,
    /// Verdict service rejected the upload
    #[display("Upload failed: {}", _0)]
    UploadFailed(String),
    /// Analysis did not complete within the polling ceiling
    #[display("Analysis timed out after {attempts} attempts")]
    AnalysisTimeout {
        /// Number of polls performed
        attempts: u32,
    },
    /// Transport-level failure talking to the verdict service
    #[display("Network error: {}", _0)]
    NetworkError(String),
    /// Verdict service rejected the API key
    #[display("The scanner API key was rejected")]
    InvalidApiKey,
    /// Actor lacks admin rights for the action
    #[display("Permission denied: {}", _0)]
    PermissionDenied(String),
    /// Scan record referenced by a widget no longer exists
    #[display("Scan record not found")]
    NoSuchRecord,
    /// Persisting config or history failed
    #[display("Storage failure: {}", _0)]
    Storage(String),
}

/// Scan error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Scan Error: {} at line {} in {}", kind, line, file)]
pub struct ScanError {
    /// The kind of error that occurred
    pub kind: ScanErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl ScanError {
    /// Create a new scan error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ScanErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Message suitable for an end-user reply.
    pub fn user_message(&self) -> String {
        self.kind.to_string()
    }
}

impl From<StorageError> for ScanError {
    #[track_caller]
    fn from(err: StorageError) -> Self {
        ScanError::new(ScanErrorKind::Storage(err.kind.to_string()))
    }
}

/// Result type for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;
