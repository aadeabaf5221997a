//! Chat platform error types.
//!
//! Raised by `ChatPlatform` implementations when a channel, message or member
//! operation cannot be completed.

/// Chat platform error variants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
pub enum PlatformErrorKind {
    /// Channel not found by ID.
    #[display("Channel not found: {}", _0)]
    ChannelNotFound(u64),
    /// Member or user not found by ID.
    #[display("User not found: {}", _0)]
    UserNotFound(u64),
    /// Message not found by ID.
    #[display("Message not found: {}", _0)]
    MessageNotFound(u64),
    /// Channel creation was rejected.
    #[display("Channel creation failed: {}", _0)]
    ChannelCreateFailed(String),
    /// Channel deletion was rejected.
    #[display("Channel deletion failed: {}", _0)]
    ChannelDeleteFailed(String),
    /// Message failed to send.
    #[display("Message send failed: {}", _0)]
    MessageSendFailed(String),
    /// Direct message could not be delivered (closed DMs, blocked bot).
    #[display("Direct message failed: {}", _0)]
    DirectMessageFailed(String),
    /// Attachment could not be downloaded.
    #[display("Attachment download failed: {}", _0)]
    DownloadFailed(String),
    /// Bot lacks required permissions for an operation.
    #[display("Insufficient permissions: {}", _0)]
    InsufficientPermissions(String),
    /// Any other API failure.
    #[display("Platform API error: {}", _0)]
    Api(String),
}

/// Chat platform error with source location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Platform Error: {} at line {} in {}", kind, line, file)]
pub struct PlatformError {
    /// The kind of error that occurred
    pub kind: PlatformErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl PlatformError {
    /// Create a new PlatformError with automatic location tracking.
    ///
    /// # Example
    /// ```
    /// use vigil_error::{PlatformError, PlatformErrorKind};
    ///
    /// let err = PlatformError::new(PlatformErrorKind::ChannelNotFound(42));
    /// assert!(err.to_string().contains("42"));
    /// ```
    #[track_caller]
    pub fn new(kind: PlatformErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

/// Result type for chat platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;
