//! Error types for the Vigil ticket and scan subsystems.
//!
//! Every domain error follows the same shape: a `...ErrorKind` enum naming
//! what went wrong and a `...Error` struct recording where it was raised.
//! [`VigilError`] unifies them for callers that cross subsystem borders,
//! such as the binary and the platform adapter.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod command;
mod config;
mod platform;
mod scan;
mod storage;
mod ticket;

pub use command::{CommandError, CommandErrorKind, CommandResult};
pub use config::ConfigError;
pub use platform::{PlatformError, PlatformErrorKind, PlatformResult};
pub use scan::{ScanError, ScanErrorKind, ScanResult};
pub use storage::{StorageError, StorageErrorKind, StorageResult};
pub use ticket::{TicketError, TicketErrorKind, TicketResult};

/// Crate-level error variants.
#[derive(Debug, derive_more::From)]
pub enum VigilErrorKind {
    /// Configuration error
    Config(ConfigError),
    /// Persistence error
    Storage(StorageError),
    /// Chat platform error
    Platform(PlatformError),
    /// Ticket subsystem error
    Ticket(TicketError),
    /// Scan subsystem error
    Scan(ScanError),
    /// Administrator command error
    Command(CommandError),
}

impl std::fmt::Display for VigilErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VigilErrorKind::Config(e) => write!(f, "{}", e),
            VigilErrorKind::Storage(e) => write!(f, "{}", e),
            VigilErrorKind::Platform(e) => write!(f, "{}", e),
            VigilErrorKind::Ticket(e) => write!(f, "{}", e),
            VigilErrorKind::Scan(e) => write!(f, "{}", e),
            VigilErrorKind::Command(e) => write!(f, "{}", e),
        }
    }
}

/// Vigil error with kind discrimination.
#[derive(Debug)]
pub struct VigilError(Box<VigilErrorKind>);

impl VigilError {
    /// Create a new error from a kind.
    pub fn new(kind: VigilErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &VigilErrorKind {
        &self.0
    }
}

impl std::fmt::Display for VigilError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Vigil Error: {}", self.0)
    }
}

impl std::error::Error for VigilError {}

impl<T> From<T> for VigilError
where
    T: Into<VigilErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Vigil operations.
pub type VigilResult<T> = std::result::Result<T, VigilError>;
