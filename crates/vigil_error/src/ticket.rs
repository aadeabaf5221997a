//! Ticket subsystem error types.
//!
//! The `Display` text of each kind is written for end users; it is what the
//! ephemeral failure embed shows. Location details stay in the logs.

use crate::{PlatformError, StorageError};

/// Kinds of ticket errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum TicketErrorKind {
    /// Ticket system disabled globally or for the guild
    #[display("The ticket system is currently disabled")]
    Disabled,
    /// Requester is on the guild ticket blacklist
    #[display("You are not allowed to create tickets")]
    Blacklisted,
    /// Per-user creation cooldown has not elapsed
    #[display("Please wait {retry_after_secs} seconds before creating another ticket")]
    RateLimited {
        /// Seconds until the cooldown expires
        retry_after_secs: u64,
    },
    /// Requester already has the maximum number of open tickets
    #[display("You already have {limit} open tickets")]
    MaxOpenReached {
        /// Configured per-user limit
        limit: u32,
    },
    /// Category requires a role the requester does not hold
    #[display("You need a specific role to open a '{category}' ticket")]
    MissingRole {
        /// Category name
        category: String,
    },
    /// Category name not configured for this guild
    #[display("Unknown ticket category: {}", _0)]
    CategoryNotFound(String),
    /// Submitted form values failed validation
    #[display("Invalid input: {}", _0)]
    InvalidInput(String),
    /// Channel creation or initial posting failed
    #[display("Could not create the ticket: {}", _0)]
    CreationFailed(String),
    /// Ticket does not exist or is no longer open
    #[display("Ticket not found or already closed: {}", _0)]
    NoSuchTicket(String),
    /// Actor lacks the staff or creator rights for the action
    #[display("Permission denied: {}", _0)]
    PermissionDenied(String),
    /// Ticket is claimed by another staff member
    #[display("This ticket is already claimed by another staff member")]
    AlreadyClaimed {
        /// Staff member holding the claim
        claimed_by: u64,
    },
    /// Claiming is turned off for the guild
    #[display("The claim system is disabled")]
    ClaimDisabled,
    /// Tagging is turned off for the guild
    #[display("Tags are disabled")]
    TagsDisabled,
    /// Tag is not part of the available tag set
    #[display("Tag '{}' is not available", _0)]
    TagUnavailable(String),
    /// A close reason is mandatory for this guild
    #[display("A reason is required to close this ticket")]
    ReasonRequired,
    /// Ratings are turned off for the guild
    #[display("Ratings are disabled")]
    RatingDisabled,
    /// Surveys are turned off for the guild
    #[display("Surveys are disabled")]
    SurveyDisabled,
    /// Rating outside one to five stars
    #[display("Rating must be between 1 and 5 stars, got {}", _0)]
    InvalidRating(u8),
    /// Ticket already carries a rating or survey
    #[display("Feedback was already submitted for this ticket")]
    AlreadyRated,
    /// Interactive widget expired before completion
    #[display("This interaction has expired")]
    WidgetTimeout,
    /// Transcript rendering failed
    #[display("Transcript generation failed: {}", _0)]
    TranscriptGenerationFailed(String),
    /// Transcript could not be posted to the transcript channel
    #[display("Transcript delivery failed: {}", _0)]
    TranscriptDeliveryFailed(String),
    /// Auto-close target saw activity since it was selected
    #[display("Ticket has been active within the last {hours} hours")]
    NotIdle {
        /// Guild auto-close threshold
        hours: u64,
    },
    /// Ticket channel could not be deleted
    #[display("Channel deletion failed: {}", _0)]
    ChannelDeletionFailed(String),
    /// Persisting the guild configuration failed
    #[display("Storage failure: {}", _0)]
    Storage(String),
}

/// Ticket error with location tracking.
///
/// # Examples
///
/// ```
/// use vigil_error::{TicketError, TicketErrorKind};
///
/// let err = TicketError::new(TicketErrorKind::Blacklisted);
/// assert_eq!(err.kind, TicketErrorKind::Blacklisted);
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Ticket Error: {} at line {} in {}", kind, line, file)]
pub struct TicketError {
    /// The kind of error that occurred
    pub kind: TicketErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl TicketError {
    /// Create a new ticket error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: TicketErrorKind) -> Self {
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

impl From<StorageError> for TicketError {
    #[track_caller]
    fn from(err: StorageError) -> Self {
        TicketError::new(TicketErrorKind::Storage(err.kind.to_string()))
    }
}

impl From<PlatformError> for TicketError {
    #[track_caller]
    fn from(err: PlatformError) -> Self {
        TicketError::new(TicketErrorKind::CreationFailed(err.kind.to_string()))
    }
}

/// Result type for ticket operations.
pub type TicketResult<T> = Result<T, TicketError>;
