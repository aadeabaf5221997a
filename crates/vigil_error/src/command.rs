//! Administrator command error types.

use crate::{ScanError, TicketError};

/// Kinds of command errors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum CommandErrorKind {
    /// No such command or subcommand
    #[display("Unknown command `{}`", _0)]
    UnknownCommand(String),
    /// Required argument absent
    #[display("`{command}` needs a {arg} argument")]
    MissingArgument {
        /// Command being parsed
        command: String,
        /// Argument name
        arg: String,
    },
    /// Argument present but unusable
    #[display("`{command}`: invalid {arg} ({reason})")]
    InvalidArgument {
        /// Command being parsed
        command: String,
        /// Argument name
        arg: String,
        /// Why it was rejected
        reason: String,
    },
    /// Invoker lacks admin rights
    #[display("You need administrator permission or an admin role to use this command")]
    PermissionDenied,
    /// Command used outside a guild
    #[display("This command only works inside a server")]
    NotInGuild,
    /// Subsystem switched off for this process
    #[display("The {} subsystem is not running", _0)]
    SubsystemUnavailable(String),
    /// The ticket core refused the action
    #[display("{}", _0)]
    Ticket(String),
    /// The scan core refused the action
    #[display("{}", _0)]
    Scan(String),
}

/// Command error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Command Error: {} at line {} in {}", kind, line, file)]
pub struct CommandError {
    /// The kind of error that occurred
    pub kind: CommandErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl CommandError {
    /// Create a new command error with automatic location tracking.
    ///
    /// # Example
    /// ```
    /// use vigil_error::{CommandError, CommandErrorKind};
    ///
    /// let err = CommandError::new(CommandErrorKind::UnknownCommand("frobnicate".into()));
    /// assert_eq!(err.user_message(), "Unknown command `frobnicate`");
    /// ```
    #[track_caller]
    pub fn new(kind: CommandErrorKind) -> Self {
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

impl From<TicketError> for CommandError {
    #[track_caller]
    fn from(err: TicketError) -> Self {
        CommandError::new(CommandErrorKind::Ticket(err.user_message()))
    }
}

impl From<ScanError> for CommandError {
    #[track_caller]
    fn from(err: ScanError) -> Self {
        CommandError::new(CommandErrorKind::Scan(err.user_message()))
    }
}

/// Result type for command execution.
pub type CommandResult<T> = Result<T, CommandError>;
