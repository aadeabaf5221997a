//! Text-prefix and slash administrator commands.
//!
//! `!ticket <subcommand> ...` and `!scan <subcommand> ...` (or the `/ticket`
//! and `/scan` slash commands carrying the same argument string) reach
//! [`AdminCommands::execute`], which checks admin rights, runs the
//! subcommand against the matching core and answers with a success or
//! failure embed.

mod args;
mod scan;
mod ticket;

pub use args::{Args, parse_id_list, parse_snowflake, parse_switch, tokenize};

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use vigil_core::MemberInfo;
use vigil_error::{CommandError, CommandErrorKind, CommandResult};
use vigil_interface::{Embed, FileAttachment, IncomingMessage, OutgoingMessage};
use vigil_scan::ScanCore;
use vigil_ticket::TicketCore;

/// Default text command prefix.
pub const DEFAULT_PREFIX: &str = "!";

/// Which subsystem a command addresses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Subsystem {
    /// `ticket ...`
    Ticket,
    /// `scan ...`
    Scan,
}

/// A recognised command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Addressed subsystem
    pub subsystem: Subsystem,
    /// Words after the subsystem name
    pub words: Vec<String>,
}

impl Invocation {
    /// True for `scan setapi`, whose source message must be removed whatever
    /// the outcome.
    pub fn carries_secret(&self) -> bool {
        self.subsystem == Subsystem::Scan
            && self
                .words
                .first()
                .is_some_and(|w| w.eq_ignore_ascii_case("setapi"))
    }
}

/// Parse `content` as `<prefix><subsystem> words...`.
///
/// # Examples
///
/// ```
/// use vigil_social::{Subsystem, parse_invocation};
///
/// let invocation = parse_invocation("!", "!scan ratelimit 5 60").expect("command");
/// assert_eq!(invocation.subsystem, Subsystem::Scan);
/// assert_eq!(invocation.words, vec!["ratelimit", "5", "60"]);
/// assert!(parse_invocation("!", "hello").is_none());
/// ```
pub fn parse_invocation(prefix: &str, content: &str) -> Option<Invocation> {
    let body = content.trim_start().strip_prefix(prefix)?;
    let mut words = tokenize(body);
    if words.is_empty() {
        return None;
    }
    let subsystem = words.remove(0).parse().ok()?;
    Some(Invocation { subsystem, words })
}

/// Where a command was issued and by whom.
#[derive(Debug, Clone, PartialEq, Eq, derive_new::new)]
pub struct CommandContext {
    /// Guild
    pub guild_id: u64,
    /// Channel the command came from
    pub channel_id: u64,
    /// Invoking member, with roles and administrator flag resolved
    pub member: MemberInfo,
}

/// What to send back for a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    /// Reply message
    pub message: OutgoingMessage,
    /// Delete the message that carried the command
    pub delete_source: bool,
}

impl CommandReply {
    /// Reply with a single embed.
    pub fn embed(embed: Embed) -> Self {
        Self {
            message: OutgoingMessage::embed(embed),
            delete_source: false,
        }
    }

    /// Green confirmation embed.
    pub fn success(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::embed(Embed::success(title, text))
    }

    /// Red failure embed for `err`.
    pub fn failure(err: &CommandError) -> Self {
        Self::embed(Embed::error(err.user_message()))
    }

    /// Same reply with a file attached.
    pub fn with_file(mut self, filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.message = self.message.with_file(FileAttachment::new(filename, bytes));
        self
    }
}

/// Administrator command router.
#[derive(Debug, Clone)]
pub struct AdminCommands {
    prefix: String,
    tickets: Option<Arc<TicketCore>>,
    scans: Option<Arc<ScanCore>>,
}

impl AdminCommands {
    /// Router for `prefix` with no subsystem attached.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            tickets: None,
            scans: None,
        }
    }

    /// Attach the ticket core.
    pub fn with_tickets(mut self, core: Arc<TicketCore>) -> Self {
        self.tickets = Some(core);
        self
    }

    /// Attach the scan core.
    pub fn with_scans(mut self, core: Arc<ScanCore>) -> Self {
        self.scans = Some(core);
        self
    }

    /// Text command prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Recognise a text command.
    pub fn parse(&self, content: &str) -> Option<Invocation> {
        parse_invocation(&self.prefix, content)
    }

    /// Handle a guild message that may carry a text command.
    ///
    /// `None` if the message is not a command. The author's administrator
    /// flag must already be resolved.
    pub async fn handle_message(&self, message: &IncomingMessage) -> Option<CommandReply> {
        if *message.author.is_bot() {
            return None;
        }
        let invocation = self.parse(&message.content)?;
        let Some(guild_id) = message.guild_id else {
            let mut reply = CommandReply::failure(&CommandError::new(CommandErrorKind::NotInGuild));
            reply.delete_source = invocation.carries_secret();
            return Some(reply);
        };
        let ctx = CommandContext::new(guild_id, message.channel_id, message.author.clone());
        Some(self.execute(&ctx, invocation).await)
    }

    /// Run a command and turn any failure into a failure embed.
    #[instrument(
        skip(self, ctx, invocation),
        fields(
            guild_id = ctx.guild_id,
            user_id = *ctx.member.user_id(),
            subsystem = %invocation.subsystem,
            subcommand = invocation.words.first().map(String::as_str).unwrap_or("")
        )
    )]
    pub async fn execute(&self, ctx: &CommandContext, invocation: Invocation) -> CommandReply {
        let secret = invocation.carries_secret();
        let args = Args::new(invocation.subsystem.as_ref(), invocation.words);
        let result = match invocation.subsystem {
            Subsystem::Ticket => match &self.tickets {
                Some(core) => ticket::run(core, ctx, args).await,
                None => Err(unavailable(Subsystem::Ticket)),
            },
            Subsystem::Scan => match &self.scans {
                Some(core) => scan::run(core, ctx, args).await,
                None => Err(unavailable(Subsystem::Scan)),
            },
        };
        let mut reply = match result {
            Ok(reply) => {
                info!("Command completed");
                reply
            }
            Err(e) => {
                match e.kind {
                    CommandErrorKind::Ticket(_) | CommandErrorKind::Scan(_) => {
                        warn!(error = %e, "Command failed")
                    }
                    _ => debug!(error = %e, "Command refused"),
                }
                CommandReply::failure(&e)
            }
        };
        reply.delete_source |= secret;
        reply
    }
}

#[track_caller]
fn unavailable(subsystem: Subsystem) -> CommandError {
    CommandError::new(CommandErrorKind::SubsystemUnavailable(subsystem.to_string()))
}

#[track_caller]
fn denied() -> CommandError {
    CommandError::new(CommandErrorKind::PermissionDenied)
}

/// Fail with `denied` unless `allowed`.
fn require(allowed: bool) -> CommandResult<()> {
    if allowed { Ok(()) } else { Err(denied()) }
}

fn id_list(ids: &std::collections::BTreeSet<u64>, mention: &str) -> String {
    if ids.is_empty() {
        "None".to_string()
    } else {
        ids.iter()
            .map(|id| format!("<{}{}>", mention, id))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn yes_no(on: bool) -> &'static str {
    if on { "Yes" } else { "No" }
}

fn channel_or_none(id: Option<u64>) -> String {
    id.map(|id| format!("<#{}>", id))
        .unwrap_or_else(|| "None".to_string())
}
