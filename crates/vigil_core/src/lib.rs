//! Core data types for the Vigil ticket and file-scan subsystems.
//!
//! This crate holds the persisted records (guild ticket configuration, ticket
//! records, scan configuration and history) plus the [`Clock`] abstraction.
//! It performs no I/O.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod clock;
mod guild;
mod member;
mod scan;
mod ticket;
mod ticket_config;

pub use clock::{Clock, ManualClock, SystemClock};
pub use guild::GuildConfig;
pub use member::MemberInfo;
pub use scan::{
    BYTES_PER_MB, EngineVerdict, GuildScanConfig, ScanGlobalConfig, ScanRateLimit, ScanRecord,
    Severity, VerdictSnapshot, VerdictStats,
};
pub use ticket::{
    ActiveTicket, CategoryStats, ClosedTicket, Closer, SurveyAnswer, TicketState, TicketStats,
    hours_between, running_average,
};
pub use ticket_config::{
    ButtonStyle, CustomField, MAX_CLOSED_TICKETS, MAX_CUSTOM_FIELDS, MAX_DESCRIPTION_LEN,
    MAX_SURVEY_QUESTIONS, MAX_TITLE_LEN, PanelSettings, TicketCategory, TicketConfig,
    TranscriptFormat, TranscriptZone, parse_utc_offset,
};
