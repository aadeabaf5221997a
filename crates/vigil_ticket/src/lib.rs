//! Support tickets for Vigil.
//!
//! A member presses the panel button, picks a category, fills a form and
//! gets a private channel shared with the support staff. Staff claim, tag and
//! close tickets; closing produces a transcript and, when enabled, asks the
//! creator for a rating.
//!
//! [`TicketCore`] holds the operations. [`TicketInteractions`] routes widget
//! events into it and [`Reaper`] closes idle tickets on a timer.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod access;
mod admin;
mod dispatch;
mod feedback;
mod flow;
mod ids;
mod lifecycle;
mod reaper;
mod service;
mod transcript;
pub mod views;

pub use access::{is_admin, is_staff, ticket_overwrites};
pub use admin::TagSearch;
pub use dispatch::{CONFIRM_TIMEOUT, CloseDecision, TicketInteractions};
pub use flow::{
    FORM_SESSION_SECS, FormInput, PanelEffect, PanelEvent, PanelState, TicketDraft, advance,
    form_steps,
};
pub use ids::TicketWidget;
pub use lifecycle::{CloseActor, authorize_close};
pub use reaper::{INACTIVITY_REASON, REAPER_INTERVAL, Reaper, SweepReport};
pub use service::{ANONYMOUS_CHANNEL_LABEL, CreateTicketRequest, TicketCore};
pub use transcript::{
    TranscriptEntry, TranscriptHeader, build_transcript, escape_html, render_csv, render_html,
    render_text,
};

#[cfg(test)]
pub(crate) mod tests_support {
    use chrono::{TimeZone, Utc};
    use vigil_core::ActiveTicket;

    pub fn active_ticket(id: &str, number: u64) -> ActiveTicket {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        ActiveTicket {
            id: id.to_string(),
            number,
            channel_id: 500 + number,
            channel_name: format!("ticket-{}", number),
            creator_id: 42,
            category_name: "General".to_string(),
            title: "Cannot log in".to_string(),
            description: "Password reset loops".to_string(),
            is_anonymous: false,
            created_at: created,
            last_activity: created,
            custom_field_values: Default::default(),
            tags: Default::default(),
            claimed_by: None,
            claimed_at: None,
            first_response_at: None,
            response_time_hours: None,
        }
    }
}
