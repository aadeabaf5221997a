//! Ticket records and statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

/// An open ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveTicket {
    /// UUID string, unique across active and closed tickets
    pub id: String,
    /// Guild-scoped sequence number
    pub number: u64,
    /// Dedicated channel
    pub channel_id: u64,
    /// Channel name at creation, used for transcript file names
    #[serde(default)]
    pub channel_name: String,
    /// Creator, kept for audit even on anonymous tickets
    pub creator_id: u64,
    /// Category the ticket was opened in
    pub category_name: String,
    /// Short summary
    pub title: String,
    /// Problem description
    #[serde(default)]
    pub description: String,
    /// Creator hidden from staff
    #[serde(default)]
    pub is_anonymous: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last non-bot message
    pub last_activity: DateTime<Utc>,
    /// Answers to category custom fields
    #[serde(default)]
    pub custom_field_values: BTreeMap<String, String>,
    /// Applied tags
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Staff member holding the claim
    #[serde(default)]
    pub claimed_by: Option<u64>,
    /// When the claim was made
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
    /// First staff reply
    #[serde(default)]
    pub first_response_at: Option<DateTime<Utc>>,
    /// Hours from creation to first staff reply
    #[serde(default)]
    pub response_time_hours: Option<f64>,
}

impl ActiveTicket {
    /// Current lifecycle state.
    pub fn state(&self) -> TicketState {
        if self.claimed_by.is_some() {
            TicketState::Claimed
        } else {
            TicketState::Open
        }
    }

    /// Hours since the last recorded activity.
    pub fn idle_hours(&self, now: DateTime<Utc>) -> f64 {
        hours_between(self.last_activity, now)
    }

    /// Name shown to staff: the creator mention, or a neutral label when
    /// the ticket is anonymous.
    pub fn creator_label(&self) -> String {
        if self.is_anonymous {
            "Anonymous".to_string()
        } else {
            format!("<@{}>", self.creator_id)
        }
    }

    /// Channel topic line, e.g. `Ticket #4 | Bug | <@42> | Tags: bug, urgent`.
    pub fn topic(&self) -> String {
        let mut topic = format!(
            "Ticket #{} | {} | {}",
            self.number,
            self.category_name,
            self.creator_label()
        );
        if !self.tags.is_empty() {
            let tags: Vec<&str> = self.tags.iter().map(String::as_str).collect();
            topic.push_str(" | Tags: ");
            topic.push_str(&tags.join(", "));
        }
        topic
    }
}

/// Lifecycle states of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum TicketState {
    /// Waiting for staff
    Open,
    /// A staff member claimed it
    Claimed,
    /// Close in progress
    Closing,
    /// Terminal
    Closed,
}

/// Who closed a ticket.
///
/// Persisted as the member id, or the string `"AUTO"` for the reaper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Closer {
    /// A member closed it
    Member(u64),
    /// The reaper closed it for inactivity
    Auto,
}

impl std::fmt::Display for Closer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Closer::Member(id) => write!(f, "<@{}>", id),
            Closer::Auto => write!(f, "AUTO"),
        }
    }
}

impl Serialize for Closer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Closer::Member(id) => serializer.serialize_u64(*id),
            Closer::Auto => serializer.serialize_str("AUTO"),
        }
    }
}

impl<'de> Deserialize<'de> for Closer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Id(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Id(id) => Ok(Closer::Member(id)),
            Raw::Text(text) if text.eq_ignore_ascii_case("auto") => Ok(Closer::Auto),
            Raw::Text(text) => text
                .parse::<u64>()
                .map(Closer::Member)
                .map_err(|_| serde::de::Error::custom(format!("invalid closer: {}", text))),
        }
    }
}

/// One answered survey question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
pub struct SurveyAnswer {
    /// Question text
    #[new(into)]
    pub question: String,
    /// Free-form answer
    #[new(into)]
    pub answer: String,
}

/// A closed ticket: the active record plus closure annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTicket {
    /// The ticket as it was when closing started
    #[serde(flatten)]
    pub ticket: ActiveTicket,
    /// Close time
    pub closed_at: DateTime<Utc>,
    /// Member id or `AUTO`
    pub closed_by: Closer,
    /// Reason supplied on close
    #[serde(default)]
    pub close_reason: Option<String>,
    /// Hours from creation to close
    pub resolution_time_hours: f64,
    /// Star rating from the creator
    #[serde(default)]
    pub rating: Option<u8>,
    /// Survey answers from the creator
    #[serde(default)]
    pub survey_responses: Option<Vec<SurveyAnswer>>,
    /// Message in the transcript channel carrying the transcript
    #[serde(default)]
    pub transcript_message_id: Option<u64>,
}

impl ClosedTicket {
    /// Close `ticket` at `closed_at`.
    pub fn from_active(
        ticket: ActiveTicket,
        closed_at: DateTime<Utc>,
        closed_by: Closer,
        close_reason: Option<String>,
        transcript_message_id: Option<u64>,
    ) -> Self {
        let resolution_time_hours = hours_between(ticket.created_at, closed_at);
        Self {
            ticket,
            closed_at,
            closed_by,
            close_reason,
            resolution_time_hours,
            rating: None,
            survey_responses: None,
            transcript_message_id,
        }
    }
}

/// Created and closed counts for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryStats {
    /// Tickets created
    #[serde(default)]
    pub created: u64,
    /// Tickets closed
    #[serde(default)]
    pub closed: u64,
}

/// Guild ticket counters and running averages.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TicketStats {
    /// Tickets ever created
    #[serde(default)]
    pub total_created: u64,
    /// Tickets ever closed
    #[serde(default)]
    pub total_closed: u64,
    /// Per-category counters
    #[serde(default)]
    pub categories: BTreeMap<String, CategoryStats>,
    /// Mean hours to first staff reply
    #[serde(default)]
    pub avg_response_time_hours: f64,
    /// Tickets contributing to the response average
    #[serde(default)]
    pub responded_tickets: u64,
    /// Mean hours to close
    #[serde(default)]
    pub avg_resolution_time_hours: f64,
    /// Tickets contributing to the resolution average
    #[serde(default)]
    pub resolved_tickets: u64,
    /// Sum of all star ratings
    #[serde(default)]
    pub rating_total: u64,
    /// Number of ratings
    #[serde(default)]
    pub rating_count: u64,
}

impl TicketStats {
    /// Count a creation.
    pub fn record_created(&mut self, category: &str) {
        self.total_created += 1;
        self.categories.entry(category.to_string()).or_default().created += 1;
    }

    /// Count a close and fold its resolution time into the average.
    pub fn record_closed(&mut self, category: &str, resolution_hours: f64) {
        self.total_closed += 1;
        self.categories.entry(category.to_string()).or_default().closed += 1;
        self.avg_resolution_time_hours = running_average(
            self.avg_resolution_time_hours,
            self.resolved_tickets,
            resolution_hours,
        );
        self.resolved_tickets += 1;
    }

    /// Fold a first-response time into the average.
    pub fn record_response(&mut self, response_hours: f64) {
        self.avg_response_time_hours = running_average(
            self.avg_response_time_hours,
            self.responded_tickets,
            response_hours,
        );
        self.responded_tickets += 1;
    }

    /// Count a star rating.
    pub fn record_rating(&mut self, stars: u8) {
        self.rating_total += u64::from(stars);
        self.rating_count += 1;
    }

    /// Mean star rating, if any were given.
    pub fn average_rating(&self) -> Option<f64> {
        (self.rating_count > 0).then(|| self.rating_total as f64 / self.rating_count as f64)
    }
}

/// `(avg * n + x) / (n + 1)`.
pub fn running_average(avg: f64, n: u64, x: f64) -> f64 {
    (avg * n as f64 + x) / (n as f64 + 1.0)
}

/// Fractional hours from `from` to `to`, never negative.
pub fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let millis = (to - from).num_milliseconds().max(0);
    millis as f64 / 3_600_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ticket() -> ActiveTicket {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        ActiveTicket {
            id: "abc".to_string(),
            number: 4,
            channel_id: 10,
            channel_name: "ticket-4".to_string(),
            creator_id: 42,
            category_name: "Bug".to_string(),
            title: "Crash".to_string(),
            description: String::new(),
            is_anonymous: false,
            created_at: created,
            last_activity: created,
            custom_field_values: BTreeMap::new(),
            tags: BTreeSet::new(),
            claimed_by: None,
            claimed_at: None,
            first_response_at: None,
            response_time_hours: None,
        }
    }

    #[test]
    fn test_topic_with_and_without_tags() {
        let mut t = ticket();
        assert_eq!(t.topic(), "Ticket #4 | Bug | <@42>");
        t.tags.insert("urgent".to_string());
        t.tags.insert("bug".to_string());
        assert_eq!(t.topic(), "Ticket #4 | Bug | <@42> | Tags: bug, urgent");
        t.is_anonymous = true;
        assert!(!t.topic().contains("42"));
    }

    #[test]
    fn test_closer_serde() {
        assert_eq!(serde_json::to_string(&Closer::Auto).unwrap(), "\"AUTO\"");
        assert_eq!(serde_json::to_string(&Closer::Member(7)).unwrap(), "7");
        let parsed: Closer = serde_json::from_str("\"AUTO\"").unwrap();
        assert_eq!(parsed, Closer::Auto);
        let parsed: Closer = serde_json::from_str("\"99\"").unwrap();
        assert_eq!(parsed, Closer::Member(99));
    }

    #[test]
    fn test_resolution_hours() {
        let t = ticket();
        let closed_at = t.created_at + Duration::minutes(90);
        let closed = ClosedTicket::from_active(t, closed_at, Closer::Auto, None, None);
        assert!((closed.resolution_time_hours - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_running_averages() {
        let mut stats = TicketStats::default();
        stats.record_closed("Bug", 2.0);
        stats.record_closed("Bug", 4.0);
        assert_eq!(stats.total_closed, 2);
        assert!((stats.avg_resolution_time_hours - 3.0).abs() < 1e-9);
        assert_eq!(stats.categories["Bug"].closed, 2);
        assert!(stats.average_rating().is_none());
        stats.record_rating(5);
        stats.record_rating(3);
        assert_eq!(stats.average_rating(), Some(4.0));
    }
}
