//! Per-guild ticket configuration.
//!
//! Every field carries a serde default so files written by older versions
//! load cleanly; missing fields pick up the canonical default.

use crate::{ActiveTicket, ClosedTicket, TicketStats};
use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Maximum number of custom fields a category may define.
pub const MAX_CUSTOM_FIELDS: usize = 5;
/// Maximum number of survey questions.
pub const MAX_SURVEY_QUESTIONS: usize = 5;
/// Maximum number of closed tickets retained per guild.
pub const MAX_CLOSED_TICKETS: usize = 1000;
/// Maximum title length in characters.
pub const MAX_TITLE_LEN: usize = 100;
/// Maximum description length in characters.
pub const MAX_DESCRIPTION_LEN: usize = 1000;

/// Transcript output format.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TranscriptFormat {
    /// Plain text
    #[default]
    Text,
    /// Self-contained HTML document
    Html,
    /// Comma separated rows
    Csv,
    /// Text plus HTML as a second attachment
    Both,
}

/// Visual style of the panel button.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ButtonStyle {
    /// Blurple
    #[default]
    Primary,
    /// Grey
    Secondary,
    /// Green
    Success,
    /// Red
    Danger,
}

/// A free-form field shown in the creation form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_new::new)]
pub struct CustomField {
    /// Field label, also the key in `custom_field_values`
    #[new(into)]
    pub name: String,
    /// Placeholder text
    #[serde(default)]
    #[new(default)]
    pub placeholder: String,
    /// Whether a value must be supplied
    #[serde(default)]
    #[new(default)]
    pub required: bool,
    /// Multi-line input
    #[serde(default)]
    #[new(default)]
    pub long: bool,
    /// Maximum value length
    #[serde(default = "default_field_max_length")]
    #[new(value = "default_field_max_length()")]
    pub max_length: u32,
}

fn default_field_max_length() -> u32 {
    1000
}

/// A ticket category offered in the picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketCategory {
    /// Category name (unique per guild)
    pub name: String,
    /// Picker description
    #[serde(default)]
    pub description: String,
    /// Picker emoji
    #[serde(default = "default_category_emoji")]
    pub emoji: String,
    /// Embed color (24-bit RGB)
    #[serde(default = "default_category_color")]
    pub color: u32,
    /// Extra form fields, at most five
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    /// Roles allowed to open this category; empty means open to everyone
    #[serde(default)]
    pub required_roles: BTreeSet<u64>,
    /// Tags applied when a ticket is created
    #[serde(default)]
    pub auto_tags: BTreeSet<String>,
    /// Display and sort priority
    #[serde(default)]
    pub priority_level: i32,
    /// Welcome text replacing the guild default
    #[serde(default)]
    pub custom_welcome: Option<String>,
}

impl TicketCategory {
    /// Category with default presentation and no restrictions.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            emoji: default_category_emoji(),
            color: default_category_color(),
            custom_fields: Vec::new(),
            required_roles: BTreeSet::new(),
            auto_tags: BTreeSet::new(),
            priority_level: 0,
            custom_welcome: None,
        }
    }
}

fn default_category_emoji() -> String {
    "🎫".to_string()
}

fn default_category_color() -> u32 {
    0x5865F2
}

/// Appearance of the ticket panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelSettings {
    /// Embed title
    #[serde(default = "default_panel_title")]
    pub title: String,
    /// Embed description
    #[serde(default = "default_panel_description")]
    pub description: String,
    /// Button label
    #[serde(default = "default_button_label")]
    pub button_label: String,
    /// Button emoji
    #[serde(default = "default_category_emoji")]
    pub button_emoji: String,
    /// Button style
    #[serde(default)]
    pub button_style: ButtonStyle,
    /// Embed footer
    #[serde(default)]
    pub footer: Option<String>,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            title: default_panel_title(),
            description: default_panel_description(),
            button_label: default_button_label(),
            button_emoji: default_category_emoji(),
            button_style: ButtonStyle::default(),
            footer: None,
        }
    }
}

fn default_panel_title() -> String {
    "Support Tickets".to_string()
}

fn default_panel_description() -> String {
    "Need help? Click the button below to open a private ticket with our team.".to_string()
}

fn default_button_label() -> String {
    "Create Ticket".to_string()
}

/// Ticket settings and records for one guild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketConfig {
    /// Guild switch
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Channel holding the panel
    #[serde(default)]
    pub panel_channel_id: Option<u64>,
    /// Panel message, replaced on each post
    #[serde(default)]
    pub panel_message_id: Option<u64>,
    /// Channel receiving transcripts and feedback
    #[serde(default)]
    pub transcript_channel_id: Option<u64>,
    /// Channel category new ticket channels are created under
    #[serde(default)]
    pub parent_category_id: Option<u64>,
    /// Channel notified on creation
    #[serde(default)]
    pub creation_notification_channel: Option<u64>,
    /// Channel notified on close
    #[serde(default)]
    pub close_notification_channel: Option<u64>,

    /// Roles that staff tickets
    #[serde(default)]
    pub support_role_ids: BTreeSet<u64>,
    /// Roles with full ticket administration
    #[serde(default)]
    pub admin_role_ids: BTreeSet<u64>,
    /// Users barred from opening tickets
    #[serde(default)]
    pub blacklisted_user_ids: BTreeSet<u64>,

    /// Ordered category list
    #[serde(default = "default_categories")]
    pub categories: Vec<TicketCategory>,

    /// Last assigned ticket number
    #[serde(default)]
    pub ticket_counter: u64,
    /// Open tickets by id
    #[serde(default)]
    pub active_tickets: BTreeMap<String, ActiveTicket>,
    /// Closed tickets by id, bounded
    #[serde(default)]
    pub closed_tickets: BTreeMap<String, ClosedTicket>,

    /// Channel name template; `{number}` and `{user}` are substituted
    #[serde(default = "default_naming_format")]
    pub naming_format: String,
    /// Seconds a user waits between creations
    #[serde(default = "default_cooldown")]
    pub ticket_cooldown_secs: u64,
    /// Open tickets allowed per user
    #[serde(default = "default_max_open")]
    pub max_open_tickets_per_user: u32,
    /// Idle hours before the reaper closes a ticket; zero disables
    #[serde(default)]
    pub auto_close_hours: u64,
    /// Creators may close their own tickets
    #[serde(default = "default_true")]
    pub allow_user_close: bool,
    /// Anonymous tickets may be opened
    #[serde(default)]
    pub allow_anonymous: bool,
    /// Closing requires a reason
    #[serde(default)]
    pub require_reason_to_close: bool,
    /// DM the creator when the ticket closes
    #[serde(default = "default_true")]
    pub dm_on_close: bool,
    /// DM the creator when staff reply
    #[serde(default)]
    pub dm_on_reply: bool,
    /// Ask for confirmation before closing
    #[serde(default = "default_true")]
    pub close_confirmation: bool,
    /// Claiming enabled
    #[serde(default = "default_true")]
    pub claim_system: bool,
    /// Post-close star rating enabled
    #[serde(default = "default_true")]
    pub rating_system: bool,
    /// Tagging enabled
    #[serde(default = "default_true")]
    pub tags_enabled: bool,
    /// Tags staff may apply
    #[serde(default = "default_tags")]
    pub available_tags: BTreeSet<String>,
    /// Emoji shown next to each tag
    #[serde(default)]
    pub tag_emojis: BTreeMap<String, String>,

    /// Transcript renderer
    #[serde(default)]
    pub transcript_format: TranscriptFormat,
    /// `UTC` or a fixed offset such as `+02:00`
    #[serde(default = "default_timezone")]
    pub transcript_timezone: String,
    /// List attachment URLs in transcripts
    #[serde(default = "default_true")]
    pub transcript_include_attachments: bool,

    /// Pin the welcome message
    #[serde(default = "default_true")]
    pub pin_welcome: bool,
    /// Default welcome text
    #[serde(default = "default_welcome")]
    pub welcome_message: String,
    /// Panel appearance
    #[serde(default)]
    pub panel: PanelSettings,

    /// Post-close survey enabled
    #[serde(default)]
    pub survey_enabled: bool,
    /// Survey questions, at most five
    #[serde(default = "default_survey_questions")]
    pub survey_questions: Vec<String>,
    /// Collect details with a multi-step form
    #[serde(default)]
    pub form_mode: bool,

    /// Counters and running averages
    #[serde(default)]
    pub stats: TicketStats,
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            panel_channel_id: None,
            panel_message_id: None,
            transcript_channel_id: None,
            parent_category_id: None,
            creation_notification_channel: None,
            close_notification_channel: None,
            support_role_ids: BTreeSet::new(),
            admin_role_ids: BTreeSet::new(),
            blacklisted_user_ids: BTreeSet::new(),
            categories: default_categories(),
            ticket_counter: 0,
            active_tickets: BTreeMap::new(),
            closed_tickets: BTreeMap::new(),
            naming_format: default_naming_format(),
            ticket_cooldown_secs: default_cooldown(),
            max_open_tickets_per_user: default_max_open(),
            auto_close_hours: 0,
            allow_user_close: true,
            allow_anonymous: false,
            require_reason_to_close: false,
            dm_on_close: true,
            dm_on_reply: false,
            close_confirmation: true,
            claim_system: true,
            rating_system: true,
            tags_enabled: true,
            available_tags: default_tags(),
            tag_emojis: BTreeMap::new(),
            transcript_format: TranscriptFormat::default(),
            transcript_timezone: default_timezone(),
            transcript_include_attachments: true,
            pin_welcome: true,
            welcome_message: default_welcome(),
            panel: PanelSettings::default(),
            survey_enabled: false,
            survey_questions: default_survey_questions(),
            form_mode: false,
            stats: TicketStats::default(),
        }
    }
}

impl TicketConfig {
    /// Look up a category by name, case-insensitively.
    pub fn category(&self, name: &str) -> Option<&TicketCategory> {
        self.categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Active ticket living in `channel_id`.
    pub fn ticket_by_channel(&self, channel_id: u64) -> Option<&ActiveTicket> {
        self.active_tickets
            .values()
            .find(|t| t.channel_id == channel_id)
    }

    /// Number of open tickets created by `user_id`.
    pub fn open_count(&self, user_id: u64) -> usize {
        self.active_tickets
            .values()
            .filter(|t| t.creator_id == user_id)
            .count()
    }

    /// Render the channel name for ticket `number` opened by `user_name`.
    ///
    /// Characters Discord rejects in channel names are replaced by `-`.
    pub fn channel_name(&self, number: u64, user_name: &str) -> String {
        let raw = self
            .naming_format
            .replace("{number}", &number.to_string())
            .replace("{user}", user_name);
        let cleaned: String = raw
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        cleaned.chars().take(100).collect()
    }

    /// Parse `transcript_timezone` into a fixed offset.
    ///
    /// Accepts fixed offsets (`UTC`, `+HH:MM`, `UTC-05:00`) and IANA zone
    /// names such as `Europe/Berlin`. Returns `None` for anything else.
    pub fn transcript_zone(&self) -> Option<TranscriptZone> {
        TranscriptZone::parse(&self.transcript_timezone)
    }

    /// Drop the oldest closed tickets until at most `limit` remain.
    ///
    /// Returns the number removed.
    pub fn trim_closed(&mut self, limit: usize) -> usize {
        let excess = self.closed_tickets.len().saturating_sub(limit);
        if excess == 0 {
            return 0;
        }
        let mut by_age: Vec<(chrono::DateTime<chrono::Utc>, String)> = self
            .closed_tickets
            .iter()
            .map(|(id, t)| (t.closed_at, id.clone()))
            .collect();
        by_age.sort();
        for (_, id) in by_age.into_iter().take(excess) {
            self.closed_tickets.remove(&id);
        }
        excess
    }
}

/// Parse a timezone label into a fixed UTC offset.
///
/// # Examples
///
/// ```
/// use vigil_core::parse_utc_offset;
///
/// assert_eq!(parse_utc_offset("UTC").map(|o| o.local_minus_utc()), Some(0));
/// assert_eq!(parse_utc_offset("+02:00").map(|o| o.local_minus_utc()), Some(7200));
/// assert_eq!(parse_utc_offset("-05:30").map(|o| o.local_minus_utc()), Some(-19800));
/// assert!(parse_utc_offset("Mars/Olympus").is_none());
/// ```
pub fn parse_utc_offset(label: &str) -> Option<FixedOffset> {
    let label = label.trim();
    let rest = label
        .strip_prefix("UTC")
        .or_else(|| label.strip_prefix("GMT"))
        .unwrap_or(label);
    if rest.is_empty() || rest == "Z" || label == "Z" {
        return FixedOffset::east_opt(0);
    }
    let (sign, digits) = match rest.as_bytes().first()? {
        b'+' => (1, &rest[1..]),
        b'-' => (-1, &rest[1..]),
        _ => return None,
    };
    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None => (digits.parse::<i32>().ok()?, 0),
    };
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Timezone transcripts are rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptZone {
    /// Constant offset from UTC
    Fixed(FixedOffset),
    /// Named zone with daylight saving rules
    Named(Tz),
}

impl TranscriptZone {
    /// UTC itself.
    pub fn utc() -> Self {
        Self::Named(Tz::UTC)
    }

    /// Parse a fixed offset or an IANA zone name.
    ///
    /// # Examples
    ///
    /// ```
    /// use vigil_core::TranscriptZone;
    ///
    /// assert!(matches!(TranscriptZone::parse("+02:00"), Some(TranscriptZone::Fixed(_))));
    /// assert!(matches!(TranscriptZone::parse("Europe/Berlin"), Some(TranscriptZone::Named(_))));
    /// assert!(TranscriptZone::parse("Mars/Olympus").is_none());
    /// ```
    pub fn parse(label: &str) -> Option<Self> {
        parse_utc_offset(label)
            .map(Self::Fixed)
            .or_else(|| label.trim().parse::<Tz>().ok().map(Self::Named))
    }

    /// `at` expressed as local time in this zone.
    pub fn localize(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            Self::Fixed(offset) => at.with_timezone(offset),
            Self::Named(tz) => at.with_timezone(tz).fixed_offset(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_categories() -> Vec<TicketCategory> {
    vec![TicketCategory::new(
        "General Support",
        "Questions and general help",
    )]
}

fn default_naming_format() -> String {
    "ticket-{number}".to_string()
}

fn default_cooldown() -> u64 {
    300
}

fn default_max_open() -> u32 {
    3
}

fn default_tags() -> BTreeSet<String> {
    ["urgent", "bug", "question", "billing"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_welcome() -> String {
    "Thank you for opening a ticket. A member of the support team will be with you shortly."
        .to_string()
}

fn default_survey_questions() -> Vec<String> {
    vec![
        "How satisfied are you with the support you received?".to_string(),
        "Is there anything we could have done better?".to_string(),
    ]
}
