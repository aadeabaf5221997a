//! Serialization tests for persisted guild records.

use chrono::{Duration, TimeZone, Utc};
use std::collections::{BTreeMap, BTreeSet};
use vigil_core::{
    ActiveTicket, ClosedTicket, Closer, GuildConfig, SurveyAnswer, TicketConfig,
    TranscriptFormat,
};

fn active(id: &str, number: u64) -> ActiveTicket {
    let created = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::hours(number as i64);
    ActiveTicket {
        id: id.to_string(),
        number,
        channel_id: 1000 + number,
        channel_name: format!("ticket-{}", number),
        creator_id: 42,
        category_name: "Bug".to_string(),
        title: "Crash".to_string(),
        description: "It crashes".to_string(),
        is_anonymous: false,
        created_at: created,
        last_activity: created,
        custom_field_values: BTreeMap::from([("Version".to_string(), "1.2".to_string())]),
        tags: BTreeSet::from(["bug".to_string()]),
        claimed_by: Some(7),
        claimed_at: Some(created),
        first_response_at: None,
        response_time_hours: None,
    }
}

#[test]
fn test_round_trip_is_lossless() {
    let mut config = GuildConfig::new(555);
    config.ticket.ticket_counter = 2;
    config.ticket.transcript_format = TranscriptFormat::Both;
    config.ticket.active_tickets.insert("a".to_string(), active("a", 2));
    let mut closed = ClosedTicket::from_active(
        active("b", 1),
        Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap(),
        Closer::Auto,
        Some("Inactivity".to_string()),
        Some(77),
    );
    closed.rating = Some(4);
    closed.survey_responses = Some(vec![SurveyAnswer::new("Q", "A")]);
    config.ticket.closed_tickets.insert("b".to_string(), closed);

    let json = serde_json::to_string_pretty(&config).expect("serialize");
    let back: GuildConfig = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, config);
    assert!(json.contains("\"closed_by\": \"AUTO\""));
}

#[test]
fn test_unknown_fields_survive() {
    let json = r#"{
        "guild_id": 9,
        "ticket": { "ticket_counter": 5, "legacy_flag": true },
        "welcome_cards": { "enabled": true }
    }"#;
    let config: GuildConfig = serde_json::from_str(json).expect("parse");
    assert_eq!(config.guild_id, 9);
    assert_eq!(config.ticket.ticket_counter, 5);
    assert!(config.extra.contains_key("welcome_cards"));

    let written = serde_json::to_value(&config).expect("serialize");
    assert_eq!(written["welcome_cards"]["enabled"], true);
}

#[test]
fn test_old_file_gains_new_defaults() {
    let json = r#"{ "guild_id": 3, "ticket": { "enabled": false, "categories": [ { "name": "Bug" } ] } }"#;
    let config: GuildConfig = serde_json::from_str(json).expect("parse");
    let defaults = TicketConfig::default();
    assert!(!config.ticket.enabled);
    assert_eq!(config.ticket.categories.len(), 1);
    assert_eq!(config.ticket.categories[0].emoji, "🎫");
    assert_eq!(config.ticket.naming_format, defaults.naming_format);
    assert_eq!(config.ticket.survey_questions, defaults.survey_questions);
}

#[test]
fn test_trim_closed_drops_oldest() {
    let mut config = TicketConfig::default();
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    for n in 0..5u64 {
        let id = format!("t{}", n);
        let closed = ClosedTicket::from_active(
            active(&id, n),
            base + Duration::days(n as i64 + 10),
            Closer::Member(1),
            None,
            None,
        );
        config.closed_tickets.insert(id, closed);
    }
    assert_eq!(config.trim_closed(3), 2);
    let kept: Vec<&str> = config.closed_tickets.keys().map(String::as_str).collect();
    assert_eq!(kept, vec!["t2", "t3", "t4"]);
}
