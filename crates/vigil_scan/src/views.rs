//! Cards, panels and pages the scan subsystem posts.

use crate::ScanWidget;
use vigil_core::{ButtonStyle, GuildScanConfig, ScanGlobalConfig, ScanRecord};
use vigil_interface::{ActionRow, Component, Embed, INFO_COLOR, OutgoingMessage};
use vigil_storage::{Page, ScanStats};

const MAX_THREAT_LINES: usize = 5;
const WARNING_COLOR: u32 = 0xE67E22;

fn detection_counts(record: &ScanRecord) -> String {
    let stats = &record.verdict_snapshot.stats;
    format!(
        "🔴 Malicious: {}\n🟠 Suspicious: {}\n🟢 Harmless: {}\n⚪ Undetected: {}",
        stats.malicious, stats.suspicious, stats.harmless, stats.undetected
    )
}

fn scanned_at(record: &ScanRecord) -> String {
    record
        .verdict_snapshot
        .analyzed_at()
        .unwrap_or(record.timestamp)
        .format("%Y-%m-%d %H:%M:%S UTC")
        .to_string()
}

/// Result card posted in the channel the scan came from.
pub fn result_card(record: &ScanRecord) -> OutgoingMessage {
    let severity = record.verdict_snapshot.stats.severity();
    let mut embed = Embed::new("🛡️ Scan result")
        .with_color(Some(severity.color()))
        .field("File", record.filename.clone(), true)
        .field("SHA-256", format!("`{}`", record.sha_prefix()), true)
        .field("Status", severity.label(), true)
        .field("Detections", detection_counts(record), false)
        .field("Scanned", scanned_at(record), true)
        .field("Requested by", format!("<@{}>", record.user_id), true);

    let threats = record.verdict_snapshot.top_threats(MAX_THREAT_LINES);
    if !threats.is_empty() {
        let lines: Vec<String> = threats
            .iter()
            .map(|(engine, threat)| format!("{}: {}", engine, threat))
            .collect();
        embed = embed.field("Threats", lines.join("\n"), false);
    }

    OutgoingMessage::embed(embed).with_row(ActionRow::new(vec![
        Component::button(
            ScanWidget::Details {
                sha: record.sha_prefix().to_string(),
            },
            "Details",
            ButtonStyle::Primary,
        ),
        Component::button(ScanWidget::History { page: None }, "History", ButtonStyle::Secondary),
        Component::button(
            ScanWidget::Delete {
                owner: record.user_id,
            },
            "Delete",
            ButtonStyle::Danger,
        ),
    ]))
}

/// Alert for a file with detections.
pub fn threat_alert(record: &ScanRecord) -> OutgoingMessage {
    let severity = record.verdict_snapshot.stats.severity();
    let embed = Embed::new(format!("⚠️ {} file detected", severity))
        .with_description(Some(format!(
            "<@{}> scanned **{}** in <#{}>.",
            record.user_id, record.filename, record.channel_id
        )))
        .with_color(Some(severity.color()))
        .field("SHA-256", format!("`{}`", record.sha256), false)
        .field("Detections", detection_counts(record), false);
    OutgoingMessage::embed(embed)
}

/// Failure card for a scan that did not complete.
pub fn failure_card(filename: &str, message: &str) -> OutgoingMessage {
    OutgoingMessage::embed(
        Embed::error(message).with_footer(Some(format!("File: {}", filename))),
    )
}

/// Scan panel with upload, history and info buttons.
pub fn panel_message() -> OutgoingMessage {
    let embed = Embed::new("🛡️ File scanner")
        .with_description(Some(
            "Check a file against dozens of antivirus engines before you open it.".to_string(),
        ))
        .with_color(Some(INFO_COLOR));
    OutgoingMessage::embed(embed).with_row(ActionRow::new(vec![
        Component::button(ScanWidget::Upload, "Upload and scan", ButtonStyle::Primary)
            .with_emoji("📤"),
        Component::button(ScanWidget::History { page: None }, "View history", ButtonStyle::Secondary)
            .with_emoji("📜"),
        Component::button(ScanWidget::Info, "Scanner info", ButtonStyle::Secondary)
            .with_emoji("ℹ️"),
    ]))
}

/// Prompt shown while waiting for an upload.
pub fn upload_prompt(timeout_secs: u64) -> Embed {
    Embed::new("📤 Waiting for your file")
        .with_description(Some(format!(
            "Upload the file in this channel within {} seconds.",
            timeout_secs
        )))
        .with_color(Some(INFO_COLOR))
}

/// Notice posted when no upload arrived in time.
pub fn upload_timeout(user_id: u64) -> OutgoingMessage {
    OutgoingMessage::embed(
        Embed::new("⏱️ Upload window closed")
            .with_description(Some(format!(
                "<@{}>, no file arrived in time. Press the button again to retry.",
                user_id
            )))
            .with_color(Some(WARNING_COLOR)),
    )
}

/// One page of scan history with pager buttons.
pub fn history_page(page: &Page<ScanRecord>, admin: bool) -> OutgoingMessage {
    let title = if admin {
        "📜 Scan history (server)"
    } else {
        "📜 Your scan history"
    };
    let mut embed = Embed::new(title).with_color(Some(INFO_COLOR)).with_footer(Some(format!(
        "Page {}/{} · {} scans",
        page.index() + 1,
        page.total_pages(),
        page.total_items()
    )));
    if page.items().is_empty() {
        embed = embed.with_description(Some("No scans yet.".to_string()));
    }
    for record in page.items() {
        let who = if admin {
            format!(" by <@{}>", record.user_id)
        } else {
            String::new()
        };
        embed = embed.field(
            format!("{} {}", record.verdict_snapshot.stats.severity().label(), record.filename),
            format!(
                "`{}`{} · {}",
                record.sha_prefix(),
                who,
                record.timestamp.format("%Y-%m-%d %H:%M")
            ),
            false,
        );
    }

    let target = |page: usize| {
        if admin {
            ScanWidget::AdminHistory { page: Some(page) }
        } else {
            ScanWidget::History { page: Some(page) }
        }
    };
    let mut previous = Component::button(
        target(page.index().saturating_sub(1)),
        "Previous",
        ButtonStyle::Secondary,
    );
    if !page.has_previous() {
        previous = previous.disabled();
    }
    let mut next = Component::button(target(page.index() + 1), "Next", ButtonStyle::Secondary);
    if !page.has_next() {
        next = next.disabled();
    }
    OutgoingMessage::embed(embed).with_row(ActionRow::new(vec![previous, next]))
}

/// Every engine that flagged the file, plus the full digest.
pub fn details(record: &ScanRecord) -> Embed {
    let severity = record.verdict_snapshot.stats.severity();
    let mut embed = Embed::new(format!("🔎 {}", record.filename))
        .with_color(Some(severity.color()))
        .field("SHA-256", format!("`{}`", record.sha256), false)
        .field("Size", format!("{} bytes", record.size_bytes), true)
        .field("Status", severity.label(), true)
        .field("Detections", detection_counts(record), false);
    let flagged = record.verdict_snapshot.top_threats(usize::MAX);
    if flagged.is_empty() {
        embed = embed.with_description(Some("No engine flagged this file.".to_string()));
    } else {
        let lines: Vec<String> = flagged
            .iter()
            .map(|(engine, threat)| format!("• {}: {}", engine, threat))
            .collect();
        embed = embed.with_description(Some(lines.join("\n")));
    }
    embed
}

/// Scanner settings for a guild. The API key is reported only as present
/// or absent.
pub fn info(global: &ScanGlobalConfig, guild: &GuildScanConfig) -> Embed {
    let yes_no = |on: bool| if on { "Yes" } else { "No" };
    let channels = |ids: &std::collections::BTreeSet<u64>| {
        if ids.is_empty() {
            "Any".to_string()
        } else {
            ids.iter()
                .map(|id| format!("<#{}>", id))
                .collect::<Vec<_>>()
                .join(", ")
        }
    };
    let auto = if guild.auto_scan_channels.is_empty() {
        "None".to_string()
    } else {
        channels(&guild.auto_scan_channels)
    };
    Embed::new("ℹ️ Scanner info")
        .with_color(Some(INFO_COLOR))
        .field("Enabled", yes_no(global.enabled && guild.enabled), true)
        .field("API key configured", yes_no(global.has_api_key()), true)
        .field("Max file size", format!("{} MB", global.max_file_size_mb), true)
        .field(
            "Rate limit",
            format!(
                "{} scans per {} minutes",
                guild.rate_limit.per_user, guild.rate_limit.window_minutes
            ),
            true,
        )
        .field("Role required", yes_no(guild.require_role), true)
        .field("Alerts", yes_no(guild.alerts_enabled), true)
        .field("Scan channels", channels(&guild.allowed_channels), false)
        .field("Auto-scan channels", auto, false)
}

/// Per-guild totals.
pub fn stats(stats: &ScanStats) -> Embed {
    Embed::new("📊 Scan statistics")
        .with_color(Some(INFO_COLOR))
        .field("Total scans", stats.total_scans().to_string(), true)
        .field("Malicious", stats.malicious().to_string(), true)
        .field("Suspicious", stats.suspicious().to_string(), true)
        .field("Clean", stats.clean().to_string(), true)
        .field("Unique users", stats.unique_users().to_string(), true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use vigil_core::{VerdictSnapshot, VerdictStats};

    fn record(malicious: u32) -> ScanRecord {
        ScanRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            guild_id: 1,
            user_id: 42,
            channel_id: 7,
            filename: "setup.exe".to_string(),
            size_bytes: 1024,
            sha256: "ab".repeat(32),
            verdict_snapshot: VerdictSnapshot {
                stats: VerdictStats {
                    malicious,
                    harmless: 10,
                    ..VerdictStats::default()
                },
                ..VerdictSnapshot::default()
            },
        }
    }

    #[test]
    fn test_result_card_color_and_widgets() {
        let card = result_card(&record(2));
        assert_eq!(card.embeds[0].color, Some(0xE74C3C));
        assert_eq!(
            card.custom_ids(),
            vec!["scan:details:abababababababab", "scan:history", "scan:delete:42"]
        );
        assert_eq!(result_card(&record(0)).embeds[0].color, Some(0x2ECC71));
    }

    #[test]
    fn test_info_never_shows_the_key() {
        let global = ScanGlobalConfig {
            api_key: Some("hunter2-key".to_string()),
            ..ScanGlobalConfig::default()
        };
        let embed = info(&global, &GuildScanConfig::default());
        let rendered = format!("{:?}", embed);
        assert!(!rendered.contains("hunter2-key"));
        assert!(embed.fields.iter().any(|f| f.value == "Yes"));
    }

    #[test]
    fn test_history_pager_disables_edges() {
        let records: Vec<ScanRecord> = (0..7).map(|_| record(0)).collect();
        let first = vigil_storage::paginate(&records, 0, 5);
        let message = history_page(&first, false);
        let row = &message.components[0].components;
        assert!(matches!(row[0], Component::Button { disabled: true, .. }));
        assert!(matches!(row[1], Component::Button { disabled: false, .. }));
        assert_eq!(row[1].custom_id(), Some("scan:history:1"));
    }
}
