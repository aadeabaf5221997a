//! Transcript rendering.
//!
//! Channel history is flattened into [`TranscriptEntry`] values once, then
//! rendered as plain text, a self-contained HTML page or CSV rows.

use chrono::{DateTime, FixedOffset, Utc};
use tracing::{debug, warn};
use vigil_core::{TicketConfig, TranscriptFormat, TranscriptZone};
use vigil_error::{TicketError, TicketErrorKind, TicketResult};
use vigil_interface::{EmbedSummary, FileAttachment, HistoryMessage};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One message as it appears in a transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    /// Post time in the transcript timezone
    pub timestamp: DateTime<FixedOffset>,
    /// Author display name
    pub author_name: String,
    /// Author user id
    pub author_id: u64,
    /// Author avatar URL
    pub author_avatar: Option<String>,
    /// Text content
    pub content: String,
    /// Attachment URLs, empty when attachments are excluded
    pub attachments: Vec<String>,
    /// One summary line per embed
    pub embeds: Vec<String>,
}

/// Header information shared by every renderer.
#[derive(Debug, Clone, PartialEq, Eq, derive_new::new)]
pub struct TranscriptHeader {
    /// Ticket channel name
    #[new(into)]
    pub channel_name: String,
    /// Guild id
    pub guild_id: u64,
    /// Generation time
    pub generated_at: DateTime<FixedOffset>,
}

/// Summary line for an embed: its title, else the first 50 characters of
/// its description, else `[Embed]`.
pub fn embed_summary(embed: &EmbedSummary) -> String {
    if let Some(title) = embed.title.as_deref().filter(|t| !t.is_empty()) {
        return title.to_string();
    }
    if let Some(description) = embed.description.as_deref().filter(|d| !d.is_empty()) {
        return description.chars().take(50).collect();
    }
    "[Embed]".to_string()
}

/// Flatten history into entries, converting timestamps to `zone`.
pub fn entries(
    history: &[HistoryMessage],
    zone: TranscriptZone,
    include_attachments: bool,
) -> Vec<TranscriptEntry> {
    history
        .iter()
        .map(|message| TranscriptEntry {
            timestamp: zone.localize(message.timestamp),
            author_name: message.author_name.clone(),
            author_id: message.author_id,
            author_avatar: message.author_avatar.clone(),
            content: message.content.clone(),
            attachments: if include_attachments {
                message.attachments.iter().map(|a| a.url.clone()).collect()
            } else {
                Vec::new()
            },
            embeds: message.embeds.iter().map(embed_summary).collect(),
        })
        .collect()
}

/// Plain text transcript.
pub fn render_text(header: &TranscriptHeader, entries: &[TranscriptEntry]) -> String {
    let mut out = String::new();
    out.push_str(&format!("Transcript of #{}\n", header.channel_name));
    out.push_str(&format!("Guild: {}\n", header.guild_id));
    out.push_str(&format!(
        "Generated: {} (UTC{})\n",
        header.generated_at.format(TIME_FORMAT),
        header.generated_at.format("%:z")
    ));
    out.push_str(&format!("Messages: {}\n", entries.len()));
    out.push_str(&"=".repeat(60));
    out.push('\n');

    for entry in entries {
        out.push_str(&format!(
            "[{}] {} ({}): {}\n",
            entry.timestamp.format(TIME_FORMAT),
            entry.author_name,
            entry.author_id,
            entry.content
        ));
        for url in &entry.attachments {
            out.push_str(&format!("    Attachment: {}\n", url));
        }
        for embed in &entry.embeds {
            out.push_str(&format!("    Embed: {}\n", embed));
        }
    }
    out
}

/// Escape `& < > " '` for HTML text and attribute values.
///
/// # Examples
///
/// ```
/// use vigil_ticket::escape_html;
///
/// assert_eq!(escape_html("<a href='x'>&\"</a>"), "&lt;a href=&#x27;x&#x27;&gt;&amp;&quot;&lt;/a&gt;");
/// ```
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

const HTML_STYLE: &str = "body{background:#36393f;color:#dcddde;font-family:Helvetica,Arial,sans-serif;margin:0;padding:20px}\
.header{border-bottom:1px solid #4f545c;margin-bottom:16px;padding-bottom:8px}\
.message{display:flex;margin:8px 0}\
.avatar{width:40px;height:40px;border-radius:50%;margin-right:12px;background:#5865f2}\
.author{font-weight:bold;color:#fff}\
.meta{font-size:12px;color:#72767d}\
.content{margin-top:4px;word-wrap:break-word}\
.attachment a{color:#00aff4}\
.embed{border-left:4px solid #5865f2;background:#2f3136;padding:4px 8px;margin-top:4px}\
.footer{border-top:1px solid #4f545c;margin-top:16px;padding-top:8px;font-size:12px;color:#72767d}";

/// Self-contained HTML transcript.
pub fn render_html(header: &TranscriptHeader, entries: &[TranscriptEntry]) -> String {
    let channel = escape_html(&header.channel_name);
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!("<title>Transcript of #{}</title>\n", channel));
    out.push_str(&format!("<style>{}</style>\n", HTML_STYLE));
    out.push_str("</head>\n<body>\n");
    out.push_str(&format!(
        "<div class=\"header\"><h1>#{}</h1><p>Guild {} &middot; {} messages</p></div>\n",
        channel,
        header.guild_id,
        entries.len()
    ));

    for entry in entries {
        out.push_str("<div class=\"message\">");
        match &entry.author_avatar {
            Some(url) => out.push_str(&format!(
                "<img class=\"avatar\" src=\"{}\" alt=\"\">",
                escape_html(url)
            )),
            None => out.push_str("<div class=\"avatar\"></div>"),
        }
        out.push_str("<div class=\"body\">");
        out.push_str(&format!(
            "<div><span class=\"author\">{}</span> <span class=\"meta\">({}) {}</span></div>",
            escape_html(&entry.author_name),
            entry.author_id,
            entry.timestamp.format(TIME_FORMAT)
        ));
        out.push_str(&format!(
            "<div class=\"content\">{}</div>",
            escape_html(&entry.content).replace('\n', "<br>")
        ));
        for url in &entry.attachments {
            let url = escape_html(url);
            out.push_str(&format!(
                "<div class=\"attachment\"><a href=\"{}\">{}</a></div>",
                url, url
            ));
        }
        for embed in &entry.embeds {
            out.push_str(&format!("<div class=\"embed\">{}</div>", escape_html(embed)));
        }
        out.push_str("</div></div>\n");
    }

    out.push_str(&format!(
        "<div class=\"footer\">Generated {} (UTC{})</div>\n</body>\n</html>\n",
        header.generated_at.format(TIME_FORMAT),
        header.generated_at.format("%:z")
    ));
    out
}

/// CSV transcript: `timestamp,author,author_id,content,attachments,embeds`.
///
/// Multiple attachments or embeds are joined with `;`.
pub fn render_csv(entries: &[TranscriptEntry]) -> TicketResult<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    let fail = |e: csv::Error| {
        TicketError::new(TicketErrorKind::TranscriptGenerationFailed(e.to_string()))
    };
    writer
        .write_record([
            "timestamp",
            "author",
            "author_id",
            "content",
            "attachments",
            "embeds",
        ])
        .map_err(fail)?;
    for entry in entries {
        writer
            .write_record([
                entry.timestamp.format(TIME_FORMAT).to_string(),
                entry.author_name.clone(),
                entry.author_id.to_string(),
                entry.content.clone(),
                entry.attachments.join(";"),
                entry.embeds.join(";"),
            ])
            .map_err(fail)?;
    }
    let bytes = writer.into_inner().map_err(|e| {
        TicketError::new(TicketErrorKind::TranscriptGenerationFailed(e.to_string()))
    })?;
    String::from_utf8(bytes)
        .map_err(|e| TicketError::new(TicketErrorKind::TranscriptGenerationFailed(e.to_string())))
}

/// Render history into transcript files per the guild settings.
///
/// `Both` yields the text file first and the HTML file second. An
/// unparseable timezone falls back to UTC.
pub fn build_transcript(
    config: &TicketConfig,
    channel_name: &str,
    guild_id: u64,
    history: &[HistoryMessage],
    now: DateTime<Utc>,
) -> TicketResult<Vec<FileAttachment>> {
    let zone = config.transcript_zone().unwrap_or_else(|| {
        warn!(
            timezone = %config.transcript_timezone,
            "Unknown transcript timezone, using UTC"
        );
        TranscriptZone::utc()
    });
    let header = TranscriptHeader::new(channel_name, guild_id, zone.localize(now));
    let entries = entries(history, zone, config.transcript_include_attachments);
    debug!(
        messages = entries.len(),
        format = %config.transcript_format,
        "Rendering transcript"
    );

    let file = |ext: &str, body: String| {
        FileAttachment::new(format!("transcript-{}.{}", channel_name, ext), body.into_bytes())
    };
    let files = match config.transcript_format {
        TranscriptFormat::Text => vec![file("txt", render_text(&header, &entries))],
        TranscriptFormat::Html => vec![file("html", render_html(&header, &entries))],
        TranscriptFormat::Csv => vec![file("csv", render_csv(&entries)?)],
        TranscriptFormat::Both => vec![
            file("txt", render_text(&header, &entries)),
            file("html", render_html(&header, &entries)),
        ],
    };
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use vigil_interface::AttachmentRef;

    fn message(id: u64, minute: u32, content: &str) -> HistoryMessage {
        HistoryMessage {
            id,
            author_id: 42,
            author_name: "Alice".to_string(),
            author_avatar: None,
            is_bot: false,
            content: content.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap(),
            attachments: vec![AttachmentRef::new("log.txt", "https://cdn/log.txt", 10)],
            embeds: vec![EmbedSummary {
                title: None,
                description: Some("x".repeat(80)),
            }],
        }
    }

    #[test]
    fn test_embed_summary_fallbacks() {
        let titled = EmbedSummary {
            title: Some("Welcome".into()),
            description: Some("body".into()),
        };
        assert_eq!(embed_summary(&titled), "Welcome");
        assert_eq!(embed_summary(&EmbedSummary::default()), "[Embed]");
        let long = EmbedSummary {
            title: None,
            description: Some("y".repeat(70)),
        };
        assert_eq!(embed_summary(&long).len(), 50);
    }

    #[test]
    fn test_timezone_shifts_timestamps() {
        let mut config = TicketConfig::default();
        config.transcript_timezone = "+02:00".to_string();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 13, 0, 0).unwrap();
        let files =
            build_transcript(&config, "ticket-1", 9, &[message(1, 5, "hi")], now).unwrap();
        let text = String::from_utf8(files[0].bytes.clone()).unwrap();
        assert!(text.contains("[2024-03-01 14:05:00] Alice (42): hi"));
        assert!(text.contains("    Attachment: https://cdn/log.txt"));
        assert_eq!(files[0].filename, "transcript-ticket-1.txt");
    }

    #[test]
    fn test_named_timezone_in_header_and_lines() {
        let mut config = TicketConfig::default();
        config.transcript_timezone = "Europe/Berlin".to_string();
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 8, 0, 0).unwrap();
        let files =
            build_transcript(&config, "ticket-1", 9, &[message(1, 5, "hi")], now).unwrap();
        let text = String::from_utf8(files[0].bytes.clone()).unwrap();
        // March is CET, the July header is CEST.
        assert!(text.contains("[2024-03-01 13:05:00] Alice (42): hi"));
        assert!(text.contains("2024-07-01 10:00:00"));
    }

    #[test]
    fn test_attachments_can_be_excluded() {
        let list = entries(&[message(1, 0, "a")], TranscriptZone::utc(), false);
        assert!(list[0].attachments.is_empty());
    }

    #[test]
    fn test_html_escapes_and_breaks_lines() {
        let zone = TranscriptZone::utc();
        let list = entries(&[message(1, 0, "<b>bold</b>\nnext")], zone, true);
        let header = TranscriptHeader::new("t<1>", 1, zone.localize(Utc::now()));
        let html = render_html(&header, &list);
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt;<br>next"));
        assert!(html.contains("#t&lt;1&gt;"));
        assert!(!html.contains("<b>bold"));
        assert!(html.contains("<style>"));
    }

    #[test]
    fn test_csv_quotes_commas() {
        let list = entries(&[message(1, 0, "hello, world")], TranscriptZone::utc(), true);
        let csv = render_csv(&list).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "timestamp,author,author_id,content,attachments,embeds");
        assert!(lines[1].contains("\"hello, world\""));
        assert!(lines[1].contains("https://cdn/log.txt"));
    }

    #[test]
    fn test_both_yields_text_then_html() {
        let mut config = TicketConfig::default();
        config.transcript_format = TranscriptFormat::Both;
        let files = build_transcript(&config, "ticket-2", 1, &[], Utc::now()).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["transcript-ticket-2.txt", "transcript-ticket-2.html"]);
    }
}
