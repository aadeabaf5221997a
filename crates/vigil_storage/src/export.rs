//! JSON and CSV exports of scan history and closed tickets.

use vigil_core::{ClosedTicket, ScanRecord};
use vigil_error::{StorageError, StorageErrorKind, StorageResult};

/// Export encoding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExportFormat {
    /// Pretty-printed JSON array
    Json,
    /// Header row plus one row per record
    Csv,
}

impl ExportFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

fn export_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::new(StorageErrorKind::Export(e.to_string()))
}

/// Encode scan records.
pub fn export_scan_records(records: &[ScanRecord], format: ExportFormat) -> StorageResult<Vec<u8>> {
    match format {
        ExportFormat::Json => serde_json::to_vec_pretty(records).map_err(export_error),
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_writer(vec![]);
            writer
                .write_record([
                    "timestamp",
                    "guild_id",
                    "user_id",
                    "channel_id",
                    "filename",
                    "size_bytes",
                    "sha256",
                    "malicious",
                    "suspicious",
                    "harmless",
                    "undetected",
                ])
                .map_err(export_error)?;
            for record in records {
                let stats = &record.verdict_snapshot.stats;
                writer
                    .write_record([
                        record.timestamp.to_rfc3339(),
                        record.guild_id.to_string(),
                        record.user_id.to_string(),
                        record.channel_id.to_string(),
                        record.filename.clone(),
                        record.size_bytes.to_string(),
                        record.sha256.clone(),
                        stats.malicious.to_string(),
                        stats.suspicious.to_string(),
                        stats.harmless.to_string(),
                        stats.undetected.to_string(),
                    ])
                    .map_err(export_error)?;
            }
            writer.into_inner().map_err(export_error)
        }
    }
}

/// Encode closed tickets, oldest close first.
///
/// Anonymous tickets export the creator column as `anonymous`.
pub fn export_closed_tickets(
    tickets: &[ClosedTicket],
    format: ExportFormat,
) -> StorageResult<Vec<u8>> {
    let mut sorted: Vec<&ClosedTicket> = tickets.iter().collect();
    sorted.sort_by_key(|t| (t.closed_at, t.ticket.number));

    match format {
        ExportFormat::Json => {
            let redacted: Vec<ClosedTicket> = sorted
                .into_iter()
                .map(|t| {
                    let mut t = t.clone();
                    if t.ticket.is_anonymous {
                        t.ticket.creator_id = 0;
                    }
                    t
                })
                .collect();
            serde_json::to_vec_pretty(&redacted).map_err(export_error)
        }
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_writer(vec![]);
            writer
                .write_record([
                    "number",
                    "id",
                    "category",
                    "title",
                    "creator",
                    "created_at",
                    "closed_at",
                    "closed_by",
                    "close_reason",
                    "resolution_hours",
                    "rating",
                    "tags",
                ])
                .map_err(export_error)?;
            for t in sorted {
                let creator = if t.ticket.is_anonymous {
                    "anonymous".to_string()
                } else {
                    t.ticket.creator_id.to_string()
                };
                let closed_by = match t.closed_by {
                    vigil_core::Closer::Member(id) => id.to_string(),
                    vigil_core::Closer::Auto => "AUTO".to_string(),
                };
                let tags: Vec<&str> = t.ticket.tags.iter().map(String::as_str).collect();
                writer
                    .write_record([
                        t.ticket.number.to_string(),
                        t.ticket.id.clone(),
                        t.ticket.category_name.clone(),
                        t.ticket.title.clone(),
                        creator,
                        t.ticket.created_at.to_rfc3339(),
                        t.closed_at.to_rfc3339(),
                        closed_by,
                        t.close_reason.clone().unwrap_or_default(),
                        format!("{:.2}", t.resolution_time_hours),
                        t.rating.map(|r| r.to_string()).unwrap_or_default(),
                        tags.join(";"),
                    ])
                    .map_err(export_error)?;
            }
            writer.into_inner().map_err(export_error)
        }
    }
}
