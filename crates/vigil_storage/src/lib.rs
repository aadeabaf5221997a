//! Persistence for Vigil.
//!
//! All state lives in JSON files under a data root:
//!
//! - `tickets/<guild_id>.json`: [`ConfigStore`]
//! - `scan/config.json`: [`ScanConfigStore`]
//! - `scan/scan_history.json`: [`HistoryLog`]
//!
//! Every write replaces the whole file atomically.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod atomic;
mod config_store;
mod export;
mod history;
mod paging;
mod scan_store;

pub use atomic::{Loaded, read_json, write_json_atomic};
pub use config_store::{ConfigStore, GuildHandle};
pub use export::{ExportFormat, export_closed_tickets, export_scan_records};
pub use history::{HISTORY_CAPACITY, HistoryLog, ScanStats};
pub use paging::{ADMIN_PAGE_SIZE, Page, USER_PAGE_SIZE, paginate};
pub use scan_store::ScanConfigStore;
