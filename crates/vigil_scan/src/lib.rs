//! File scanning for Vigil.
//!
//! Members submit files through the scan panel or by posting them in an
//! auto-scan channel. [`ScanCore`] runs the access gates, uploads the file to
//! the verdict service, polls until the analysis finishes and records the
//! outcome. [`VirusTotalClient`] is the production [`VerdictService`].
//!
//! [`VerdictService`]: vigil_interface::VerdictService

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod dispatch;
mod ids;
mod poll;
mod service;
pub mod views;

pub use client::VirusTotalClient;
pub use dispatch::{ScanInteractions, UPLOAD_TIMEOUT};
pub use ids::ScanWidget;
pub use poll::{MAX_POLL_ATTEMPTS, await_verdict, backoff_delay, sha256_hex};
pub use service::{ScanCore, ScanRequest, is_scan_admin};
