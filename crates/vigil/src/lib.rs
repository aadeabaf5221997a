//! Vigil: support tickets and file scanning for Discord servers.
//!
//! This crate ties the subsystem crates together. [`VigilConfig`] holds the
//! process settings and [`Services`] builds the stores, cores and routers
//! from them. The `vigil` binary adds the gateway connection.
//!
//! The subsystem crates are re-exported for convenience:
//!
//! - [`core`]: data types and the clock
//! - [`storage`]: per-guild config, scan config and scan history files
//! - [`ticket`]: ticket lifecycle, transcripts and the inactivity sweeper
//! - [`scan`]: uploads, verdict polling and result cards
//! - [`social`]: admin commands and the Discord adapter

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod services;

pub use config::{
    DEFAULT_CONFIG_NAME, ENV_PREFIX, LogFormat, LogSettings, ScanSettings, TicketSettings,
    VigilConfig,
};
pub use services::Services;

pub use vigil_core as core;
pub use vigil_error as error;
pub use vigil_interface as interface;
pub use vigil_scan as scan;
pub use vigil_social as social;
pub use vigil_storage as storage;
pub use vigil_ticket as ticket;
