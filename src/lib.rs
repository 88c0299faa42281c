//! smart-collector - S.M.A.R.T. Health Data Collection
//!
//! Discovers local storage devices and retrieves their S.M.A.R.T. data by
//! driving `smartctl` in JSON mode. Plain disks, disks behind RAID
//! controllers and megaraid logical drives are fetched concurrently and
//! collapsed into one report per physical device.
//!
//! # Architecture
//!
//! ```text
//! VersionGate → DeviceDiscoverer → FetchOrchestrator → finalize
//!                                   (basic │ raid │ megaraid)
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - smartctl process runner and a scripted test double
//! - [`collector`] - one-call collection cycles and device requests
//! - [`config`] - collector configuration
//! - [`domain`] - ports the collector depends on
//! - [`error`] - Error types
//! - [`hardware`] - discovery, RAID probing, fetching and deduplication

pub mod adapters;
pub mod collector;
pub mod config;
pub mod domain;
pub mod error;
pub mod hardware;

// Re-export commonly used types
pub use collector::SmartCollector;
pub use config::CollectorConfig;
pub use domain::{Clock, SmartController, SystemClock};
pub use error::{Error, Result};
pub use hardware::{DeviceEntry, DeviceReport, FetchMode, RaidParameters, ReportSet, VersionCache};
