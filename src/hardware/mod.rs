//! Storage Device Discovery and SMART Collection
//!
//! Everything that talks to smartctl lives here:
//!
//! - [`version`] - minimum smartctl version gate with a cached result
//! - [`discovery`] - device scans and per-device report decoding
//! - [`raid`] - logical drive enumeration behind RAID controllers
//! - [`runner`] - concurrent fetch phases for basic, RAID and megaraid devices
//! - [`dedup`] - collapsing devices reachable through several paths
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use smart_collector::adapters::SmartctlRunner;
//! use smart_collector::hardware::{DeviceDiscoverer, FetchMode, FetchOrchestrator};
//!
//! # async fn example() -> smart_collector::Result<()> {
//! let ctl = Arc::new(SmartctlRunner::new("smartctl", std::time::Duration::from_secs(30)));
//! let devices = DeviceDiscoverer::new(ctl.clone()).discover().await?;
//!
//! let orchestrator = FetchOrchestrator::new(ctl, 4);
//! let results = orchestrator
//!     .run(FetchMode::Structured, &devices, &devices.megaraid_parameters())
//!     .await?;
//!
//! for (key, entry) in smart_collector::hardware::finalize(results) {
//!     println!("{} - {}", key, entry.serial_number());
//! }
//! # Ok(())
//! # }
//! ```

pub mod dedup;
pub mod discovery;
pub mod raid;
pub mod runner;
pub mod version;

#[cfg(test)]
mod proptest;

pub use dedup::{finalize, ReportSet, SerialNumbered};
pub use discovery::{
    report::{DeviceEntry, DeviceHealth, DeviceReport, FetchMode, RawReport, ReportParser},
    scanner::DeviceDiscoverer,
    DeviceDescriptor, DiscoveredDevices, DiskType, RaidParameters,
};
pub use raid::{RaidProbe, RaidType};
pub use runner::{FetchOrchestrator, ResultSet};
pub use version::{SmartctlVersion, VersionCache, VersionGate, MIN_SUPPORTED_VERSION};
