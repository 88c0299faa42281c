//! RAID Probing
//!
//! Enumerates the logical drives smartctl can reach behind a RAID
//! controller. Index-addressed types are queried at increasing indices
//! until the first failure; `sat` and `scsi` are queried once.

use std::sync::Arc;

use tracing::debug;

use super::discovery::DeviceDescriptor;
use super::discovery::report::{FetchedDevice, ReportParser};
use crate::config::DEFAULT_RAID_PROBE_LIMIT;
use crate::domain::ports::SmartController;
use crate::error::{Error, Result};

// =============================================================================
// RAID Types
// =============================================================================

/// smartctl `-d` types probed for every RAID device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RaidType {
    ThreeWare,
    Areca,
    Cciss,
    Sat,
    Scsi,
}

impl RaidType {
    /// Order in which probes are dispatched for each device
    pub const PROBE_ORDER: [RaidType; 5] = [
        RaidType::ThreeWare,
        RaidType::Areca,
        RaidType::Cciss,
        RaidType::Sat,
        RaidType::Scsi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RaidType::ThreeWare => "3ware",
            RaidType::Areca => "areca",
            RaidType::Cciss => "cciss",
            RaidType::Sat => "sat",
            RaidType::Scsi => "scsi",
        }
    }

    /// First logical drive index, or `None` for types queried once.
    pub fn start_index(&self) -> Option<u32> {
        match self {
            RaidType::ThreeWare | RaidType::Cciss => Some(0),
            RaidType::Areca => Some(1),
            RaidType::Sat | RaidType::Scsi => None,
        }
    }
}

impl std::fmt::Display for RaidType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// RAID Probe
// =============================================================================

/// Queries devices through RAID type tags
#[derive(Clone)]
pub struct RaidProbe {
    ctl: Arc<dyn SmartController>,
    limit: u32,
}

impl RaidProbe {
    pub fn new(ctl: Arc<dyn SmartController>) -> Self {
        Self {
            ctl,
            limit: DEFAULT_RAID_PROBE_LIMIT,
        }
    }

    /// Cap the number of logical drives enumerated per device and type.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Collect every logical drive reachable as `raid_type` on `device`.
    ///
    /// Failures end the enumeration for this pair only and are never
    /// propagated.
    pub async fn probe(
        &self,
        device: &DeviceDescriptor,
        raid_type: RaidType,
    ) -> Vec<FetchedDevice> {
        let Some(start) = raid_type.start_index() else {
            let target = device.with_raid_type(raid_type.as_str());
            return match self.query(&target).await {
                Ok(found) => vec![found],
                Err(e) => {
                    debug!("failed to get device {:?} info: {}", target.display_name, e);
                    Vec::new()
                }
            };
        };

        let mut found = Vec::new();

        for index in start..start.saturating_add(self.limit) {
            let target = device.with_raid_type(format!("{},{}", raid_type, index));

            match self.query(&target).await {
                Ok(drive) => found.push(drive),
                Err(e) => {
                    debug!("failed to get device {:?} info: {}", target.display_name, e);
                    return found;
                }
            }
        }

        debug!(
            "stopped probing {:?} as {} after {} logical drives",
            device.name, raid_type, self.limit
        );
        found
    }

    /// Query one device, through `-d <raid type>` when the descriptor has one.
    ///
    /// A report without SMART status is [`Error::SmartUnavailable`].
    pub async fn query(&self, device: &DeviceDescriptor) -> Result<FetchedDevice> {
        let name = device.name.as_str();
        let payload = match device.raid_type.as_deref() {
            Some(raid_type) => self.ctl.execute(&["-a", name, "-d", raid_type, "-j"]).await?,
            None => self.ctl.execute(&["-a", name, "-j"]).await?,
        };

        let report = ReportParser::parse(&payload)?;
        if !report.has_smart_status() {
            return Err(Error::SmartUnavailable {
                device: device.key(),
            });
        }

        Ok(FetchedDevice {
            key: device.key(),
            report,
            payload,
        })
    }
}
