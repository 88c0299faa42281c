//! Device Discovery Components
//!
//! Device descriptors produced by smartctl scans, and the report types
//! decoded from per-device smartctl output.

pub mod report;
pub mod scanner;

use serde::{Deserialize, Serialize};

// =============================================================================
// Disk Types
// =============================================================================

/// Kind of storage device as derived from a smartctl report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskType {
    /// NVMe device
    Nvme,
    /// Solid-state ATA/SCSI device
    Ssd,
    /// Spinning disk
    Hdd,
    /// smartctl could not tell
    Unknown,
}

impl DiskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiskType::Nvme => "nvme",
            DiskType::Ssd => "ssd",
            DiskType::Hdd => "hdd",
            DiskType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DiskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Device Descriptors
// =============================================================================

/// A device as listed by `smartctl --scan -j`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Device path (e.g., /dev/sda)
    #[serde(default)]
    pub name: String,
    /// Human readable name; `"<name> <raid type>"` for RAID-derived entries
    #[serde(rename = "info_name", default)]
    pub display_name: String,
    /// smartctl device type (e.g., sat, nvme, megaraid,0)
    #[serde(rename = "type", default)]
    pub subsystem_type: String,
    /// RAID type tag this descriptor was derived with
    #[serde(skip)]
    pub raid_type: Option<String>,
}

impl DeviceDescriptor {
    pub fn new(name: impl Into<String>, subsystem_type: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            subsystem_type: subsystem_type.into(),
            raid_type: None,
        }
    }

    /// Derive a descriptor addressing this device through a RAID type tag.
    pub fn with_raid_type(&self, raid_type: impl Into<String>) -> Self {
        let raid_type = raid_type.into();
        Self {
            name: self.name.clone(),
            display_name: device_key(&self.name, &raid_type),
            subsystem_type: self.subsystem_type.clone(),
            raid_type: Some(raid_type),
        }
    }

    /// Key used for this device in the result set
    pub fn key(&self) -> String {
        match &self.raid_type {
            Some(raid_type) => device_key(&self.name, raid_type),
            None => self.name.clone(),
        }
    }

    /// Whether smartctl reports this device behind a megaraid controller
    pub fn is_megaraid(&self) -> bool {
        self.subsystem_type.contains("megaraid")
    }
}

/// A device name and the smartctl `-d` type used to reach it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RaidParameters {
    pub name: String,
    pub raid_type: String,
}

impl RaidParameters {
    pub fn new(name: impl Into<String>, raid_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raid_type: raid_type.into(),
        }
    }

    /// Key used for this device in the result set
    pub fn key(&self) -> String {
        device_key(&self.name, &self.raid_type)
    }
}

impl From<&RaidParameters> for DeviceDescriptor {
    fn from(params: &RaidParameters) -> Self {
        DeviceDescriptor::new(params.name.clone(), params.raid_type.clone())
            .with_raid_type(params.raid_type.clone())
    }
}

impl From<&DeviceDescriptor> for RaidParameters {
    fn from(descriptor: &DeviceDescriptor) -> Self {
        Self::new(descriptor.name.clone(), descriptor.subsystem_type.clone())
    }
}

/// Devices from one discovery pass, split by how they must be queried
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredDevices {
    /// Devices queried directly
    pub basic: Vec<DeviceDescriptor>,
    /// Devices probed through RAID type tags
    pub raid: Vec<DeviceDescriptor>,
    /// Devices behind megaraid controllers
    pub megaraid: Vec<DeviceDescriptor>,
}

impl DiscoveredDevices {
    /// Megaraid devices as `{name, raid type}` pairs
    pub fn megaraid_parameters(&self) -> Vec<RaidParameters> {
        self.megaraid.iter().map(RaidParameters::from).collect()
    }

    pub fn total(&self) -> usize {
        self.basic.len() + self.raid.len() + self.megaraid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Result-set key for a device reached through a RAID type tag.
pub fn device_key(name: &str, raid_type: &str) -> String {
    format!("{} {}", name, raid_type)
}
