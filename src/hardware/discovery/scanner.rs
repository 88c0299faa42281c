//! Device Scanner
//!
//! Enumerates devices with `smartctl --scan` and splits them into basic,
//! RAID and megaraid lists for the fetch phase.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use super::{DeviceDescriptor, DiscoveredDevices};
use crate::domain::ports::SmartController;
use crate::error::{Error, Result};

const SCAN_ARGS: [&str; 2] = ["--scan", "-j"];
const SAT_SCAN_ARGS: [&str; 4] = ["--scan", "-d", "sat", "-j"];

#[derive(Debug, Deserialize)]
struct ScanOutput {
    #[serde(default)]
    devices: Vec<DeviceDescriptor>,
}

// =============================================================================
// Device Discoverer
// =============================================================================

/// Discovers devices through smartctl scans
pub struct DeviceDiscoverer {
    ctl: Arc<dyn SmartController>,
}

impl DeviceDiscoverer {
    pub fn new(ctl: Arc<dyn SmartController>) -> Self {
        Self { ctl }
    }

    /// Run the plain and SAT-forced scans and partition the results.
    ///
    /// Any failure is fatal: without both scans the device universe is
    /// unknown.
    pub async fn discover(&self) -> Result<DiscoveredDevices> {
        let basic = self
            .scan(&SCAN_ARGS)
            .await
            .map_err(|e| Error::Discovery(format!("failed to scan for devices: {}", e)))?;

        let sat = self
            .scan(&SAT_SCAN_ARGS)
            .await
            .map_err(|e| Error::Discovery(format!("failed to scan for sat devices: {}", e)))?;

        let devices = partition(basic, sat);

        info!(
            "Discovered {} basic, {} raid and {} megaraid devices",
            devices.basic.len(),
            devices.raid.len(),
            devices.megaraid.len()
        );

        Ok(devices)
    }

    async fn scan(&self, args: &[&str]) -> Result<Vec<DeviceDescriptor>> {
        let out = self.ctl.execute(args).await?;
        let devices = parse_scan(&out)?;
        debug!("smartctl {} listed {} devices", args.join(" "), devices.len());
        Ok(devices)
    }
}

/// Decode scan output, sorted by device name. Entries without a name are dropped.
pub fn parse_scan(payload: &[u8]) -> Result<Vec<DeviceDescriptor>> {
    let mut scan: ScanOutput = serde_json::from_slice(payload)?;
    scan.devices.retain(|d| !d.name.is_empty());

    for device in &mut scan.devices {
        if device.display_name.is_empty() {
            device.display_name = device.name.clone();
        }
    }

    scan.devices.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(scan.devices)
}

/// Split scan results into basic, RAID and megaraid lists.
///
/// Devices the SAT scan also lists are left out of the basic list; SAT
/// entries whose type mentions megaraid go to the megaraid list.
pub fn partition(basic: Vec<DeviceDescriptor>, sat: Vec<DeviceDescriptor>) -> DiscoveredDevices {
    let sat_names: HashSet<&str> = sat.iter().map(|d| d.name.as_str()).collect();

    let basic = basic
        .into_iter()
        .filter(|d| !sat_names.contains(d.name.as_str()))
        .collect();

    let (megaraid, raid): (Vec<_>, Vec<_>) = sat.into_iter().partition(|d| d.is_megaraid());

    DiscoveredDevices {
        basic,
        raid,
        megaraid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ScriptedSmartctl;
    use assert_matches::assert_matches;

    const SCAN: &str = r#"{"devices": [
        {"name": "/dev/sdb", "info_name": "/dev/sdb", "type": "scsi", "protocol": "SCSI"},
        {"name": "/dev/nvme0", "info_name": "/dev/nvme0", "type": "nvme", "protocol": "NVMe"},
        {"name": "/dev/sda", "info_name": "/dev/sda [SAT]", "type": "sat", "protocol": "ATA"}
    ]}"#;

    const SAT_SCAN: &str = r#"{"devices": [
        {"name": "/dev/sdb", "info_name": "/dev/sdb", "type": "sat", "protocol": "ATA"},
        {"name": "/dev/bus/0", "info_name": "/dev/bus/0 [megaraid_disk_00]", "type": "megaraid,0", "protocol": "SCSI"}
    ]}"#;

    fn names(devices: &[DeviceDescriptor]) -> Vec<&str> {
        devices.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn test_parse_scan_sorts_by_name() {
        let devices = parse_scan(SCAN.as_bytes()).unwrap();
        assert_eq!(names(&devices), vec!["/dev/nvme0", "/dev/sda", "/dev/sdb"]);
    }

    #[test]
    fn test_parse_scan_defaults_display_name() {
        let devices = parse_scan(br#"{"devices": [{"name": "/dev/sdc", "type": "sat"}]}"#).unwrap();
        assert_eq!(devices[0].display_name, "/dev/sdc");
    }

    #[test]
    fn test_parse_scan_skips_unnamed_entries() {
        let devices = parse_scan(
            br#"{"devices": [{"info_name": "?", "type": "sat"}, {"name": "/dev/sdd", "type": "sat"}]}"#,
        )
        .unwrap();
        assert_eq!(names(&devices), vec!["/dev/sdd"]);
    }

    #[test]
    fn test_parse_scan_without_devices() {
        let devices = parse_scan(br#"{"json_format_version": [1, 0]}"#).unwrap();
        assert!(devices.is_empty());
    }

    #[test]
    fn test_partition() {
        let basic = parse_scan(SCAN.as_bytes()).unwrap();
        let sat = parse_scan(SAT_SCAN.as_bytes()).unwrap();

        let devices = partition(basic, sat);

        assert_eq!(names(&devices.basic), vec!["/dev/nvme0", "/dev/sda"]);
        assert_eq!(names(&devices.raid), vec!["/dev/sdb"]);
        assert_eq!(names(&devices.megaraid), vec!["/dev/bus/0"]);
        assert_eq!(devices.megaraid[0].subsystem_type, "megaraid,0");
    }

    #[tokio::test]
    async fn test_discover() {
        let ctl = ScriptedSmartctl::new()
            .respond("--scan -j", SCAN)
            .respond("--scan -d sat -j", SAT_SCAN);
        let discoverer = DeviceDiscoverer::new(Arc::new(ctl));

        let devices = discoverer.discover().await.unwrap();

        assert_eq!(devices.total(), 4);
        assert_eq!(names(&devices.raid), vec!["/dev/sdb"]);
    }

    #[tokio::test]
    async fn test_discover_fails_when_sat_scan_fails() {
        let ctl = ScriptedSmartctl::new()
            .respond("--scan -j", SCAN)
            .fail("--scan -d sat -j", "exit status 1");
        let discoverer = DeviceDiscoverer::new(Arc::new(ctl));

        let err = discoverer.discover().await.unwrap_err();
        assert_matches!(err, Error::Discovery(ref msg) if msg.contains("sat devices"));
    }

    #[tokio::test]
    async fn test_discover_fails_on_bad_json() {
        let ctl = ScriptedSmartctl::new().respond("--scan -j", "not json");
        let discoverer = DeviceDiscoverer::new(Arc::new(ctl));

        let err = discoverer.discover().await.unwrap_err();
        assert_matches!(err, Error::Discovery(_));
    }
}
