//! smartctl Report Parsing
//!
//! Decodes the JSON payload of `smartctl -a <device> -j` into a
//! [`DeviceReport`], or keeps it verbatim as a [`RawReport`]. The tool's own
//! exit status envelope is interpreted here and never by callers.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize, Serializer};

use super::DiskType;
use crate::error::{Error, Result};

/// smartctl exit status bit: command line did not parse
pub const EXIT_PARSE_ERROR: i64 = 1 << 0;

/// smartctl exit status bit: device open failed or device did not identify
pub const EXIT_OPEN_ERROR: i64 = 1 << 1;

const SPIN_UP_ATTR_NAME: &str = "Spin_Up_Time";
const UNKNOWN_ATTR_NAME: &str = "Unknown_Attribute";
const UNKNOWN_ERROR_MESSAGE: &str = "unknown error from smartctl";

// =============================================================================
// Tool Envelope
// =============================================================================

/// The `smartctl` object embedded in every JSON payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolEnvelope {
    /// smartctl version digits (e.g. `[7, 3]`)
    pub version: Vec<u32>,
    /// Diagnostic messages
    pub messages: Vec<ToolMessage>,
    /// Exit status bitmask
    pub exit_status: i64,
}

/// One diagnostic message from smartctl
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolMessage {
    #[serde(rename = "string")]
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}

impl ToolEnvelope {
    /// Fail with [`Error::Device`] when the parse-error or open-error bit is set.
    pub fn check(&self) -> Result<()> {
        if self.exit_status & (EXIT_PARSE_ERROR | EXIT_OPEN_ERROR) == 0 {
            return Ok(());
        }

        let messages = self.joined_messages();
        if messages.is_empty() {
            return Err(Error::Device(UNKNOWN_ERROR_MESSAGE.to_string()));
        }

        Err(Error::Device(messages))
    }

    /// Non-empty message texts joined with ", "
    pub fn joined_messages(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.text.as_str())
            .filter(|m| !m.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// =============================================================================
// Device Report
// =============================================================================

/// Structured S.M.A.R.T. data for one device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceReport {
    pub model_name: String,
    pub serial_number: String,
    pub firmware_version: String,
    /// Rotation rate in RPM, 0 for solid-state devices
    pub rotation_rate: u32,
    pub device: DeviceInfo,
    pub smartctl: ToolEnvelope,
    /// Overall health; absent when the device is not SMART capable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smart_status: Option<SmartStatus>,
    pub ata_smart_attributes: AtaAttributes,
    pub ata_smart_data: AtaSmartData,
    pub temperature: Temperature,
    pub power_on_time: PowerOnTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nvme_smart_health_information_log: Option<NvmeHealthLog>,
}

/// The `device` object of a report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceInfo {
    pub name: String,
    pub info_name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub protocol: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartStatus {
    pub passed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtaAttributes {
    pub table: Vec<AtaAttribute>,
}

/// One row of the ATA attribute table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtaAttribute {
    pub id: u32,
    pub name: String,
    pub value: u32,
    pub worst: u32,
    pub thresh: u32,
    pub raw: RawValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawValue {
    pub value: u64,
    pub string: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtaSmartData {
    pub self_test: SelfTest,
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfTest {
    pub status: SelfTestStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfTestStatus {
    pub passed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub self_tests_supported: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Temperature {
    pub current: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerOnTime {
    pub hours: u64,
}

/// NVMe SMART / health information log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NvmeHealthLog {
    pub critical_warning: u64,
    pub temperature: i64,
    pub available_spare: u64,
    pub percentage_used: u64,
    pub power_on_hours: u64,
    pub media_errors: u64,
}

/// Attribute identity and failure threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeSummary {
    pub id: u32,
    pub name: String,
    pub threshold: u32,
}

/// Current reading of one attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeReading {
    /// Raw value
    pub value: u64,
    /// Raw value as printed by smartctl
    pub raw: String,
    /// Normalized value
    pub normalized_value: u32,
    pub id: u32,
}

/// Flattened single-device health view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceHealth {
    pub disk_type: DiskType,
    pub firmware_version: String,
    pub model_name: String,
    pub serial_number: String,
    pub exit_status: i64,
    pub error: String,
    pub self_test_passed: Option<bool>,
    pub temperature: i64,
    pub power_on_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical_warning: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_errors: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage_used: Option<u64>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, AttributeReading>,
}

impl DeviceReport {
    /// Whether smartctl returned an overall health status
    pub fn has_smart_status(&self) -> bool {
        self.smart_status.is_some()
    }

    /// Overall health result, if the device is SMART capable
    pub fn smart_passed(&self) -> Option<bool> {
        self.smart_status.map(|s| s.passed)
    }

    /// Classify the device as NVMe, SSD or HDD.
    ///
    /// A zero rotation rate means solid state unless the attribute table
    /// carries `Spin_Up_Time`, which only spinning disks report.
    pub fn disk_type(&self) -> DiskType {
        match self.device.device_type.as_str() {
            "nvme" => DiskType::Nvme,
            "unknown" => DiskType::Unknown,
            _ => {
                if self.rotation_rate > 0 {
                    return DiskType::Hdd;
                }

                let spins = self
                    .ata_smart_attributes
                    .table
                    .iter()
                    .any(|a| a.name == SPIN_UP_ATTR_NAME);

                if spins {
                    DiskType::Hdd
                } else {
                    DiskType::Ssd
                }
            }
        }
    }

    /// Attribute ids, names and thresholds in table order
    pub fn attribute_summaries(&self) -> Vec<AttributeSummary> {
        self.ata_smart_attributes
            .table
            .iter()
            .filter(|a| a.name != UNKNOWN_ATTR_NAME)
            .map(|a| AttributeSummary {
                id: a.id,
                name: a.name.clone(),
                threshold: a.thresh,
            })
            .collect()
    }

    /// Attribute readings keyed by lower-cased attribute name
    pub fn attribute_readings(&self) -> BTreeMap<String, AttributeReading> {
        self.ata_smart_attributes
            .table
            .iter()
            .filter(|a| a.name != UNKNOWN_ATTR_NAME)
            .map(|a| {
                (
                    a.name.to_lowercase(),
                    AttributeReading {
                        value: a.raw.value,
                        raw: a.raw.string.clone(),
                        normalized_value: a.value,
                        id: a.id,
                    },
                )
            })
            .collect()
    }

    /// Self-test result, only for devices that support self tests
    pub fn self_test_passed(&self) -> Option<bool> {
        self.ata_smart_data
            .capabilities
            .self_tests_supported
            .then_some(self.ata_smart_data.self_test.status.passed)
    }

    /// Flattened view used for single-device requests
    pub fn health(&self) -> DeviceHealth {
        let disk_type = self.disk_type();
        let nvme_log = match disk_type {
            DiskType::Nvme => Some(
                self.nvme_smart_health_information_log
                    .clone()
                    .unwrap_or_default(),
            ),
            _ => None,
        };

        let (temperature, power_on_time) = match &nvme_log {
            Some(log) => (log.temperature, log.power_on_hours),
            None => (self.temperature.current, self.power_on_time.hours),
        };

        DeviceHealth {
            disk_type,
            firmware_version: self.firmware_version.clone(),
            model_name: self.model_name.clone(),
            serial_number: self.serial_number.clone(),
            exit_status: self.smartctl.exit_status,
            error: self.smartctl.joined_messages(),
            self_test_passed: self.self_test_passed(),
            temperature,
            power_on_time,
            critical_warning: nvme_log.as_ref().map(|l| l.critical_warning),
            media_errors: nvme_log.as_ref().map(|l| l.media_errors),
            percentage_used: nvme_log.as_ref().map(|l| l.percentage_used),
            attributes: self.attribute_readings(),
        }
    }
}

// =============================================================================
// Raw Report
// =============================================================================

/// Unmodified smartctl output for one device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawReport {
    pub serial_number: String,
    #[serde(serialize_with = "serialize_payload")]
    pub payload: Bytes,
}

impl RawReport {
    pub fn new(serial_number: impl Into<String>, payload: Bytes) -> Self {
        Self {
            serial_number: serial_number.into(),
            payload,
        }
    }

    /// Payload as text, if it is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

fn serialize_payload<S: Serializer>(
    payload: &Bytes,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(payload))
}

// =============================================================================
// Result Entries
// =============================================================================

/// Which representation the fetch phase keeps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchMode {
    /// Decoded [`DeviceReport`]s
    #[default]
    Structured,
    /// Verbatim [`RawReport`]s
    Raw,
}

/// One entry of a result set
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DeviceEntry {
    Report(Box<DeviceReport>),
    Raw(RawReport),
}

impl DeviceEntry {
    pub fn serial_number(&self) -> &str {
        match self {
            DeviceEntry::Report(report) => &report.serial_number,
            DeviceEntry::Raw(raw) => &raw.serial_number,
        }
    }

    pub fn as_report(&self) -> Option<&DeviceReport> {
        match self {
            DeviceEntry::Report(report) => Some(&**report),
            DeviceEntry::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&RawReport> {
        match self {
            DeviceEntry::Raw(raw) => Some(raw),
            DeviceEntry::Report(_) => None,
        }
    }
}

/// A successfully queried device, before it is merged into a result set
#[derive(Debug, Clone)]
pub struct FetchedDevice {
    /// Result-set key
    pub key: String,
    pub report: DeviceReport,
    pub payload: Bytes,
}

impl FetchedDevice {
    /// Convert into a keyed result entry in the requested representation.
    pub fn into_entry(self, mode: FetchMode) -> (String, DeviceEntry) {
        let entry = match mode {
            FetchMode::Structured => DeviceEntry::Report(Box::new(self.report)),
            FetchMode::Raw => {
                DeviceEntry::Raw(RawReport::new(self.report.serial_number, self.payload))
            }
        };
        (self.key, entry)
    }
}

// =============================================================================
// Report Parser
// =============================================================================

/// Decodes per-device smartctl payloads
pub struct ReportParser;

impl ReportParser {
    /// Decode a payload and check its exit status envelope.
    ///
    /// A report without `smart_status` is returned successfully; callers
    /// treat it as a skip signal.
    pub fn parse(payload: &[u8]) -> Result<DeviceReport> {
        let report: DeviceReport = serde_json::from_slice(payload)?;
        report.smartctl.check()?;
        Ok(report)
    }
}
