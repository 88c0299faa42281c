//! Result Deduplication
//!
//! The same physical disk can be reached through several logical paths
//! (directly, and again through a controller's SAT passthrough). Entries
//! are collapsed by serial number, keeping the lexicographically smallest
//! device key so the survivor does not depend on fetch order.

use std::collections::{BTreeMap, HashSet};

use super::discovery::report::{DeviceEntry, DeviceReport, RawReport};

/// Final result set, iterated in ascending key order
pub type ReportSet<T = DeviceEntry> = BTreeMap<String, T>;

/// Anything carrying a device serial number
pub trait SerialNumbered {
    fn serial_number(&self) -> &str;
}

impl SerialNumbered for DeviceEntry {
    fn serial_number(&self) -> &str {
        DeviceEntry::serial_number(self)
    }
}

impl SerialNumbered for DeviceReport {
    fn serial_number(&self) -> &str {
        &self.serial_number
    }
}

impl SerialNumbered for RawReport {
    fn serial_number(&self) -> &str {
        &self.serial_number
    }
}

/// Keep the first entry per serial number in ascending key order.
pub fn finalize<T, I>(entries: I) -> ReportSet<T>
where
    T: SerialNumbered,
    I: IntoIterator<Item = (String, T)>,
{
    let sorted: BTreeMap<String, T> = entries.into_iter().collect();
    let mut seen = HashSet::new();

    sorted
        .into_iter()
        .filter(|(_, entry)| seen.insert(entry.serial_number().to_string()))
        .collect()
}
