//! Property-Based Tests for Discovery and Fetching
//!
//! # Test Properties
//!
//! 1. **Partition**: every scanned device lands in exactly one category,
//!    and no name is both basic and SAT-listed
//! 2. **Deduplication**: finalize is idempotent, order-independent and
//!    keeps the smallest key per serial number
//! 3. **Contiguity**: RAID probes return indices start..start+n and stop at
//!    the first failure

#![cfg(test)]

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use proptest::prelude::*;

use super::dedup::finalize;
use super::discovery::report::DeviceReport;
use super::discovery::scanner::partition;
use super::discovery::DeviceDescriptor;
use super::raid::{RaidProbe, RaidType};
use crate::adapters::ScriptedSmartctl;

// =============================================================================
// Property Strategies
// =============================================================================

/// Device lists drawn from a small name pool so scans overlap.
fn scan_strategy() -> impl Strategy<Value = Vec<DeviceDescriptor>> {
    prop::collection::vec(
        (0u8..12, prop::sample::select(vec!["sat", "scsi", "nvme", "megaraid,0", "megaraid,7"])),
        0..12,
    )
    .prop_map(|entries| {
        entries
            .into_iter()
            .map(|(n, t)| DeviceDescriptor::new(format!("/dev/sd{}", (b'a' + n) as char), t))
            .collect()
    })
}

/// Distinct keys with deliberately colliding serials, in shuffled order.
fn results_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::btree_map("/dev/sd[a-h]( sat| 3ware,[0-3])?", "S[0-4]", 0..20)
        .prop_map(|map| map.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

fn reports(pairs: &[(String, String)]) -> Vec<(String, DeviceReport)> {
    pairs
        .iter()
        .map(|(key, serial)| {
            let report = DeviceReport {
                serial_number: serial.clone(),
                ..Default::default()
            };
            (key.clone(), report)
        })
        .collect()
}

fn drive(serial: &str) -> String {
    format!(
        r#"{{"smartctl": {{"exit_status": 0}}, "serial_number": "{}", "smart_status": {{"passed": true}}}}"#,
        serial
    )
}

// =============================================================================
// Partition Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_partition_is_exhaustive(basic in scan_strategy(), sat in scan_strategy()) {
        let sat_names: HashSet<String> = sat.iter().map(|d| d.name.clone()).collect();
        let expected_basic = basic.iter().filter(|d| !sat_names.contains(&d.name)).count();

        let devices = partition(basic, sat.clone());

        prop_assert_eq!(devices.basic.len(), expected_basic);
        prop_assert_eq!(devices.raid.len() + devices.megaraid.len(), sat.len());

        for device in &devices.basic {
            prop_assert!(!sat_names.contains(&device.name));
        }
        for device in &devices.megaraid {
            prop_assert!(device.subsystem_type.contains("megaraid"));
        }
        for device in &devices.raid {
            prop_assert!(!device.subsystem_type.contains("megaraid"));
        }
    }
}

// =============================================================================
// Deduplication Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_finalize_idempotent(pairs in results_strategy()) {
        let once = finalize(reports(&pairs));
        let twice = finalize(once.clone());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_finalize_order_independent(pairs in results_strategy()) {
        let mut reversed = reports(&pairs);
        reversed.reverse();

        prop_assert_eq!(finalize(reports(&pairs)), finalize(reversed));
    }

    #[test]
    fn prop_finalize_keeps_smallest_key(pairs in results_strategy()) {
        let merged: BTreeMap<String, String> = pairs.iter().cloned().collect();
        let finalized = finalize(reports(&pairs));

        let mut seen = HashSet::new();
        for (key, serial) in &merged {
            if seen.insert(serial.clone()) {
                prop_assert!(finalized.contains_key(key));
            } else {
                prop_assert!(!finalized.contains_key(key));
            }
        }
        prop_assert_eq!(finalized.len(), seen.len());
    }
}

// =============================================================================
// Contiguity Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_raid_indices_contiguous(
        raid_type in prop::sample::select(
            vec![RaidType::ThreeWare, RaidType::Areca, RaidType::Cciss]
        ),
        responding in prop::collection::vec(any::<bool>(), 0..10),
    ) {
        let start = raid_type.start_index().unwrap_or(0);
        let ctl = ScriptedSmartctl::new();
        for (offset, ok) in responding.iter().enumerate() {
            if *ok {
                let index = start + offset as u32;
                ctl.set_response(
                    &format!("-a /dev/sda -d {},{} -j", raid_type, index),
                    drive(&index.to_string()),
                );
            }
        }
        let probe = RaidProbe::new(Arc::new(ctl));
        let device = DeviceDescriptor::new("/dev/sda", "sat");

        let devices = tokio_test::block_on(probe.probe(&device, raid_type));

        let expected = responding.iter().take_while(|ok| **ok).count();
        prop_assert_eq!(devices.len(), expected);
        for (offset, device) in devices.iter().enumerate() {
            prop_assert_eq!(
                &device.key,
                &format!("/dev/sda {},{}", raid_type, start + offset as u32)
            );
        }
    }
}
