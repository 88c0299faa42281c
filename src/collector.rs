//! SMART Collector
//!
//! Runs complete collection cycles: version gate, discovery, fetch and
//! deduplication. Also answers single-device requests.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::adapters::SmartctlRunner;
use crate::config::CollectorConfig;
use crate::domain::ports::SmartController;
use crate::error::Result;
use crate::hardware::dedup::{finalize, ReportSet};
use crate::hardware::discovery::report::{DeviceReport, FetchMode};
use crate::hardware::discovery::scanner::DeviceDiscoverer;
use crate::hardware::discovery::{DeviceDescriptor, RaidParameters};
use crate::hardware::raid::RaidProbe;
use crate::hardware::runner::FetchOrchestrator;
use crate::hardware::version::{VersionCache, VersionGate};

/// Entry point for SMART data collection
pub struct SmartCollector {
    gate: VersionGate,
    discoverer: DeviceDiscoverer,
    orchestrator: FetchOrchestrator,
    probe: RaidProbe,
}

impl SmartCollector {
    /// Build a collector around an existing smartctl controller.
    ///
    /// The version cache is shared so that repeated collectors, or
    /// repeated cycles, skip the version query while it is still valid.
    pub fn new(
        ctl: Arc<dyn SmartController>,
        config: &CollectorConfig,
        cache: Arc<VersionCache>,
    ) -> Self {
        Self {
            gate: VersionGate::new(ctl.clone(), cache),
            discoverer: DeviceDiscoverer::new(ctl.clone()),
            orchestrator: FetchOrchestrator::from_config(ctl.clone(), config),
            probe: RaidProbe::new(ctl),
        }
    }

    /// Collector driving the real smartctl binary.
    pub fn from_config(config: &CollectorConfig) -> Result<Self> {
        config.validate()?;

        let ctl = Arc::new(SmartctlRunner::from_config(config));
        let cache = Arc::new(VersionCache::with_interval(config.version_check_interval));

        Ok(Self::new(ctl, config, cache))
    }

    /// Run one cycle, fetching megaraid devices found by the scan.
    pub async fn collect(&self, mode: FetchMode) -> Result<ReportSet> {
        self.run_cycle(mode, None).await
    }

    /// Run one cycle with caller-supplied megaraid `{name, type}` pairs.
    pub async fn collect_with_megaraids(
        &self,
        mode: FetchMode,
        megaraids: Vec<RaidParameters>,
    ) -> Result<ReportSet> {
        self.run_cycle(mode, Some(megaraids)).await
    }

    #[instrument(skip(self, megaraids))]
    async fn run_cycle(
        &self,
        mode: FetchMode,
        megaraids: Option<Vec<RaidParameters>>,
    ) -> Result<ReportSet> {
        self.gate.ensure_supported().await?;

        let devices = self.discoverer.discover().await?;
        let megaraids = megaraids.unwrap_or_else(|| devices.megaraid_parameters());

        let results = self.orchestrator.run(mode, &devices, &megaraids).await?;
        let fetched = results.len();
        let reports = finalize(results);

        info!(
            "Collected {} devices ({} duplicates removed)",
            reports.len(),
            fetched - reports.len()
        );

        Ok(reports)
    }

    /// Fetch one device, optionally through a smartctl `-d` type.
    pub async fn device(&self, name: &str, raid_type: Option<&str>) -> Result<DeviceReport> {
        self.gate.ensure_supported().await?;

        let mut device = DeviceDescriptor::new(name, raid_type.unwrap_or_default());
        if let Some(raid_type) = raid_type {
            device = device.with_raid_type(raid_type);
        }

        let found = self.probe.query(&device).await?;
        debug!("fetched SMART data for {}", found.key);

        Ok(found.report)
    }
}
