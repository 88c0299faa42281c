//! Fetch Orchestrator
//!
//! Fetches SMART reports for every discovered device. Each category runs
//! on a pool of workers sharing one job queue:
//!
//! ```text
//! basic     ──► queue ──► workers ──► results        (fail-fast)
//! raid      ──► jobs  ──► workers ──► collector ──► results
//! megaraid  ──► queue ──► workers ──► results        (best-effort)
//! ```
//!
//! Phases run one after the other. Results land in a shared map that is
//! locked for a single insert at a time.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, trace, warn};

use super::discovery::report::{DeviceEntry, FetchMode, FetchedDevice};
use super::discovery::{DeviceDescriptor, DiscoveredDevices, RaidParameters};
use super::raid::{RaidProbe, RaidType};
use crate::config::CollectorConfig;
use crate::domain::ports::SmartController;
use crate::error::{Error, Result};

// =============================================================================
// Result Set
// =============================================================================

/// Device key to entry map filled during a fetch cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    entries: HashMap<String, DeviceEntry>,
}

impl ResultSet {
    pub fn insert(&mut self, (key, entry): (String, DeviceEntry)) {
        self.entries.insert(key, entry);
    }

    pub fn get(&self, key: &str) -> Option<&DeviceEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DeviceEntry)> {
        self.entries.iter()
    }
}

impl IntoIterator for ResultSet {
    type Item = (String, DeviceEntry);
    type IntoIter = std::collections::hash_map::IntoIter<String, DeviceEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

type SharedResults = Arc<Mutex<ResultSet>>;

type Queue<T> = Arc<tokio::sync::Mutex<mpsc::Receiver<T>>>;

/// One RAID probe: a device and the type to enumerate it as
#[derive(Debug, Clone)]
struct RaidJob {
    device: DeviceDescriptor,
    raid_type: RaidType,
}

// =============================================================================
// Fetch Orchestrator
// =============================================================================

/// Runs the basic, RAID and megaraid fetch phases
pub struct FetchOrchestrator {
    probe: RaidProbe,
    workers: usize,
}

impl FetchOrchestrator {
    pub fn new(ctl: Arc<dyn SmartController>, workers: usize) -> Self {
        Self {
            probe: RaidProbe::new(ctl),
            workers: workers.max(1),
        }
    }

    pub fn from_config(ctl: Arc<dyn SmartController>, config: &CollectorConfig) -> Self {
        Self {
            probe: RaidProbe::new(ctl).with_limit(config.raid_probe_limit),
            workers: config.worker_count(),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Fetch every device of `devices`, plus the given megaraid pairs.
    ///
    /// Fails only when a basic device fails; RAID and megaraid failures
    /// are logged and skipped.
    pub async fn run(
        &self,
        mode: FetchMode,
        devices: &DiscoveredDevices,
        megaraids: &[RaidParameters],
    ) -> Result<ResultSet> {
        let results: SharedResults = Arc::new(Mutex::new(ResultSet::default()));

        self.fetch_basic(mode, &devices.basic, &results).await?;
        self.fetch_raids(mode, &devices.raid, &results).await;
        self.fetch_megaraids(mode, megaraids, &results).await;

        let results = std::mem::take(&mut *results.lock());
        info!("Fetched SMART data for {} devices", results.len());

        Ok(results)
    }

    // =========================================================================
    // Basic Devices
    // =========================================================================

    async fn fetch_basic(
        &self,
        mode: FetchMode,
        devices: &[DeviceDescriptor],
        results: &SharedResults,
    ) -> Result<()> {
        if devices.is_empty() {
            return Ok(());
        }

        let queue = closed_queue(devices.to_vec());
        let (err_tx, mut err_rx) = mpsc::channel(self.workers);

        let mut workers = JoinSet::new();
        for _ in 0..self.workers {
            workers.spawn(basic_worker(
                self.probe.clone(),
                queue.clone(),
                results.clone(),
                mode,
                err_tx.clone(),
            ));
        }
        drop(err_tx);

        let failure = tokio::select! {
            biased;
            Some(err) = err_rx.recv() => Some(err),
            _ = drain(&mut workers) => err_rx.try_recv().ok(),
        };

        match failure {
            Some(err) => {
                workers.detach_all();
                Err(err)
            }
            None => Ok(()),
        }
    }

    // =========================================================================
    // RAID Devices
    // =========================================================================

    async fn fetch_raids(
        &self,
        mode: FetchMode,
        devices: &[DeviceDescriptor],
        results: &SharedResults,
    ) {
        if devices.is_empty() {
            return;
        }

        let (job_tx, job_rx) = mpsc::channel::<RaidJob>(self.workers);
        let (found_tx, mut found_rx) = mpsc::channel::<Vec<FetchedDevice>>(self.workers);
        let jobs = Arc::new(tokio::sync::Mutex::new(job_rx));

        let collector = {
            let results = results.clone();
            tokio::spawn(async move {
                while let Some(batch) = found_rx.recv().await {
                    for device in batch {
                        results.lock().insert(device.into_entry(mode));
                    }
                }
            })
        };

        let workers: Vec<_> = (0..self.workers)
            .map(|_| tokio::spawn(raid_worker(self.probe.clone(), jobs.clone(), found_tx.clone())))
            .collect();
        drop(found_tx);

        'dispatch: for device in devices {
            for raid_type in RaidType::PROBE_ORDER {
                let job = RaidJob {
                    device: device.clone(),
                    raid_type,
                };
                if job_tx.send(job).await.is_err() {
                    warn!("RAID workers exited before all jobs were dispatched");
                    break 'dispatch;
                }
            }
        }
        drop(job_tx);

        for joined in join_all(workers).await {
            if let Err(e) = joined {
                warn!("RAID worker failed: {}", e);
            }
        }

        if let Err(e) = collector.await {
            warn!("RAID result collector failed: {}", e);
        }
    }

    // =========================================================================
    // Megaraid Devices
    // =========================================================================

    async fn fetch_megaraids(
        &self,
        mode: FetchMode,
        params: &[RaidParameters],
        results: &SharedResults,
    ) {
        if params.is_empty() {
            return;
        }

        let queue = closed_queue(params.iter().map(DeviceDescriptor::from).collect());

        let mut workers = JoinSet::new();
        for _ in 0..self.workers {
            workers.spawn(megaraid_worker(
                self.probe.clone(),
                queue.clone(),
                results.clone(),
                mode,
            ));
        }

        drain(&mut workers).await;
    }
}

// =============================================================================
// Workers
// =============================================================================

async fn basic_worker(
    probe: RaidProbe,
    queue: Queue<DeviceDescriptor>,
    results: SharedResults,
    mode: FetchMode,
    errors: mpsc::Sender<Error>,
) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(device) = next else {
            return;
        };

        match probe.query(&device).await {
            Ok(found) => {
                results.lock().insert(found.into_entry(mode));
            }
            Err(Error::SmartUnavailable { device }) => {
                debug!("skipping {}: SMART status is not reported", device);
            }
            Err(e) => {
                let _ = errors.send(e).await;
                return;
            }
        }
    }
}

async fn raid_worker(
    probe: RaidProbe,
    jobs: Queue<RaidJob>,
    found: mpsc::Sender<Vec<FetchedDevice>>,
) {
    loop {
        let next = jobs.lock().await.recv().await;
        let Some(job) = next else {
            return;
        };

        let devices = probe.probe(&job.device, job.raid_type).await;
        trace!("{} as {} yielded {} devices", job.device.name, job.raid_type, devices.len());

        if !devices.is_empty() && found.send(devices).await.is_err() {
            return;
        }
    }
}

async fn megaraid_worker(
    probe: RaidProbe,
    queue: Queue<DeviceDescriptor>,
    results: SharedResults,
    mode: FetchMode,
) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(device) = next else {
            return;
        };

        match probe.query(&device).await {
            Ok(found) => {
                results.lock().insert(found.into_entry(mode));
            }
            Err(e) => trace!("failed to get megaraid device {}: {}", device.display_name, e),
        }
    }
}

/// Queue holding exactly `items`, with its sender already dropped.
fn closed_queue<T>(items: Vec<T>) -> Queue<T> {
    let (tx, rx) = mpsc::channel(items.len().max(1));
    for item in items {
        if tx.try_send(item).is_err() {
            break;
        }
    }
    Arc::new(tokio::sync::Mutex::new(rx))
}

async fn drain(workers: &mut JoinSet<()>) {
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            warn!("fetch worker failed: {}", e);
        }
    }
}
