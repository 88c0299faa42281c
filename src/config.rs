//! Collector configuration
//!
//! Settings can be loaded from a YAML file and are then overridden by
//! command-line flags in the binary. Every field has a default, so a
//! partial file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default per-invocation smartctl timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between smartctl version checks.
pub const DEFAULT_VERSION_CHECK_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default upper bound on logical drives enumerated per RAID probe.
pub const DEFAULT_RAID_PROBE_LIMIT: u32 = 256;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the S.M.A.R.T. collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Path to the smartctl binary
    pub smartctl_path: PathBuf,

    /// Run smartctl through sudo
    pub use_sudo: bool,

    /// Timeout for a single smartctl invocation
    #[serde(with = "duration_secs")]
    pub timeout: Duration,

    /// Worker count override (defaults to available parallelism)
    pub workers: Option<usize>,

    /// How long a successful version check stays valid
    #[serde(with = "duration_secs")]
    pub version_check_interval: Duration,

    /// Maximum logical drives enumerated for one device and RAID type
    pub raid_probe_limit: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            smartctl_path: PathBuf::from("smartctl"),
            use_sudo: false,
            timeout: DEFAULT_TIMEOUT,
            workers: None,
            version_check_interval: DEFAULT_VERSION_CHECK_INTERVAL,
            raid_probe_limit: DEFAULT_RAID_PROBE_LIMIT,
        }
    }
}

impl CollectorConfig {
    /// Parse a configuration from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)
            .map_err(|e| Error::Config(format!("invalid YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Check values that have no meaningful zero.
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".into()));
        }
        if self.raid_probe_limit == 0 {
            return Err(Error::Config(
                "raid_probe_limit must be greater than zero".into(),
            ));
        }
        if self.smartctl_path.as_os_str().is_empty() {
            return Err(Error::Config("smartctl_path must not be empty".into()));
        }
        Ok(())
    }

    /// Number of concurrent workers per fetch phase, never below 1.
    pub fn worker_count(&self) -> usize {
        self.workers
            .filter(|&n| n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
