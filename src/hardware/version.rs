//! smartctl Version Gate
//!
//! JSON output with the fields this crate reads requires smartctl 7.1 or
//! newer. The check is amortized: a successful result stays valid for a
//! configurable interval (24 hours by default), tracked by a
//! [`VersionCache`] the caller owns and shares between cycles. Only a
//! successful check is remembered.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info};

use super::discovery::report::ToolEnvelope;
use crate::config::DEFAULT_VERSION_CHECK_INTERVAL;
use crate::domain::ports::{Clock, SmartController, SystemClock};
use crate::error::{Error, Result};

/// Oldest supported smartctl release
pub const MIN_SUPPORTED_VERSION: SmartctlVersion = SmartctlVersion { major: 7, minor: 1 };

const VERSION_ARGS: [&str; 2] = ["-j", "-V"];

// =============================================================================
// Version
// =============================================================================

/// smartctl `major.minor` version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SmartctlVersion {
    pub major: u32,
    pub minor: u32,
}

impl SmartctlVersion {
    /// Build from the `smartctl.version` digits; `[n]` means `n.0`.
    pub fn from_digits(digits: &[u32]) -> Result<Self> {
        match digits {
            [] => Err(Error::Version("invalid smartctl version".into())),
            [major] => Ok(Self { major: *major, minor: 0 }),
            [major, minor, ..] => Ok(Self {
                major: *major,
                minor: *minor,
            }),
        }
    }
}

impl std::fmt::Display for SmartctlVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Fail unless `digits` name a version at or above [`MIN_SUPPORTED_VERSION`].
pub fn evaluate_version(digits: &[u32]) -> Result<SmartctlVersion> {
    let version = SmartctlVersion::from_digits(digits)?;

    if version < MIN_SUPPORTED_VERSION {
        return Err(Error::Version(format!(
            "incorrect smartctl version {}, must be {} or higher",
            version, MIN_SUPPORTED_VERSION
        )));
    }

    Ok(version)
}

#[derive(Debug, Deserialize)]
struct VersionOutput {
    #[serde(default)]
    smartctl: ToolEnvelope,
}

// =============================================================================
// Version Cache
// =============================================================================

/// Outcome of an in-flight check; `None` until it finishes
type CheckOutcome = Option<std::result::Result<(), String>>;

#[derive(Default)]
struct CacheState {
    last_checked: Option<DateTime<Utc>>,
    in_flight: Option<watch::Receiver<CheckOutcome>>,
}

/// Time of the last successful version check
///
/// Only one check runs at a time. Callers arriving while it runs wait for
/// its outcome instead of querying smartctl again.
pub struct VersionCache {
    clock: Arc<dyn Clock>,
    interval: Duration,
    state: Mutex<CacheState>,
}

enum Slot<'a> {
    /// A successful check is still valid
    Valid,
    /// The caller must run the check and report through the guard
    Check(InFlight<'a>),
    /// Another caller is checking
    Wait(watch::Receiver<CheckOutcome>),
}

impl VersionCache {
    pub fn new(clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            clock,
            interval,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Cache driven by the system clock.
    pub fn with_interval(interval: Duration) -> Self {
        Self::new(Arc::new(SystemClock), interval)
    }

    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        self.state.lock().last_checked
    }

    fn claim(&self) -> Slot<'_> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        if let Some(at) = state.last_checked {
            // A clock that went backwards keeps the previous result.
            let expired = matches!((now - at).to_std(), Ok(elapsed) if elapsed > self.interval);
            if !expired {
                return Slot::Valid;
            }
        }

        if let Some(rx) = &state.in_flight {
            return Slot::Wait(rx.clone());
        }

        let (tx, rx) = watch::channel(None);
        state.in_flight = Some(rx);
        Slot::Check(InFlight {
            cache: self,
            tx: Some(tx),
        })
    }
}

impl Default for VersionCache {
    fn default() -> Self {
        Self::with_interval(DEFAULT_VERSION_CHECK_INTERVAL)
    }
}

impl std::fmt::Debug for VersionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionCache")
            .field("interval", &self.interval)
            .field("last_checked", &self.last_checked())
            .finish()
    }
}

/// Ownership of the running check.
///
/// Dropping it unfinished clears the in-flight marker, which wakes waiters
/// so one of them takes over.
struct InFlight<'a> {
    cache: &'a VersionCache,
    tx: Option<watch::Sender<CheckOutcome>>,
}

impl InFlight<'_> {
    fn finish(mut self, outcome: std::result::Result<(), String>) {
        {
            let mut state = self.cache.state.lock();
            if outcome.is_ok() {
                state.last_checked = Some(self.cache.clock.now());
            }
            state.in_flight = None;
        }

        if let Some(tx) = self.tx.take() {
            tx.send_replace(Some(outcome));
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            self.cache.state.lock().in_flight = None;
        }
    }
}

// =============================================================================
// Version Gate
// =============================================================================

/// Ensures the installed smartctl is recent enough
pub struct VersionGate {
    ctl: Arc<dyn SmartController>,
    cache: Arc<VersionCache>,
}

impl VersionGate {
    pub fn new(ctl: Arc<dyn SmartController>, cache: Arc<VersionCache>) -> Self {
        Self { ctl, cache }
    }

    /// Check the smartctl version unless a recent check succeeded.
    pub async fn ensure_supported(&self) -> Result<()> {
        loop {
            match self.cache.claim() {
                Slot::Valid => {
                    debug!("smartctl version check still valid, skipping");
                    return Ok(());
                }
                Slot::Check(flight) => {
                    return match self.check().await {
                        Ok(version) => {
                            flight.finish(Ok(()));
                            info!("smartctl version {} is supported", version);
                            Ok(())
                        }
                        Err(e) => {
                            flight.finish(Err(version_reason(&e)));
                            Err(e)
                        }
                    };
                }
                Slot::Wait(mut rx) => {
                    let outcome = rx
                        .wait_for(Option::is_some)
                        .await
                        .ok()
                        .and_then(|outcome| (*outcome).clone());

                    match outcome {
                        Some(Ok(())) => return Ok(()),
                        Some(Err(reason)) => return Err(Error::Version(reason)),
                        // The checking caller went away; claim again.
                        None => continue,
                    }
                }
            }
        }
    }

    async fn check(&self) -> Result<SmartctlVersion> {
        let out = self
            .ctl
            .execute(&VERSION_ARGS)
            .await
            .map_err(|e| Error::Version(format!("failed to execute smartctl: {}", e)))?;

        let body: VersionOutput = serde_json::from_slice(&out).map_err(|e| {
            Error::Version(format!("failed to parse smartctl version output: {}", e))
        })?;

        evaluate_version(&body.smartctl.version)
    }
}

fn version_reason(err: &Error) -> String {
    match err {
        Error::Version(reason) => reason.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ScriptedSmartctl;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn new() -> Self {
            Self(Mutex::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()))
        }

        fn advance(&self, by: chrono::Duration) {
            *self.0.lock() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock()
        }
    }

    fn version_payload(digits: &str) -> String {
        format!(r#"{{"smartctl": {{"version": {}, "exit_status": 0}}}}"#, digits)
    }

    fn gate(ctl: Arc<ScriptedSmartctl>, clock: Arc<ManualClock>) -> VersionGate {
        let cache = Arc::new(VersionCache::new(clock, DEFAULT_VERSION_CHECK_INTERVAL));
        VersionGate::new(ctl, cache)
    }

    #[test]
    fn test_evaluate_version() {
        assert!(evaluate_version(&[7, 1]).is_ok());
        assert!(evaluate_version(&[7, 4]).is_ok());
        assert!(evaluate_version(&[8]).is_ok());
        assert!(evaluate_version(&[7, 10]).is_ok());
        assert_matches!(evaluate_version(&[7, 0]), Err(Error::Version(_)));
        assert_matches!(evaluate_version(&[7]), Err(Error::Version(_)));
        assert_matches!(evaluate_version(&[6, 9]), Err(Error::Version(_)));
        assert_matches!(evaluate_version(&[]), Err(Error::Version(_)));
    }

    #[test]
    fn test_version_display() {
        assert_eq!(MIN_SUPPORTED_VERSION.to_string(), "7.1");
    }

    #[tokio::test]
    async fn test_second_check_within_interval_is_skipped() {
        let ctl = Arc::new(ScriptedSmartctl::new().respond("-j -V", version_payload("[7, 1]")));
        let clock = Arc::new(ManualClock::new());
        let gate = gate(ctl.clone(), clock.clone());

        gate.ensure_supported().await.unwrap();
        clock.advance(chrono::Duration::hours(23));
        gate.ensure_supported().await.unwrap();

        assert_eq!(ctl.call_count("-j -V"), 1);

        clock.advance(chrono::Duration::hours(2));
        gate.ensure_supported().await.unwrap();
        assert_eq!(ctl.call_count("-j -V"), 2);
    }

    #[tokio::test]
    async fn test_old_version_fails_and_is_rechecked() {
        let ctl = Arc::new(ScriptedSmartctl::new().respond("-j -V", version_payload("[7, 0]")));
        let clock = Arc::new(ManualClock::new());
        let gate = gate(ctl.clone(), clock);

        assert_matches!(gate.ensure_supported().await, Err(Error::Version(_)));
        assert_matches!(gate.ensure_supported().await, Err(Error::Version(_)));
        assert_eq!(ctl.call_count("-j -V"), 2);
    }

    #[tokio::test]
    async fn test_empty_version_fails() {
        let ctl = Arc::new(ScriptedSmartctl::new().respond("-j -V", version_payload("[]")));
        let gate = gate(ctl, Arc::new(ManualClock::new()));

        assert_matches!(gate.ensure_supported().await, Err(Error::Version(_)));
    }

    #[tokio::test]
    async fn test_execution_failure_is_version_error() {
        let ctl = Arc::new(ScriptedSmartctl::new().fail("-j -V", "not found"));
        let gate = gate(ctl, Arc::new(ManualClock::new()));

        let err = gate.ensure_supported().await.unwrap_err();
        assert_matches!(err, Error::Version(ref msg) if msg.contains("failed to execute"));
    }

    #[tokio::test]
    async fn test_unparsable_output_is_version_error() {
        let ctl = Arc::new(ScriptedSmartctl::new().respond("-j -V", "smartctl 7.3 2022-02-28"));
        let gate = gate(ctl, Arc::new(ManualClock::new()));

        assert_matches!(gate.ensure_supported().await, Err(Error::Version(_)));
    }

    /// Answers the version query after a delay
    struct SlowSmartctl {
        payload: &'static str,
        delay: std::time::Duration,
        calls: std::sync::atomic::AtomicUsize,
    }

    impl SlowSmartctl {
        fn new(payload: &'static str) -> Self {
            Self {
                payload,
                delay: std::time::Duration::from_millis(50),
                calls: std::sync::atomic::AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl SmartController for SlowSmartctl {
        async fn execute(&self, _args: &[&str]) -> Result<bytes::Bytes> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(bytes::Bytes::from_static(self.payload.as_bytes()))
        }
    }

    const OLD_VERSION: &str = r#"{"smartctl": {"version": [7, 0], "exit_status": 0}}"#;
    const NEW_VERSION: &str = r#"{"smartctl": {"version": [7, 2], "exit_status": 0}}"#;

    fn shared_gates(ctl: Arc<SlowSmartctl>) -> (VersionGate, VersionGate, Arc<VersionCache>) {
        let cache = Arc::new(VersionCache::new(
            Arc::new(ManualClock::new()),
            DEFAULT_VERSION_CHECK_INTERVAL,
        ));
        (
            VersionGate::new(ctl.clone(), cache.clone()),
            VersionGate::new(ctl, cache.clone()),
            cache,
        )
    }

    #[tokio::test]
    async fn test_concurrent_check_waits_for_failure() {
        let ctl = Arc::new(SlowSmartctl::new(OLD_VERSION));
        let (first, second, cache) = shared_gates(ctl.clone());

        let (a, b) = tokio::join!(first.ensure_supported(), second.ensure_supported());

        assert_matches!(a, Err(Error::Version(_)));
        assert_matches!(b, Err(Error::Version(ref msg)) if msg.contains("7.0"));
        assert_eq!(ctl.calls(), 1);
        assert!(cache.last_checked().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_check_shares_success() {
        let ctl = Arc::new(SlowSmartctl::new(NEW_VERSION));
        let (first, second, cache) = shared_gates(ctl.clone());

        let (a, b) = tokio::join!(first.ensure_supported(), second.ensure_supported());

        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(ctl.calls(), 1);
        assert!(cache.last_checked().is_some());
    }

    #[tokio::test]
    async fn test_abandoned_check_is_retried() {
        let ctl = Arc::new(SlowSmartctl::new(NEW_VERSION));
        let (first, second, cache) = shared_gates(ctl.clone());

        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(5),
            first.ensure_supported(),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(cache.last_checked().is_none());

        second.ensure_supported().await.unwrap();
        assert_eq!(ctl.calls(), 2);
        assert!(cache.last_checked().is_some());
    }
}
