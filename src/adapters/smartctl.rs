//! smartctl Process Adapter
//!
//! Implements the `SmartController` port by spawning smartctl.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::config::CollectorConfig;
use crate::domain::ports::SmartController;
use crate::error::{Error, Result};

/// Runs smartctl as a child process.
///
/// smartctl encodes warnings in its exit status, so a non-zero exit that
/// still produced output is passed through for the report parser to judge.
#[derive(Debug, Clone)]
pub struct SmartctlRunner {
    path: PathBuf,
    use_sudo: bool,
    timeout: Duration,
}

impl SmartctlRunner {
    /// Create a runner for the given binary.
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            use_sudo: false,
            timeout,
        }
    }

    /// Create a runner from collector settings.
    pub fn from_config(config: &CollectorConfig) -> Self {
        Self::new(config.smartctl_path.clone(), config.timeout).with_sudo(config.use_sudo)
    }

    /// Run smartctl through non-interactive sudo.
    pub fn with_sudo(mut self, use_sudo: bool) -> Self {
        self.use_sudo = use_sudo;
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = if self.use_sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg("-n").arg(&self.path);
            cmd
        } else {
            Command::new(&self.path)
        };

        cmd.args(args)
            .env("LANG", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl SmartController for SmartctlRunner {
    async fn execute(&self, args: &[&str]) -> Result<Bytes> {
        trace!("Running {} {}", self.path.display(), args.join(" "));

        let output = timeout(self.timeout, self.command(args).output())
            .await
            .map_err(|_| Error::execution(args, format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| Error::execution(args, e.to_string()))?;

        classify_output(args, output.status.code(), output.stdout, &output.stderr)
    }
}

/// Decide whether a finished smartctl run produced usable output.
fn classify_output(
    args: &[&str],
    code: Option<i32>,
    stdout: Vec<u8>,
    stderr: &[u8],
) -> Result<Bytes> {
    let has_output = stdout.iter().any(|b| !b.is_ascii_whitespace());

    match code {
        None => Err(Error::execution(args, "terminated by signal")),
        Some(0) => Ok(Bytes::from(stdout)),
        Some(code) if has_output => {
            debug!(
                "smartctl {} exited with status {}, keeping output",
                args.join(" "),
                code
            );
            Ok(Bytes::from(stdout))
        }
        Some(code) => Err(Error::execution(
            args,
            format!(
                "exit status {}: {}",
                code,
                String::from_utf8_lossy(stderr).trim()
            ),
        )),
    }
}
