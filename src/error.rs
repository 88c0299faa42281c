//! Error types for the S.M.A.R.T. collector

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while collecting S.M.A.R.T. data
#[derive(Error, Debug)]
pub enum Error {
    /// Device scan failed or its output could not be decoded
    #[error("Device discovery failed: {0}")]
    Discovery(String),

    /// smartctl version is unsupported or could not be determined
    #[error("smartctl version check failed: {0}")]
    Version(String),

    /// smartctl could not be run or exited without usable output
    #[error("smartctl '{command}' failed: {reason}")]
    Execution { command: String, reason: String },

    /// smartctl output is not valid JSON
    #[error("Failed to parse smartctl output: {0}")]
    Parse(#[from] serde_json::Error),

    /// smartctl reported a parse or open error in its exit status envelope
    #[error("smartctl returned error: {0}")]
    Device(String),

    /// Device answered but exposes no SMART status
    #[error("SMART data unavailable for device: {device}")]
    SmartUnavailable { device: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build an execution error for the given smartctl arguments.
    pub fn execution(args: &[&str], reason: impl Into<String>) -> Self {
        Error::Execution {
            command: args.join(" "),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_joins_args() {
        let err = Error::execution(&["-a", "/dev/sda", "-j"], "exit status 2");
        assert_eq!(
            err.to_string(),
            "smartctl '-a /dev/sda -j' failed: exit status 2"
        );
    }

    #[test]
    fn test_device_error_message() {
        let err = Error::Device("No such device".to_string());
        assert_eq!(err.to_string(), "smartctl returned error: No such device");
    }
}
