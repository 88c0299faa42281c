//! Domain Ports (Port/Adapter Pattern)
//!
//! Abstractions the collection pipeline depends on. Infrastructure adapters
//! implement these traits to provide concrete implementations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Domain Layer                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │          SmartController │ Clock                     │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                  Adapters (Impls)                    │    │
//! │  │  SmartctlRunner │ ScriptedSmartctl │ SystemClock     │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::Result;

// =============================================================================
// Execution Port
// =============================================================================

/// Port for running the smartctl diagnostic tool.
///
/// Implementations return the raw stdout of one invocation, or fail with
/// [`Error::Execution`](crate::Error::Execution) when the tool could not be
/// run or produced no usable output.
///
/// # Example
///
/// ```ignore
/// struct SmartctlRunner { /* ... */ }
///
/// #[async_trait]
/// impl SmartController for SmartctlRunner {
///     async fn execute(&self, args: &[&str]) -> Result<Bytes> {
///         // spawn smartctl with args, capture stdout
///     }
/// }
/// ```
#[async_trait]
pub trait SmartController: Send + Sync {
    /// Run smartctl with the given arguments and return its stdout.
    async fn execute(&self, args: &[&str]) -> Result<Bytes>;
}

// =============================================================================
// Clock Port
// =============================================================================

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// =============================================================================
// Tests
// =============================================================================
