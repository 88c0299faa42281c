//! Infrastructure Adapters
//!
//! Implementations of the domain ports, following the Port/Adapter
//! (Hexagonal) architecture pattern.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │           Ports (domain::ports)              │
//! │               SmartController                │
//! └──────────────────────────────────────────────┘
//!                        │
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │            Adapters (This Module)            │
//! │      SmartctlRunner │ ScriptedSmartctl       │
//! └──────────────────────────────────────────────┘
//! ```

mod scripted;
mod smartctl;

pub use scripted::ScriptedSmartctl;
pub use smartctl::SmartctlRunner;
