//! Domain Layer
//!
//! - **Ports** (`ports.rs`) - Trait abstractions for external dependencies
//!
//! # Usage
//!
//! ```ignore
//! use smart_collector::domain::ports::SmartController;
//!
//! async fn version<C: SmartController>(ctl: &C) -> Result<Bytes> {
//!     ctl.execute(&["-j", "-V"]).await
//! }
//! ```

pub mod ports;

pub use ports::{Clock, SmartController, SystemClock};
