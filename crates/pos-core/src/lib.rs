//! Shared vocabulary for the point-of-sale peripheral supervisor.
//!
//! This crate holds the pieces every other crate in the workspace agrees on:
//! the classified error taxonomy returned to callers, the device kinds and
//! health types exchanged between managers and the availability aggregator,
//! the parsed payloads produced by peripherals (barcodes, checks, weights),
//! and the tunable timings that govern connection and protocol behaviour.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use config::DeviceSettings;
pub use error::{DeviceError, Result, WeightError};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
