//! Driver boundary and session plumbing for point-of-sale peripherals.
//!
//! Vendor drivers expose a synchronous control handle (open, claim, enable,
//! plus peripheral operations) and deliver asynchronous callbacks on their
//! own threads. This crate holds everything between that boundary and the
//! peripheral protocols:
//!
//! - [`traits`]: the handle traits consumed here and implemented by drivers,
//!   with power reporting as an optional capability.
//! - [`registry`] and [`discovery`]: candidate logical configurations and the
//!   open/claim/enable probe that binds a handle to the first one answering.
//! - [`supervisor`]: one handle, one session, with a live connection predicate.
//! - [`bridge`]: a single-slot barrier that turns callbacks into a blocking,
//!   cancellable wait.
//! - [`lock`]: the per-peripheral operation lock.
//! - [`mock`]: scriptable drivers for tests and simulation.
//!
//! # Example
//!
//! ```
//! use pos_core::DeviceSettings;
//! use pos_hardware::discovery::Discovery;
//! use pos_hardware::mock::MockScale;
//! use pos_hardware::registry::{InMemoryRegistry, LogicalDeviceConfig};
//! use pos_hardware::supervisor::{ConnectOutcome, ConnectionSupervisor};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(InMemoryRegistry::new(vec![
//!     LogicalDeviceConfig::new("Scale", "Unplugged"),
//!     LogicalDeviceConfig::new("Scale", "Magellan"),
//! ]));
//! let scale = MockScale::new("Magellan");
//! let supervisor = ConnectionSupervisor::new(
//!     scale,
//!     Discovery::new(registry, DeviceSettings::fast()),
//!     None,
//! );
//!
//! assert_eq!(supervisor.connect(), ConnectOutcome::Connected);
//! assert!(supervisor.is_connected());
//! assert_eq!(supervisor.bound_config().unwrap().logical_name, "Magellan");
//! ```

pub mod bridge;
pub mod codes;
pub mod discovery;
pub mod error;
pub mod events;
pub mod lock;
pub mod mock;
pub mod registry;
pub mod supervisor;
pub mod traits;

pub use bridge::EventBridge;
pub use error::{DriverError, DriverResult, ErrorCode};
pub use events::DriverEvent;
pub use lock::{OperationGuard, OperationLock};
pub use registry::{DeviceFilter, DeviceRegistry, LogicalDeviceConfig};
pub use supervisor::{ConnectOutcome, ConnectionSupervisor};
pub use traits::{DeviceCategory, DriverListener, HardwareHandle};
