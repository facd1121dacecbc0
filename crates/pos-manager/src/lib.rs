//! Manager layer for point-of-sale peripherals.
//!
//! A manager is the externally callable surface of one peripheral (two for
//! the scanners). It serializes operations through the orchestrator's
//! operation lock, turns lock contention into a busy error, and keeps the
//! health cache described in [`health`].
//!
//! ```text
//! ┌───────────────────┐  connect() every interval  ┌──────────────────┐
//! │ ReconnectScheduler│───────────────────────────►│  DeviceManager   │
//! └───────────────────┘                            │  (per peripheral)│
//!           │ health() every interval              └────────┬─────────┘
//!           ▼                                               │ try_lock
//! ┌───────────────────┐   error snapshots    ┌──────────────▼─────────┐
//! │ AvailabilityAggr. │─────────────────────►│ subscribers (mpsc)     │
//! └───────────────────┘                      └────────────────────────┘
//! ```
//!
//! Managers receive their orchestrators already built; the availability
//! aggregator receives its managers explicitly at startup.

pub mod availability;
pub mod cash_drawer;
pub mod descriptor;
pub mod health;
pub mod line_display;
pub mod managed;
pub mod micr;
pub mod printer;
pub mod scale;
pub mod scanner;
pub mod scheduler;

pub use availability::{
    AvailabilityAggregator, DeviceAvailability, DeviceErrorNotifier, DeviceErrorSnapshot,
};
pub use cash_drawer::CashDrawerManager;
pub use descriptor::{DescriptorError, DeviceDescriptor, DeviceDescriptors};
pub use health::{FirstConnectGate, HealthTracker};
pub use line_display::LineDisplayManager;
pub use managed::{Managed, ManagedDevice};
pub use micr::MicrManager;
pub use printer::PrinterManager;
pub use scale::ScaleManager;
pub use scanner::{ScanTarget, ScannerManager};
pub use scheduler::{ReconnectScheduler, SchedulerHandle, ShutdownReport};

use pos_core::{DeviceKind, HealthRecord, Result};

/// Common surface of every manager.
///
/// Implementors supply their devices and health tracker; connection,
/// reconnection and health reporting are provided.
pub trait DeviceManager: Send + Sync {
    /// Devices under this manager, in reporting order.
    fn devices(&self) -> Vec<&dyn ManagedDevice>;

    fn tracker(&self) -> &HealthTracker;

    /// Kinds reported by [`health`](Self::health), in the same order.
    fn kinds(&self) -> Vec<DeviceKind> {
        self.devices().iter().map(|device| device.kind()).collect()
    }

    /// Best-effort connect of every device, as run by the scheduler.
    ///
    /// The first call advances the first-connect gate.
    fn connect(&self) {
        for device in self.devices() {
            device.connect();
        }
        self.tracker().gate().on_connect_tick();
    }

    /// Disconnect and connect every device again.
    ///
    /// Fails with the first device's busy or offline error; the remaining
    /// devices are still attempted.
    fn reconnect_device(&self) -> Result<()> {
        let mut outcome = Ok(());
        for device in self.devices() {
            if let Err(e) = device.reconnect()
                && outcome.is_ok()
            {
                outcome = Err(e);
            }
        }
        outcome
    }

    /// Fresh health, one record per device. Updates the cache.
    fn health(&self) -> Vec<HealthRecord> {
        let records = fresh_health(self);
        self.tracker().record(records)
    }

    /// Cached health, subject to the first-connect rules.
    fn status(&self) -> Vec<HealthRecord> {
        self.tracker().status(|| fresh_health(self))
    }
}

fn fresh_health<M: DeviceManager + ?Sized>(manager: &M) -> Vec<HealthRecord> {
    manager
        .devices()
        .iter()
        .map(|device| device.health())
        .collect()
}
