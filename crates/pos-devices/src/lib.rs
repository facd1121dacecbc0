//! Peripheral device orchestrators.
//!
//! Each orchestrator wraps one [`ConnectionSupervisor`] and one
//! [`EventBridge`](pos_hardware::EventBridge), handles its driver's callbacks,
//! and implements the peripheral's protocol: opening the drawer and waiting
//! for it to close, printing a transaction, reading a check, weighing,
//! writing the line display, and scanning. Raw driver errors are classified
//! into [`DeviceError`](pos_core::DeviceError) by exhaustive per-peripheral
//! tables.
//!
//! Orchestrators are created behind an `Arc` and register themselves as weak
//! driver listeners, so dropping the last `Arc` stops callback delivery.
//!
//! Every orchestrator owns an [`OperationLock`](pos_hardware::OperationLock);
//! callers take it with [`Peripheral::try_lock`] around one logical operation.
//!
//! [`ConnectionSupervisor`]: pos_hardware::ConnectionSupervisor

pub mod base;
pub mod cash_drawer;
pub mod line_display;
pub mod micr;
pub mod printer;
pub mod scale;
pub mod scanner;

pub use base::DeviceCore;
pub use cash_drawer::CashDrawer;
pub use line_display::LineDisplay;
pub use micr::Micr;
pub use printer::{PrintItem, Printer};
pub use scale::Scale;
pub use scanner::Scanner;

use pos_core::DeviceKind;
use pos_hardware::OperationGuard;
use std::time::Duration;

/// Common surface of every device orchestrator.
pub trait Peripheral: Send + Sync {
    /// Kind of peripheral this orchestrator drives.
    fn kind(&self) -> DeviceKind;

    /// Connect if not connected. Returns whether the device is connected afterwards.
    ///
    /// Never fails; discovery problems are logged.
    fn connect(&self) -> bool;

    /// Release and close the handle and reset transient state.
    fn disconnect(&self);

    /// Live connection predicate.
    fn is_connected(&self) -> bool;

    /// Physical device description, or the kind name if unavailable.
    fn device_name(&self) -> String;

    /// Take the operation lock within `timeout`.
    fn try_lock(&self, timeout: Duration) -> Option<OperationGuard<'_>>;
}
