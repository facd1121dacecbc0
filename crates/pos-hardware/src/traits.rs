//! Driver boundary traits.
//!
//! Vendor drivers expose a synchronous control handle plus asynchronous
//! callbacks. [`HardwareHandle`] is the part every peripheral shares; each
//! peripheral adds its own operations in a sub-trait. All methods take `&self`
//! because drivers are shared between request threads and the driver's own
//! callback thread, and do their own internal synchronisation.
//!
//! Power notifications are an optional capability: a handle that supports
//! them returns `Some` from [`HardwareHandle::power_reporting`].

use crate::codes::{ControlState, PowerReportingCapability, PowerState};
use crate::error::DriverResult;
use crate::events::{DataEvent, ErrorEvent, OutputCompleteEvent, StatusEvent};
use pos_core::CheckData;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Registry category a handle binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceCategory {
    CashDrawer,
    PosPrinter,
    Micr,
    Scale,
    LineDisplay,
    Scanner,
}

impl DeviceCategory {
    /// Category name as listed in the device registry.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CashDrawer => "CashDrawer",
            Self::PosPrinter => "POSPrinter",
            Self::Micr => "MICR",
            Self::Scale => "Scale",
            Self::LineDisplay => "LineDisplay",
            Self::Scanner => "Scanner",
        }
    }
}

impl fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver for driver callbacks.
///
/// Drivers invoke these from their own threads. Implementations must not
/// block for long.
pub trait DriverListener: Send + Sync {
    fn on_data(&self, _event: DataEvent) {}

    fn on_error(&self, _event: ErrorEvent) {}

    fn on_status(&self, _event: StatusEvent) {}

    fn on_output_complete(&self, _event: OutputCompleteEvent) {}
}

/// Listener that forwards to a weakly held target.
///
/// Drivers keep their listeners alive; forwarding through a `Weak` lets an
/// orchestrator own its handle without the handle owning it back.
pub struct WeakListener<T>(Weak<T>);

impl<T> WeakListener<T> {
    pub fn new(target: &Arc<T>) -> Self {
        Self(Arc::downgrade(target))
    }
}

impl<T: DriverListener> DriverListener for WeakListener<T> {
    fn on_data(&self, event: DataEvent) {
        if let Some(target) = self.0.upgrade() {
            target.on_data(event);
        }
    }

    fn on_error(&self, event: ErrorEvent) {
        if let Some(target) = self.0.upgrade() {
            target.on_error(event);
        }
    }

    fn on_status(&self, event: StatusEvent) {
        if let Some(target) = self.0.upgrade() {
            target.on_status(event);
        }
    }

    fn on_output_complete(&self, event: OutputCompleteEvent) {
        if let Some(target) = self.0.upgrade() {
            target.on_output_complete(event);
        }
    }
}

/// Optional power notification capability.
pub trait PowerReporting: Send + Sync {
    fn power_notify_capability(&self) -> PowerReportingCapability;

    fn set_power_notify(&self, enabled: bool) -> DriverResult<()>;
}

/// Control handle shared by every peripheral driver.
pub trait HardwareHandle: Send + Sync {
    /// Registry category this handle binds to.
    fn category(&self) -> DeviceCategory;

    fn open(&self, logical_name: &str) -> DriverResult<()>;

    fn close(&self) -> DriverResult<()>;

    fn claim(&self, timeout: Duration) -> DriverResult<()>;

    fn release(&self) -> DriverResult<()>;

    fn set_device_enabled(&self, enabled: bool) -> DriverResult<()>;

    fn device_enabled(&self) -> DriverResult<bool>;

    fn state(&self) -> ControlState;

    fn claimed(&self) -> bool;

    fn power_state(&self) -> DriverResult<PowerState>;

    /// Human readable description of the bound physical device.
    fn physical_device_description(&self) -> DriverResult<String>;

    /// Register a callback receiver.
    fn add_listener(&self, listener: Arc<dyn DriverListener>);

    /// Power notification capability, when the driver has one.
    fn power_reporting(&self) -> Option<&dyn PowerReporting> {
        None
    }
}

/// Register `target` as a weakly held listener on `handle`.
pub fn attach_listener<H, T>(handle: &H, target: &Arc<T>)
where
    H: HardwareHandle + ?Sized,
    T: DriverListener + 'static,
{
    handle.add_listener(Arc::new(WeakListener::new(target)));
}

pub trait CashDrawerHandle: HardwareHandle {
    fn open_drawer(&self) -> DriverResult<()>;

    fn drawer_opened(&self) -> DriverResult<bool>;
}

/// Printer station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrinterStation {
    Receipt,
    Slip,
}

pub trait PrinterHandle: HardwareHandle {
    fn set_async_mode(&self, enabled: bool) -> DriverResult<()>;

    /// Begin (`TP_TRANSACTION`) or end and flush (`TP_NORMAL`) a transaction.
    fn transaction_print(&self, station: PrinterStation, control: i32) -> DriverResult<()>;

    fn print_normal(&self, station: PrinterStation, data: &str) -> DriverResult<()>;

    fn print_barcode(
        &self,
        station: PrinterStation,
        data: &str,
        symbology: i32,
        height: i32,
        width: i32,
    ) -> DriverResult<()>;

    fn print_bitmap(&self, station: PrinterStation, image: &[u8], width: i32) -> DriverResult<()>;

    fn clear_output(&self) -> DriverResult<()>;

    fn cover_open(&self) -> DriverResult<bool>;

    fn rec_empty(&self) -> DriverResult<bool>;

    fn slp_empty(&self) -> DriverResult<bool>;

    /// Direct query of the receipt near-end sensor.
    fn query_rec_near_end(&self) -> DriverResult<bool>;

    fn begin_insertion(&self, timeout: Duration) -> DriverResult<()>;

    fn end_insertion(&self) -> DriverResult<()>;

    fn begin_removal(&self, timeout: Duration) -> DriverResult<()>;

    fn end_removal(&self) -> DriverResult<()>;
}

pub trait MicrHandle: HardwareHandle {
    fn begin_insertion(&self, timeout: Duration) -> DriverResult<()>;

    fn end_insertion(&self) -> DriverResult<()>;

    fn begin_removal(&self, timeout: Duration) -> DriverResult<()>;

    fn end_removal(&self) -> DriverResult<()>;

    fn set_data_event_enabled(&self, enabled: bool) -> DriverResult<()>;

    fn clear_input(&self) -> DriverResult<()>;

    /// Fields parsed from the last check read.
    fn check_fields(&self) -> DriverResult<CheckData>;
}

pub trait ScaleHandle: HardwareHandle {
    /// Blocking read of a settled weight, in thousandths of the weight unit.
    fn read_weight(&self, timeout: Duration) -> DriverResult<i32>;

    /// Last live weight reported with a status update.
    fn live_weight(&self) -> DriverResult<i32>;

    fn set_status_notify(&self, enabled: bool) -> DriverResult<()>;
}

pub trait LineDisplayHandle: HardwareHandle {
    fn display_text_at(&self, row: usize, column: usize, text: &str) -> DriverResult<()>;

    fn clear_text(&self) -> DriverResult<()>;
}

pub trait ScannerHandle: HardwareHandle {
    fn set_auto_disable(&self, enabled: bool) -> DriverResult<()>;

    fn set_decode_data(&self, enabled: bool) -> DriverResult<()>;

    fn set_data_event_enabled(&self, enabled: bool) -> DriverResult<()>;

    fn scan_data_label(&self) -> DriverResult<Vec<u8>>;

    fn scan_data_type(&self) -> DriverResult<i32>;

    fn clear_input(&self) -> DriverResult<()>;
}
