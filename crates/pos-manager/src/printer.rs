//! Printer manager.

use crate::health::HealthTracker;
use crate::managed::{Managed, ManagedDevice};
use crate::DeviceManager;
use pos_core::{DeviceSettings, Result};
use pos_devices::{PrintItem, Printer};
use pos_hardware::traits::{PrinterHandle, PrinterStation};
use std::sync::Arc;
use std::time::Duration;

/// Printer operations use their own short lock timeout.
pub struct PrinterManager {
    printer: Managed<Printer<dyn PrinterHandle>>,
    tracker: HealthTracker,
    settings: DeviceSettings,
}

impl PrinterManager {
    pub fn new(printer: Arc<Printer<dyn PrinterHandle>>, settings: DeviceSettings) -> Self {
        Self {
            printer: Managed::new(printer, settings.connect_lock_timeout()),
            tracker: HealthTracker::new(),
            settings,
        }
    }

    pub fn printer(&self) -> &Arc<Printer<dyn PrinterHandle>> {
        self.printer.peripheral()
    }

    /// Print `items` as one transaction on `station`.
    pub fn print_content(&self, items: &[PrintItem], station: PrinterStation) -> Result<()> {
        let _guard = self.printer.lock(self.settings.printer_lock_timeout())?;
        self.printer.peripheral().print_content(items, station)
    }

    pub fn insert_slip(&self, timeout: Duration) -> Result<()> {
        let _guard = self.printer.lock(self.settings.printer_lock_timeout())?;
        self.printer.peripheral().insert_slip(timeout)
    }

    pub fn remove_slip(&self, timeout: Duration) -> Result<()> {
        let _guard = self.printer.lock(self.settings.printer_lock_timeout())?;
        self.printer.peripheral().remove_slip(timeout)
    }
}

impl DeviceManager for PrinterManager {
    fn devices(&self) -> Vec<&dyn ManagedDevice> {
        vec![&self.printer]
    }

    fn tracker(&self) -> &HealthTracker {
        &self.tracker
    }
}
