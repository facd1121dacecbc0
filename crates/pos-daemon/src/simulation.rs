//! Simulated station: every peripheral wired to a mock driver.

use crate::config::SimulatedDevices;
use pos_core::{DeviceKind, DeviceSettings};
use pos_devices::{CashDrawer, LineDisplay, Micr, Printer, Scale, Scanner};
use pos_hardware::mock::{
    MockCashDrawer, MockDriver, MockLineDisplay, MockMicr, MockPrinter, MockScale, MockScanner,
};
use pos_hardware::registry::InMemoryRegistry;
use pos_hardware::traits::{
    CashDrawerHandle, LineDisplayHandle, MicrHandle, PrinterHandle, ScaleHandle, ScannerHandle,
};
use pos_hardware::{DeviceFilter, DeviceRegistry, LogicalDeviceConfig};
use pos_manager::{
    CashDrawerManager, DeviceManager, LineDisplayManager, MicrManager, PrinterManager,
    ScaleManager, ScannerManager,
};
use std::sync::Arc;
use tracing::debug;

pub const DRAWER_NAME: &str = "SimDrawer";
pub const PRINTER_NAME: &str = "SimPrinter";
pub const MICR_NAME: &str = "SimMicr";
pub const SCALE_NAME: &str = "SimScale";
pub const DISPLAY_NAME: &str = "SimDisplay";
pub const HANDHELD_NAME: &str = "SimHandheld";
pub const FLATBED_NAME: &str = "SimFlatbed";

/// Registry filter key that tells the two scanners apart.
pub const SCANNER_TYPE_KEY: &str = "type";

/// Registry listing every simulated logical device.
pub fn simulation_registry() -> InMemoryRegistry {
    InMemoryRegistry::new(vec![
        LogicalDeviceConfig::new("CashDrawer", DRAWER_NAME),
        LogicalDeviceConfig::new("POSPrinter", PRINTER_NAME),
        LogicalDeviceConfig::new("MICR", MICR_NAME),
        LogicalDeviceConfig::new("Scale", SCALE_NAME),
        LogicalDeviceConfig::new("LineDisplay", DISPLAY_NAME),
        LogicalDeviceConfig::new("Scanner", HANDHELD_NAME)
            .with_property(SCANNER_TYPE_KEY, "handheld"),
        LogicalDeviceConfig::new("Scanner", FLATBED_NAME)
            .with_property(SCANNER_TYPE_KEY, "flatbed"),
    ])
}

/// Managers for a full station backed by mock drivers.
pub struct SimulatedStation {
    pub cash_drawer: Arc<CashDrawerManager>,
    pub printer: Arc<PrinterManager>,
    pub micr: Arc<MicrManager>,
    pub scale: Arc<ScaleManager>,
    pub line_display: Arc<LineDisplayManager>,
    pub scanners: Arc<ScannerManager>,
}

impl SimulatedStation {
    /// Build the station. Peripherals not in `plugged` are created unplugged.
    pub fn build(
        registry: Arc<dyn DeviceRegistry>,
        plugged: &SimulatedDevices,
        settings: &DeviceSettings,
    ) -> Self {
        let unplug = |kind: DeviceKind, driver: &MockDriver| {
            if !plugged.is_plugged(kind) {
                debug!(device = %kind, "Simulated peripheral unplugged");
                driver.detach();
            }
        };

        let drawer_mock = MockCashDrawer::new(DRAWER_NAME);
        unplug(DeviceKind::CashDrawer, drawer_mock.driver());
        let printer_mock = MockPrinter::new(PRINTER_NAME);
        unplug(DeviceKind::Printer, printer_mock.driver());
        let micr_mock = MockMicr::new(MICR_NAME);
        unplug(DeviceKind::Micr, micr_mock.driver());
        let scale_mock = MockScale::new(SCALE_NAME);
        unplug(DeviceKind::Scale, scale_mock.driver());
        let display_mock = MockLineDisplay::new(DISPLAY_NAME);
        unplug(DeviceKind::LineDisplay, display_mock.driver());
        let handheld_mock = MockScanner::new(HANDHELD_NAME);
        unplug(DeviceKind::HandheldScanner, handheld_mock.driver());
        let flatbed_mock = MockScanner::new(FLATBED_NAME);
        unplug(DeviceKind::FlatbedScanner, flatbed_mock.driver());

        let drawer: Arc<dyn CashDrawerHandle> = drawer_mock;
        let printer: Arc<dyn PrinterHandle> = printer_mock;
        let micr: Arc<dyn MicrHandle> = micr_mock;
        let scale: Arc<dyn ScaleHandle> = scale_mock;
        let display: Arc<dyn LineDisplayHandle> = display_mock;
        let handheld: Arc<dyn ScannerHandle> = handheld_mock;
        let flatbed: Arc<dyn ScannerHandle> = flatbed_mock;

        Self {
            cash_drawer: Arc::new(CashDrawerManager::new(
                CashDrawer::new(drawer, registry.clone(), settings.clone()),
                settings.clone(),
            )),
            printer: Arc::new(PrinterManager::new(
                Printer::new(printer, registry.clone(), settings.clone()),
                settings.clone(),
            )),
            micr: Arc::new(MicrManager::new(
                Micr::new(micr, registry.clone(), settings.clone()),
                settings.clone(),
            )),
            scale: Arc::new(ScaleManager::new(
                Scale::new(scale, registry.clone(), settings.clone()),
                settings.clone(),
            )),
            line_display: Arc::new(LineDisplayManager::new(
                LineDisplay::new(display, registry.clone(), settings.clone()),
                settings.clone(),
            )),
            scanners: Arc::new(ScannerManager::new(
                Scanner::new(
                    DeviceKind::HandheldScanner,
                    handheld,
                    registry.clone(),
                    Some(DeviceFilter::new(SCANNER_TYPE_KEY, "handheld")),
                    settings.clone(),
                ),
                Scanner::new(
                    DeviceKind::FlatbedScanner,
                    flatbed,
                    registry,
                    Some(DeviceFilter::new(SCANNER_TYPE_KEY, "flatbed")),
                    settings.clone(),
                ),
                settings.clone(),
            )),
        }
    }

    /// Every manager, in reporting order.
    pub fn managers(&self) -> Vec<Arc<dyn DeviceManager>> {
        vec![
            self.cash_drawer.clone(),
            self.printer.clone(),
            self.micr.clone(),
            self.scale.clone(),
            self.line_display.clone(),
            self.scanners.clone(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pos_core::HealthStatus;

    fn station(plugged: SimulatedDevices) -> SimulatedStation {
        SimulatedStation::build(
            Arc::new(simulation_registry()),
            &plugged,
            &DeviceSettings::fast(),
        )
    }

    #[test]
    fn test_every_peripheral_connects() {
        let station = station(SimulatedDevices::default());
        let managers = station.managers();
        for manager in &managers {
            manager.connect();
        }

        let kinds: Vec<DeviceKind> = managers.iter().flat_map(|m| m.kinds()).collect();
        assert_eq!(kinds, DeviceKind::ALL.to_vec());
        assert!(
            managers
                .iter()
                .flat_map(|m| m.health())
                .all(|record| record.status == HealthStatus::Ready)
        );
    }

    #[test]
    fn test_unplugged_peripheral_stays_offline() {
        let station = station(SimulatedDevices {
            scale: false,
            ..SimulatedDevices::default()
        });
        station.scale.connect();
        station.micr.connect();

        assert_eq!(station.scale.health()[0].status, HealthStatus::NotReady);
        assert_eq!(station.micr.health()[0].status, HealthStatus::Ready);
    }
}
