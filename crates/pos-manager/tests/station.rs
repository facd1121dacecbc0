//! End-to-end scenarios across every manager, backed by mock drivers.

use pos_core::{Barcode, DeviceError, DeviceKind, DeviceSettings, HealthStatus, Symbology};
use pos_devices::{CashDrawer, LineDisplay, Micr, PrintItem, Printer, Scale, Scanner};
use pos_hardware::codes::symbology::EAN13;
use pos_hardware::mock::{
    MockCashDrawer, MockLineDisplay, MockMicr, MockPrinter, MockScale, MockScanner,
};
use pos_hardware::registry::{InMemoryRegistry, LogicalDeviceConfig};
use pos_hardware::traits::{
    CashDrawerHandle, LineDisplayHandle, MicrHandle, PrinterHandle, PrinterStation, ScaleHandle,
    ScannerHandle,
};
use pos_hardware::{DeviceFilter, ErrorCode};
use pos_manager::{
    AvailabilityAggregator, CashDrawerManager, DeviceDescriptors, DeviceManager,
    LineDisplayManager, MicrManager, PrinterManager, ReconnectScheduler, ScaleManager, ScanTarget,
    ScannerManager,
};
use std::sync::Arc;
use std::time::Duration;

struct Station {
    drawer_mock: Arc<MockCashDrawer>,
    printer_mock: Arc<MockPrinter>,
    scale_mock: Arc<MockScale>,
    flatbed_mock: Arc<MockScanner>,
    drawer: Arc<CashDrawerManager>,
    printer: Arc<PrinterManager>,
    scale: Arc<ScaleManager>,
    display: Arc<LineDisplayManager>,
    scanners: Arc<ScannerManager>,
    managers: Vec<Arc<dyn DeviceManager>>,
}

fn station() -> Station {
    let registry = Arc::new(InMemoryRegistry::new(vec![
        LogicalDeviceConfig::new("CashDrawer", "Drawer"),
        LogicalDeviceConfig::new("POSPrinter", "Receipt"),
        LogicalDeviceConfig::new("MICR", "Micr"),
        LogicalDeviceConfig::new("Scale", "Scale"),
        LogicalDeviceConfig::new("LineDisplay", "Display"),
        LogicalDeviceConfig::new("Scanner", "Handheld").with_property("type", "handheld"),
        LogicalDeviceConfig::new("Scanner", "Flatbed").with_property("type", "flatbed"),
    ]));
    let settings = DeviceSettings::fast();

    let drawer_mock = MockCashDrawer::new("Drawer");
    let printer_mock = MockPrinter::new("Receipt");
    let micr_mock = MockMicr::new("Micr");
    let scale_mock = MockScale::new("Scale");
    let display_mock = MockLineDisplay::new("Display");
    let handheld_mock = MockScanner::new("Handheld");
    let flatbed_mock = MockScanner::new("Flatbed");

    let drawer_handle: Arc<dyn CashDrawerHandle> = drawer_mock.clone();
    let printer_handle: Arc<dyn PrinterHandle> = printer_mock.clone();
    let micr_handle: Arc<dyn MicrHandle> = micr_mock;
    let scale_handle: Arc<dyn ScaleHandle> = scale_mock.clone();
    let display_handle: Arc<dyn LineDisplayHandle> = display_mock;
    let handheld_handle: Arc<dyn ScannerHandle> = handheld_mock;
    let flatbed_handle: Arc<dyn ScannerHandle> = flatbed_mock.clone();

    let drawer = Arc::new(CashDrawerManager::new(
        CashDrawer::new(drawer_handle, registry.clone(), settings.clone()),
        settings.clone(),
    ));
    let printer = Arc::new(PrinterManager::new(
        Printer::new(printer_handle, registry.clone(), settings.clone()),
        settings.clone(),
    ));
    let micr = Arc::new(MicrManager::new(
        Micr::new(micr_handle, registry.clone(), settings.clone()),
        settings.clone(),
    ));
    let scale = Arc::new(ScaleManager::new(
        Scale::new(scale_handle, registry.clone(), settings.clone()),
        settings.clone(),
    ));
    let display = Arc::new(LineDisplayManager::new(
        LineDisplay::new(display_handle, registry.clone(), settings.clone()),
        settings.clone(),
    ));
    let scanners = Arc::new(ScannerManager::new(
        Scanner::new(
            DeviceKind::HandheldScanner,
            handheld_handle,
            registry.clone(),
            Some(DeviceFilter::new("type", "handheld")),
            settings.clone(),
        ),
        Scanner::new(
            DeviceKind::FlatbedScanner,
            flatbed_handle,
            registry,
            Some(DeviceFilter::new("type", "flatbed")),
            settings.clone(),
        ),
        settings,
    ));

    let managers: Vec<Arc<dyn DeviceManager>> = vec![
        drawer.clone(),
        printer.clone(),
        micr,
        scale.clone(),
        display.clone(),
        scanners.clone(),
    ];
    Station {
        drawer_mock,
        printer_mock,
        scale_mock,
        flatbed_mock,
        drawer,
        printer,
        scale,
        display,
        scanners,
        managers,
    }
}

fn connect_all(station: &Station) {
    for manager in &station.managers {
        manager.connect();
    }
}

#[test]
fn test_status_before_first_connect_reports_not_ready() {
    let station = station();
    for manager in &station.managers {
        assert!(
            manager
                .status()
                .iter()
                .all(|record| record.status == HealthStatus::NotReady)
        );
    }
}

#[test]
fn test_checkout_flow() {
    let station = station();
    connect_all(&station);

    station.flatbed_mock.queue_scan("4006381333931", EAN13);
    let barcode = station
        .scanners
        .scan(ScanTarget::Both, Some(Duration::from_secs(2)))
        .unwrap();
    assert_eq!(barcode, Barcode::new("4006381333931", Symbology::Ean13));

    station.scale_mock.set_resting_weight(Some(1250));
    let weight = station.scale.stable_weight(None).unwrap();
    assert_eq!(weight.display, "1.25");

    station
        .display
        .display_line(Some("Apples 1.25 kg"), Some("Total 3.10"))
        .unwrap();
    station
        .printer
        .print_content(
            &[PrintItem::Text("Apples    3.10\n".into())],
            PrinterStation::Receipt,
        )
        .unwrap();
    assert_eq!(station.printer_mock.printed().len(), 1);

    station
        .drawer_mock
        .set_auto_close(Some(Duration::from_millis(20)));
    station.drawer.open_cash_drawer().unwrap();
    assert!(!station.drawer_mock.is_open());
}

#[test]
fn test_power_loss_surfaces_in_availability() {
    let station = station();
    connect_all(&station);
    let aggregator =
        AvailabilityAggregator::new(station.managers.clone(), DeviceDescriptors::empty());
    let mut errors = aggregator.subscribe();

    station.printer_mock.driver().detach();
    station.printer_mock.driver().emit_error(ErrorCode::Offline, 0);
    let snapshot = aggregator.refresh().unwrap();
    assert_eq!(snapshot.devices, vec![DeviceKind::Printer]);
    assert_eq!(errors.try_recv().unwrap(), snapshot);

    assert_eq!(
        station
            .printer
            .print_content(&[PrintItem::Text("x".into())], PrinterStation::Receipt),
        Err(DeviceError::offline(DeviceKind::Printer))
    );

    station.printer_mock.driver().attach("Receipt");
    station.printer.connect();
    assert!(aggregator.refresh().unwrap().is_clear());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scheduler_reconnects_late_peripheral() {
    let station = station();
    station.printer_mock.driver().detach();

    let aggregator = Arc::new(AvailabilityAggregator::new(
        station.managers.clone(),
        DeviceDescriptors::empty(),
    ));
    let mut errors = aggregator.subscribe();
    let handle = ReconnectScheduler::new(station.managers.clone(), Duration::from_millis(20))
        .with_availability(aggregator)
        .start();

    let first = tokio::time::timeout(Duration::from_secs(5), errors.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(first.devices.contains(&DeviceKind::Printer));

    station.printer_mock.driver().attach("Receipt");
    let recovered = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match errors.recv().await {
                Some(snapshot) if snapshot.is_clear() => return snapshot,
                Some(_) => continue,
                None => panic!("notifier closed"),
            }
        }
    })
    .await
    .unwrap();
    assert!(recovered.is_clear());

    let report = handle.shutdown().await;
    assert_eq!(report.panicked, 0);
    assert_eq!(report.failed, 0);
}
