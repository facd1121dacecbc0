//! Barcode scanner orchestrator.
//!
//! Handheld and flatbed scanners run the same protocol against separate
//! handles. A read arms the event bridge, turns on auto-disable, decoding
//! and data events, enables the device and waits for a label. The device is
//! left disabled afterwards so it only scans while someone is waiting.

use crate::Peripheral;
use crate::base::{DeviceCore, describe, is_offline_code};
use pos_core::{Barcode, DeviceError, DeviceKind, DeviceSettings, Result};
use pos_hardware::codes::{power, symbology_from_code};
use pos_hardware::events::{DataEvent, DriverEvent, ErrorEvent, OutputCompleteEvent, StatusEvent};
use pos_hardware::traits::{ScannerHandle, attach_listener};
use pos_hardware::{
    ConnectOutcome, DeviceFilter, DeviceRegistry, DriverError, DriverListener, ErrorCode,
    OperationGuard,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub fn is_failure_status(status: i32) -> bool {
    power::is_failure(status)
}

/// Classify a scanner driver error.
pub fn map_error(kind: DeviceKind, error: &DriverError) -> DeviceError {
    match error.code {
        code if is_offline_code(code) || code == ErrorCode::Disabled => DeviceError::offline(kind),
        ErrorCode::Busy | ErrorCode::Claimed => DeviceError::busy(kind),
        ErrorCode::Timeout => DeviceError::timeout(kind),
        ErrorCode::Extended => DeviceError::bad_data(kind, describe(error)),
        ErrorCode::Failure => DeviceError::hardware(kind, describe(error)),
        _ => DeviceError::unexpected(describe(error)),
    }
}

/// Turn raw label bytes into text.
///
/// Scanners pad labels with whitespace and line terminators; invalid UTF-8
/// is replaced rather than rejected.
pub fn decode_label(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// Reads labels from one scanner.
pub struct Scanner<H: ScannerHandle + ?Sized> {
    core: DeviceCore<H>,
}

impl<H: ScannerHandle + ?Sized + 'static> Scanner<H> {
    /// Create a scanner of `kind`, bound to the registry entry matching `filter`.
    pub fn new(
        kind: DeviceKind,
        handle: Arc<H>,
        registry: Arc<dyn DeviceRegistry>,
        filter: Option<DeviceFilter>,
        settings: DeviceSettings,
    ) -> Arc<Self> {
        let scanner = Arc::new(Self {
            core: DeviceCore::new(kind, handle, registry, filter, settings, is_failure_status),
        });
        attach_listener(scanner.core.supervisor().handle().as_ref(), &scanner);
        scanner
    }
}

impl<H: ScannerHandle + ?Sized> Scanner<H> {
    pub fn core(&self) -> &DeviceCore<H> {
        &self.core
    }

    /// Wait up to `timeout` for one label.
    ///
    /// A cancelled read fails with a timeout error.
    pub fn read_data(&self, timeout: Duration) -> Result<Barcode> {
        let kind = self.core.kind();
        self.core.ensure_connected()?;

        let bridge = self.core.bridge();
        bridge.start_event_listeners();

        let setup = self.core.call(|handle| {
            handle.set_auto_disable(true)?;
            handle.set_decode_data(true)?;
            handle.set_data_event_enabled(true)?;
            handle.set_device_enabled(true)
        });
        let result = match setup {
            Ok(()) => {
                debug!(device = %kind, "Waiting for scan");
                let event = bridge.wait_for_event(Some(timeout));
                self.interpret(event)
            }
            Err(e) => Err(map_error(kind, &e)),
        };

        self.finish_read();
        if let Ok(barcode) = &result {
            info!(device = %kind, symbology = ?barcode.symbology, "Label scanned");
        }
        result
    }

    /// Stop a pending read and disable the scanner.
    ///
    /// Fails with an already-disabled error when no read is active.
    pub fn cancel_scanner_data(&self) -> Result<()> {
        let kind = self.core.kind();
        let enabled = self
            .core
            .call(|handle| handle.device_enabled())
            .map_err(|e| map_error(kind, &e))?;
        if !enabled {
            return Err(DeviceError::already_disabled(kind));
        }

        self.core
            .call(|handle| handle.set_device_enabled(false))
            .map_err(|e| map_error(kind, &e))?;
        self.core.bridge().stop_waiting_for_event();
        debug!(device = %kind, "Scan cancelled");
        Ok(())
    }

    fn interpret(&self, event: DriverEvent) -> Result<Barcode> {
        let kind = self.core.kind();
        match event {
            DriverEvent::Data(_) => {
                let (label, code) = self
                    .core
                    .call(|handle| Ok((handle.scan_data_label()?, handle.scan_data_type()?)))
                    .map_err(|e| map_error(kind, &e))?;
                Ok(Barcode::new(decode_label(&label), symbology_from_code(code)))
            }
            DriverEvent::Error(error) if error.synthetic => Err(DeviceError::timeout(kind)),
            DriverEvent::Error(error) => Err(map_error(kind, &error.to_driver_error())),
            DriverEvent::StatusUpdate(status) => {
                warn!(device = %kind, status = status.status, "Scanner lost power during read");
                Err(DeviceError::offline(kind))
            }
            DriverEvent::OutputComplete(_) => {
                Err(DeviceError::unexpected("output complete from a scanner"))
            }
        }
    }

    fn finish_read(&self) {
        self.core.best_effort("disable", |handle| {
            if handle.device_enabled()? {
                handle.set_device_enabled(false)?;
            }
            Ok(())
        });
        self.core.best_effort("clear input", |handle| handle.clear_input());
    }
}

impl<H: ScannerHandle + ?Sized> Peripheral for Scanner<H> {
    fn kind(&self) -> DeviceKind {
        self.core.kind()
    }

    fn connect(&self) -> bool {
        match self.core.connect() {
            ConnectOutcome::Connected | ConnectOutcome::AlreadyConnected => true,
            ConnectOutcome::NotConnected => false,
        }
    }

    fn disconnect(&self) {
        self.core.disconnect();
    }

    fn is_connected(&self) -> bool {
        self.core.is_connected()
    }

    fn device_name(&self) -> String {
        self.core.device_name()
    }

    fn try_lock(&self, timeout: Duration) -> Option<OperationGuard<'_>> {
        self.core.try_lock(timeout)
    }
}

impl<H: ScannerHandle + ?Sized> DriverListener for Scanner<H> {
    fn on_data(&self, event: DataEvent) {
        self.core.bridge().on_data(event);
    }

    fn on_error(&self, event: ErrorEvent) {
        self.core.close_on_hardware_loss(&event);
        self.core.bridge().on_error(event);
    }

    fn on_status(&self, event: StatusEvent) {
        self.core.bridge().on_status(event);
    }

    fn on_output_complete(&self, event: OutputCompleteEvent) {
        self.core.bridge().on_output_complete(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pos_core::Symbology;
    use pos_hardware::codes::symbology::{EAN13, QRCODE};
    use pos_hardware::mock::{MockOp, MockScanner};
    use pos_hardware::registry::{InMemoryRegistry, LogicalDeviceConfig};
    use rstest::rstest;
    use std::thread;

    fn scanner(mock: &Arc<MockScanner>) -> Arc<Scanner<MockScanner>> {
        let registry = Arc::new(InMemoryRegistry::new(vec![
            LogicalDeviceConfig::new("Scanner", "Flatbed").with_property("type", "flatbed"),
            LogicalDeviceConfig::new("Scanner", "Handheld").with_property("type", "handheld"),
        ]));
        let scanner = Scanner::new(
            DeviceKind::HandheldScanner,
            mock.clone(),
            registry,
            Some(DeviceFilter::new("type", "handheld")),
            DeviceSettings::fast(),
        );
        assert!(scanner.connect());
        scanner
    }

    #[rstest]
    #[case(b"0123456789012\r\n".as_slice(), "0123456789012")]
    #[case(b"  ABC ".as_slice(), "ABC")]
    #[case(b"".as_slice(), "")]
    #[case(b"A\xffB".as_slice(), "A\u{fffd}B")]
    fn test_decode_label(#[case] bytes: &[u8], #[case] expected: &str) {
        assert_eq!(decode_label(bytes), expected);
    }

    #[rstest]
    #[case(ErrorCode::NoHardware, "DEVICE_OFFLINE")]
    #[case(ErrorCode::Disabled, "DEVICE_OFFLINE")]
    #[case(ErrorCode::Claimed, "DEVICE_BUSY")]
    #[case(ErrorCode::Timeout, "TIMEOUT")]
    #[case(ErrorCode::Extended, "BAD_DATA")]
    #[case(ErrorCode::Failure, "HARDWARE_ERROR")]
    #[case(ErrorCode::Illegal, "UNEXPECTED_ERROR")]
    fn test_error_mapping(#[case] code: ErrorCode, #[case] expected: &str) {
        let error = map_error(DeviceKind::FlatbedScanner, &DriverError::new(code, "x"));
        assert_eq!(error.code(), expected);
    }

    #[test]
    fn test_binds_filtered_candidate() {
        let mock = MockScanner::new("Handheld");
        let scanner = scanner(&mock);
        assert_eq!(mock.driver().opened_name().as_deref(), Some("Handheld"));
        assert!(!mock.driver().is_enabled());
        assert_eq!(scanner.kind(), DeviceKind::HandheldScanner);
    }

    #[test]
    fn test_read_queued_label() {
        let mock = MockScanner::new("Handheld");
        let scanner = scanner(&mock);
        mock.queue_scan("4006381333931\r\n", EAN13);

        let barcode = scanner.read_data(Duration::from_millis(200)).unwrap();
        assert_eq!(barcode, Barcode::new("4006381333931", Symbology::Ean13));
        assert!(!mock.driver().is_enabled());
        assert_eq!(mock.driver().calls(MockOp::ClearInput), 1);
    }

    #[test]
    fn test_label_scanned_during_wait() {
        let mock = MockScanner::new("Handheld");
        let scanner = scanner(&mock);

        let trigger = {
            let mock = mock.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                mock.queue_scan("https://example.com", QRCODE);
            })
        };

        let barcode = scanner.read_data(Duration::from_secs(2)).unwrap();
        assert_eq!(barcode.symbology, Symbology::QrCode);
        trigger.join().unwrap();
    }

    #[test]
    fn test_read_times_out_and_disables() {
        let mock = MockScanner::new("Handheld");
        let scanner = scanner(&mock);

        assert_eq!(
            scanner.read_data(Duration::from_millis(30)),
            Err(DeviceError::timeout(DeviceKind::HandheldScanner))
        );
        assert!(!mock.driver().is_enabled());
    }

    #[test]
    fn test_cancel_unblocks_read() {
        let mock = MockScanner::new("Handheld");
        let scanner = scanner(&mock);

        let canceller = {
            let scanner = scanner.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                scanner.cancel_scanner_data()
            })
        };

        let started = std::time::Instant::now();
        assert_eq!(
            scanner.read_data(Duration::from_secs(5)),
            Err(DeviceError::timeout(DeviceKind::HandheldScanner))
        );
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(canceller.join().unwrap(), Ok(()));
    }

    #[test]
    fn test_cancel_when_idle_is_already_disabled() {
        let mock = MockScanner::new("Handheld");
        let scanner = scanner(&mock);

        assert_eq!(
            scanner.cancel_scanner_data(),
            Err(DeviceError::already_disabled(DeviceKind::HandheldScanner))
        );
    }

    #[test]
    fn test_read_not_connected() {
        let mock = MockScanner::new("Elsewhere");
        let registry = Arc::new(InMemoryRegistry::new(vec![LogicalDeviceConfig::new(
            "Scanner", "Handheld",
        )]));
        let scanner = Scanner::new(
            DeviceKind::FlatbedScanner,
            mock.clone(),
            registry,
            None,
            DeviceSettings::fast(),
        );

        assert!(!scanner.connect());
        assert_eq!(
            scanner.read_data(Duration::from_millis(10)),
            Err(DeviceError::offline(DeviceKind::FlatbedScanner))
        );
    }

    #[test]
    fn test_connect_disconnect_round_trip() {
        let mock = MockScanner::new("Handheld");
        let scanner = scanner(&mock);
        scanner.disconnect();

        assert!(!scanner.is_connected());
        assert_eq!(mock.driver().calls(MockOp::Release), 1);
        assert_eq!(mock.driver().calls(MockOp::Close), 1);
    }
}
