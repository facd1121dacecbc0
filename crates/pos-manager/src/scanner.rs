//! Scanner manager: a handheld and a flatbed scanner behind one surface.
//!
//! A scan can target either scanner or both. Scanning both races the two
//! reads; the first label wins and the other read is cancelled.

use crate::health::HealthTracker;
use crate::managed::{Managed, ManagedDevice};
use crate::DeviceManager;
use crossbeam::channel::{self, RecvTimeoutError};
use pos_core::{Barcode, DeviceError, DeviceSettings, Result};
use pos_devices::{Peripheral, Scanner};
use pos_hardware::traits::ScannerHandle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// How often the losing read is cancelled again until it returns.
const CANCEL_RETRY_INTERVAL: Duration = Duration::from_millis(20);

/// Which scanner a scan reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanTarget {
    Handheld,
    Flatbed,
    Both,
}

type ScannerDevice = Scanner<dyn ScannerHandle>;

pub struct ScannerManager {
    handheld: Managed<ScannerDevice>,
    flatbed: Managed<ScannerDevice>,
    tracker: HealthTracker,
    settings: DeviceSettings,
}

impl ScannerManager {
    pub fn new(
        handheld: Arc<ScannerDevice>,
        flatbed: Arc<ScannerDevice>,
        settings: DeviceSettings,
    ) -> Self {
        let connect_lock_timeout = settings.connect_lock_timeout();
        Self {
            handheld: Managed::new(handheld, connect_lock_timeout),
            flatbed: Managed::new(flatbed, connect_lock_timeout),
            tracker: HealthTracker::new(),
            settings,
        }
    }

    pub fn handheld(&self) -> &Arc<ScannerDevice> {
        self.handheld.peripheral()
    }

    pub fn flatbed(&self) -> &Arc<ScannerDevice> {
        self.flatbed.peripheral()
    }

    /// Read one label from `target`, waiting at most `timeout` (or the configured default).
    pub fn scan(&self, target: ScanTarget, timeout: Option<Duration>) -> Result<Barcode> {
        let timeout = timeout.unwrap_or_else(|| self.settings.scan_timeout());
        let lock_timeout = self.settings.operation_lock_timeout();

        match target {
            ScanTarget::Handheld => {
                let _guard = self.handheld.lock(lock_timeout)?;
                self.handheld().read_data(timeout)
            }
            ScanTarget::Flatbed => {
                let _guard = self.flatbed.lock(lock_timeout)?;
                self.flatbed().read_data(timeout)
            }
            ScanTarget::Both => {
                let _handheld = self.handheld.lock(lock_timeout)?;
                let _flatbed = self.flatbed.lock(lock_timeout)?;
                self.race(timeout)
            }
        }
    }

    /// Stop a pending scan on `target`.
    ///
    /// For [`ScanTarget::Both`] this succeeds if either scanner was reading.
    pub fn cancel_scanner_data(&self, target: ScanTarget) -> Result<()> {
        match target {
            ScanTarget::Handheld => self.handheld().cancel_scanner_data(),
            ScanTarget::Flatbed => self.flatbed().cancel_scanner_data(),
            ScanTarget::Both => {
                let handheld = self.handheld().cancel_scanner_data();
                let flatbed = self.flatbed().cancel_scanner_data();
                handheld.or(flatbed)
            }
        }
    }

    fn race(&self, timeout: Duration) -> Result<Barcode> {
        let scanners = [self.handheld(), self.flatbed()];
        let (tx, rx) = channel::bounded(scanners.len());

        thread::scope(|scope| {
            for (index, scanner) in scanners.iter().enumerate() {
                let tx = tx.clone();
                scope.spawn(move || {
                    let _ = tx.send((index, scanner.read_data(timeout)));
                });
            }
            drop(tx);

            let mut failures = Vec::new();
            while let Ok((index, result)) = rx.recv() {
                match result {
                    Ok(barcode) => {
                        let loser = scanners[1 - index];
                        info!(winner = %scanners[index].kind(), "Scan race won");
                        if failures.is_empty() {
                            cancel_until_returned(loser, &rx);
                        }
                        return Ok(barcode);
                    }
                    Err(e) => failures.push(e),
                }
            }
            Err(pick_failure(failures))
        })
    }
}

/// Cancel `loser` until its read reports back, since a cancel that lands
/// before the read has enabled the scanner has no effect.
fn cancel_until_returned<T>(loser: &ScannerDevice, rx: &channel::Receiver<T>) {
    loop {
        if let Err(e) = loser.cancel_scanner_data() {
            debug!(error = %e, "Losing scanner not reading yet");
        }
        match rx.recv_timeout(CANCEL_RETRY_INTERVAL) {
            Ok(_) | Err(RecvTimeoutError::Disconnected) => return,
            Err(RecvTimeoutError::Timeout) => continue,
        }
    }
}

/// Error reported when no scanner produced a label.
///
/// An offline scanner is the least informative failure, so any other error wins.
fn pick_failure(failures: Vec<DeviceError>) -> DeviceError {
    let mut fallback = None;
    for error in failures {
        if !matches!(error, DeviceError::Offline { .. }) {
            return error;
        }
        fallback.get_or_insert(error);
    }
    fallback.unwrap_or_else(|| DeviceError::unexpected("no scanner reported"))
}

impl DeviceManager for ScannerManager {
    fn devices(&self) -> Vec<&dyn ManagedDevice> {
        vec![&self.handheld, &self.flatbed]
    }

    fn tracker(&self) -> &HealthTracker {
        &self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pos_core::{DeviceKind, Symbology};
    use pos_hardware::codes::symbology::{CODE128, UPCA};
    use pos_hardware::mock::MockScanner;
    use pos_hardware::registry::{InMemoryRegistry, LogicalDeviceConfig};
    use pos_hardware::DeviceFilter;
    use rstest::rstest;
    use std::time::Instant;

    struct Fixture {
        handheld: Arc<MockScanner>,
        flatbed: Arc<MockScanner>,
        manager: Arc<ScannerManager>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(InMemoryRegistry::new(vec![
            LogicalDeviceConfig::new("Scanner", "Handheld").with_property("type", "handheld"),
            LogicalDeviceConfig::new("Scanner", "Flatbed").with_property("type", "flatbed"),
        ]));
        let settings = DeviceSettings::fast();
        let handheld = MockScanner::new("Handheld");
        let flatbed = MockScanner::new("Flatbed");

        let handheld_handle: Arc<dyn ScannerHandle> = handheld.clone();
        let flatbed_handle: Arc<dyn ScannerHandle> = flatbed.clone();
        let manager = Arc::new(ScannerManager::new(
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
        manager.connect();
        Fixture {
            handheld,
            flatbed,
            manager,
        }
    }

    #[rstest]
    #[case(vec![DeviceError::offline(DeviceKind::HandheldScanner), DeviceError::timeout(DeviceKind::FlatbedScanner)], "TIMEOUT")]
    #[case(vec![DeviceError::timeout(DeviceKind::HandheldScanner), DeviceError::offline(DeviceKind::FlatbedScanner)], "TIMEOUT")]
    #[case(vec![DeviceError::offline(DeviceKind::HandheldScanner), DeviceError::offline(DeviceKind::FlatbedScanner)], "DEVICE_OFFLINE")]
    #[case(vec![], "UNEXPECTED_ERROR")]
    fn test_pick_failure(#[case] failures: Vec<DeviceError>, #[case] code: &str) {
        assert_eq!(pick_failure(failures).code(), code);
    }

    #[test]
    fn test_scan_target_serialization() {
        assert_eq!(serde_json::to_string(&ScanTarget::Both).unwrap(), "\"both\"");
    }

    #[test]
    fn test_health_reports_both_scanners() {
        let fixture = fixture();
        assert_eq!(
            fixture.manager.kinds(),
            vec![DeviceKind::HandheldScanner, DeviceKind::FlatbedScanner]
        );
        let health = fixture.manager.health();
        assert_eq!(health.len(), 2);
        assert!(health.iter().all(|record| record.status.is_ready()));
    }

    #[test]
    fn test_scan_single_target() {
        let fixture = fixture();
        fixture.handheld.queue_scan("036000291452", UPCA);

        let barcode = fixture
            .manager
            .scan(ScanTarget::Handheld, Some(Duration::from_millis(200)))
            .unwrap();
        assert_eq!(barcode, Barcode::new("036000291452", Symbology::UpcA));
    }

    #[test]
    fn test_race_returns_first_label_and_cancels_loser() {
        let fixture = fixture();
        fixture.flatbed.queue_scan("PKG-0042", CODE128);

        let started = Instant::now();
        let barcode = fixture
            .manager
            .scan(ScanTarget::Both, Some(Duration::from_secs(5)))
            .unwrap();

        assert_eq!(barcode, Barcode::new("PKG-0042", Symbology::Code128));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!fixture.handheld.driver().is_enabled());
    }

    #[test]
    fn test_race_with_offline_scanner_reports_timeout() {
        let fixture = fixture();
        fixture.handheld.driver().detach();
        fixture.manager.handheld().core().supervisor().close_now();

        let error = fixture
            .manager
            .scan(ScanTarget::Both, Some(Duration::from_millis(30)))
            .unwrap_err();
        assert_eq!(error, DeviceError::timeout(DeviceKind::FlatbedScanner));
    }

    #[test]
    fn test_cancel_idle_scanner() {
        let fixture = fixture();
        assert_eq!(
            fixture.manager.cancel_scanner_data(ScanTarget::Flatbed),
            Err(DeviceError::already_disabled(DeviceKind::FlatbedScanner))
        );
    }

    #[test]
    fn test_cancel_pending_scan() {
        let fixture = fixture();
        let canceller = {
            let manager = fixture.manager.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(40));
                manager.cancel_scanner_data(ScanTarget::Both)
            })
        };

        let error = fixture
            .manager
            .scan(ScanTarget::Both, Some(Duration::from_secs(5)))
            .unwrap_err();
        assert_eq!(error.code(), "TIMEOUT");
        assert_eq!(canceller.join().unwrap(), Ok(()));
    }
}
