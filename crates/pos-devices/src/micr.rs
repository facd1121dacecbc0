//! MICR check reader orchestrator.
//!
//! A check read has three phases: insertion ([`Micr::insert_check`]), the
//! asynchronous read itself ([`Micr::read_check_data`]), and withdrawal
//! ([`Micr::withdraw_check`]). The read completes a one-shot channel from the
//! driver's data or error callback. Both the insertion loop and the read
//! observe [`Micr::cancel_check_read`].

use crate::Peripheral;
use crate::base::{DeviceCore, describe, is_offline_code};
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use pos_core::{CheckData, DeviceError, DeviceKind, DeviceSettings, Result};
use pos_hardware::codes::{micr as codes, power};
use pos_hardware::events::{DataEvent, ErrorEvent, OutputCompleteEvent, StatusEvent};
use pos_hardware::traits::{MicrHandle, attach_listener};
use pos_hardware::{
    ConnectOutcome, DeviceRegistry, DriverError, DriverListener, DriverResult, ErrorCode,
    OperationGuard,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Statuses that end a wait on the check reader.
pub fn is_failure_status(status: i32) -> bool {
    power::is_failure(status)
}

/// Classify a MICR driver error.
pub fn map_error(error: &DriverError) -> DeviceError {
    let kind = DeviceKind::Micr;
    match error.code {
        ErrorCode::Extended => match error.extended {
            codes::EXT_NOCHECK => DeviceError::timeout(kind),
            codes::EXT_CHECK | codes::EXT_JAM | codes::EXT_COVEROPEN => {
                DeviceError::hardware(kind, describe(error))
            }
            codes::EXT_BADDATA | codes::EXT_NODATA | codes::EXT_BADSIZE | codes::EXT_CHECKDIGIT => {
                DeviceError::bad_data(kind, describe(error))
            }
            _ => DeviceError::unexpected(describe(error)),
        },
        code if is_offline_code(code) || code == ErrorCode::Disabled => DeviceError::offline(kind),
        ErrorCode::Failure => DeviceError::hardware(kind, describe(error)),
        ErrorCode::Timeout => DeviceError::timeout(kind),
        ErrorCode::Busy | ErrorCode::Claimed => DeviceError::busy(kind),
        _ => DeviceError::unexpected(describe(error)),
    }
}

type PendingRead = Sender<DriverResult<CheckData>>;

/// Reads the MICR line of checks.
pub struct Micr<H: MicrHandle + ?Sized> {
    core: DeviceCore<H>,
    cancelled: AtomicBool,
    check_inserted: AtomicBool,
    pending: Mutex<Option<PendingRead>>,
}

impl<H: MicrHandle + ?Sized + 'static> Micr<H> {
    pub fn new(
        handle: Arc<H>,
        registry: Arc<dyn DeviceRegistry>,
        settings: DeviceSettings,
    ) -> Arc<Self> {
        let micr = Arc::new(Self {
            core: DeviceCore::new(
                DeviceKind::Micr,
                handle,
                registry,
                None,
                settings,
                is_failure_status,
            ),
            cancelled: AtomicBool::new(false),
            check_inserted: AtomicBool::new(false),
            pending: Mutex::new(None),
        });
        attach_listener(micr.core.supervisor().handle().as_ref(), &micr);
        micr
    }
}

impl<H: MicrHandle + ?Sized> Micr<H> {
    pub fn core(&self) -> &DeviceCore<H> {
        &self.core
    }

    pub fn check_inserted(&self) -> bool {
        self.check_inserted.load(Ordering::SeqCst)
    }

    /// Wait up to `timeout` for a check to be inserted.
    ///
    /// Polls the driver's insertion until it succeeds, fails with a
    /// non-timeout error, the deadline passes, or the read is cancelled.
    pub fn insert_check(&self, timeout: Duration) -> Result<()> {
        let kind = self.core.kind();
        self.core.ensure_connected()?;
        self.cancelled.store(false, Ordering::SeqCst);

        let deadline = Instant::now() + timeout;
        let poll = self.core.settings().insertion_poll_timeout();
        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                info!(device = %kind, "Check insertion cancelled");
                self.core.best_effort("end insertion", |handle| handle.end_insertion());
                return Err(DeviceError::timeout(kind));
            }
            match self.core.call(|handle| handle.begin_insertion(poll)) {
                Ok(()) => break,
                Err(e) if e.is_timeout() && Instant::now() < deadline => continue,
                Err(e) => {
                    self.core.best_effort("end insertion", |handle| handle.end_insertion());
                    return Err(if e.is_timeout() {
                        DeviceError::timeout(kind)
                    } else {
                        map_error(&e)
                    });
                }
            }
        }

        self.core
            .call(|handle| handle.end_insertion())
            .map_err(|e| map_error(&e))?;
        self.check_inserted.store(true, Ordering::SeqCst);
        debug!(device = %kind, "Check inserted");
        Ok(())
    }

    /// Read the inserted check, waiting up to `timeout` for the data callback.
    pub fn read_check_data(&self, timeout: Duration) -> Result<CheckData> {
        let kind = self.core.kind();
        self.core.ensure_connected()?;

        let (tx, rx) = channel::bounded(1);
        *self.pending.lock() = Some(tx);
        if self.cancelled.load(Ordering::SeqCst) {
            self.pending.lock().take();
            return Err(DeviceError::timeout(kind));
        }

        let enabled = self
            .core
            .call(|handle| handle.set_data_event_enabled(true));
        let result = match enabled {
            Ok(()) => match rx.recv_timeout(timeout) {
                Ok(Ok(data)) => Ok(data),
                Ok(Err(e)) => Err(map_error(&e)),
                Err(RecvTimeoutError::Timeout) => Err(DeviceError::timeout(kind)),
                Err(RecvTimeoutError::Disconnected) => {
                    Err(DeviceError::unexpected("check read abandoned"))
                }
            },
            Err(e) => Err(map_error(&e)),
        };

        self.pending.lock().take();
        self.core.best_effort("clear input", |handle| handle.clear_input());
        result
    }

    /// Eject the check.
    pub fn withdraw_check(&self) -> Result<()> {
        let timeout = self.core.settings().insertion_poll_timeout();
        let result = self.core.call(|handle| {
            handle.begin_removal(timeout)?;
            handle.end_removal()
        });
        self.check_inserted.store(false, Ordering::SeqCst);
        result.map_err(|e| map_error(&e))
    }

    /// Abort a pending insertion or read. The aborted call fails with a timeout.
    pub fn cancel_check_read(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.complete(Err(DriverError::timeout("check read cancelled")));
        self.core.bridge().stop_waiting_for_event();
    }

    fn complete(&self, result: DriverResult<CheckData>) {
        if let Some(tx) = self.pending.lock().take() {
            // The reader may have given up already.
            let _ = tx.try_send(result);
        }
    }

    fn after_connect(&self) {
        if let Err(e) = self.core.call(|handle| handle.set_device_enabled(true)) {
            warn!(device = %self.core.kind(), error = %e, "Enabling check reader failed");
        }
    }
}

impl<H: MicrHandle + ?Sized> Peripheral for Micr<H> {
    fn kind(&self) -> DeviceKind {
        self.core.kind()
    }

    fn connect(&self) -> bool {
        match self.core.connect() {
            ConnectOutcome::Connected => {
                self.after_connect();
                true
            }
            ConnectOutcome::AlreadyConnected => true,
            ConnectOutcome::NotConnected => false,
        }
    }

    fn disconnect(&self) {
        self.core.disconnect();
        self.cancelled.store(false, Ordering::SeqCst);
        self.check_inserted.store(false, Ordering::SeqCst);
        self.pending.lock().take();
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

impl<H: MicrHandle + ?Sized> DriverListener for Micr<H> {
    fn on_data(&self, event: DataEvent) {
        let fields = self.core.call(|handle| handle.check_fields());
        if let Err(e) = &fields {
            warn!(device = %self.core.kind(), error = %e, "Reading check fields failed");
        }
        self.complete(fields);
        self.core.bridge().on_data(event);
    }

    fn on_error(&self, event: ErrorEvent) {
        self.core.close_on_hardware_loss(&event);
        self.complete(Err(event.to_driver_error()));
        self.core.bridge().on_error(event);
    }

    fn on_status(&self, event: StatusEvent) {
        self.core.bridge().on_status(event);
    }

    fn on_output_complete(&self, event: OutputCompleteEvent) {
        self.core.bridge().on_output_complete(event);
    }
}
