//! Cash drawer orchestrator.

use crate::Peripheral;
use crate::base::{DeviceCore, describe, is_offline_code};
use pos_core::{DeviceError, DeviceKind, DeviceSettings, Result};
use pos_hardware::codes::cash_drawer::{SUE_DRAWER_CLOSED, SUE_DRAWER_OPEN};
use pos_hardware::codes::power;
use pos_hardware::events::{DataEvent, ErrorEvent, OutputCompleteEvent, StatusEvent};
use pos_hardware::traits::{CashDrawerHandle, attach_listener};
use pos_hardware::{
    ConnectOutcome, DeviceRegistry, DriverError, DriverListener, ErrorCode, OperationGuard,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Statuses that end a wait on the cash drawer.
pub fn is_failure_status(status: i32) -> bool {
    power::is_failure(status)
}

/// Classify a cash drawer driver error.
pub fn map_error(error: &DriverError) -> DeviceError {
    let kind = DeviceKind::CashDrawer;
    match error.code {
        code if is_offline_code(code) || code == ErrorCode::Disabled => DeviceError::offline(kind),
        ErrorCode::Busy | ErrorCode::Claimed => DeviceError::busy(kind),
        ErrorCode::Timeout => DeviceError::timeout(kind),
        ErrorCode::Failure | ErrorCode::Extended => DeviceError::hardware(kind, describe(error)),
        _ => DeviceError::unexpected(describe(error)),
    }
}

/// Opens the drawer and waits for the cashier to close it.
pub struct CashDrawer<H: CashDrawerHandle + ?Sized> {
    core: DeviceCore<H>,
    drawer_open: AtomicBool,
}

impl<H: CashDrawerHandle + ?Sized + 'static> CashDrawer<H> {
    pub fn new(
        handle: Arc<H>,
        registry: Arc<dyn DeviceRegistry>,
        settings: DeviceSettings,
    ) -> Arc<Self> {
        let drawer = Arc::new(Self {
            core: DeviceCore::new(
                DeviceKind::CashDrawer,
                handle,
                registry,
                None,
                settings,
                is_failure_status,
            ),
            drawer_open: AtomicBool::new(false),
        });
        attach_listener(drawer.core.supervisor().handle().as_ref(), &drawer);
        drawer
    }
}

impl<H: CashDrawerHandle + ?Sized> CashDrawer<H> {
    pub fn core(&self) -> &DeviceCore<H> {
        &self.core
    }

    /// Drawer state as last reported by the driver.
    pub fn is_drawer_open(&self) -> bool {
        self.drawer_open.load(Ordering::SeqCst)
    }

    /// Open the drawer and block until it is closed again.
    ///
    /// Fails with [`DeviceError::AlreadyOpen`] if the drawer is open, and
    /// with an offline error if the device drops off while open.
    pub fn open_cash_drawer(&self) -> Result<()> {
        let kind = self.core.kind();
        self.core.ensure_connected()?;

        let opened = self
            .core
            .call(|handle| handle.drawer_opened())
            .map_err(|e| map_error(&e))?;
        if opened || self.is_drawer_open() {
            return Err(DeviceError::AlreadyOpen);
        }

        self.core
            .call(|handle| handle.open_drawer())
            .map_err(|e| map_error(&e))?;
        self.drawer_open.store(true, Ordering::SeqCst);
        info!(device = %kind, "Cash drawer opened");

        let interval = self.core.settings().drawer_poll_interval();
        while self.is_drawer_open() {
            if !self.core.is_connected() {
                warn!(device = %kind, "Cash drawer went offline while open");
                return Err(DeviceError::offline(kind));
            }
            std::thread::sleep(interval);
        }

        info!(device = %kind, "Cash drawer closed");
        Ok(())
    }

    fn after_connect(&self) {
        if let Err(e) = self.core.call(|handle| handle.set_device_enabled(true)) {
            warn!(device = %self.core.kind(), error = %e, "Enabling cash drawer failed");
        }
        match self.core.call(|handle| handle.drawer_opened()) {
            Ok(open) => self.drawer_open.store(open, Ordering::SeqCst),
            Err(e) => debug!(error = %e, "Reading drawer state failed"),
        }
    }
}

impl<H: CashDrawerHandle + ?Sized> Peripheral for CashDrawer<H> {
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
        self.drawer_open.store(false, Ordering::SeqCst);
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

impl<H: CashDrawerHandle + ?Sized> DriverListener for CashDrawer<H> {
    fn on_data(&self, event: DataEvent) {
        self.core.bridge().on_data(event);
    }

    fn on_error(&self, event: ErrorEvent) {
        self.core.close_on_hardware_loss(&event);
        self.core.bridge().on_error(event);
    }

    fn on_status(&self, event: StatusEvent) {
        match event.status {
            SUE_DRAWER_OPEN => self.drawer_open.store(true, Ordering::SeqCst),
            SUE_DRAWER_CLOSED => self.drawer_open.store(false, Ordering::SeqCst),
            _ => {}
        }
        self.core.bridge().on_status(event);
    }

    fn on_output_complete(&self, event: OutputCompleteEvent) {
        self.core.bridge().on_output_complete(event);
    }
}
