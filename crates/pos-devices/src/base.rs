//! Parts shared by every orchestrator.

use pos_core::{DeviceError, DeviceKind, DeviceSettings, Result};
use pos_hardware::bridge::StatusFilter;
use pos_hardware::discovery::Discovery;
use pos_hardware::events::ErrorEvent;
use pos_hardware::{
    ConnectOutcome, ConnectionSupervisor, DeviceFilter, DeviceRegistry, DriverError, DriverResult,
    ErrorCode, EventBridge, HardwareHandle, OperationGuard, OperationLock,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Supervisor, bridge and lock for one peripheral.
pub struct DeviceCore<H: HardwareHandle + ?Sized> {
    kind: DeviceKind,
    supervisor: ConnectionSupervisor<H>,
    bridge: EventBridge,
    lock: OperationLock,
    settings: DeviceSettings,
}

impl<H: HardwareHandle + ?Sized> DeviceCore<H> {
    pub fn new(
        kind: DeviceKind,
        handle: Arc<H>,
        registry: Arc<dyn DeviceRegistry>,
        filter: Option<DeviceFilter>,
        settings: DeviceSettings,
        is_failure_status: StatusFilter,
    ) -> Self {
        let discovery = Discovery::new(registry, settings.clone());
        Self {
            kind,
            supervisor: ConnectionSupervisor::new(handle, discovery, filter),
            bridge: EventBridge::new(is_failure_status),
            lock: OperationLock::new(),
            settings,
        }
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn supervisor(&self) -> &ConnectionSupervisor<H> {
        &self.supervisor
    }

    pub fn bridge(&self) -> &EventBridge {
        &self.bridge
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub fn connect(&self) -> ConnectOutcome {
        self.supervisor.connect()
    }

    pub fn disconnect(&self) {
        self.supervisor.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.supervisor.is_connected()
    }

    pub fn try_lock(&self, timeout: Duration) -> Option<OperationGuard<'_>> {
        self.lock.try_lock(timeout)
    }

    /// Run a driver call under the data mutex.
    pub fn call<R>(&self, f: impl FnOnce(&H) -> DriverResult<R>) -> DriverResult<R> {
        self.supervisor.with_handle(f)
    }

    /// Run a cleanup call, logging instead of propagating a failure.
    pub fn best_effort(&self, step: &str, f: impl FnOnce(&H) -> DriverResult<()>) {
        if let Err(e) = self.call(f) {
            warn!(device = %self.kind, step, error = %e, "Cleanup step failed");
        }
    }

    /// Fail with an offline error unless the live predicate holds.
    pub fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(DeviceError::offline(self.kind))
        }
    }

    pub fn device_name(&self) -> String {
        self.call(|handle| handle.physical_device_description())
            .unwrap_or_else(|_| self.kind.as_str().to_string())
    }

    /// Close the handle at once when the error means the hardware is gone.
    ///
    /// Returns whether the handle was closed.
    pub fn close_on_hardware_loss(&self, event: &ErrorEvent) -> bool {
        if !event.code.is_hardware_loss() {
            return false;
        }
        warn!(device = %self.kind, code = %event.code, "Hardware lost, closing handle");
        self.supervisor.close_now();
        true
    }
}

/// Driver codes that mean the session is gone.
pub fn is_offline_code(code: ErrorCode) -> bool {
    matches!(
        code,
        ErrorCode::Offline | ErrorCode::NoHardware | ErrorCode::Closed | ErrorCode::NotClaimed
    )
}

/// Message for a classified error built from a driver error.
pub fn describe(error: &DriverError) -> String {
    if error.code == ErrorCode::Extended {
        format!("{} (extended {})", error.message, error.extended)
    } else {
        format!("{} ({})", error.message, error.code)
    }
}
