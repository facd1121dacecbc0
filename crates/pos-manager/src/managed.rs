//! Lock discipline shared by every manager.

use pos_core::{DeviceError, DeviceKind, HealthRecord, HealthStatus, Result};
use pos_devices::Peripheral;
use pos_hardware::OperationGuard;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Object-safe view of a managed device, used by the provided
/// [`DeviceManager`](crate::DeviceManager) methods.
pub trait ManagedDevice: Send + Sync {
    fn kind(&self) -> DeviceKind;

    /// Background connect attempt. Skipped when an operation holds the lock.
    fn connect(&self) -> bool;

    /// Drop the session and connect again.
    fn reconnect(&self) -> Result<()>;

    /// Health read straight from the live connection predicate.
    fn health(&self) -> HealthRecord;
}

/// One orchestrator as seen by its manager.
pub struct Managed<P: Peripheral + ?Sized> {
    peripheral: Arc<P>,
    connect_lock_timeout: Duration,
}

impl<P: Peripheral + ?Sized> Managed<P> {
    pub fn new(peripheral: Arc<P>, connect_lock_timeout: Duration) -> Self {
        Self {
            peripheral,
            connect_lock_timeout,
        }
    }

    pub fn peripheral(&self) -> &Arc<P> {
        &self.peripheral
    }

    /// Take the operation lock or fail with the device's busy error.
    pub fn lock(&self, timeout: Duration) -> Result<OperationGuard<'_>> {
        self.peripheral
            .try_lock(timeout)
            .ok_or_else(|| DeviceError::busy(self.peripheral.kind()))
    }
}

impl<P: Peripheral + ?Sized> ManagedDevice for Managed<P> {
    fn kind(&self) -> DeviceKind {
        self.peripheral.kind()
    }

    fn connect(&self) -> bool {
        let kind = self.kind();
        let Some(_guard) = self.peripheral.try_lock(self.connect_lock_timeout) else {
            debug!(device = %kind, "Device busy, skipping connect");
            return self.peripheral.is_connected();
        };
        let connected = self.peripheral.connect();
        if !connected {
            debug!(device = %kind, "Device not connected");
        }
        connected
    }

    fn reconnect(&self) -> Result<()> {
        let kind = self.kind();
        let _guard = self
            .peripheral
            .try_lock(self.connect_lock_timeout)
            .ok_or_else(|| DeviceError::busy(kind))?;

        info!(device = %kind, "Reconnecting device");
        self.peripheral.disconnect();
        if self.peripheral.connect() {
            Ok(())
        } else {
            warn!(device = %kind, "Reconnect failed");
            Err(DeviceError::offline(kind))
        }
    }

    fn health(&self) -> HealthRecord {
        let status = HealthStatus::from_connected(self.peripheral.is_connected());
        HealthRecord::new(self.peripheral.device_name(), status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pos_core::DeviceSettings;
    use pos_devices::LineDisplay;
    use pos_hardware::mock::{MockLineDisplay, MockOp};
    use pos_hardware::registry::{InMemoryRegistry, LogicalDeviceConfig};
    use std::thread;

    fn managed(mock: &Arc<MockLineDisplay>) -> Arc<Managed<LineDisplay<MockLineDisplay>>> {
        let registry = Arc::new(InMemoryRegistry::new(vec![LogicalDeviceConfig::new(
            "LineDisplay",
            "Display",
        )]));
        let display = LineDisplay::new(mock.clone(), registry, DeviceSettings::fast());
        Arc::new(Managed::new(display, Duration::from_millis(20)))
    }

    #[test]
    fn test_connect_and_health() {
        let mock = MockLineDisplay::new("Display");
        let managed = managed(&mock);
        assert_eq!(managed.health().status, HealthStatus::NotReady);

        assert!(managed.connect());
        let health = managed.health();
        assert_eq!(health.status, HealthStatus::Ready);
        assert_eq!(health.device_name, "Mock LineDisplay Display");
    }

    #[test]
    fn test_reconnect_cycles_session() {
        let mock = MockLineDisplay::new("Display");
        let managed = managed(&mock);
        managed.connect();

        managed.reconnect().unwrap();
        assert_eq!(mock.driver().calls(MockOp::Close), 1);
        assert_eq!(mock.driver().calls(MockOp::Open), 2);
    }

    #[test]
    fn test_reconnect_offline_when_unplugged() {
        let mock = MockLineDisplay::new("Display");
        let managed = managed(&mock);
        managed.connect();
        mock.driver().detach();

        assert_eq!(
            managed.reconnect(),
            Err(DeviceError::offline(DeviceKind::LineDisplay))
        );
    }

    #[test]
    fn test_contended_lock_is_busy() {
        let mock = MockLineDisplay::new("Display");
        let managed = managed(&mock);
        let _guard = managed.lock(Duration::from_millis(10)).unwrap();

        let other = managed.clone();
        let (reconnect, lock) = thread::spawn(move || {
            (
                other.reconnect(),
                other.lock(Duration::from_millis(10)).map(|_| ()),
            )
        })
        .join()
        .unwrap();

        assert_eq!(reconnect, Err(DeviceError::busy(DeviceKind::LineDisplay)));
        assert_eq!(lock, Err(DeviceError::busy(DeviceKind::LineDisplay)));
    }

    #[test]
    fn test_connect_skipped_while_busy() {
        let mock = MockLineDisplay::new("Display");
        let managed = managed(&mock);
        let _guard = managed.lock(Duration::from_millis(10)).unwrap();

        let other = managed.clone();
        assert!(!thread::spawn(move || other.connect()).join().unwrap());
        assert_eq!(mock.driver().calls(MockOp::Open), 0);
    }
}
