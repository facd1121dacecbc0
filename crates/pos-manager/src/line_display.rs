//! Line display manager.

use crate::health::HealthTracker;
use crate::managed::{Managed, ManagedDevice};
use crate::DeviceManager;
use pos_core::{DeviceSettings, Result};
use pos_devices::LineDisplay;
use pos_hardware::traits::LineDisplayHandle;
use std::sync::Arc;

pub struct LineDisplayManager {
    display: Managed<LineDisplay<dyn LineDisplayHandle>>,
    tracker: HealthTracker,
    settings: DeviceSettings,
}

impl LineDisplayManager {
    pub fn new(display: Arc<LineDisplay<dyn LineDisplayHandle>>, settings: DeviceSettings) -> Self {
        Self {
            display: Managed::new(display, settings.connect_lock_timeout()),
            tracker: HealthTracker::new(),
            settings,
        }
    }

    pub fn display_line(&self, line1: Option<&str>, line2: Option<&str>) -> Result<()> {
        let _guard = self.display.lock(self.settings.operation_lock_timeout())?;
        self.display.peripheral().display_line(line1, line2)
    }

    pub fn clear_display(&self) -> Result<()> {
        let _guard = self.display.lock(self.settings.operation_lock_timeout())?;
        self.display.peripheral().clear_display()
    }
}

impl DeviceManager for LineDisplayManager {
    fn devices(&self) -> Vec<&dyn ManagedDevice> {
        vec![&self.display]
    }

    fn tracker(&self) -> &HealthTracker {
        &self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pos_core::{DeviceError, DeviceKind};
    use pos_hardware::mock::MockLineDisplay;
    use pos_hardware::registry::{InMemoryRegistry, LogicalDeviceConfig};

    fn manager(mock: &Arc<MockLineDisplay>) -> LineDisplayManager {
        let registry = Arc::new(InMemoryRegistry::new(vec![LogicalDeviceConfig::new(
            "LineDisplay",
            "Display",
        )]));
        let handle: Arc<dyn LineDisplayHandle> = mock.clone();
        let settings = DeviceSettings::fast();
        LineDisplayManager::new(LineDisplay::new(handle, registry, settings.clone()), settings)
    }

    #[test]
    fn test_display_and_clear() {
        let mock = MockLineDisplay::new("Display");
        let manager = manager(&mock);
        manager.connect();

        manager.display_line(Some("Subtotal"), Some("12.50")).unwrap();
        assert_eq!(mock.rows()[0], "Subtotal            ");
        assert_eq!(mock.rows()[1], "12.50               ");

        manager.clear_display().unwrap();
        assert_eq!(mock.rows(), vec![String::new(), String::new()]);
    }

    #[test]
    fn test_display_before_connect_is_offline() {
        let mock = MockLineDisplay::new("Display");
        let manager = manager(&mock);

        assert_eq!(
            manager.display_line(Some("x"), None),
            Err(DeviceError::offline(DeviceKind::LineDisplay))
        );
    }
}
