//! Scale manager.

use crate::health::HealthTracker;
use crate::managed::{Managed, ManagedDevice};
use crate::DeviceManager;
use pos_core::{DeviceSettings, Result, WeightReading};
use pos_devices::Scale;
use pos_hardware::traits::ScaleHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub struct ScaleManager {
    scale: Managed<Scale<dyn ScaleHandle>>,
    tracker: HealthTracker,
    settings: DeviceSettings,
}

impl ScaleManager {
    pub fn new(scale: Arc<Scale<dyn ScaleHandle>>, settings: DeviceSettings) -> Self {
        Self {
            scale: Managed::new(scale, settings.connect_lock_timeout()),
            tracker: HealthTracker::new(),
            settings,
        }
    }

    pub fn scale(&self) -> &Arc<Scale<dyn ScaleHandle>> {
        self.scale.peripheral()
    }

    /// Settled weight, waiting at most `timeout` (or the configured default).
    pub fn stable_weight(&self, timeout: Option<Duration>) -> Result<WeightReading> {
        let _guard = self.scale.lock(self.settings.operation_lock_timeout())?;
        let timeout = timeout.unwrap_or_else(|| self.settings.stable_weight_timeout());
        self.scale.peripheral().read_stable_weight(timeout)
    }

    pub fn subscribe_live_weight(&self) -> broadcast::Receiver<WeightReading> {
        self.scale.peripheral().subscribe_live_weight()
    }

    pub fn stop_live_weight(&self) {
        self.scale.peripheral().stop_live_weight();
    }
}

impl DeviceManager for ScaleManager {
    fn devices(&self) -> Vec<&dyn ManagedDevice> {
        vec![&self.scale]
    }

    fn tracker(&self) -> &HealthTracker {
        &self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pos_core::{DeviceError, DeviceKind, WeightError};
    use pos_hardware::codes::scale::SUE_STABLE_WEIGHT;
    use pos_hardware::mock::MockScale;
    use pos_hardware::registry::{InMemoryRegistry, LogicalDeviceConfig};
    use std::thread;

    fn manager(mock: &Arc<MockScale>) -> Arc<ScaleManager> {
        let registry = Arc::new(InMemoryRegistry::new(vec![LogicalDeviceConfig::new(
            "Scale", "Scale",
        )]));
        let handle: Arc<dyn ScaleHandle> = mock.clone();
        let settings = DeviceSettings::fast();
        let scale = Scale::new(handle, registry, settings.clone());
        let manager = Arc::new(ScaleManager::new(scale, settings));
        manager.connect();
        manager
    }

    #[test]
    fn test_stable_weight_default_timeout() {
        let mock = MockScale::new("Scale");
        mock.set_resting_weight(Some(3000));
        let manager = manager(&mock);

        assert_eq!(manager.stable_weight(None).unwrap().display, "3.00");
    }

    #[test]
    fn test_unstable_weight() {
        let mock = MockScale::new("Scale");
        let manager = manager(&mock);

        assert_eq!(
            manager.stable_weight(Some(Duration::from_millis(30))),
            Err(DeviceError::Weight(WeightError::Unstable))
        );
    }

    #[test]
    fn test_concurrent_weigh_is_busy() {
        let mock = MockScale::new("Scale");
        let manager = manager(&mock);

        let first = {
            let manager = manager.clone();
            thread::spawn(move || manager.stable_weight(Some(Duration::from_millis(300))))
        };
        thread::sleep(Duration::from_millis(50));

        assert_eq!(
            manager.stable_weight(Some(Duration::from_millis(10))),
            Err(DeviceError::busy(DeviceKind::Scale))
        );
        mock.set_resting_weight(Some(500));
        assert_eq!(first.join().unwrap().unwrap().display, "0.50");
    }

    #[test]
    fn test_live_weight_subscription() {
        let mock = MockScale::new("Scale");
        let manager = manager(&mock);
        let mut live = manager.subscribe_live_weight();

        mock.emit_live(SUE_STABLE_WEIGHT, 1500);
        assert_eq!(live.try_recv().unwrap().display, "1.50");

        manager.stop_live_weight();
        mock.emit_live(SUE_STABLE_WEIGHT, 1600);
        assert!(live.try_recv().is_err());
    }
}
