//! Check reader manager.

use crate::health::HealthTracker;
use crate::managed::{Managed, ManagedDevice};
use crate::DeviceManager;
use pos_core::{CheckData, DeviceSettings, Result};
use pos_devices::Micr;
use pos_hardware::traits::MicrHandle;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub struct MicrManager {
    micr: Managed<Micr<dyn MicrHandle>>,
    tracker: HealthTracker,
    settings: DeviceSettings,
}

impl MicrManager {
    pub fn new(micr: Arc<Micr<dyn MicrHandle>>, settings: DeviceSettings) -> Self {
        Self {
            micr: Managed::new(micr, settings.connect_lock_timeout()),
            tracker: HealthTracker::new(),
            settings,
        }
    }

    pub fn micr(&self) -> &Arc<Micr<dyn MicrHandle>> {
        self.micr.peripheral()
    }

    /// Wait up to `timeout` for a check, read it, and eject it.
    ///
    /// The check is ejected whether or not the read succeeded.
    pub fn read_check(&self, timeout: Duration) -> Result<CheckData> {
        let _guard = self.micr.lock(self.settings.operation_lock_timeout())?;
        let micr = self.micr.peripheral();

        micr.insert_check(timeout)?;
        let result = micr.read_check_data(self.settings.check_read_timeout());
        if let Err(e) = micr.withdraw_check() {
            warn!(error = %e, "Withdrawing check failed");
        }
        result
    }

    /// Abort a read in progress. Does not wait for the operation lock.
    pub fn cancel_check_read(&self) {
        self.micr.peripheral().cancel_check_read();
    }
}

impl DeviceManager for MicrManager {
    fn devices(&self) -> Vec<&dyn ManagedDevice> {
        vec![&self.micr]
    }

    fn tracker(&self) -> &HealthTracker {
        &self.tracker
    }
}
