//! Cash drawer manager.

use crate::health::HealthTracker;
use crate::managed::{Managed, ManagedDevice};
use crate::DeviceManager;
use pos_core::{DeviceSettings, Result};
use pos_devices::CashDrawer;
use pos_hardware::traits::CashDrawerHandle;
use std::sync::Arc;

pub struct CashDrawerManager {
    drawer: Managed<CashDrawer<dyn CashDrawerHandle>>,
    tracker: HealthTracker,
    settings: DeviceSettings,
}

impl CashDrawerManager {
    pub fn new(drawer: Arc<CashDrawer<dyn CashDrawerHandle>>, settings: DeviceSettings) -> Self {
        Self {
            drawer: Managed::new(drawer, settings.connect_lock_timeout()),
            tracker: HealthTracker::new(),
            settings,
        }
    }

    pub fn drawer(&self) -> &Arc<CashDrawer<dyn CashDrawerHandle>> {
        self.drawer.peripheral()
    }

    /// Open the drawer and return once it is closed again.
    pub fn open_cash_drawer(&self) -> Result<()> {
        let _guard = self.drawer.lock(self.settings.operation_lock_timeout())?;
        self.drawer.peripheral().open_cash_drawer()
    }
}

impl DeviceManager for CashDrawerManager {
    fn devices(&self) -> Vec<&dyn ManagedDevice> {
        vec![&self.drawer]
    }

    fn tracker(&self) -> &HealthTracker {
        &self.tracker
    }
}
