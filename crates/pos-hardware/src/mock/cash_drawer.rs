//! Mock cash drawer.

use super::{MockDriver, MockOp, delegate_hardware_handle};
use crate::codes::cash_drawer::{SUE_DRAWER_CLOSED, SUE_DRAWER_OPEN};
use crate::error::DriverResult;
use crate::traits::{CashDrawerHandle, DeviceCategory};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Cash drawer whose lid is closed by the test, or automatically after a delay.
pub struct MockCashDrawer {
    driver: MockDriver,
    open: AtomicBool,
    auto_close: Mutex<Option<Duration>>,
    this: Weak<MockCashDrawer>,
}

impl MockCashDrawer {
    pub fn new(attached: &str) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            driver: MockDriver::new(DeviceCategory::CashDrawer, attached),
            open: AtomicBool::new(false),
            auto_close: Mutex::new(None),
            this: this.clone(),
        })
    }

    pub fn driver(&self) -> &MockDriver {
        &self.driver
    }

    /// Close the drawer `delay` after every open.
    pub fn set_auto_close(&self, delay: Option<Duration>) {
        *self.auto_close.lock() = delay;
    }

    /// Set the drawer state without a status callback.
    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Push the drawer shut and report it.
    pub fn close_drawer(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.driver.emit_status(SUE_DRAWER_CLOSED);
    }
}

delegate_hardware_handle!(MockCashDrawer);

impl CashDrawerHandle for MockCashDrawer {
    fn open_drawer(&self) -> DriverResult<()> {
        self.driver.enter_enabled(MockOp::OpenDrawer)?;
        self.open.store(true, Ordering::SeqCst);
        self.driver.emit_status(SUE_DRAWER_OPEN);

        let auto_close = *self.auto_close.lock();
        if let Some(delay) = auto_close
            && let Some(drawer) = self.this.upgrade()
        {
            std::thread::spawn(move || {
                std::thread::sleep(delay);
                drawer.close_drawer();
            });
        }
        Ok(())
    }

    fn drawer_opened(&self) -> DriverResult<bool> {
        Ok(self.open.load(Ordering::SeqCst))
    }
}
