//! Mock scale.

use super::{MockDriver, MockOp, delegate_hardware_handle};
use crate::error::{DriverError, DriverResult};
use crate::traits::{DeviceCategory, ScaleHandle};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::Duration;

/// Scale answering reads from a script.
///
/// Queued results are consumed in order; once the queue is empty every read
/// returns the resting weight, or times out if none is set.
pub struct MockScale {
    driver: MockDriver,
    reads: Mutex<VecDeque<DriverResult<i32>>>,
    resting: Mutex<Option<i32>>,
    live: AtomicI32,
    status_notify: AtomicBool,
}

impl MockScale {
    pub fn new(attached: &str) -> Arc<Self> {
        Arc::new(Self {
            driver: MockDriver::new(DeviceCategory::Scale, attached),
            reads: Mutex::new(VecDeque::new()),
            resting: Mutex::new(None),
            live: AtomicI32::new(0),
            status_notify: AtomicBool::new(false),
        })
    }

    pub fn driver(&self) -> &MockDriver {
        &self.driver
    }

    pub fn queue_read(&self, result: DriverResult<i32>) {
        self.reads.lock().push_back(result);
    }

    /// Weight returned when no scripted read is queued.
    pub fn set_resting_weight(&self, weight: Option<i32>) {
        *self.resting.lock() = weight;
    }

    /// Report a live weight with a status update.
    pub fn emit_live(&self, status: i32, weight: i32) {
        self.live.store(weight, Ordering::SeqCst);
        self.driver.emit_status(status);
    }

    pub fn status_notify(&self) -> bool {
        self.status_notify.load(Ordering::SeqCst)
    }
}

delegate_hardware_handle!(MockScale);

impl ScaleHandle for MockScale {
    fn read_weight(&self, timeout: Duration) -> DriverResult<i32> {
        self.driver.enter_enabled(MockOp::ReadWeight)?;
        let scripted = self.reads.lock().pop_front();
        match scripted {
            Some(result) => result,
            None => match *self.resting.lock() {
                Some(weight) => Ok(weight),
                None => {
                    std::thread::sleep(timeout);
                    Err(DriverError::timeout("weight did not settle"))
                }
            },
        }
    }

    fn live_weight(&self) -> DriverResult<i32> {
        Ok(self.live.load(Ordering::SeqCst))
    }

    fn set_status_notify(&self, enabled: bool) -> DriverResult<()> {
        self.status_notify.store(enabled, Ordering::SeqCst);
        Ok(())
    }
}
