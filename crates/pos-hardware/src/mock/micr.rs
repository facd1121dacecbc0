//! Mock MICR check reader.

use super::{DataPayload, MockDriver, MockOp, delegate_hardware_handle};
use crate::codes::micr::EXT_NODATA;
use crate::error::{DriverError, DriverResult};
use crate::traits::{DeviceCategory, MicrHandle};
use pos_core::CheckData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Check reader. A queued check is sensed on insertion and its fields are
/// delivered as a data event once data events are enabled.
pub struct MockMicr {
    driver: MockDriver,
    check_present: AtomicBool,
}

impl MockMicr {
    pub fn new(attached: &str) -> Arc<Self> {
        Arc::new(Self {
            driver: MockDriver::new(DeviceCategory::Micr, attached),
            check_present: AtomicBool::new(false),
        })
    }

    pub fn driver(&self) -> &MockDriver {
        &self.driver
    }

    /// Insert a check that reads as `data`.
    pub fn insert_check(&self, data: CheckData) {
        self.check_present.store(true, Ordering::SeqCst);
        self.driver.queue_data(DataPayload::Check(data));
    }

    pub fn check_present(&self) -> bool {
        self.check_present.load(Ordering::SeqCst)
    }
}

delegate_hardware_handle!(MockMicr);

impl MicrHandle for MockMicr {
    fn begin_insertion(&self, timeout: Duration) -> DriverResult<()> {
        self.driver.enter_enabled(MockOp::BeginInsertion)?;
        if !self.check_present() {
            std::thread::sleep(timeout);
            return Err(DriverError::timeout("no check inserted"));
        }
        Ok(())
    }

    fn end_insertion(&self) -> DriverResult<()> {
        self.driver.enter(MockOp::EndInsertion)
    }

    fn begin_removal(&self, _timeout: Duration) -> DriverResult<()> {
        self.driver.enter(MockOp::BeginRemoval)
    }

    fn end_removal(&self) -> DriverResult<()> {
        self.driver.enter(MockOp::EndRemoval)?;
        self.check_present.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn set_data_event_enabled(&self, enabled: bool) -> DriverResult<()> {
        self.driver.set_data_event_enabled(enabled)
    }

    fn clear_input(&self) -> DriverResult<()> {
        self.driver.enter(MockOp::ClearInput)
    }

    fn check_fields(&self) -> DriverResult<CheckData> {
        match self.driver.last_payload() {
            Some(DataPayload::Check(data)) => Ok(data),
            _ => Err(DriverError::extended(EXT_NODATA, "no check data")),
        }
    }
}
