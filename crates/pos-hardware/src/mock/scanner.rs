//! Mock barcode scanner.

use super::{DataPayload, MockDriver, MockOp, delegate_hardware_handle};
use crate::error::{DriverError, DriverResult, ErrorCode};
use crate::traits::{DeviceCategory, ScannerHandle};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Scanner that delivers queued labels once it is enabled for data events.
pub struct MockScanner {
    driver: MockDriver,
    decode_data: AtomicBool,
}

impl MockScanner {
    pub fn new(attached: &str) -> Arc<Self> {
        Arc::new(Self {
            driver: MockDriver::new(DeviceCategory::Scanner, attached),
            decode_data: AtomicBool::new(false),
        })
    }

    pub fn driver(&self) -> &MockDriver {
        &self.driver
    }

    /// Present a label to the scanner.
    pub fn queue_scan(&self, label: &str, symbology: i32) {
        self.driver.queue_data(DataPayload::Label {
            data: label.as_bytes().to_vec(),
            symbology,
        });
    }

    fn label(&self) -> DriverResult<(Vec<u8>, i32)> {
        match self.driver.last_payload() {
            Some(DataPayload::Label { data, symbology }) => Ok((data, symbology)),
            _ => Err(DriverError::new(ErrorCode::Illegal, "no label scanned")),
        }
    }
}

delegate_hardware_handle!(MockScanner);

impl ScannerHandle for MockScanner {
    fn set_auto_disable(&self, enabled: bool) -> DriverResult<()> {
        self.driver.set_auto_disable(enabled);
        Ok(())
    }

    fn set_decode_data(&self, enabled: bool) -> DriverResult<()> {
        self.decode_data.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    fn set_data_event_enabled(&self, enabled: bool) -> DriverResult<()> {
        self.driver.set_data_event_enabled(enabled)
    }

    fn scan_data_label(&self) -> DriverResult<Vec<u8>> {
        let (data, _) = self.label()?;
        Ok(data)
    }

    fn scan_data_type(&self) -> DriverResult<i32> {
        let (_, symbology) = self.label()?;
        Ok(symbology)
    }

    fn clear_input(&self) -> DriverResult<()> {
        self.driver.enter(MockOp::ClearInput)
    }
}
