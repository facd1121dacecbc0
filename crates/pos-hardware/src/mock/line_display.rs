//! Mock two-line display.

use super::{MockDriver, MockOp, delegate_hardware_handle};
use crate::error::{DriverError, DriverResult, ErrorCode};
use crate::traits::{DeviceCategory, LineDisplayHandle};
use parking_lot::Mutex;
use pos_core::constants::{LINE_DISPLAY_COLUMNS, LINE_DISPLAY_ROWS};
use std::sync::Arc;

pub struct MockLineDisplay {
    driver: MockDriver,
    rows: Mutex<Vec<String>>,
}

impl MockLineDisplay {
    pub fn new(attached: &str) -> Arc<Self> {
        Arc::new(Self {
            driver: MockDriver::new(DeviceCategory::LineDisplay, attached),
            rows: Mutex::new(vec![String::new(); LINE_DISPLAY_ROWS]),
        })
    }

    pub fn driver(&self) -> &MockDriver {
        &self.driver
    }

    /// Current contents of each row.
    pub fn rows(&self) -> Vec<String> {
        self.rows.lock().clone()
    }
}

delegate_hardware_handle!(MockLineDisplay);

impl LineDisplayHandle for MockLineDisplay {
    fn display_text_at(&self, row: usize, column: usize, text: &str) -> DriverResult<()> {
        self.driver.enter_enabled(MockOp::DisplayText)?;
        if row >= LINE_DISPLAY_ROWS || column + text.chars().count() > LINE_DISPLAY_COLUMNS {
            return Err(DriverError::new(ErrorCode::Illegal, "text outside the display"));
        }
        let mut rows = self.rows.lock();
        let mut line: Vec<char> = format!("{:<width$}", rows[row], width = LINE_DISPLAY_COLUMNS)
            .chars()
            .collect();
        for (offset, ch) in text.chars().enumerate() {
            line[column + offset] = ch;
        }
        rows[row] = line.into_iter().collect();
        Ok(())
    }

    fn clear_text(&self) -> DriverResult<()> {
        self.driver.enter_enabled(MockOp::ClearText)?;
        for row in self.rows.lock().iter_mut() {
            row.clear();
        }
        Ok(())
    }
}
