//! Two-line customer display orchestrator.

use crate::Peripheral;
use crate::base::{DeviceCore, describe, is_offline_code};
use pos_core::constants::LINE_DISPLAY_ROWS;
use pos_core::{DeviceError, DeviceKind, DeviceSettings, Result};
use pos_hardware::codes::power;
use pos_hardware::events::{DataEvent, ErrorEvent, OutputCompleteEvent, StatusEvent};
use pos_hardware::traits::{LineDisplayHandle, attach_listener};
use pos_hardware::{
    ConnectOutcome, DeviceRegistry, DriverError, DriverListener, ErrorCode, OperationGuard,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub fn is_failure_status(status: i32) -> bool {
    power::is_failure(status)
}

/// Classify a line display driver error.
pub fn map_error(error: &DriverError) -> DeviceError {
    let kind = DeviceKind::LineDisplay;
    match error.code {
        ErrorCode::Illegal => DeviceError::invalid_format(describe(error)),
        code if is_offline_code(code) => DeviceError::offline(kind),
        ErrorCode::Busy | ErrorCode::Claimed => DeviceError::busy(kind),
        _ => DeviceError::unexpected(describe(error)),
    }
}

/// Fit a line to a display `columns` wide.
///
/// Short lines are padded with spaces, long lines are cut, and a missing
/// line blanks the row.
pub fn format_line(line: Option<&str>, columns: usize) -> String {
    let text = line.unwrap_or("");
    let fitted: String = text.chars().take(columns).collect();
    format!("{:<width$}", fitted, width = columns)
}

pub struct LineDisplay<H: LineDisplayHandle + ?Sized> {
    core: DeviceCore<H>,
}

impl<H: LineDisplayHandle + ?Sized + 'static> LineDisplay<H> {
    pub fn new(
        handle: Arc<H>,
        registry: Arc<dyn DeviceRegistry>,
        settings: DeviceSettings,
    ) -> Arc<Self> {
        let display = Arc::new(Self {
            core: DeviceCore::new(
                DeviceKind::LineDisplay,
                handle,
                registry,
                None,
                settings,
                is_failure_status,
            ),
        });
        attach_listener(display.core.supervisor().handle().as_ref(), &display);
        display
    }
}

impl<H: LineDisplayHandle + ?Sized> LineDisplay<H> {
    pub fn core(&self) -> &DeviceCore<H> {
        &self.core
    }

    /// Write both rows of the display.
    pub fn display_line(&self, line1: Option<&str>, line2: Option<&str>) -> Result<()> {
        self.core.ensure_connected()?;
        let columns = self.core.settings().line_display_columns;
        let rows: [String; LINE_DISPLAY_ROWS] =
            [format_line(line1, columns), format_line(line2, columns)];

        self.core
            .call(|handle| {
                if !handle.device_enabled()? {
                    handle.set_device_enabled(true)?;
                }
                for (row, text) in rows.iter().enumerate() {
                    handle.display_text_at(row, 0, text)?;
                }
                Ok(())
            })
            .map_err(|e| map_error(&e))?;

        debug!(line1 = %rows[0], line2 = %rows[1], "Line display updated");
        Ok(())
    }

    /// Blank the display.
    pub fn clear_display(&self) -> Result<()> {
        self.core.ensure_connected()?;
        self.core
            .call(|handle| {
                if !handle.device_enabled()? {
                    handle.set_device_enabled(true)?;
                }
                handle.clear_text()
            })
            .map_err(|e| map_error(&e))
    }

    fn after_connect(&self) {
        if let Err(e) = self.core.call(|handle| handle.set_device_enabled(true)) {
            warn!(device = %self.core.kind(), error = %e, "Enabling line display failed");
        }
    }
}

impl<H: LineDisplayHandle + ?Sized> Peripheral for LineDisplay<H> {
    fn kind(&self) -> DeviceKind {
        self.core.kind()
    }

    fn connect(&self) -> bool {
        match self.core.connect() {
            ConnectOutcome::Connected => {
                self.after_connect();
                true
            }
            ConnectOutcome::AlreadyConnected => true,
            ConnectOutcome::NotConnected => false,
        }
    }

    fn disconnect(&self) {
        self.core.disconnect();
    }

    fn is_connected(&self) -> bool {
        self.core.is_connected()
    }

    fn device_name(&self) -> String {
        self.core.device_name()
    }

    fn try_lock(&self, timeout: Duration) -> Option<OperationGuard<'_>> {
        self.core.try_lock(timeout)
    }
}

impl<H: LineDisplayHandle + ?Sized> DriverListener for LineDisplay<H> {
    fn on_data(&self, event: DataEvent) {
        self.core.bridge().on_data(event);
    }

    fn on_error(&self, event: ErrorEvent) {
        self.core.close_on_hardware_loss(&event);
        self.core.bridge().on_error(event);
    }

    fn on_status(&self, event: StatusEvent) {
        self.core.bridge().on_status(event);
    }

    fn on_output_complete(&self, event: OutputCompleteEvent) {
        self.core.bridge().on_output_complete(event);
    }
}
