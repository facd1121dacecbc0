//! Receipt and slip printer orchestrator.
//!
//! A print job is one transaction: begin, print every item, end, then wait
//! for the driver's output-complete callback. Paper and cover state are
//! checked before the job starts. Whatever happens, pending output is
//! cleared afterwards and an inserted slip is withdrawn.
//!
//! Some driver errors leave the printer in a state only a fresh session
//! clears. Those trigger a disconnect and reconnect before the error is
//! returned; see [`recovery_for`].

use crate::Peripheral;
use crate::base::{DeviceCore, describe, is_offline_code};
use parking_lot::Mutex;
use pos_core::{DeviceError, DeviceKind, DeviceSettings, Result, Symbology};
use pos_hardware::codes::{power, printer as codes, symbology_to_code};
use pos_hardware::events::{DataEvent, ErrorEvent, OutputCompleteEvent, StatusEvent};
use pos_hardware::traits::{PrinterHandle, PrinterStation, attach_listener};
use pos_hardware::{
    ConnectOutcome, DeviceRegistry, DriverError, DriverEvent, DriverListener, DriverResult,
    ErrorCode, OperationGuard,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One element of a print job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintItem {
    /// Text, including any escape sequences the printer understands.
    Text(String),

    /// Barcode printed centred with its text below.
    Barcode {
        data: String,
        symbology: Symbology,
        height: i32,
        width: i32,
    },

    /// Bitmap image data; `None` width prints the image as is.
    Image { data: Vec<u8>, width: Option<i32> },
}

/// Statuses that end a wait on the printer.
pub fn is_failure_status(status: i32) -> bool {
    power::is_failure(status)
        || matches!(
            status,
            codes::SUE_COVER_OPEN | codes::SUE_REC_EMPTY | codes::SUE_SLP_EMPTY | codes::SUE_JRN_EMPTY
        )
}

/// What to do with the session after a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Reconnect and report the content as invalid.
    ReconnectAsInvalidFormat,
    /// Reconnect and report the classified error.
    Reconnect,
    /// Report the classified error without touching the session.
    None,
}

fn is_bad_content(error: &DriverError) -> bool {
    error.code == ErrorCode::Illegal
        || error.is_extended(codes::EXT_BADFORMAT)
        || error.is_extended(codes::EXT_TOOBIG)
}

/// Recovery rule for a printer driver error.
pub fn recovery_for(error: &DriverError) -> Recovery {
    if is_bad_content(error) {
        Recovery::ReconnectAsInvalidFormat
    } else if matches!(error.code, ErrorCode::Failure | ErrorCode::Disabled) {
        Recovery::Reconnect
    } else {
        Recovery::None
    }
}

/// Classify a printer driver error.
pub fn map_error(error: &DriverError) -> DeviceError {
    let kind = DeviceKind::Printer;
    if is_bad_content(error) {
        return DeviceError::invalid_format(describe(error));
    }
    match error.code {
        ErrorCode::Extended => match error.extended {
            codes::EXT_COVER_OPEN => DeviceError::CoverOpen,
            codes::EXT_REC_EMPTY
            | codes::EXT_SLP_EMPTY
            | codes::EXT_JRN_EMPTY
            | codes::EXT_SLP_FORM => DeviceError::OutOfPaper,
            _ => DeviceError::hardware(kind, describe(error)),
        },
        code if is_offline_code(code) || code == ErrorCode::Disabled => DeviceError::offline(kind),
        ErrorCode::Failure => DeviceError::hardware(kind, describe(error)),
        ErrorCode::Busy | ErrorCode::Claimed => DeviceError::busy(kind),
        ErrorCode::Timeout => DeviceError::timeout(kind),
        _ => DeviceError::unexpected(describe(error)),
    }
}

/// Driver error equivalent to a failure status delivered during a wait.
fn status_error(status: i32) -> DriverError {
    match status {
        codes::SUE_COVER_OPEN => DriverError::extended(codes::EXT_COVER_OPEN, "cover opened"),
        codes::SUE_REC_EMPTY => DriverError::extended(codes::EXT_REC_EMPTY, "receipt paper ran out"),
        codes::SUE_SLP_EMPTY => DriverError::extended(codes::EXT_SLP_EMPTY, "slip paper ran out"),
        codes::SUE_JRN_EMPTY => DriverError::extended(codes::EXT_JRN_EMPTY, "journal paper ran out"),
        _ => DriverError::new(ErrorCode::Offline, format!("power status {}", status)),
    }
}

#[derive(Debug, Default)]
struct PrinterFlags {
    cover_open: bool,
    rec_empty: bool,
    slp_empty: bool,
    slip_inserted: bool,
    reconnect_needed: bool,
}

/// Prints receipts and slips.
pub struct Printer<H: PrinterHandle + ?Sized> {
    core: DeviceCore<H>,
    flags: Mutex<PrinterFlags>,
}

impl<H: PrinterHandle + ?Sized + 'static> Printer<H> {
    pub fn new(
        handle: Arc<H>,
        registry: Arc<dyn DeviceRegistry>,
        settings: DeviceSettings,
    ) -> Arc<Self> {
        let printer = Arc::new(Self {
            core: DeviceCore::new(
                DeviceKind::Printer,
                handle,
                registry,
                None,
                settings,
                is_failure_status,
            ),
            flags: Mutex::new(PrinterFlags::default()),
        });
        attach_listener(printer.core.supervisor().handle().as_ref(), &printer);
        printer
    }
}

impl<H: PrinterHandle + ?Sized> Printer<H> {
    pub fn core(&self) -> &DeviceCore<H> {
        &self.core
    }

    /// Whether a slip is held in the mechanism.
    pub fn slip_inserted(&self) -> bool {
        self.flags.lock().slip_inserted
    }

    /// Whether the next job will reconnect first.
    pub fn reconnect_needed(&self) -> bool {
        self.flags.lock().reconnect_needed
    }

    /// Print `items` on `station` as a single transaction.
    pub fn print_content(&self, items: &[PrintItem], station: PrinterStation) -> Result<()> {
        if std::mem::take(&mut self.flags.lock().reconnect_needed) {
            info!(device = %self.core.kind(), "Reconnecting before print");
            self.reconnect();
        }
        let result = self
            .core
            .ensure_connected()
            .and_then(|()| self.check_ready(station))
            .map(|()| self.run_transaction(items, station));
        self.cleanup();

        match result? {
            Ok(()) => Ok(()),
            Err(e) => {
                let recovery = recovery_for(&e);
                warn!(device = %self.core.kind(), error = %e, ?recovery, "Print failed");
                match recovery {
                    Recovery::ReconnectAsInvalidFormat => {
                        self.reconnect();
                        Err(DeviceError::invalid_format(describe(&e)))
                    }
                    Recovery::Reconnect => {
                        self.reconnect();
                        Err(map_error(&e))
                    }
                    Recovery::None => Err(map_error(&e)),
                }
            }
        }
    }

    fn check_ready(&self, station: PrinterStation) -> Result<()> {
        let (cover_flag, empty_flag) = {
            let flags = self.flags.lock();
            let empty = match station {
                PrinterStation::Receipt => flags.rec_empty,
                PrinterStation::Slip => flags.slp_empty,
            };
            (flags.cover_open, empty)
        };

        let cover_open = cover_flag
            || self
                .core
                .call(|handle| handle.cover_open())
                .map_err(|e| map_error(&e))?;
        if cover_open {
            return Err(DeviceError::CoverOpen);
        }

        let empty = empty_flag
            || self
                .core
                .call(|handle| match station {
                    PrinterStation::Receipt => handle.rec_empty(),
                    PrinterStation::Slip => handle.slp_empty(),
                })
                .map_err(|e| map_error(&e))?;
        if empty {
            return Err(DeviceError::OutOfPaper);
        }

        if station == PrinterStation::Receipt
            && self.core.settings().needs_near_empty_query(&self.core.device_name())
        {
            let near_end = self
                .core
                .call(|handle| handle.query_rec_near_end())
                .map_err(|e| map_error(&e))?;
            if near_end {
                return Err(DeviceError::OutOfPaper);
            }
        }
        Ok(())
    }

    fn run_transaction(&self, items: &[PrintItem], station: PrinterStation) -> DriverResult<()> {
        self.core.call(|handle| {
            handle.transaction_print(station, codes::TP_TRANSACTION)?;
            for item in items {
                print_item(handle, station, item)?;
            }
            Ok(())
        })?;

        self.core.bridge().start_event_listeners();
        self.core
            .call(|handle| handle.transaction_print(station, codes::TP_NORMAL))?;

        let timeout = self.core.settings().print_complete_timeout();
        match self.core.bridge().wait_for_event(Some(timeout)) {
            DriverEvent::OutputComplete(event) => {
                debug!(output_id = event.output_id, "Print complete");
                Ok(())
            }
            DriverEvent::Error(event) => Err(event.to_driver_error()),
            DriverEvent::StatusUpdate(event) => Err(status_error(event.status)),
            DriverEvent::Data(event) => {
                warn!(
                    device = %self.core.kind(),
                    status = event.status,
                    "Data event during print"
                );
                // Printers never deliver data; anything else here is unexpected.
                Err(DriverError::new(
                    ErrorCode::Other(event.status),
                    format!("data event {} while waiting for output", event.status),
                ))
            }
        }
    }

    fn cleanup(&self) {
        self.core.best_effort("clear output", |handle| handle.clear_output());
        if self.slip_inserted() {
            self.withdraw_slip();
        }
    }

    fn withdraw_slip(&self) {
        let timeout = self.core.settings().insertion_poll_timeout();
        self.core.best_effort("begin removal", |handle| handle.begin_removal(timeout));
        self.core.best_effort("end removal", |handle| handle.end_removal());
        self.flags.lock().slip_inserted = false;
    }

    fn reconnect(&self) {
        self.disconnect();
        if !self.connect() {
            warn!(device = %self.core.kind(), "Reconnect failed");
        }
    }

    /// Wait up to `timeout` for a slip to be inserted.
    pub fn insert_slip(&self, timeout: Duration) -> Result<()> {
        let kind = self.core.kind();
        self.core.ensure_connected()?;

        let deadline = Instant::now() + timeout;
        let poll = self.core.settings().insertion_poll_timeout();
        loop {
            match self.core.call(|handle| handle.begin_insertion(poll)) {
                Ok(()) => break,
                Err(e) if e.is_timeout() && Instant::now() < deadline => continue,
                Err(e) => {
                    self.core.best_effort("end insertion", |handle| handle.end_insertion());
                    return Err(if e.is_timeout() {
                        DeviceError::timeout(kind)
                    } else {
                        map_error(&e)
                    });
                }
            }
        }

        self.core
            .call(|handle| handle.end_insertion())
            .map_err(|e| map_error(&e))?;
        self.flags.lock().slip_inserted = true;
        info!(device = %kind, "Slip inserted");
        Ok(())
    }

    /// Eject the slip.
    pub fn remove_slip(&self, timeout: Duration) -> Result<()> {
        self.core.ensure_connected()?;
        let result = self.core.call(|handle| {
            handle.begin_removal(timeout)?;
            handle.end_removal()
        });
        self.flags.lock().slip_inserted = false;
        result.map_err(|e| map_error(&e))
    }

    fn after_connect(&self) {
        let result = self.core.call(|handle| {
            handle.set_async_mode(true)?;
            handle.set_device_enabled(true)
        });
        if let Err(e) = result {
            warn!(device = %self.core.kind(), error = %e, "Printer setup after connect failed");
        }
    }
}

fn print_item<H: PrinterHandle + ?Sized>(
    handle: &H,
    station: PrinterStation,
    item: &PrintItem,
) -> DriverResult<()> {
    match item {
        PrintItem::Text(text) => handle.print_normal(station, text),
        PrintItem::Barcode {
            data,
            symbology,
            height,
            width,
        } => handle.print_barcode(station, data, symbology_to_code(*symbology), *height, *width),
        PrintItem::Image { data, width } => {
            handle.print_bitmap(station, data, width.unwrap_or(codes::BM_ASIS))
        }
    }
}

impl<H: PrinterHandle + ?Sized> Peripheral for Printer<H> {
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
        *self.flags.lock() = PrinterFlags::default();
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

impl<H: PrinterHandle + ?Sized> DriverListener for Printer<H> {
    fn on_data(&self, event: DataEvent) {
        self.core.bridge().on_data(event);
    }

    fn on_error(&self, event: ErrorEvent) {
        if self.core.close_on_hardware_loss(&event) {
            self.flags.lock().reconnect_needed = true;
        }
        self.core.bridge().on_error(event);
    }

    fn on_status(&self, event: StatusEvent) {
        {
            let mut flags = self.flags.lock();
            match event.status {
                codes::SUE_COVER_OPEN => flags.cover_open = true,
                codes::SUE_COVER_OK => flags.cover_open = false,
                codes::SUE_REC_EMPTY => flags.rec_empty = true,
                codes::SUE_REC_NEAREMPTY | codes::SUE_REC_PAPEROK => flags.rec_empty = false,
                codes::SUE_SLP_EMPTY => flags.slp_empty = true,
                codes::SUE_SLP_NEAREMPTY | codes::SUE_SLP_PAPEROK => flags.slp_empty = false,
                _ => {}
            }
        }
        self.core.bridge().on_status(event);
    }

    fn on_output_complete(&self, event: OutputCompleteEvent) {
        self.core.bridge().on_output_complete(event);
    }
}
