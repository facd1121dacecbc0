//! Mock receipt and slip printer.

use super::{MockDriver, MockOp, delegate_hardware_handle};
use crate::codes::printer::{
    EXT_BADFORMAT, EXT_COVER_OPEN, EXT_REC_EMPTY, EXT_SLP_EMPTY, TP_NORMAL, TP_TRANSACTION,
};
use crate::error::{DriverError, DriverResult, ErrorCode};
use crate::traits::{DeviceCategory, PrinterHandle, PrinterStation};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::Duration;

/// One item the mock printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintRecord {
    Text {
        station: PrinterStation,
        data: String,
    },
    Barcode {
        station: PrinterStation,
        data: String,
        symbology: i32,
    },
    Bitmap {
        station: PrinterStation,
        bytes: usize,
    },
}

/// How the mock finishes an asynchronous transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Emit an output-complete event.
    Output,
    /// Emit an error event.
    Error { code: ErrorCode, extended: i32 },
    /// Emit a data event, which no real printer does.
    Data { status: i32 },
    /// Emit nothing.
    Silent,
}

pub struct MockPrinter {
    driver: MockDriver,
    cover_open: AtomicBool,
    rec_empty: AtomicBool,
    slp_empty: AtomicBool,
    rec_near_end: AtomicBool,
    slip_present: AtomicBool,
    async_mode: AtomicBool,
    next_output_id: AtomicI32,
    completion: Mutex<Completion>,
    transaction: Mutex<Option<Vec<PrintRecord>>>,
    printed: Mutex<Vec<PrintRecord>>,
}

impl MockPrinter {
    pub fn new(attached: &str) -> Arc<Self> {
        Arc::new(Self {
            driver: MockDriver::new(DeviceCategory::PosPrinter, attached),
            cover_open: AtomicBool::new(false),
            rec_empty: AtomicBool::new(false),
            slp_empty: AtomicBool::new(false),
            rec_near_end: AtomicBool::new(false),
            slip_present: AtomicBool::new(false),
            async_mode: AtomicBool::new(false),
            next_output_id: AtomicI32::new(1),
            completion: Mutex::new(Completion::Output),
            transaction: Mutex::new(None),
            printed: Mutex::new(Vec::new()),
        })
    }

    pub fn driver(&self) -> &MockDriver {
        &self.driver
    }

    pub fn set_cover_open(&self, open: bool) {
        self.cover_open.store(open, Ordering::SeqCst);
    }

    pub fn set_rec_empty(&self, empty: bool) {
        self.rec_empty.store(empty, Ordering::SeqCst);
    }

    pub fn set_slp_empty(&self, empty: bool) {
        self.slp_empty.store(empty, Ordering::SeqCst);
    }

    pub fn set_rec_near_end(&self, near_end: bool) {
        self.rec_near_end.store(near_end, Ordering::SeqCst);
    }

    /// Place a slip in the throat so the next insertion succeeds.
    pub fn set_slip_present(&self, present: bool) {
        self.slip_present.store(present, Ordering::SeqCst);
    }

    pub fn slip_present(&self) -> bool {
        self.slip_present.load(Ordering::SeqCst)
    }

    pub fn set_completion(&self, completion: Completion) {
        *self.completion.lock() = completion;
    }

    pub fn async_mode(&self) -> bool {
        self.async_mode.load(Ordering::SeqCst)
    }

    /// Items flushed by completed transactions or printed outside one.
    pub fn printed(&self) -> Vec<PrintRecord> {
        self.printed.lock().clone()
    }

    fn check_station(&self, station: PrinterStation) -> DriverResult<()> {
        if self.cover_open.load(Ordering::SeqCst) {
            return Err(DriverError::extended(EXT_COVER_OPEN, "cover open"));
        }
        match station {
            PrinterStation::Receipt if self.rec_empty.load(Ordering::SeqCst) => {
                Err(DriverError::extended(EXT_REC_EMPTY, "receipt paper empty"))
            }
            PrinterStation::Slip if self.slp_empty.load(Ordering::SeqCst) => {
                Err(DriverError::extended(EXT_SLP_EMPTY, "slip paper empty"))
            }
            _ => Ok(()),
        }
    }

    fn push(&self, record: PrintRecord) {
        match self.transaction.lock().as_mut() {
            Some(buffer) => buffer.push(record),
            None => self.printed.lock().push(record),
        }
    }

    fn finish_transaction(&self) {
        let buffered = self.transaction.lock().take().unwrap_or_default();
        self.printed.lock().extend(buffered);

        if !self.async_mode() {
            return;
        }
        let completion = *self.completion.lock();
        match completion {
            Completion::Output => {
                let id = self.next_output_id.fetch_add(1, Ordering::SeqCst);
                self.driver.emit_output_complete(id);
            }
            Completion::Error { code, extended } => self.driver.emit_error(code, extended),
            Completion::Data { status } => self.driver.emit_data(status),
            Completion::Silent => {}
        }
    }
}

delegate_hardware_handle!(MockPrinter);

impl PrinterHandle for MockPrinter {
    fn set_async_mode(&self, enabled: bool) -> DriverResult<()> {
        self.async_mode.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    fn transaction_print(&self, _station: PrinterStation, control: i32) -> DriverResult<()> {
        self.driver.enter_enabled(MockOp::TransactionPrint)?;
        match control {
            TP_TRANSACTION => {
                *self.transaction.lock() = Some(Vec::new());
                Ok(())
            }
            TP_NORMAL => {
                self.finish_transaction();
                Ok(())
            }
            other => Err(DriverError::new(
                ErrorCode::Illegal,
                format!("unknown transaction control {}", other),
            )),
        }
    }

    fn print_normal(&self, station: PrinterStation, data: &str) -> DriverResult<()> {
        self.driver.enter_enabled(MockOp::PrintNormal)?;
        self.check_station(station)?;
        self.push(PrintRecord::Text {
            station,
            data: data.to_string(),
        });
        Ok(())
    }

    fn print_barcode(
        &self,
        station: PrinterStation,
        data: &str,
        symbology: i32,
        _height: i32,
        _width: i32,
    ) -> DriverResult<()> {
        self.driver.enter_enabled(MockOp::PrintBarcode)?;
        self.check_station(station)?;
        if data.is_empty() {
            return Err(DriverError::new(ErrorCode::Illegal, "empty barcode"));
        }
        self.push(PrintRecord::Barcode {
            station,
            data: data.to_string(),
            symbology,
        });
        Ok(())
    }

    fn print_bitmap(&self, station: PrinterStation, image: &[u8], _width: i32) -> DriverResult<()> {
        self.driver.enter_enabled(MockOp::PrintBitmap)?;
        self.check_station(station)?;
        if image.is_empty() {
            return Err(DriverError::extended(EXT_BADFORMAT, "empty bitmap"));
        }
        self.push(PrintRecord::Bitmap {
            station,
            bytes: image.len(),
        });
        Ok(())
    }

    fn clear_output(&self) -> DriverResult<()> {
        self.driver.enter(MockOp::ClearOutput)?;
        *self.transaction.lock() = None;
        Ok(())
    }

    fn cover_open(&self) -> DriverResult<bool> {
        Ok(self.cover_open.load(Ordering::SeqCst))
    }

    fn rec_empty(&self) -> DriverResult<bool> {
        Ok(self.rec_empty.load(Ordering::SeqCst))
    }

    fn slp_empty(&self) -> DriverResult<bool> {
        Ok(self.slp_empty.load(Ordering::SeqCst))
    }

    fn query_rec_near_end(&self) -> DriverResult<bool> {
        Ok(self.rec_near_end.load(Ordering::SeqCst))
    }

    fn begin_insertion(&self, timeout: Duration) -> DriverResult<()> {
        self.driver.enter_enabled(MockOp::BeginInsertion)?;
        if !self.slip_present() {
            std::thread::sleep(timeout);
            return Err(DriverError::timeout("no slip inserted"));
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
        self.slip_present.store(false, Ordering::SeqCst);
        Ok(())
    }
}
