//! Scriptable mock drivers for every peripheral.
//!
//! Each mock wraps a [`MockDriver`] that models the common control-handle
//! session (open, claim, enable, power) and records calls. Tests and the
//! simulated daemon script the mocks to attach or detach hardware, inject
//! driver failures, and emit callbacks.
//!
//! # Examples
//!
//! ```
//! use pos_hardware::mock::{MockOp, MockScale};
//! use pos_hardware::traits::HardwareHandle;
//! use std::time::Duration;
//!
//! let scale = MockScale::new("Magellan");
//! scale.open("Magellan").unwrap();
//! scale.claim(Duration::from_secs(1)).unwrap();
//! assert!(scale.claimed());
//! assert_eq!(scale.driver().calls(MockOp::Claim), 1);
//! ```

mod cash_drawer;
mod line_display;
mod micr;
mod printer;
mod scale;
mod scanner;

pub use cash_drawer::MockCashDrawer;
pub use line_display::MockLineDisplay;
pub use micr::MockMicr;
pub use printer::{Completion, MockPrinter, PrintRecord};
pub use scale::MockScale;
pub use scanner::MockScanner;

use crate::codes::{ControlState, PowerReportingCapability, PowerState, power};
use crate::error::{DriverError, DriverResult, ErrorCode};
use crate::events::{DataEvent, ErrorEvent, OutputCompleteEvent, StatusEvent};
use crate::traits::{DeviceCategory, DriverListener, PowerReporting};
use parking_lot::Mutex;
use pos_core::CheckData;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Driver calls a mock records and can fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Open,
    Close,
    Claim,
    Release,
    Enable,
    Disable,
    PowerState,
    Description,
    OpenDrawer,
    TransactionPrint,
    PrintNormal,
    PrintBarcode,
    PrintBitmap,
    ClearOutput,
    ClearInput,
    BeginInsertion,
    EndInsertion,
    BeginRemoval,
    EndRemoval,
    ReadWeight,
    DisplayText,
    ClearText,
    DataEventEnabled,
}

/// Payload made available when a queued data event is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataPayload {
    Label { data: Vec<u8>, symbology: i32 },
    Check(CheckData),
}

#[derive(Debug)]
struct Session {
    control: ControlState,
    claimed: bool,
    enabled: bool,
    power: PowerState,
    power_notify: bool,
    data_event_enabled: bool,
    auto_disable: bool,
    opened_name: Option<String>,
    attached: Option<String>,
    description: String,
}

/// Common mock session shared by every peripheral mock.
pub struct MockDriver {
    category: DeviceCategory,
    session: Mutex<Session>,
    capability: Mutex<PowerReportingCapability>,
    listeners: Mutex<Vec<Arc<dyn DriverListener>>>,
    calls: Mutex<HashMap<MockOp, usize>>,
    fail_once: Mutex<HashMap<MockOp, VecDeque<DriverError>>>,
    fail_always: Mutex<HashMap<MockOp, DriverError>>,
    queued_data: Mutex<VecDeque<DataPayload>>,
    last_payload: Mutex<Option<DataPayload>>,
}

impl MockDriver {
    /// New closed driver whose hardware answers to `attached`.
    pub fn new(category: DeviceCategory, attached: &str) -> Self {
        Self {
            category,
            session: Mutex::new(Session {
                control: ControlState::Closed,
                claimed: false,
                enabled: false,
                power: PowerState::Online,
                power_notify: false,
                data_event_enabled: false,
                auto_disable: false,
                opened_name: None,
                attached: Some(attached.to_string()),
                description: format!("Mock {} {}", category, attached),
            }),
            capability: Mutex::new(PowerReportingCapability::Standard),
            listeners: Mutex::new(Vec::new()),
            calls: Mutex::new(HashMap::new()),
            fail_once: Mutex::new(HashMap::new()),
            fail_always: Mutex::new(HashMap::new()),
            queued_data: Mutex::new(VecDeque::new()),
            last_payload: Mutex::new(None),
        }
    }

    pub fn category(&self) -> DeviceCategory {
        self.category
    }

    /// Record a call and return any injected failure for it.
    pub fn enter(&self, op: MockOp) -> DriverResult<()> {
        *self.calls.lock().entry(op).or_insert(0) += 1;
        if let Some(error) = self
            .fail_once
            .lock()
            .get_mut(&op)
            .and_then(|queue| queue.pop_front())
        {
            return Err(error);
        }
        if let Some(error) = self.fail_always.lock().get(&op) {
            return Err(error.clone());
        }
        Ok(())
    }

    /// Record a call on an operation that needs an enabled device.
    pub fn enter_enabled(&self, op: MockOp) -> DriverResult<()> {
        self.enter(op)?;
        let session = self.session.lock();
        if session.control == ControlState::Closed {
            return Err(DriverError::new(ErrorCode::Closed, "control is closed"));
        }
        if !session.claimed {
            return Err(DriverError::new(ErrorCode::NotClaimed, "device is not claimed"));
        }
        if !session.enabled {
            return Err(DriverError::new(ErrorCode::Disabled, "device is disabled"));
        }
        Ok(())
    }

    /// Number of recorded calls of `op`.
    pub fn calls(&self, op: MockOp) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or(0)
    }

    pub fn reset_calls(&self) {
        self.calls.lock().clear();
    }

    /// Fail the next call of `op` with `error`.
    pub fn fail_next(&self, op: MockOp, error: DriverError) {
        self.fail_once.lock().entry(op).or_default().push_back(error);
    }

    /// Fail every call of `op` with `error` until cleared.
    pub fn fail_always(&self, op: MockOp, error: DriverError) {
        self.fail_always.lock().insert(op, error);
    }

    pub fn clear_failures(&self) {
        self.fail_once.lock().clear();
        self.fail_always.lock().clear();
    }

    /// Make the hardware answer to `logical_name`.
    pub fn attach(&self, logical_name: &str) {
        self.session.lock().attached = Some(logical_name.to_string());
    }

    /// Unplug the hardware. Claims fail until re-attached.
    pub fn detach(&self) {
        self.session.lock().attached = None;
    }

    /// Logical name of the current open, if any.
    pub fn opened_name(&self) -> Option<String> {
        self.session.lock().opened_name.clone()
    }

    pub fn set_description(&self, description: &str) {
        self.session.lock().description = description.to_string();
    }

    pub fn set_power_capability(&self, capability: PowerReportingCapability) {
        *self.capability.lock() = capability;
    }

    pub fn power_notify_enabled(&self) -> bool {
        self.session.lock().power_notify
    }

    pub fn set_power_state(&self, power: PowerState) {
        self.session.lock().power = power;
    }

    /// Overwrite the session state directly.
    pub fn force_session(&self, control: ControlState, claimed: bool, power: PowerState) {
        let mut session = self.session.lock();
        session.control = control;
        session.claimed = claimed;
        session.power = power;
    }

    pub fn is_enabled(&self) -> bool {
        self.session.lock().enabled
    }

    pub fn data_event_enabled(&self) -> bool {
        self.session.lock().data_event_enabled
    }

    /// Queue a data payload, delivered once the device is enabled with data events on.
    pub fn queue_data(&self, payload: DataPayload) {
        self.queued_data.lock().push_back(payload);
        self.deliver_data();
    }

    pub fn has_queued_data(&self) -> bool {
        !self.queued_data.lock().is_empty()
    }

    /// Payload of the last delivered data event.
    pub fn last_payload(&self) -> Option<DataPayload> {
        self.last_payload.lock().clone()
    }

    pub fn set_auto_disable(&self, enabled: bool) {
        self.session.lock().auto_disable = enabled;
    }

    fn deliver_data(&self) {
        let payload = {
            let mut session = self.session.lock();
            if !(session.enabled && session.data_event_enabled) {
                return;
            }
            let Some(payload) = self.queued_data.lock().pop_front() else {
                return;
            };
            session.data_event_enabled = false;
            if session.auto_disable {
                session.enabled = false;
            }
            payload
        };
        *self.last_payload.lock() = Some(payload);
        self.emit_data(0);
    }

    pub fn set_data_event_enabled(&self, enabled: bool) -> DriverResult<()> {
        self.enter(MockOp::DataEventEnabled)?;
        self.session.lock().data_event_enabled = enabled;
        self.deliver_data();
        Ok(())
    }

    fn listeners(&self) -> Vec<Arc<dyn DriverListener>> {
        self.listeners.lock().clone()
    }

    pub fn emit_data(&self, status: i32) {
        for listener in self.listeners() {
            listener.on_data(DataEvent { status });
        }
    }

    pub fn emit_error(&self, code: ErrorCode, extended: i32) {
        for listener in self.listeners() {
            listener.on_error(ErrorEvent::new(code, extended));
        }
    }

    pub fn emit_status(&self, status: i32) {
        if status == power::SUE_POWER_ONLINE {
            self.session.lock().power = PowerState::Online;
        } else if power::is_failure(status) {
            self.session.lock().power = PowerState::from_i32(status);
        }
        for listener in self.listeners() {
            listener.on_status(StatusEvent { status });
        }
    }

    pub fn emit_output_complete(&self, output_id: i32) {
        for listener in self.listeners() {
            listener.on_output_complete(OutputCompleteEvent { output_id });
        }
    }

    pub fn open(&self, logical_name: &str) -> DriverResult<()> {
        self.enter(MockOp::Open)?;
        let mut session = self.session.lock();
        if session.control != ControlState::Closed {
            return Err(DriverError::new(ErrorCode::Illegal, "control is already open"));
        }
        session.control = ControlState::Idle;
        session.opened_name = Some(logical_name.to_string());
        Ok(())
    }

    pub fn close(&self) -> DriverResult<()> {
        self.enter(MockOp::Close)?;
        let mut session = self.session.lock();
        session.control = ControlState::Closed;
        session.claimed = false;
        session.enabled = false;
        session.data_event_enabled = false;
        session.opened_name = None;
        Ok(())
    }

    pub fn claim(&self) -> DriverResult<()> {
        self.enter(MockOp::Claim)?;
        let mut session = self.session.lock();
        if session.control == ControlState::Closed {
            return Err(DriverError::new(ErrorCode::Closed, "control is closed"));
        }
        if session.attached.is_none() || session.attached != session.opened_name {
            return Err(DriverError::new(ErrorCode::NoHardware, "no hardware attached"));
        }
        session.claimed = true;
        Ok(())
    }

    pub fn release(&self) -> DriverResult<()> {
        self.enter(MockOp::Release)?;
        let mut session = self.session.lock();
        if !session.claimed {
            return Err(DriverError::new(ErrorCode::Illegal, "device is not claimed"));
        }
        session.claimed = false;
        session.enabled = false;
        Ok(())
    }

    pub fn set_device_enabled(&self, enabled: bool) -> DriverResult<()> {
        self.enter(if enabled { MockOp::Enable } else { MockOp::Disable })?;
        {
            let mut session = self.session.lock();
            if !session.claimed {
                return Err(DriverError::new(ErrorCode::NotClaimed, "device is not claimed"));
            }
            if enabled && session.attached != session.opened_name {
                return Err(DriverError::new(ErrorCode::Offline, "hardware is offline"));
            }
            session.enabled = enabled;
        }
        if enabled {
            self.deliver_data();
        }
        Ok(())
    }

    pub fn device_enabled(&self) -> DriverResult<bool> {
        Ok(self.session.lock().enabled)
    }

    pub fn state(&self) -> ControlState {
        self.session.lock().control
    }

    pub fn claimed(&self) -> bool {
        self.session.lock().claimed
    }

    pub fn power_state(&self) -> DriverResult<PowerState> {
        self.enter(MockOp::PowerState)?;
        Ok(self.session.lock().power)
    }

    pub fn physical_device_description(&self) -> DriverResult<String> {
        self.enter(MockOp::Description)?;
        Ok(self.session.lock().description.clone())
    }

    pub fn add_listener(&self, listener: Arc<dyn DriverListener>) {
        self.listeners.lock().push(listener);
    }
}

impl PowerReporting for MockDriver {
    fn power_notify_capability(&self) -> PowerReportingCapability {
        *self.capability.lock()
    }

    fn set_power_notify(&self, enabled: bool) -> DriverResult<()> {
        self.session.lock().power_notify = enabled;
        Ok(())
    }
}

/// Implement [`HardwareHandle`](crate::traits::HardwareHandle) for a mock by
/// delegating to its `driver` field.
macro_rules! delegate_hardware_handle {
    ($mock:ty) => {
        impl $crate::traits::HardwareHandle for $mock {
            fn category(&self) -> $crate::traits::DeviceCategory {
                self.driver.category()
            }

            fn open(&self, logical_name: &str) -> $crate::error::DriverResult<()> {
                self.driver.open(logical_name)
            }

            fn close(&self) -> $crate::error::DriverResult<()> {
                self.driver.close()
            }

            fn claim(&self, _timeout: std::time::Duration) -> $crate::error::DriverResult<()> {
                self.driver.claim()
            }

            fn release(&self) -> $crate::error::DriverResult<()> {
                self.driver.release()
            }

            fn set_device_enabled(&self, enabled: bool) -> $crate::error::DriverResult<()> {
                self.driver.set_device_enabled(enabled)
            }

            fn device_enabled(&self) -> $crate::error::DriverResult<bool> {
                self.driver.device_enabled()
            }

            fn state(&self) -> $crate::codes::ControlState {
                self.driver.state()
            }

            fn claimed(&self) -> bool {
                self.driver.claimed()
            }

            fn power_state(&self) -> $crate::error::DriverResult<$crate::codes::PowerState> {
                self.driver.power_state()
            }

            fn physical_device_description(&self) -> $crate::error::DriverResult<String> {
                self.driver.physical_device_description()
            }

            fn add_listener(&self, listener: std::sync::Arc<dyn $crate::traits::DriverListener>) {
                self.driver.add_listener(listener)
            }

            fn power_reporting(&self) -> Option<&dyn $crate::traits::PowerReporting> {
                Some(&self.driver)
            }
        }
    };
}

pub(crate) use delegate_hardware_handle;
