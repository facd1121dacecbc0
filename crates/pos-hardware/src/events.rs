//! Callback events delivered by drivers.

use crate::error::{DriverError, ErrorCode};

/// Input data is available on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataEvent {
    /// Device-specific status accompanying the data.
    pub status: i32,
}

/// The device reported an asynchronous error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    pub code: ErrorCode,
    pub extended: i32,

    /// Set for events injected locally to cancel a wait.
    pub synthetic: bool,
}

impl ErrorEvent {
    pub fn new(code: ErrorCode, extended: i32) -> Self {
        Self {
            code,
            extended,
            synthetic: false,
        }
    }

    /// Timeout injected when a wait is cancelled.
    pub fn cancelled() -> Self {
        Self {
            code: ErrorCode::Timeout,
            extended: 0,
            synthetic: true,
        }
    }

    /// The event as a driver error.
    pub fn to_driver_error(&self) -> DriverError {
        let message = if self.synthetic {
            "wait cancelled"
        } else {
            "error event"
        };
        DriverError {
            code: self.code,
            extended: self.extended,
            message: message.to_string(),
        }
    }
}

/// The device reported a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEvent {
    pub status: i32,
}

/// An asynchronous output request finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputCompleteEvent {
    pub output_id: i32,
}

/// Any driver callback, as captured by the event bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    Data(DataEvent),
    Error(ErrorEvent),
    StatusUpdate(StatusEvent),
    OutputComplete(OutputCompleteEvent),
}

impl DriverEvent {
    /// The error event, if this is one.
    pub fn as_error(&self) -> Option<&ErrorEvent> {
        match self {
            Self::Error(event) => Some(event),
            _ => None,
        }
    }

    /// Whether this is the synthetic timeout injected on cancellation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Error(event) if event.synthetic)
    }
}
