//! Error types raised by the hardware driver layer.
//!
//! Drivers report failures as a numeric result code plus an optional
//! device-specific extended code. [`DriverError`] carries both so the
//! per-peripheral mapping tables can classify them exactly.

use std::fmt;

/// Result type alias for driver calls.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Driver result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Control is closed.
    Closed,
    /// Device is claimed by another control.
    Claimed,
    /// Operation requires a claim.
    NotClaimed,
    /// No service could be loaded for the logical name.
    NoService,
    /// Device is disabled.
    Disabled,
    /// Illegal parameter or call sequence.
    Illegal,
    /// Physical device is not connected.
    NoHardware,
    /// Physical device is powered off or offline.
    Offline,
    /// Named entity does not exist.
    NoExist,
    /// Named entity already exists.
    Exists,
    /// Device cannot perform the operation.
    Failure,
    /// Operation timed out.
    Timeout,
    /// Device is busy with another request.
    Busy,
    /// Device-specific condition; see the extended code.
    Extended,
    /// Code outside the known set.
    Other(i32),
}

impl ErrorCode {
    /// Numeric driver code.
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Closed => 101,
            Self::Claimed => 102,
            Self::NotClaimed => 103,
            Self::NoService => 104,
            Self::Disabled => 105,
            Self::Illegal => 106,
            Self::NoHardware => 107,
            Self::Offline => 108,
            Self::NoExist => 109,
            Self::Exists => 110,
            Self::Failure => 111,
            Self::Timeout => 112,
            Self::Busy => 113,
            Self::Extended => 114,
            Self::Other(code) => *code,
        }
    }

    /// Decode a numeric driver code.
    pub fn from_i32(code: i32) -> Self {
        match code {
            101 => Self::Closed,
            102 => Self::Claimed,
            103 => Self::NotClaimed,
            104 => Self::NoService,
            105 => Self::Disabled,
            106 => Self::Illegal,
            107 => Self::NoHardware,
            108 => Self::Offline,
            109 => Self::NoExist,
            110 => Self::Exists,
            111 => Self::Failure,
            112 => Self::Timeout,
            113 => Self::Busy,
            114 => Self::Extended,
            other => Self::Other(other),
        }
    }

    /// Codes that mean the physical device is gone and the handle must be closed.
    pub fn is_hardware_loss(&self) -> bool {
        matches!(self, Self::Offline | Self::NoHardware)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(code) => write!(f, "code {}", code),
            known => write!(f, "{:?} ({})", known, known.as_i32()),
        }
    }
}

/// Error raised by a driver call or delivered through an error callback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("driver error {code}, extended {extended}: {message}")]
pub struct DriverError {
    /// Driver result code.
    pub code: ErrorCode,

    /// Device-specific extended code, meaningful when `code` is `Extended`.
    pub extended: i32,

    /// Driver-supplied description.
    pub message: String,
}

impl DriverError {
    /// Create a new driver error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            extended: 0,
            message: message.into(),
        }
    }

    /// Create a new extended driver error.
    pub fn extended(extended: i32, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Extended,
            extended,
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, message)
    }

    /// Whether this is an extended error with the given extended code.
    pub fn is_extended(&self, extended: i32) -> bool {
        self.code == ErrorCode::Extended && self.extended == extended
    }

    /// Whether the driver reported a timeout.
    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::Timeout
    }
}
