//! Classified errors surfaced by peripheral operations.
//!
//! Every operation on a peripheral either succeeds or fails with exactly one
//! [`DeviceError`]. Raw driver failures are translated into this taxonomy by
//! the per-peripheral mapping tables; connection and discovery failures never
//! reach this type because they are reported as a boolean outcome instead.

use crate::types::DeviceKind;
use serde::{Deserialize, Serialize};

/// Result type alias for peripheral operations.
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Reasons a scale reading cannot be turned into a weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
pub enum WeightError {
    /// Platter reports a negative weight.
    #[error("weight is under zero")]
    UnderZero,

    /// Load exceeds the scale capacity.
    #[error("weight exceeds scale capacity")]
    Overweight,

    /// Weight did not settle before the deadline.
    #[error("weight is unstable")]
    Unstable,

    /// Scale is warming up or otherwise unable to weigh.
    #[error("scale is not ready")]
    NotReady,
}

impl WeightError {
    /// Stable machine-readable code for this condition.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnderZero => "WEIGHT_UNDER_ZERO",
            Self::Overweight => "WEIGHT_OVERWEIGHT",
            Self::Unstable => "WEIGHT_UNSTABLE",
            Self::NotReady => "SCALE_NOT_READY",
        }
    }
}

/// Errors returned by peripheral operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// Another operation holds the peripheral.
    #[error("{device} is busy")]
    Busy { device: DeviceKind },

    /// Peripheral is not connected or dropped off mid-operation.
    #[error("{device} is offline")]
    Offline { device: DeviceKind },

    /// Cash drawer was already open when asked to open.
    #[error("cash drawer is already open")]
    AlreadyOpen,

    /// Peripheral was already disabled when asked to stop.
    #[error("{device} is already disabled")]
    AlreadyDisabled { device: DeviceKind },

    /// Content handed to the peripheral cannot be rendered.
    #[error("invalid format: {message}")]
    InvalidFormat { message: String },

    /// Operation did not complete in time or was cancelled.
    #[error("{device} timed out")]
    Timeout { device: DeviceKind },

    /// Hardware reported a failure.
    #[error("{device} hardware error: {message}")]
    Hardware { device: DeviceKind, message: String },

    /// Peripheral produced data that could not be interpreted.
    #[error("bad data from {device}: {message}")]
    BadData { device: DeviceKind, message: String },

    /// Printer station has no paper.
    #[error("printer is out of paper")]
    OutOfPaper,

    /// Printer cover is open.
    #[error("printer cover is open")]
    CoverOpen,

    /// Scale reading outside the weighable range.
    #[error("{0}")]
    Weight(#[from] WeightError),

    /// Anything the mapping tables do not classify.
    #[error("unexpected error: {message}")]
    Unexpected { message: String },
}

impl DeviceError {
    /// Create a new busy error.
    pub fn busy(device: DeviceKind) -> Self {
        Self::Busy { device }
    }

    /// Create a new offline error.
    pub fn offline(device: DeviceKind) -> Self {
        Self::Offline { device }
    }

    /// Create a new already-disabled error.
    pub fn already_disabled(device: DeviceKind) -> Self {
        Self::AlreadyDisabled { device }
    }

    /// Create a new invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(device: DeviceKind) -> Self {
        Self::Timeout { device }
    }

    /// Create a new hardware error.
    pub fn hardware(device: DeviceKind, message: impl Into<String>) -> Self {
        Self::Hardware {
            device,
            message: message.into(),
        }
    }

    /// Create a new bad data error.
    pub fn bad_data(device: DeviceKind, message: impl Into<String>) -> Self {
        Self::BadData {
            device,
            message: message.into(),
        }
    }

    /// Create an unexpected error with custom message.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    /// Stable machine-readable code, suitable for response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Busy { .. } => "DEVICE_BUSY",
            Self::Offline { .. } => "DEVICE_OFFLINE",
            Self::AlreadyOpen => "ALREADY_OPEN",
            Self::AlreadyDisabled { .. } => "ALREADY_DISABLED",
            Self::InvalidFormat { .. } => "INVALID_FORMAT",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Hardware { .. } => "HARDWARE_ERROR",
            Self::BadData { .. } => "BAD_DATA",
            Self::OutOfPaper => "OUT_OF_PAPER",
            Self::CoverOpen => "COVER_OPEN",
            Self::Weight(weight) => weight.code(),
            Self::Unexpected { .. } => "UNEXPECTED_ERROR",
        }
    }

    /// Whether the caller may retry the same request later without changes.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Busy { .. } | Self::Offline { .. } | Self::Timeout { .. }
        )
    }
}
