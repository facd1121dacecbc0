//! Numeric codes used by the driver layer.
//!
//! Control and power states are decoded into enums; status-update and
//! extended error codes stay as `i32` constants grouped per peripheral, since
//! drivers deliver them as raw integers in callbacks.

use pos_core::Symbology;

/// Control state of a hardware handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlState {
    Closed,
    Idle,
    Busy,
    Error,
}

impl ControlState {
    pub fn from_i32(code: i32) -> Self {
        match code {
            2 => Self::Idle,
            3 => Self::Busy,
            4 => Self::Error,
            _ => Self::Closed,
        }
    }
}

/// Power state reported by a hardware handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerState {
    Unknown,
    Online,
    Off,
    Offline,
    OffOffline,
}

impl PowerState {
    pub fn from_i32(code: i32) -> Self {
        match code {
            2001 => Self::Online,
            2002 => Self::Off,
            2003 => Self::Offline,
            2004 => Self::OffOffline,
            _ => Self::Unknown,
        }
    }
}

/// Level of power reporting a device supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerReportingCapability {
    None,
    Standard,
    Advanced,
}

/// Power status updates shared by every peripheral.
pub mod power {
    pub const SUE_POWER_ONLINE: i32 = 2001;
    pub const SUE_POWER_OFF: i32 = 2002;
    pub const SUE_POWER_OFFLINE: i32 = 2003;
    pub const SUE_POWER_OFF_OFFLINE: i32 = 2004;

    /// Power updates that mean the device can no longer be used.
    pub fn is_failure(status: i32) -> bool {
        matches!(
            status,
            SUE_POWER_OFF | SUE_POWER_OFFLINE | SUE_POWER_OFF_OFFLINE
        )
    }
}

/// Cash drawer status updates.
pub mod cash_drawer {
    pub const SUE_DRAWER_CLOSED: i32 = 0;
    pub const SUE_DRAWER_OPEN: i32 = 1;
}

/// Printer status updates and extended errors.
pub mod printer {
    pub const SUE_COVER_OPEN: i32 = 11;
    pub const SUE_COVER_OK: i32 = 12;
    pub const SUE_JRN_EMPTY: i32 = 21;
    pub const SUE_JRN_NEAREMPTY: i32 = 22;
    pub const SUE_JRN_PAPEROK: i32 = 23;
    pub const SUE_REC_EMPTY: i32 = 24;
    pub const SUE_REC_NEAREMPTY: i32 = 25;
    pub const SUE_REC_PAPEROK: i32 = 26;
    pub const SUE_SLP_EMPTY: i32 = 27;
    pub const SUE_SLP_NEAREMPTY: i32 = 28;
    pub const SUE_SLP_PAPEROK: i32 = 29;
    pub const SUE_IDLE: i32 = 1001;

    pub const EXT_COVER_OPEN: i32 = 201;
    pub const EXT_JRN_EMPTY: i32 = 202;
    pub const EXT_REC_EMPTY: i32 = 203;
    pub const EXT_SLP_EMPTY: i32 = 204;
    pub const EXT_SLP_FORM: i32 = 205;
    pub const EXT_TOOBIG: i32 = 206;
    pub const EXT_BADFORMAT: i32 = 207;

    /// Transaction control for `transaction_print`.
    pub const TP_TRANSACTION: i32 = 11;
    pub const TP_NORMAL: i32 = 12;

    /// Bitmap width meaning "as is".
    pub const BM_ASIS: i32 = -11;
    pub const BC_CENTER: i32 = -2;
    pub const BC_TEXT_BELOW: i32 = -13;
}

/// MICR extended errors.
pub mod micr {
    pub const EXT_NOCHECK: i32 = 201;
    pub const EXT_CHECK: i32 = 202;
    pub const EXT_BADDATA: i32 = 203;
    pub const EXT_NODATA: i32 = 204;
    pub const EXT_BADSIZE: i32 = 205;
    pub const EXT_JAM: i32 = 206;
    pub const EXT_CHECKDIGIT: i32 = 207;
    pub const EXT_COVEROPEN: i32 = 208;
}

/// Scale status updates and extended errors.
pub mod scale {
    pub const SUE_STABLE_WEIGHT: i32 = 11;
    pub const SUE_WEIGHT_UNSTABLE: i32 = 12;
    pub const SUE_WEIGHT_ZERO: i32 = 13;
    pub const SUE_WEIGHT_OVERWEIGHT: i32 = 14;
    pub const SUE_NOT_READY: i32 = 15;
    pub const SUE_WEIGHT_UNDER_ZERO: i32 = 16;

    pub const EXT_OVERWEIGHT: i32 = 201;
    pub const EXT_UNDER_ZERO: i32 = 202;
    pub const EXT_SAME_WEIGHT: i32 = 203;
}

/// Scanner symbology codes.
pub mod symbology {
    pub const UNKNOWN: i32 = 0;
    pub const UPCA: i32 = 101;
    pub const UPCE: i32 = 102;
    pub const EAN8: i32 = 103;
    pub const EAN13: i32 = 104;
    pub const ITF: i32 = 106;
    pub const CODABAR: i32 = 107;
    pub const CODE39: i32 = 108;
    pub const CODE93: i32 = 109;
    pub const CODE128: i32 = 110;
    pub const EAN128: i32 = 120;
    pub const GS1DATABAR: i32 = 131;
    pub const PDF417: i32 = 201;
    pub const DATAMATRIX: i32 = 203;
    pub const QRCODE: i32 = 204;
}

/// Decode a scanner symbology code.
pub fn symbology_from_code(code: i32) -> Symbology {
    use symbology::*;
    match code {
        UNKNOWN => Symbology::Unknown,
        UPCA => Symbology::UpcA,
        UPCE => Symbology::UpcE,
        EAN8 => Symbology::Ean8,
        EAN13 => Symbology::Ean13,
        ITF => Symbology::Interleaved2of5,
        CODABAR => Symbology::Codabar,
        CODE39 => Symbology::Code39,
        CODE93 => Symbology::Code93,
        CODE128 => Symbology::Code128,
        EAN128 => Symbology::Ean128,
        GS1DATABAR => Symbology::Gs1DataBar,
        PDF417 => Symbology::Pdf417,
        DATAMATRIX => Symbology::DataMatrix,
        QRCODE => Symbology::QrCode,
        other => Symbology::Other(other),
    }
}

/// Encode a symbology for printing.
pub fn symbology_to_code(symbology: Symbology) -> i32 {
    use symbology::*;
    match symbology {
        Symbology::UpcA => UPCA,
        Symbology::UpcE => UPCE,
        Symbology::Ean8 => EAN8,
        Symbology::Ean13 => EAN13,
        Symbology::Interleaved2of5 => ITF,
        Symbology::Codabar => CODABAR,
        Symbology::Code39 => CODE39,
        Symbology::Code93 => CODE93,
        Symbology::Code128 => CODE128,
        Symbology::Ean128 => EAN128,
        Symbology::Gs1DataBar => GS1DATABAR,
        Symbology::Pdf417 => PDF417,
        Symbology::DataMatrix => DATAMATRIX,
        Symbology::QrCode => QRCODE,
        Symbology::Other(code) => code,
        Symbology::Unknown => UNKNOWN,
    }
}
