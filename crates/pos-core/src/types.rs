//! Domain types shared by devices, managers and the availability aggregator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of point-of-sale peripheral.
///
/// The display form doubles as the device category name used by the static
/// device descriptor and in health records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Cash drawer.
    #[serde(rename = "cashdrawer")]
    CashDrawer,

    /// Receipt and slip printer.
    Printer,

    /// MICR check reader.
    Micr,

    /// Weighing scale.
    Scale,

    /// Two-line customer display.
    #[serde(rename = "linedisplay")]
    LineDisplay,

    /// Handheld barcode scanner.
    #[serde(rename = "handscanner")]
    HandheldScanner,

    /// Flatbed (in-counter) barcode scanner.
    #[serde(rename = "flatbedscanner")]
    FlatbedScanner,
}

impl DeviceKind {
    /// Every peripheral kind, in reporting order.
    pub const ALL: [DeviceKind; 7] = [
        Self::CashDrawer,
        Self::Printer,
        Self::Micr,
        Self::Scale,
        Self::LineDisplay,
        Self::HandheldScanner,
        Self::FlatbedScanner,
    ];

    /// Category name used in descriptors and health records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CashDrawer => "cashdrawer",
            Self::Printer => "printer",
            Self::Micr => "micr",
            Self::Scale => "scale",
            Self::LineDisplay => "linedisplay",
            Self::HandheldScanner => "handscanner",
            Self::FlatbedScanner => "flatbedscanner",
        }
    }

    /// Parse a category name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health of a single peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    /// Connected, claimed and powered.
    Ready,

    /// Anything else.
    NotReady,
}

impl HealthStatus {
    /// Map a live connection predicate to a status.
    pub fn from_connected(connected: bool) -> Self {
        if connected { Self::Ready } else { Self::NotReady }
    }

    /// Whether the status is [`HealthStatus::Ready`].
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Health snapshot for one peripheral.
///
/// Written by `health()` and served from cache by `status()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    /// Device name the record describes.
    pub device_name: String,

    /// Health at the time of the read.
    pub status: HealthStatus,
}

impl HealthRecord {
    /// Create a new health record.
    pub fn new(device_name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            device_name: device_name.into(),
            status,
        }
    }

    /// Record for a kind, named by its category.
    pub fn for_kind(kind: DeviceKind, status: HealthStatus) -> Self {
        Self::new(kind.as_str(), status)
    }
}

/// Barcode symbologies reported by scanners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbology {
    UpcA,
    UpcE,
    Ean8,
    Ean13,
    Ean128,
    Code39,
    Code93,
    Code128,
    Interleaved2of5,
    Codabar,
    Pdf417,
    QrCode,
    DataMatrix,
    Gs1DataBar,
    /// Symbology the scanner reported but we do not name.
    Other(i32),
    /// Scanner did not report a symbology.
    Unknown,
}

/// A decoded barcode scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Barcode {
    /// Decoded label text.
    pub data: String,

    /// Symbology of the label.
    pub symbology: Symbology,
}

impl Barcode {
    /// Create a new barcode.
    pub fn new(data: impl Into<String>, symbology: Symbology) -> Self {
        Self {
            data: data.into(),
            symbology,
        }
    }
}

/// Fields parsed from the MICR line of a check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckData {
    /// Raw MICR line as read.
    pub raw_data: String,

    /// Account number.
    pub account_number: String,

    /// Bank number (routing prefix).
    pub bank_number: String,

    /// Transit (routing) number.
    pub transit_number: String,

    /// Check serial number.
    pub serial_number: String,

    /// Encoded amount, if present.
    pub amount: String,

    /// Extended processing code.
    pub epc: String,

    /// Personal / business / unknown.
    pub check_type: i32,

    /// Country of the check format.
    pub country_code: i32,
}

/// Display sentinel for readings that are not a weight.
pub const NO_WEIGHT_DISPLAY: &str = "-.--";

/// One scale reading, as published to callers and live-weight subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightReading {
    /// Raw weight in thousandths of the weight unit, when the reading is valid.
    pub raw: Option<i32>,

    /// Formatted weight, or [`NO_WEIGHT_DISPLAY`].
    pub display: String,

    /// Why the reading is not a weight.
    pub error: Option<crate::WeightError>,

    /// When the reading was taken.
    pub timestamp: DateTime<Utc>,
}

impl WeightReading {
    /// Reading for a settled raw weight.
    pub fn from_raw(raw: i32) -> Self {
        Self {
            raw: Some(raw),
            display: format_weight(raw),
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Reading for a scale condition that has no weight.
    pub fn from_error(error: crate::WeightError) -> Self {
        Self {
            raw: None,
            display: NO_WEIGHT_DISPLAY.to_string(),
            error: Some(error),
            timestamp: Utc::now(),
        }
    }

    /// Whether this reading carries a weight.
    pub fn is_weight(&self) -> bool {
        self.raw.is_some()
    }
}

/// Format a raw weight (thousandths) with two decimals, rounding half up.
///
/// Negative weights have no display form and render as [`NO_WEIGHT_DISPLAY`].
pub fn format_weight(raw: i32) -> String {
    if raw < 0 {
        return NO_WEIGHT_DISPLAY.to_string();
    }
    let hundredths = (i64::from(raw) + 5) / 10;
    format!("{}.{:02}", hundredths / 100, hundredths % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_device_kind_names_round_trip() {
        for kind in DeviceKind::ALL {
            assert_eq!(DeviceKind::from_name(kind.as_str()), Some(kind));
        }
        assert_eq!(DeviceKind::from_name("SCALE"), Some(DeviceKind::Scale));
        assert_eq!(DeviceKind::from_name("keyboard"), None);
    }

    #[test]
    fn test_device_kind_serializes_as_category() {
        let json = serde_json::to_string(&DeviceKind::HandheldScanner).unwrap();
        assert_eq!(json, "\"handscanner\"");
    }

    #[test]
    fn test_health_record_serialization() {
        let record = HealthRecord::for_kind(DeviceKind::Printer, HealthStatus::NotReady);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"deviceName":"printer","status":"NOT_READY"}"#);
    }

    #[rstest]
    #[case(3000, "3.00")]
    #[case(0, "0.00")]
    #[case(1, "0.00")]
    #[case(5, "0.01")]
    #[case(12345, "12.35")]
    #[case(999, "1.00")]
    #[case(-10, "-.--")]
    fn test_format_weight(#[case] raw: i32, #[case] expected: &str) {
        assert_eq!(format_weight(raw), expected);
    }

    #[test]
    fn test_weight_reading_from_error() {
        let reading = WeightReading::from_error(crate::WeightError::Unstable);
        assert_eq!(reading.display, NO_WEIGHT_DISPLAY);
        assert!(!reading.is_weight());
    }

    #[test]
    fn test_weight_reading_error_serialization() {
        let reading = WeightReading::from_error(crate::WeightError::Overweight);
        let json = serde_json::to_string(&reading).unwrap();
        assert!(json.contains("\"error\":\"Overweight\""));

        let parsed: WeightReading = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, reading);
        assert_eq!(parsed.error, Some(crate::WeightError::Overweight));
    }
}
