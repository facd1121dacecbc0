//! Tunable device timings.

use crate::constants::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timings and limits shared by discovery, devices and managers.
///
/// Every field has a default, so a partial configuration file only needs to
/// name what it overrides.
///
/// # Examples
///
/// ```
/// use pos_core::DeviceSettings;
/// use std::time::Duration;
///
/// let settings = DeviceSettings::default();
/// assert_eq!(settings.claim_timeout(), Duration::from_secs(30));
/// assert_eq!(settings.registry_reload_attempts, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Claim timeout during discovery probes.
    pub claim_timeout_ms: u64,

    /// How many times to reload an empty registry.
    pub registry_reload_attempts: u32,

    /// Pause between registry reloads.
    pub registry_reload_pause_ms: u64,

    /// Interval of the background connect task.
    pub reconnect_interval_ms: u64,

    /// Lock timeout for connect and reconnect.
    pub connect_lock_timeout_ms: u64,

    /// Lock timeout for printer operations.
    pub printer_lock_timeout_ms: u64,

    /// Lock timeout for other peripheral operations.
    pub operation_lock_timeout_ms: u64,

    /// Poll interval while the cash drawer is open.
    pub drawer_poll_interval_ms: u64,

    /// Wait for printer output to complete.
    pub print_complete_timeout_ms: u64,

    /// Driver timeout per insertion attempt.
    pub insertion_poll_timeout_ms: u64,

    /// Wait for MICR data.
    pub check_read_timeout_ms: u64,

    /// Driver timeout per scale read attempt.
    pub scale_read_attempt_ms: u64,

    /// Overall stable weight deadline.
    pub stable_weight_timeout_ms: u64,

    /// Wait for a scanner label.
    pub scan_timeout_ms: u64,

    /// Character columns per line display row.
    pub line_display_columns: usize,

    /// Printer models that need a direct paper near-empty query before printing.
    pub near_empty_query_models: Vec<String>,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            claim_timeout_ms: DEFAULT_CLAIM_TIMEOUT_MS,
            registry_reload_attempts: DEFAULT_REGISTRY_RELOAD_ATTEMPTS,
            registry_reload_pause_ms: DEFAULT_REGISTRY_RELOAD_PAUSE_MS,
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            connect_lock_timeout_ms: DEFAULT_CONNECT_LOCK_TIMEOUT_MS,
            printer_lock_timeout_ms: DEFAULT_PRINTER_LOCK_TIMEOUT_MS,
            operation_lock_timeout_ms: DEFAULT_OPERATION_LOCK_TIMEOUT_MS,
            drawer_poll_interval_ms: DEFAULT_DRAWER_POLL_INTERVAL_MS,
            print_complete_timeout_ms: DEFAULT_PRINT_COMPLETE_TIMEOUT_MS,
            insertion_poll_timeout_ms: DEFAULT_INSERTION_POLL_TIMEOUT_MS,
            check_read_timeout_ms: DEFAULT_CHECK_READ_TIMEOUT_MS,
            scale_read_attempt_ms: DEFAULT_SCALE_READ_ATTEMPT_MS,
            stable_weight_timeout_ms: DEFAULT_STABLE_WEIGHT_TIMEOUT_MS,
            scan_timeout_ms: DEFAULT_SCAN_TIMEOUT_MS,
            line_display_columns: LINE_DISPLAY_COLUMNS,
            near_empty_query_models: vec!["TM-H6000IV".to_string()],
        }
    }
}

impl DeviceSettings {
    pub fn claim_timeout(&self) -> Duration {
        Duration::from_millis(self.claim_timeout_ms)
    }

    pub fn registry_reload_pause(&self) -> Duration {
        Duration::from_millis(self.registry_reload_pause_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn connect_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_lock_timeout_ms)
    }

    pub fn printer_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.printer_lock_timeout_ms)
    }

    pub fn operation_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_lock_timeout_ms)
    }

    pub fn drawer_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drawer_poll_interval_ms)
    }

    pub fn print_complete_timeout(&self) -> Duration {
        Duration::from_millis(self.print_complete_timeout_ms)
    }

    pub fn insertion_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.insertion_poll_timeout_ms)
    }

    pub fn check_read_timeout(&self) -> Duration {
        Duration::from_millis(self.check_read_timeout_ms)
    }

    pub fn scale_read_attempt(&self) -> Duration {
        Duration::from_millis(self.scale_read_attempt_ms)
    }

    pub fn stable_weight_timeout(&self) -> Duration {
        Duration::from_millis(self.stable_weight_timeout_ms)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    /// Whether a printer model needs the direct near-empty query.
    pub fn needs_near_empty_query(&self, model: &str) -> bool {
        self.near_empty_query_models
            .iter()
            .any(|candidate| model.contains(candidate.as_str()))
    }

    /// Settings with every wait shortened, for tests and simulations.
    pub fn fast() -> Self {
        Self {
            claim_timeout_ms: 100,
            registry_reload_attempts: 2,
            registry_reload_pause_ms: 5,
            reconnect_interval_ms: 20,
            connect_lock_timeout_ms: 200,
            printer_lock_timeout_ms: 50,
            operation_lock_timeout_ms: 50,
            drawer_poll_interval_ms: 5,
            print_complete_timeout_ms: 500,
            insertion_poll_timeout_ms: 10,
            check_read_timeout_ms: 500,
            scale_read_attempt_ms: 10,
            stable_weight_timeout_ms: 200,
            scan_timeout_ms: 500,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let settings = DeviceSettings::default();
        assert_eq!(settings.printer_lock_timeout(), Duration::from_secs(1));
        assert_eq!(settings.connect_lock_timeout(), Duration::from_secs(10));
        assert_eq!(settings.drawer_poll_interval(), Duration::from_millis(500));
        assert_eq!(settings.registry_reload_pause(), Duration::from_secs(1));
        assert_eq!(settings.line_display_columns, 20);
    }

    #[test]
    fn test_partial_deserialization_keeps_defaults() {
        let settings: DeviceSettings =
            serde_json::from_str(r#"{"claim_timeout_ms": 5000}"#).unwrap();
        assert_eq!(settings.claim_timeout(), Duration::from_secs(5));
        assert_eq!(settings.registry_reload_attempts, 5);
    }

    #[test]
    fn test_near_empty_query_models() {
        let settings = DeviceSettings::default();
        assert!(settings.needs_near_empty_query("EPSON TM-H6000IV Receipt"));
        assert!(!settings.needs_near_empty_query("NCR 7167"));
    }
}
