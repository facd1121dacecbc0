//! Default timings and limits for peripheral supervision.
//!
//! These values were tuned against real hardware and have no common formula.
//! Each one is the default of a field in [`DeviceSettings`](crate::DeviceSettings),
//! so deployments can override them without code changes.

// ============================================================================
// Connection
// ============================================================================

/// Timeout handed to the driver's claim call during discovery.
pub const DEFAULT_CLAIM_TIMEOUT_MS: u64 = 30_000;

/// Registry reload attempts when it lists no entries.
pub const DEFAULT_REGISTRY_RELOAD_ATTEMPTS: u32 = 5;

/// Pause between registry reload attempts.
pub const DEFAULT_REGISTRY_RELOAD_PAUSE_MS: u64 = 1_000;

/// Interval of the background reconnect task.
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 5_000;

// ============================================================================
// Operation locks
// ============================================================================

/// Lock timeout used by `connect()` and `reconnect_device()`.
pub const DEFAULT_CONNECT_LOCK_TIMEOUT_MS: u64 = 10_000;

/// Lock timeout for printer operations.
pub const DEFAULT_PRINTER_LOCK_TIMEOUT_MS: u64 = 1_000;

/// Lock timeout for every other peripheral operation.
pub const DEFAULT_OPERATION_LOCK_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// Protocol timings
// ============================================================================

/// Poll interval while waiting for an opened cash drawer to close.
pub const DEFAULT_DRAWER_POLL_INTERVAL_MS: u64 = 500;

/// Time to wait for the printer's output-complete event.
pub const DEFAULT_PRINT_COMPLETE_TIMEOUT_MS: u64 = 30_000;

/// Driver timeout for a single begin-insertion attempt (MICR and slip).
pub const DEFAULT_INSERTION_POLL_TIMEOUT_MS: u64 = 1_000;

/// Time to wait for MICR data after the check is inserted.
pub const DEFAULT_CHECK_READ_TIMEOUT_MS: u64 = 30_000;

/// Driver timeout for a single scale read attempt.
pub const DEFAULT_SCALE_READ_ATTEMPT_MS: u64 = 1_000;

/// Overall deadline for a stable weight read.
pub const DEFAULT_STABLE_WEIGHT_TIMEOUT_MS: u64 = 10_000;

/// Time to wait for a scanner label.
pub const DEFAULT_SCAN_TIMEOUT_MS: u64 = 60_000;

// ============================================================================
// Line display
// ============================================================================

/// Default character columns per line display row.
pub const LINE_DISPLAY_COLUMNS: usize = 20;

/// Rows on the line display.
pub const LINE_DISPLAY_ROWS: usize = 2;

// ============================================================================
// Notifications
// ============================================================================

/// Capacity of the live weight broadcast channel.
pub const LIVE_WEIGHT_CHANNEL_CAPACITY: usize = 64;
