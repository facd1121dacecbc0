//! Integration tests for discovery, supervision and the event bridge
//!
//! These tests bind mock drivers through a JSON file registry and drive
//! callbacks from separate threads, the way a vendor driver would.

use pos_core::DeviceSettings;
use pos_hardware::bridge::EventBridge;
use pos_hardware::codes::{PowerState, power};
use pos_hardware::discovery::Discovery;
use pos_hardware::error::ErrorCode;
use pos_hardware::mock::{MockOp, MockScanner};
use pos_hardware::registry::{DeviceFilter, FileRegistry};
use pos_hardware::supervisor::{ConnectOutcome, ConnectionSupervisor};
use pos_hardware::traits::{HardwareHandle, attach_listener};
use pos_hardware::DriverEvent;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const REGISTRY: &str = r#"[
    {"category": "Scanner", "logicalName": "DS9208", "properties": {"kind": "handheld"}},
    {"category": "Scanner", "logicalName": "MG8400", "properties": {"kind": "flatbed"}},
    {"category": "Scale", "logicalName": "MG8400-Scale"}
]"#;

fn registry_file() -> tempfile::NamedTempFile {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), REGISTRY).unwrap();
    file
}

/// Filter picks the flatbed entry even though the handheld is listed first
#[test]
fn test_filtered_discovery_from_file_registry() {
    let file = registry_file();
    let registry = Arc::new(FileRegistry::new(file.path()));
    let scanner = MockScanner::new("MG8400");

    let supervisor = ConnectionSupervisor::new(
        scanner.clone(),
        Discovery::new(registry, DeviceSettings::fast()),
        Some(DeviceFilter::new("kind", "flatbed")),
    );

    assert_eq!(supervisor.connect(), ConnectOutcome::Connected);
    assert_eq!(scanner.driver().calls(MockOp::Open), 1);
    assert_eq!(scanner.driver().opened_name().as_deref(), Some("MG8400"));
}

/// An empty registry file is reloaded until entries appear
#[test]
fn test_registry_written_late_is_picked_up() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), "[]").unwrap();

    let registry = Arc::new(FileRegistry::new(file.path()));
    let settings = DeviceSettings {
        registry_reload_attempts: 50,
        registry_reload_pause_ms: 10,
        ..DeviceSettings::fast()
    };
    let scanner = MockScanner::new("DS9208");
    let supervisor = ConnectionSupervisor::new(scanner, Discovery::new(registry, settings), None);

    let path = file.path().to_path_buf();
    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        std::fs::write(path, REGISTRY).unwrap();
    });

    assert_eq!(supervisor.connect(), ConnectOutcome::Connected);
    writer.join().unwrap();
}

/// Power loss reported through a callback wakes a waiter and drops the session
#[test]
fn test_power_loss_callback_wakes_waiter() {
    let file = registry_file();
    let registry = Arc::new(FileRegistry::new(file.path()));
    let scanner = MockScanner::new("DS9208");
    let supervisor = ConnectionSupervisor::new(
        scanner.clone(),
        Discovery::new(registry, DeviceSettings::fast()),
        None,
    );
    supervisor.connect();

    let bridge = Arc::new(EventBridge::new(power::is_failure));
    attach_listener(scanner.as_ref(), &bridge);
    bridge.start_event_listeners();

    let driver = scanner.clone();
    let callback = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        driver.driver().emit_status(power::SUE_POWER_ONLINE);
        driver.driver().emit_status(power::SUE_POWER_OFF_OFFLINE);
    });

    let event = bridge.wait_for_event(Some(Duration::from_secs(2)));
    callback.join().unwrap();

    assert!(matches!(event, DriverEvent::StatusUpdate(status) if status.status == power::SUE_POWER_OFF_OFFLINE));
    assert_eq!(scanner.power_state().unwrap(), PowerState::OffOffline);
    assert!(!supervisor.is_connected());
}

/// Listener registration is weak: dropping the bridge stops delivery
#[test]
fn test_dropped_listener_is_not_called() {
    let scanner = MockScanner::new("DS9208");
    let bridge = Arc::new(EventBridge::new(power::is_failure));
    attach_listener(scanner.as_ref(), &bridge);
    drop(bridge);

    scanner.driver().emit_error(ErrorCode::Offline, 0);
}
