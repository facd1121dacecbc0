//! Device availability and error notifications.
//!
//! The aggregator is handed every manager at startup. It joins their health
//! with the static descriptors for reporting, and on each refresh pushes a
//! [`DeviceErrorSnapshot`] to subscribers when the set of unavailable
//! peripherals changed.

use crate::descriptor::{DeviceDescriptor, DeviceDescriptors};
use crate::DeviceManager;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pos_core::{DeviceKind, HealthRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Availability of one installed unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAvailability {
    pub category: DeviceKind,
    pub device_name: String,
    pub ready: bool,
    #[serde(flatten)]
    pub descriptor: Option<DeviceDescriptor>,
}

/// Peripherals that are currently not ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceErrorSnapshot {
    pub devices: Vec<DeviceKind>,
    pub timestamp: DateTime<Utc>,
}

impl DeviceErrorSnapshot {
    pub fn new(devices: Vec<DeviceKind>) -> Self {
        Self {
            devices,
            timestamp: Utc::now(),
        }
    }

    pub fn is_clear(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Fan-out of error snapshots to long-lived subscribers.
#[derive(Debug, Default)]
pub struct DeviceErrorNotifier {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<DeviceErrorSnapshot>>>,
}

impl DeviceErrorNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<DeviceErrorSnapshot> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Send `snapshot` to every subscriber, dropping the ones that hung up.
    ///
    /// Returns the number of subscribers reached.
    pub fn notify(&self, snapshot: &DeviceErrorSnapshot) -> usize {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());

        let pruned = before - subscribers.len();
        if pruned > 0 {
            debug!(pruned, "Dropped closed error subscribers");
        }
        subscribers.len()
    }
}

/// Joins live health from every manager with the static descriptors.
pub struct AvailabilityAggregator {
    managers: Vec<Arc<dyn DeviceManager>>,
    descriptors: DeviceDescriptors,
    notifier: DeviceErrorNotifier,
    last_unavailable: Mutex<Vec<DeviceKind>>,
}

impl AvailabilityAggregator {
    pub fn new(managers: Vec<Arc<dyn DeviceManager>>, descriptors: DeviceDescriptors) -> Self {
        for category in descriptors.unknown_categories() {
            warn!(category, "Descriptor category matches no peripheral");
        }
        Self {
            managers,
            descriptors,
            notifier: DeviceErrorNotifier::new(),
            last_unavailable: Mutex::new(Vec::new()),
        }
    }

    pub fn notifier(&self) -> &DeviceErrorNotifier {
        &self.notifier
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<DeviceErrorSnapshot> {
        self.notifier.subscribe()
    }

    /// One record per installed unit, from cached health.
    ///
    /// A peripheral without descriptor entries still gets one record.
    pub fn availability(&self) -> Vec<DeviceAvailability> {
        let mut records = Vec::new();
        for manager in &self.managers {
            for (kind, health) in manager.kinds().into_iter().zip(manager.status()) {
                self.expand(kind, &health, &mut records);
            }
        }
        records
    }

    /// Read fresh health from every manager and notify subscribers when the
    /// set of unavailable peripherals changed.
    ///
    /// Returns the snapshot that was broadcast, if any.
    pub fn refresh(&self) -> Option<DeviceErrorSnapshot> {
        let unavailable = self.unavailable();

        let mut last = self.last_unavailable.lock();
        if *last == unavailable {
            return None;
        }
        *last = unavailable.clone();
        drop(last);

        let snapshot = DeviceErrorSnapshot::new(unavailable);
        if snapshot.is_clear() {
            info!("All peripherals available");
        } else {
            let devices: Vec<&str> = snapshot.devices.iter().map(DeviceKind::as_str).collect();
            warn!(devices = ?devices, "Peripherals unavailable");
        }
        let reached = self.notifier.notify(&snapshot);
        debug!(reached, "Error snapshot broadcast");
        Some(snapshot)
    }

    fn unavailable(&self) -> Vec<DeviceKind> {
        let mut unavailable = Vec::new();
        for manager in &self.managers {
            for (kind, health) in manager.kinds().into_iter().zip(manager.health()) {
                if !health.status.is_ready() {
                    unavailable.push(kind);
                }
            }
        }
        unavailable
    }

    fn expand(&self, kind: DeviceKind, health: &HealthRecord, out: &mut Vec<DeviceAvailability>) {
        let ready = health.status.is_ready();
        let descriptors = self.descriptors.for_kind(kind);
        if descriptors.is_empty() {
            out.push(DeviceAvailability {
                category: kind,
                device_name: health.device_name.clone(),
                ready,
                descriptor: None,
            });
            return;
        }
        out.extend(descriptors.iter().map(|descriptor| DeviceAvailability {
            category: kind,
            device_name: health.device_name.clone(),
            ready,
            descriptor: Some(descriptor.clone()),
        }));
    }
}
