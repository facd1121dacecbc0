//! Discovery: bind a handle to the first registry candidate that answers.

use crate::codes::ControlState;
use crate::registry::{DeviceFilter, DeviceRegistry, LogicalDeviceConfig};
use crate::traits::HardwareHandle;
use pos_core::DeviceSettings;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Probes registry candidates for a handle's category.
///
/// Each candidate is tried with `open → claim → enable(true) → enable(false)`.
/// The first candidate for which all four steps succeed is returned and the
/// handle is left open and claimed on it. Failures are logged, never raised.
pub struct Discovery {
    registry: Arc<dyn DeviceRegistry>,
    settings: DeviceSettings,
}

impl Discovery {
    pub fn new(registry: Arc<dyn DeviceRegistry>, settings: DeviceSettings) -> Self {
        Self { registry, settings }
    }

    /// Candidates for `category`, reloading an empty registry a bounded number of times.
    pub fn candidates(
        &self,
        category: &str,
        filter: Option<&DeviceFilter>,
    ) -> Vec<LogicalDeviceConfig> {
        self.ensure_loaded();
        self.registry
            .entries()
            .into_iter()
            .filter(|entry| entry.matches(category, filter))
            .collect()
    }

    fn ensure_loaded(&self) {
        let attempts = self.settings.registry_reload_attempts;
        for attempt in 1..=attempts {
            if self.registry.size() > 0 {
                return;
            }
            if let Err(e) = self.registry.load() {
                warn!(attempt, error = %e, "Registry load failed");
            }
            if self.registry.size() > 0 {
                return;
            }
            if attempt < attempts {
                std::thread::sleep(self.settings.registry_reload_pause());
            }
        }
        if self.registry.size() == 0 {
            warn!(attempts, "Registry still empty after reloading");
        }
    }

    /// Bind `handle` to the first candidate that passes the probe.
    pub fn bind<H>(&self, handle: &H, filter: Option<&DeviceFilter>) -> Option<LogicalDeviceConfig>
    where
        H: HardwareHandle + ?Sized,
    {
        let category = handle.category();
        let candidates = self.candidates(category.as_str(), filter);
        if candidates.is_empty() {
            debug!(category = %category, "No registry candidates");
            return None;
        }

        for candidate in candidates {
            reset_handle(handle);
            if self.probe(handle, &candidate) {
                info!(
                    category = %category,
                    logical_name = %candidate.logical_name,
                    "Device bound"
                );
                return Some(candidate);
            }
        }
        None
    }

    fn probe<H>(&self, handle: &H, candidate: &LogicalDeviceConfig) -> bool
    where
        H: HardwareHandle + ?Sized,
    {
        let name = candidate.logical_name.as_str();
        let result = handle
            .open(name)
            .and_then(|_| handle.claim(self.settings.claim_timeout()))
            .and_then(|_| handle.set_device_enabled(true))
            .and_then(|_| handle.set_device_enabled(false));

        match result {
            Ok(()) => true,
            Err(e) => {
                debug!(logical_name = %name, error = %e, "Candidate did not answer");
                false
            }
        }
    }
}

/// Clear whatever session state a previous candidate left on the handle.
///
/// Only steps that apply are attempted; each failure is logged and ignored.
pub fn reset_handle<H>(handle: &H)
where
    H: HardwareHandle + ?Sized,
{
    if matches!(handle.device_enabled(), Ok(true))
        && let Err(e) = handle.set_device_enabled(false)
    {
        debug!(error = %e, "Disable during reset failed");
    }
    if handle.claimed()
        && let Err(e) = handle.release()
    {
        debug!(error = %e, "Release during reset failed");
    }
    if handle.state() != ControlState::Closed
        && let Err(e) = handle.close()
    {
        debug!(error = %e, "Close during reset failed");
    }
}
