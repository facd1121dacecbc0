//! Connection supervisor: one handle, one session.

use crate::codes::{ControlState, PowerReportingCapability, PowerState};
use crate::discovery::Discovery;
use crate::registry::{DeviceFilter, LogicalDeviceConfig};
use crate::traits::HardwareHandle;
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of [`ConnectionSupervisor::connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The live predicate already held; discovery was skipped.
    AlreadyConnected,
    /// Discovery bound a candidate.
    Connected,
    /// No candidate answered.
    NotConnected,
}

impl ConnectOutcome {
    /// Whether the handle is connected after the call.
    pub fn is_connected(&self) -> bool {
        !matches!(self, Self::NotConnected)
    }
}

/// Live connection predicate.
///
/// Connected iff the control is idle or busy, claimed, and powered online or
/// of unknown power. A failing power query counts as not connected.
pub fn is_connected_state<H>(handle: &H) -> bool
where
    H: HardwareHandle + ?Sized,
{
    matches!(handle.state(), ControlState::Idle | ControlState::Busy)
        && handle.claimed()
        && matches!(
            handle.power_state(),
            Ok(PowerState::Online | PowerState::Unknown)
        )
}

#[derive(Debug, Default)]
struct SessionState {
    attempts: u32,
    bound: Option<LogicalDeviceConfig>,
}

/// Owns one hardware handle and keeps a session on it.
///
/// All handle access goes through the data mutex, which is reentrant so a
/// driver that delivers a callback on the calling thread cannot deadlock.
pub struct ConnectionSupervisor<H: HardwareHandle + ?Sized> {
    handle: Arc<H>,
    discovery: Discovery,
    filter: Option<DeviceFilter>,
    data: ReentrantMutex<()>,
    session: Mutex<SessionState>,
}

impl<H: HardwareHandle + ?Sized> ConnectionSupervisor<H> {
    pub fn new(handle: Arc<H>, discovery: Discovery, filter: Option<DeviceFilter>) -> Self {
        Self {
            handle,
            discovery,
            filter,
            data: ReentrantMutex::new(()),
            session: Mutex::new(SessionState::default()),
        }
    }

    /// Connect unless already connected.
    pub fn connect(&self) -> ConnectOutcome {
        let _data = self.data.lock();
        let category = self.handle.category();

        if is_connected_state(self.handle.as_ref()) {
            self.session.lock().attempts = 0;
            return ConnectOutcome::AlreadyConnected;
        }

        match self.discovery.bind(self.handle.as_ref(), self.filter.as_ref()) {
            Some(config) => {
                {
                    let mut session = self.session.lock();
                    session.attempts = 0;
                    session.bound = Some(config);
                }
                self.enable_power_notify();
                info!(category = %category, "Connected");
                ConnectOutcome::Connected
            }
            None => {
                let attempts = {
                    let mut session = self.session.lock();
                    session.attempts = session.attempts.saturating_add(1);
                    session.bound = None;
                    session.attempts
                };
                debug!(category = %category, attempts, "Connect attempt failed");
                ConnectOutcome::NotConnected
            }
        }
    }

    fn enable_power_notify(&self) {
        let Some(power) = self.handle.power_reporting() else {
            return;
        };
        if power.power_notify_capability() == PowerReportingCapability::None {
            return;
        }
        if let Err(e) = power.set_power_notify(true) {
            warn!(category = %self.handle.category(), error = %e, "Enabling power notify failed");
        }
    }

    /// Release and close the handle. Best effort; failures are logged.
    pub fn disconnect(&self) {
        let _data = self.data.lock();
        let category = self.handle.category();

        if let Err(e) = self.handle.release() {
            warn!(category = %category, error = %e, "Release failed");
        }
        if let Err(e) = self.handle.close() {
            warn!(category = %category, error = %e, "Close failed");
        }
        self.session.lock().bound = None;
        debug!(category = %category, "Disconnected");
    }

    /// Close the handle immediately, outside the normal disconnect path.
    pub fn close_now(&self) {
        let _data = self.data.lock();
        if let Err(e) = self.handle.close() {
            warn!(category = %self.handle.category(), error = %e, "Close after hardware loss failed");
        }
    }

    /// Evaluate the live predicate.
    pub fn is_connected(&self) -> bool {
        let _data = self.data.lock();
        is_connected_state(self.handle.as_ref())
    }

    /// Run `f` with the handle while holding the data mutex.
    pub fn with_handle<R>(&self, f: impl FnOnce(&H) -> R) -> R {
        let _data = self.data.lock();
        f(self.handle.as_ref())
    }

    /// The handle, for listener registration.
    pub fn handle(&self) -> &Arc<H> {
        &self.handle
    }

    /// Consecutive failed connect attempts.
    pub fn attempts(&self) -> u32 {
        self.session.lock().attempts
    }

    /// Configuration bound by the last successful discovery.
    pub fn bound_config(&self) -> Option<LogicalDeviceConfig> {
        self.session.lock().bound.clone()
    }
}
