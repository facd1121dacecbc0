//! Daemon configuration file.
//!
//! ```toml
//! registry = "/etc/pos/registry.json"
//! descriptors = "/etc/pos/devices.json"
//!
//! [devices]
//! reconnect_interval_ms = 5000
//! claim_timeout_ms = 30000
//!
//! [simulate]
//! micr = false
//! ```
//!
//! Every key is optional.

use anyhow::{Context, Result};
use pos_core::{DeviceKind, DeviceSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// JSON device registry. The built-in simulation registry when unset.
    pub registry: Option<PathBuf>,

    /// JSON device descriptor document.
    pub descriptors: Option<PathBuf>,

    pub devices: DeviceSettings,

    pub simulate: SimulatedDevices,
}

/// Which simulated peripherals are plugged in.
///
/// A peripheral that is not simulated is still managed; it simply never
/// connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedDevices {
    pub cash_drawer: bool,
    pub printer: bool,
    pub micr: bool,
    pub scale: bool,
    pub line_display: bool,
    pub handheld_scanner: bool,
    pub flatbed_scanner: bool,
}

impl Default for SimulatedDevices {
    fn default() -> Self {
        Self {
            cash_drawer: true,
            printer: true,
            micr: true,
            scale: true,
            line_display: true,
            handheld_scanner: true,
            flatbed_scanner: true,
        }
    }
}

impl SimulatedDevices {
    pub fn is_plugged(&self, kind: DeviceKind) -> bool {
        match kind {
            DeviceKind::CashDrawer => self.cash_drawer,
            DeviceKind::Printer => self.printer,
            DeviceKind::Micr => self.micr,
            DeviceKind::Scale => self.scale,
            DeviceKind::LineDisplay => self.line_display,
            DeviceKind::HandheldScanner => self.handheld_scanner,
            DeviceKind::FlatbedScanner => self.flatbed_scanner,
        }
    }
}

impl DaemonConfig {
    /// Load `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}
