//! Static device descriptors.
//!
//! A JSON document maps a device category name to the physical units
//! installed for it:
//!
//! ```json
//! {
//!   "printer": [
//!     { "vidpid": "04b8:0202", "usbport": "1-1.2", "manufacturer": "Epson",
//!       "model": "TM-T88V", "config": "receipt", "firmware": "30.01",
//!       "serialnumber": "X5K0123456" }
//!   ]
//! }
//! ```
//!
//! The document is read once and only consulted when building availability
//! records.

use pos_core::DeviceKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading a descriptor document.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// Descriptor file could not be read.
    #[error("Failed to read descriptor file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Document is not valid descriptor JSON.
    #[error("Invalid descriptor document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Attributes of one installed unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceDescriptor {
    pub vidpid: String,
    pub usbport: String,
    pub manufacturer: String,
    pub model: String,
    pub config: String,
    pub firmware: String,
    pub serialnumber: String,

    /// Scales only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibration_date: Option<String>,

    /// Scales only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibration_count: Option<u32>,
}

/// Descriptor entries keyed by lowercase category name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceDescriptors {
    categories: BTreeMap<String, Vec<DeviceDescriptor>>,
}

impl DeviceDescriptors {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, DescriptorError> {
        let raw: BTreeMap<String, Vec<DeviceDescriptor>> = serde_json::from_str(json)?;
        let mut categories: BTreeMap<String, Vec<DeviceDescriptor>> = BTreeMap::new();
        for (category, entries) in raw {
            categories
                .entry(category.to_ascii_lowercase())
                .or_default()
                .extend(entries);
        }
        Ok(Self { categories })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DescriptorError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DescriptorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Units installed for `kind`. Empty when the category is absent.
    pub fn for_kind(&self, kind: DeviceKind) -> &[DeviceDescriptor] {
        self.categories
            .get(kind.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Category names that do not correspond to any known device kind.
    pub fn unknown_categories(&self) -> Vec<&str> {
        self.categories
            .keys()
            .filter(|name| DeviceKind::from_name(name).is_none())
            .map(String::as_str)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.values().all(Vec::is_empty)
    }
}
