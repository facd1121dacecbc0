//! Device registry: candidate logical configurations per device category.
//!
//! The registry is owned by the driver installation. Entries are read fresh on
//! each discovery pass, and [`DeviceRegistry::load`] may be called again when
//! the registry looks empty (for example while the driver service is still
//! writing it at boot).

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Errors raised while loading a registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read registry {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse registry {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A named candidate binding from the device registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalDeviceConfig {
    /// Registry category, e.g. `POSPrinter`.
    pub category: String,

    /// Free-form properties used for filtering.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,

    /// Name passed to `open`.
    pub logical_name: String,
}

impl LogicalDeviceConfig {
    pub fn new(category: impl Into<String>, logical_name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            properties: BTreeMap::new(),
            logical_name: logical_name.into(),
        }
    }

    /// Add a filterable property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Whether this entry belongs to `category` and passes `filter`.
    pub fn matches(&self, category: &str, filter: Option<&DeviceFilter>) -> bool {
        if !self.category.eq_ignore_ascii_case(category) {
            return false;
        }
        match filter {
            Some(filter) => self.properties.get(&filter.key) == Some(&filter.value),
            None => true,
        }
    }
}

/// Property filter applied to registry entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFilter {
    pub key: String,
    pub value: String,
}

impl DeviceFilter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Source of logical device configurations.
pub trait DeviceRegistry: Send + Sync {
    /// (Re)load the registry from its backing store.
    fn load(&self) -> Result<(), RegistryError>;

    /// Number of entries currently loaded.
    fn size(&self) -> usize;

    /// Snapshot of the loaded entries, in registry order.
    fn entries(&self) -> Vec<LogicalDeviceConfig>;
}

/// Registry held in memory. `load` is a no-op.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    entries: RwLock<Vec<LogicalDeviceConfig>>,
}

impl InMemoryRegistry {
    pub fn new(entries: Vec<LogicalDeviceConfig>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Append an entry.
    pub fn insert(&self, entry: LogicalDeviceConfig) {
        self.entries.write().push(entry);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl DeviceRegistry for InMemoryRegistry {
    fn load(&self) -> Result<(), RegistryError> {
        Ok(())
    }

    fn size(&self) -> usize {
        self.entries.read().len()
    }

    fn entries(&self) -> Vec<LogicalDeviceConfig> {
        self.entries.read().clone()
    }
}

/// Registry backed by a JSON array of [`LogicalDeviceConfig`] on disk.
///
/// Nothing is read at construction; the first discovery pass finds the
/// registry empty and calls `load`.
#[derive(Debug)]
pub struct FileRegistry {
    path: PathBuf,
    entries: RwLock<Vec<LogicalDeviceConfig>>,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DeviceRegistry for FileRegistry {
    fn load(&self) -> Result<(), RegistryError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| RegistryError::Io {
            path: self.path.clone(),
            source,
        })?;
        let entries: Vec<LogicalDeviceConfig> =
            serde_json::from_str(&text).map_err(|source| RegistryError::Parse {
                path: self.path.clone(),
                source,
            })?;

        tracing::debug!(path = %self.path.display(), entries = entries.len(), "Registry loaded");
        *self.entries.write() = entries;
        Ok(())
    }

    fn size(&self) -> usize {
        self.entries.read().len()
    }

    fn entries(&self) -> Vec<LogicalDeviceConfig> {
        self.entries.read().clone()
    }
}
