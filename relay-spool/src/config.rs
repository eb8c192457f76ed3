use std::sync::Arc;

use serde::Deserialize;

use crate::{
    backends::{FileBackingStore, MemoryBackingStore},
    store::BackingStore,
};

/// The `[spool]` section of the configuration file
///
/// ```toml
/// [spool]
/// type = "File"
/// path = "/var/spool/relay"
/// ```
///
/// or, for a transient queue with an optional limit:
///
/// ```toml
/// [spool]
/// type = "Memory"
/// capacity = 1000
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum SpoolConfig {
    File(FileBackingStore),
    Memory(MemoryConfig),
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MemoryConfig {
    /// Maximum number of entries (omit for unlimited)
    #[serde(default)]
    pub capacity: Option<usize>,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self::File(FileBackingStore::default())
    }
}

impl SpoolConfig {
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::File(store) => Some(store.path()),
            Self::Memory(_) => None,
        }
    }

    /// Initialise the configured backend and hand it out as a trait object
    ///
    /// # Errors
    /// If the file backend's directory cannot be prepared
    pub fn into_backing_store(self) -> crate::Result<Arc<dyn BackingStore>> {
        match self {
            Self::File(store) => {
                store.init()?;
                Ok(Arc::new(store))
            }
            Self::Memory(MemoryConfig {
                capacity: Some(capacity),
            }) => Ok(Arc::new(MemoryBackingStore::with_capacity(capacity))),
            Self::Memory(MemoryConfig { capacity: None }) => {
                Ok(Arc::new(MemoryBackingStore::new()))
            }
        }
    }
}
