use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use relay_common::Mail;

use crate::{SpoolError, store::BackingStore, types::QueueEntryId};

/// In-memory backing store
///
/// Entries live in a `HashMap` behind an `RwLock`. Nothing survives a
/// restart, so this is meant for tests and transient setups. An optional
/// capacity makes `enqueue` fail once the store is full.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackingStore {
    pub(crate) entries: Arc<RwLock<HashMap<QueueEntryId, Mail>>>,
    capacity: Option<usize>,
}

impl MemoryBackingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::default(),
            capacity: Some(capacity),
        }
    }

    /// Recovers from a poisoned lock by reading through it
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

#[async_trait]
impl BackingStore for MemoryBackingStore {
    async fn enqueue(&self, mail: &Mail) -> crate::Result<QueueEntryId> {
        let id = QueueEntryId::generate();
        let mut entries = self.entries.write()?;

        if let Some(capacity) = self.capacity
            && entries.len() >= capacity
        {
            return Err(SpoolError::CapacityExceeded {
                len: entries.len(),
                capacity,
            });
        }

        entries.insert(id.clone(), mail.clone());

        Ok(id)
    }

    async fn list(&self) -> crate::Result<Vec<QueueEntryId>> {
        let mut ids: Vec<_> = self.entries.read()?.keys().cloned().collect();
        ids.sort();

        Ok(ids)
    }

    async fn load(&self, id: &QueueEntryId) -> crate::Result<Mail> {
        self.entries
            .read()?
            .get(id)
            .cloned()
            .ok_or_else(|| SpoolError::NotFound(id.clone()))
    }

    async fn remove(&self, id: &QueueEntryId) -> crate::Result<()> {
        self.entries
            .write()?
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SpoolError::NotFound(id.clone()))
    }
}
