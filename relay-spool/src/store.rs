use async_trait::async_trait;
use relay_common::Mail;

use crate::types::QueueEntryId;

/// Durable holding area for mail awaiting delivery
///
/// Implementations must make `enqueue` atomic with respect to `list`: an
/// entry is either fully visible or not visible at all.
#[async_trait]
pub trait BackingStore: Send + Sync + std::fmt::Debug {
    /// Persist a mail and return the id of the new entry
    async fn enqueue(&self, mail: &Mail) -> crate::Result<QueueEntryId>;

    /// A snapshot of the entries currently queued
    ///
    /// Ids are returned oldest first, but callers must not depend on it.
    async fn list(&self) -> crate::Result<Vec<QueueEntryId>>;

    /// Read back a queued mail
    async fn load(&self, id: &QueueEntryId) -> crate::Result<Mail>;

    /// Remove an entry once it reached a terminal outcome
    async fn remove(&self, id: &QueueEntryId) -> crate::Result<()>;
}
