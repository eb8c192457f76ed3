//! Backing store implementations for the queue
//!
//! - `file`: one file per entry, used in production
//! - `memory`: in-process storage for transient use
//! - `test`: memory storage with synchronisation helpers for tests

pub mod file;
pub mod memory;

pub use file::{FileBackingStore, FileBackingStoreBuilder};
pub use memory::MemoryBackingStore;
pub use test::TestBackingStore;
