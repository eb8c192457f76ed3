//! Error types for the relay-spool crate.

use std::io;

use thiserror::Error;

use crate::QueueEntryId;

/// Top-level queue store error type.
#[derive(Debug, Error)]
pub enum SpoolError {
    /// I/O operation failed (file read/write/delete).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// Entry not found in the queue.
    #[error("Queue entry not found: {0}")]
    NotFound(QueueEntryId),

    /// Queue directory validation failed.
    #[error("Queue validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The memory store is full.
    #[error("Memory queue capacity exceeded: {len}/{capacity} entries")]
    CapacityExceeded { len: usize, capacity: usize },

    /// Internal error (lock poisoning, timeouts).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Serialization and deserialization errors.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("Bincode encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Bincode decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    /// Bytes left over after decoding an entry.
    #[error("Corrupted entry: {0} trailing bytes")]
    TrailingBytes(usize),
}

/// Queue directory validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Queue path cannot contain '..' components: {0}")]
    ParentDir(String),

    #[error("Queue path must be absolute: {0}")]
    NotAbsolute(String),

    #[error("Queue path cannot be in system directory {prefix}: {path}")]
    SystemDirectory { prefix: &'static str, path: String },

    #[error("Queue path is not a directory: {0}")]
    NotDirectory(String),
}

/// Specialized `Result` type for queue operations.
pub type Result<T> = std::result::Result<T, SpoolError>;

impl<T> From<std::sync::PoisonError<T>> for SpoolError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}
