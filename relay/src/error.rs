use relay_common::{AccountError, MailError};
use relay_spool::SpoolError;
use thiserror::Error;

/// Why the processing chain stopped a mail
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// A plugin declined the mail
    #[error("Plugin {plugin} cancelled processing")]
    Veto { plugin: &'static str },

    /// A plugin failed or panicked
    #[error("Plugin {plugin} failed: {reason}")]
    Fault { plugin: &'static str, reason: String },
}

/// Reasons a submitted mail was dropped before reaching the queue
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error("Saving mail failed: {0}")]
    Persist(#[from] SpoolError),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error("Processing chain task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
