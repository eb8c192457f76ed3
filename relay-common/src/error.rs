//! Error types shared across the relay crates.

use thiserror::Error;

/// Failures resolving a sender to its routing profile
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountError {
    /// No account is configured for the sender address
    #[error("No account data found for {0}")]
    UnknownAccount(String),

    /// The sender's account names an alias target that does not exist
    #[error("No account data found for referenced configuration {target} (sender {sender})")]
    UnknownAlias { sender: String, target: String },

    /// The alias target is itself an alias; only one hop is followed
    #[error("Referenced configuration {target} for {sender} is itself an alias")]
    NestedAlias { sender: String, target: String },
}

/// Errors raised while validating configuration at load time
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required field is missing for the named section
    #[error("Wrong configuration for {section}: {field} is missing")]
    MissingField {
        section: String,
        field: &'static str,
    },

    /// A field carries a value outside its accepted set
    #[error("Invalid configuration for {section}: {field}: {reason}")]
    InvalidValue {
        section: String,
        field: &'static str,
        reason: String,
    },

    /// The configuration file could not be found or read
    #[error("Unable to read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for the expected shape
    #[error("Unable to parse configuration file {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// Errors raised by operations on a [`crate::Mail`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MailError {
    #[error("Mail has no recipients")]
    NoRecipients,

    #[error("Mail has no sender")]
    NoSender,

    #[error("Unable to parse mail: {0}")]
    Parse(String),
}
