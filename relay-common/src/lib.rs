pub mod account;
pub mod config;
pub mod error;
pub mod log_file;
pub mod logging;
pub mod mail;
pub mod traits;

pub use tracing;

pub use account::{AccountDirectory, AccountEntry, Credentials, GateConfig, MailAccount, SecurityMode};
pub use error::{AccountError, ConfigError, MailError};
pub use mail::Mail;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
    Finalised,
}
