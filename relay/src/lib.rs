pub mod chain;
pub mod config;
pub mod controller;
pub mod error;
pub mod intake;
pub mod plugins;

pub use chain::ProcessingChain;
pub use config::RelayConfig;
pub use controller::{Relay, bootstrap};
pub use error::{ChainError, IntakeError};
pub use intake::{IntakeContext, IntakeEvent, IntakeSession, IntakeState};
pub use plugins::{MailCallback, Plugin, PluginConfig};
