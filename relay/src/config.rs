//! The relay's TOML configuration file.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use relay_common::{ConfigError, config::AccountConfig, logging::LogConfig};
use relay_delivery::DeliveryConfig;
use relay_spool::SpoolConfig;
use serde::Deserialize;

use crate::plugins::PluginConfig;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "RELAY_CONFIG";

const SEARCH_PATHS: [&str; 2] = ["relay.toml", "/etc/relay/relay.toml"];

fn default_identity() -> String {
    String::from("Rust SMTP Relay")
}

/// The `[relay]` section
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelaySection {
    /// Name recorded in the `Received` header of every queued mail
    #[serde(default = "default_identity")]
    pub identity: String,
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            identity: default_identity(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub relay: RelaySection,

    #[serde(default)]
    pub spool: SpoolConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub logging: LogConfig,

    /// Processing-chain plugins, in execution order
    #[serde(default, rename = "plugin")]
    pub plugins: Vec<PluginConfig>,

    /// Routing profiles keyed by sender address
    #[serde(default)]
    pub accounts: HashMap<String, AccountConfig>,
}

impl RelayConfig {
    /// Find the configuration file to use
    ///
    /// An explicit path wins, then [`CONFIG_ENV`], then `./relay.toml`, then
    /// `/etc/relay/relay.toml`.
    pub fn locate(explicit: Option<PathBuf>) -> Option<PathBuf> {
        explicit
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(|| {
                SEARCH_PATHS
                    .iter()
                    .map(PathBuf::from)
                    .find(|path| path.is_file())
            })
    }

    /// # Errors
    /// If the file cannot be read or is not a valid configuration
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;

        Self::parse(&content).map_err(|reason| ConfigError::Parse {
            path: display,
            reason,
        })
    }

    /// # Errors
    /// The parser's message if `content` is not a valid configuration
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|err| err.to_string())
    }
}
