use serde::{Deserialize, Serialize};

use crate::{
    account::{AccountEntry, Credentials, GateConfig, MailAccount, SecurityMode},
    error::ConfigError,
};

const fn default_pop_port() -> u16 {
    995
}

const fn default_pop_ssl() -> bool {
    true
}

const fn default_pop_check_delay() -> u64 {
    60
}

/// One `[accounts."<sender>"]` table as written in the configuration file
///
/// This is the unvalidated form; [`AccountConfig::into_entry`] checks the
/// field requirements and resolves the port default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountConfig {
    /// Name of another account whose settings are used instead of these
    #[serde(default, rename = "use")]
    pub alias: Option<String>,

    #[serde(default)]
    pub smtp_host: Option<String>,
    /// 0 means derive from the security mode
    #[serde(default)]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_security: SecurityMode,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default)]
    pub local_hostname: Option<String>,
    #[serde(default)]
    pub return_path: Option<String>,
    #[serde(default)]
    pub reply_to: Option<String>,

    #[serde(default)]
    pub pop_before_smtp: bool,
    #[serde(default)]
    pub pop_host: Option<String>,
    #[serde(default = "default_pop_port")]
    pub pop_port: u16,
    #[serde(default = "default_pop_ssl")]
    pub pop_ssl: bool,
    #[serde(default)]
    pub pop_username: Option<String>,
    #[serde(default)]
    pub pop_password: Option<String>,
    #[serde(default = "default_pop_check_delay")]
    pub pop_check_delay_secs: u64,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            alias: None,
            smtp_host: None,
            smtp_port: 0,
            smtp_security: SecurityMode::default(),
            smtp_username: None,
            smtp_password: None,
            local_hostname: None,
            return_path: None,
            reply_to: None,
            pop_before_smtp: false,
            pop_host: None,
            pop_port: default_pop_port(),
            pop_ssl: default_pop_ssl(),
            pop_username: None,
            pop_password: None,
            pop_check_delay_secs: default_pop_check_delay(),
        }
    }
}

/// Treat empty strings the same as absent values
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn require(
    value: Option<String>,
    section: &str,
    field: &'static str,
) -> Result<String, ConfigError> {
    present(value).ok_or_else(|| ConfigError::MissingField {
        section: section.to_string(),
        field,
    })
}

impl AccountConfig {
    /// Validate this table and turn it into a directory entry
    ///
    /// # Errors
    /// If a field required by the account's mode is missing
    pub fn into_entry(self, section: &str) -> Result<AccountEntry, ConfigError> {
        if let Some(target) = present(self.alias) {
            return Ok(AccountEntry::Alias(target));
        }

        let host = require(self.smtp_host, section, "smtp_host")?;

        let port = if self.smtp_port == 0 {
            self.smtp_security.default_port()
        } else {
            self.smtp_port
        };

        let credentials = match present(self.smtp_username) {
            Some(username) => Some(Credentials {
                username,
                password: require(self.smtp_password, section, "smtp_password")?,
            }),
            None => None,
        };

        let gate = if self.pop_before_smtp {
            Some(GateConfig {
                host: require(self.pop_host, section, "pop_host")?,
                port: self.pop_port,
                use_tls: self.pop_ssl,
                credentials: Credentials {
                    username: require(self.pop_username, section, "pop_username")?,
                    password: require(self.pop_password, section, "pop_password")?,
                },
                recheck_interval: std::time::Duration::from_secs(self.pop_check_delay_secs),
            })
        } else {
            None
        };

        Ok(AccountEntry::Account(std::sync::Arc::new(MailAccount {
            host,
            port,
            security: self.smtp_security,
            credentials,
            local_hostname: present(self.local_hostname),
            return_path: present(self.return_path),
            reply_to: present(self.reply_to),
            gate,
        })))
    }
}
