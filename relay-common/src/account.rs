use std::{collections::HashMap, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    config::AccountConfig,
    error::{AccountError, ConfigError},
};

/// How the connection to the upstream server is secured
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityMode {
    /// Plain text for the whole session
    #[default]
    None,
    /// Plain connect followed by an explicit `STARTTLS` upgrade
    Tls,
    /// Encrypted from the first byte
    Ssl,
}

impl SecurityMode {
    /// The port used when none is configured
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::Tls => 25,
            Self::Ssl => 465,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The authentication gate: a mailbox server that has to accept a login
/// before the upstream server will relay for us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub credentials: Credentials,
    /// Minimum time between two gate handshakes
    pub recheck_interval: Duration,
}

/// A terminal routing profile for one sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAccount {
    pub host: String,
    /// Always resolved; never 0
    pub port: u16,
    pub security: SecurityMode,
    pub credentials: Option<Credentials>,
    /// Identity announced in `EHLO`
    pub local_hostname: Option<String>,
    pub return_path: Option<String>,
    pub reply_to: Option<String>,
    /// Present iff gating is enabled for this account
    pub gate: Option<GateConfig>,
}

impl MailAccount {
    pub fn new(host: impl Into<String>, security: SecurityMode) -> Self {
        Self {
            host: host.into(),
            port: security.default_port(),
            security,
            credentials: None,
            local_hostname: None,
            return_path: None,
            reply_to: None,
            gate: None,
        }
    }

    #[inline]
    pub const fn gating_enabled(&self) -> bool {
        self.gate.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountEntry {
    /// Use the named account instead
    Alias(String),
    Account(Arc<MailAccount>),
}

/// Read-only mapping from sender address to routing profile
///
/// Built once at startup and shared between intake and the dispatcher.
#[derive(Debug, Default, Clone)]
pub struct AccountDirectory {
    entries: HashMap<String, AccountEntry>,
}

impl AccountDirectory {
    /// Validate every configured account and build the directory
    ///
    /// # Errors
    /// If any account fails validation
    pub fn from_config(accounts: HashMap<String, AccountConfig>) -> Result<Self, ConfigError> {
        let entries = accounts
            .into_iter()
            .map(|(name, config)| config.into_entry(&name).map(|entry| (name, entry)))
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(Self { entries })
    }

    #[must_use]
    pub fn with_account(mut self, name: impl Into<String>, account: MailAccount) -> Self {
        self.entries
            .insert(name.into(), AccountEntry::Account(Arc::new(account)));
        self
    }

    #[must_use]
    pub fn with_alias(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.entries
            .insert(name.into(), AccountEntry::Alias(target.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a sender address to its routing profile
    ///
    /// Lookup is exact. An alias is followed exactly once; an alias whose
    /// target is itself an alias is not chased further.
    ///
    /// # Errors
    /// [`AccountError::UnknownAccount`] if the sender has no entry,
    /// [`AccountError::UnknownAlias`] if the alias target does not exist and
    /// [`AccountError::NestedAlias`] if the target is another alias.
    pub fn resolve(&self, sender: &str) -> Result<Arc<MailAccount>, AccountError> {
        match self.entries.get(sender) {
            None => Err(AccountError::UnknownAccount(sender.to_string())),
            Some(AccountEntry::Account(account)) => Ok(Arc::clone(account)),
            Some(AccountEntry::Alias(target)) => match self.entries.get(target) {
                Some(AccountEntry::Account(account)) => Ok(Arc::clone(account)),
                Some(AccountEntry::Alias(_)) => Err(AccountError::NestedAlias {
                    sender: sender.to_string(),
                    target: target.clone(),
                }),
                None => Err(AccountError::UnknownAlias {
                    sender: sender.to_string(),
                    target: target.clone(),
                }),
            },
        }
    }
}
