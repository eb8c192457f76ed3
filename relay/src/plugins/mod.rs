//! Processing-chain plugins.
//!
//! A plugin inspects each accepted mail before it is queued. It may rewrite
//! the envelope through a [`MailCallback`] and decides whether processing
//! continues (`Ok(true)`) or the mail is dropped (`Ok(false)`). An `Err` or a
//! panic is a fault and drops the mail too.

use std::fmt::Debug;

use mailparse::ParsedMail;
use relay_common::Mail;
use serde::Deserialize;
use tracing::Span;

pub mod fix_address;
pub mod reject;
pub mod save_attachment;

pub use fix_address::FixAddress;
pub use reject::Reject;
pub use save_attachment::SaveAttachment;

/// Envelope rewrites available to a plugin
pub trait MailCallback {
    /// Replace the recipient list with `recipient` and rewrite the `To` header
    fn set_recipient(&mut self, recipient: &str);

    /// Replace the sender and rewrite the `From` header
    fn set_sender(&mut self, sender: &str);
}

pub trait Plugin: Send + Sync + Debug {
    /// Registration name, used in logs and chain errors
    fn name(&self) -> &'static str;

    /// Asked once at load time; disabled plugins are never registered
    fn is_enabled(&self) -> bool;

    /// Hand the plugin the span it should log under
    fn bind(&mut self, span: Span);

    /// Inspect one mail
    ///
    /// Called on the blocking thread pool, so synchronous I/O is fine here.
    ///
    /// # Errors
    /// Any error is treated as a fault and the mail is discarded
    fn handle(
        &self,
        parsed: &ParsedMail<'_>,
        mail: &Mail,
        callback: &mut dyn MailCallback,
    ) -> anyhow::Result<bool>;
}

const fn enabled() -> bool {
    true
}

/// One `[[plugin]]` entry of the configuration file
///
/// Entries run in the order they are listed.
///
/// ```toml
/// [[plugin]]
/// type = "FixAddress"
/// match_recipient = "<name@some.address.com>"
/// new_recipient = "<other.name@new.address.com>"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum PluginConfig {
    FixAddress {
        #[serde(default = "enabled")]
        enabled: bool,
        match_recipient: String,
        new_recipient: String,
    },
    SaveAttachment {
        #[serde(default = "enabled")]
        enabled: bool,
        directory: std::path::PathBuf,
        #[serde(default = "save_attachment::default_subject_prefix")]
        subject_prefix: String,
        #[serde(default = "save_attachment::default_filename")]
        default_filename: String,
    },
    Reject {
        #[serde(default = "enabled")]
        enabled: bool,
        senders: Vec<String>,
    },
}

impl PluginConfig {
    #[must_use]
    pub fn into_plugin(self) -> Box<dyn Plugin> {
        match self {
            Self::FixAddress {
                enabled,
                match_recipient,
                new_recipient,
            } => Box::new(FixAddress::new(match_recipient, new_recipient).enabled(enabled)),
            Self::SaveAttachment {
                enabled,
                directory,
                subject_prefix,
                default_filename,
            } => Box::new(
                SaveAttachment::new(directory)
                    .with_subject_prefix(subject_prefix)
                    .with_default_filename(default_filename)
                    .enabled(enabled),
            ),
            Self::Reject { enabled, senders } => Box::new(Reject::new(senders).enabled(enabled)),
        }
    }
}
