use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
};

use relay_common::{Mail, internal};

use crate::{
    error::ChainError,
    plugins::{MailCallback, Plugin, PluginConfig},
};

/// Rewrites requested by a plugin, applied once it returns
#[derive(Debug, Default)]
struct MailEdits {
    recipient: Option<String>,
    sender: Option<String>,
}

impl MailCallback for MailEdits {
    fn set_recipient(&mut self, recipient: &str) {
        self.recipient = Some(recipient.to_string());
    }

    fn set_sender(&mut self, sender: &str) {
        self.sender = Some(sender.to_string());
    }
}

impl MailEdits {
    fn apply(self, mail: &mut Mail) {
        if let Some(recipient) = self.recipient {
            mail.replace_header("To", &recipient);
            mail.set_recipients(vec![recipient]);
        }

        if let Some(sender) = self.sender {
            mail.replace_header("From", &sender);
            mail.set_sender(sender);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("panic"))
}

/// The registered plugins, in execution order
#[derive(Debug, Default)]
pub struct ProcessingChain {
    plugins: Vec<Box<dyn Plugin>>,
}

impl ProcessingChain {
    /// Build the chain from the configured plugin list, keeping its order
    pub fn from_config(configs: Vec<PluginConfig>) -> Self {
        configs
            .into_iter()
            .map(PluginConfig::into_plugin)
            .fold(Self::default(), Self::register)
    }

    /// Append a plugin, unless it reports itself disabled
    #[must_use]
    pub fn register(mut self, mut plugin: Box<dyn Plugin>) -> Self {
        let name = plugin.name();

        if !plugin.is_enabled() {
            internal!(level = DEBUG, "Plugin {name} is disabled");
            return self;
        }

        plugin.bind(tracing::info_span!("plugin", name));
        internal!(level = INFO, "Registered plugin {name}");
        self.plugins.push(plugin);
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|plugin| plugin.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Run every plugin over `mail`, stopping at the first one that declines
    /// or fails
    ///
    /// Each plugin sees the edits made by the ones before it.
    ///
    /// # Errors
    /// [`ChainError::Veto`] if a plugin returned `false`, [`ChainError::Fault`]
    /// if one returned an error or panicked
    pub fn run(&self, mail: &mut Mail) -> Result<(), ChainError> {
        for plugin in &self.plugins {
            let name = plugin.name();
            let mut edits = MailEdits::default();

            let outcome = {
                let current: &Mail = mail;
                let parsed = current.parse().map_err(|err| {
                    internal!(level = ERROR, "Unable to parse mail for {name}: {err}");
                    ChainError::Fault {
                        plugin: name,
                        reason: err.to_string(),
                    }
                })?;

                panic::catch_unwind(AssertUnwindSafe(|| {
                    plugin.handle(&parsed, current, &mut edits)
                }))
            };

            match outcome {
                Ok(Ok(true)) => edits.apply(mail),
                Ok(Ok(false)) => {
                    internal!(
                        level = WARN,
                        "Plugin {name} cancelled processing. Mail discarded"
                    );
                    return Err(ChainError::Veto { plugin: name });
                }
                Ok(Err(err)) => {
                    let reason = format!("{err:#}");
                    internal!(level = ERROR, "Plugin {name} failed: {reason}");
                    return Err(ChainError::Fault {
                        plugin: name,
                        reason,
                    });
                }
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    internal!(level = ERROR, "Plugin {name} panicked: {reason}");
                    return Err(ChainError::Fault {
                        plugin: name,
                        reason,
                    });
                }
            }
        }

        Ok(())
    }
}
