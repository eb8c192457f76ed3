//! Plugins with scripted behaviour for chain tests

use std::{sync::Arc, time::Duration};

use mailparse::ParsedMail;
use parking_lot::Mutex;
use relay::{MailCallback, Plugin};
use relay_common::Mail;
use tracing::Span;

#[derive(Debug, Clone)]
pub enum Behaviour {
    Continue,
    Veto,
    Fail(&'static str),
    Panic(&'static str),
    SetRecipient(&'static str),
    SetSender(&'static str),
    /// Sleeps the calling thread, like a plugin doing synchronous I/O
    Block(Duration),
}

/// Records the recipients it saw on each call, then acts out its behaviour
#[derive(Debug)]
pub struct Scripted {
    name: &'static str,
    behaviour: Behaviour,
    enabled: bool,
    seen: Arc<Mutex<Vec<Vec<String>>>>,
}

impl Scripted {
    pub fn new(name: &'static str, behaviour: Behaviour) -> Self {
        Self {
            name,
            behaviour,
            enabled: true,
            seen: Arc::default(),
        }
    }

    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Shared view of the recipient lists this plugin was called with
    pub fn seen(&self) -> Arc<Mutex<Vec<Vec<String>>>> {
        Arc::clone(&self.seen)
    }

    pub fn boxed(self) -> Box<dyn Plugin> {
        Box::new(self)
    }
}

impl Plugin for Scripted {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn bind(&mut self, _span: Span) {}

    fn handle(
        &self,
        _parsed: &ParsedMail<'_>,
        mail: &Mail,
        callback: &mut dyn MailCallback,
    ) -> anyhow::Result<bool> {
        self.seen.lock().push(mail.recipients().to_vec());

        match &self.behaviour {
            Behaviour::Continue => Ok(true),
            Behaviour::Veto => Ok(false),
            Behaviour::Fail(reason) => Err(anyhow::anyhow!(*reason)),
            Behaviour::Panic(reason) => panic!("{reason}"),
            Behaviour::SetRecipient(recipient) => {
                callback.set_recipient(recipient);
                Ok(true)
            }
            Behaviour::SetSender(sender) => {
                callback.set_sender(sender);
                Ok(true)
            }
            Behaviour::Block(duration) => {
                std::thread::sleep(*duration);
                Ok(true)
            }
        }
    }
}
