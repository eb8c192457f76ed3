//! Intake of one submitted mail.
//!
//! The envelope arrives as discrete events driving [`IntakeState`]; the body
//! completes the session and commits the mail to the queue.

use std::sync::Arc;

use relay_common::{
    AccountDirectory, Mail, incoming, internal, traits::fsm::FiniteStateMachine,
};
use relay_spool::{BackingStore, QueueEntryId};

use crate::{chain::ProcessingChain, error::IntakeError};

/// Envelope and body events from the protocol engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeEvent {
    MailFrom(String),
    RcptTo(String),
    Data(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IntakeState {
    #[default]
    Idle,
    HaveSender,
    HaveRecipients,
    /// Terminal; further events are ignored
    Received,
}

fn strip_brackets(address: &str) -> &str {
    let trimmed = address.trim();
    trimmed
        .strip_prefix('<')
        .and_then(|a| a.strip_suffix('>'))
        .unwrap_or(trimmed)
}

impl FiniteStateMachine for IntakeState {
    type Input = IntakeEvent;
    type Context = Mail;

    fn transition(self, input: Self::Input, mail: &mut Self::Context) -> Self {
        match (self, input) {
            (Self::Received, _) => Self::Received,
            (state, IntakeEvent::MailFrom(sender)) => {
                mail.set_sender(strip_brackets(&sender));
                if state == Self::HaveRecipients {
                    Self::HaveRecipients
                } else {
                    Self::HaveSender
                }
            }
            (_, IntakeEvent::RcptTo(recipient)) => {
                mail.add_recipient(strip_brackets(&recipient));
                Self::HaveRecipients
            }
            (_, IntakeEvent::Data(body)) => {
                mail.set_data(body);
                Self::Received
            }
        }
    }
}

/// What every session shares: the chain, the routing table and the queue
#[derive(Debug)]
pub struct IntakeContext {
    identity: String,
    chain: ProcessingChain,
    accounts: Arc<AccountDirectory>,
    spool: Arc<dyn BackingStore>,
}

impl IntakeContext {
    pub fn new(
        identity: impl Into<String>,
        chain: ProcessingChain,
        accounts: Arc<AccountDirectory>,
        spool: Arc<dyn BackingStore>,
    ) -> Self {
        Self {
            identity: identity.into(),
            chain,
            accounts,
            spool,
        }
    }

    /// A fresh session for one submission
    pub fn session(self: &Arc<Self>) -> IntakeSession {
        IntakeSession {
            state: IntakeState::default(),
            mail: Mail::default(),
            context: Arc::clone(self),
        }
    }

    pub const fn chain(&self) -> &ProcessingChain {
        &self.chain
    }

    /// Plugins may block on their own I/O, so the chain runs on the blocking
    /// pool with the caller's subscriber and span carried over.
    async fn run_chain(self: &Arc<Self>, mut mail: Mail) -> Result<Mail, IntakeError> {
        let context = Arc::clone(self);
        let dispatch = tracing::dispatcher::get_default(Clone::clone);
        let span = tracing::Span::current();

        tokio::task::spawn_blocking(move || {
            tracing::dispatcher::with_default(&dispatch, || {
                span.in_scope(|| context.chain.run(&mut mail).map(|()| mail))
            })
        })
        .await?
        .map_err(IntakeError::from)
    }

    async fn commit(self: &Arc<Self>, mail: Mail) -> Result<QueueEntryId, IntakeError> {
        mail.validate()?;
        let mut mail = self.run_chain(mail).await?;

        let account = self.accounts.resolve(mail.sender())?;

        let received = format!("({}) {}", self.identity, chrono::Utc::now().to_rfc2822());
        mail.prepend_header("Received", &received);
        if let Some(return_path) = &account.return_path {
            mail.prepend_header("Return-Path", return_path);
        }
        if let Some(reply_to) = &account.reply_to {
            mail.prepend_header("Reply-To", reply_to);
        }

        let id = self.spool.enqueue(&mail).await?;
        internal!(level = INFO, "Mail scheduled for sending ({id})");

        Ok(id)
    }
}

/// One submission, from `MAIL FROM` to the body
#[derive(Debug)]
pub struct IntakeSession {
    state: IntakeState,
    mail: Mail,
    context: Arc<IntakeContext>,
}

impl IntakeSession {
    pub const fn state(&self) -> IntakeState {
        self.state
    }

    pub const fn mail(&self) -> &Mail {
        &self.mail
    }

    fn apply(&mut self, event: IntakeEvent) {
        self.state = self.state.transition(event, &mut self.mail);
    }

    pub fn mail_from(&mut self, sender: &str) {
        incoming!(level = DEBUG, "MAIL FROM: {sender}");
        self.apply(IntakeEvent::MailFrom(sender.to_string()));
    }

    pub fn rcpt_to(&mut self, recipient: &str) {
        incoming!(level = DEBUG, "RCPT TO: {recipient}");
        self.apply(IntakeEvent::RcptTo(recipient.to_string()));
    }

    /// Complete the session with the raw header and body text
    ///
    /// Runs the processing chain, stamps the trace headers and queues the
    /// result. A mail that fails any step is dropped and never queued.
    ///
    /// # Errors
    /// If the envelope is incomplete, the chain stops the mail, the sender
    /// has no account, or the queue cannot store it
    pub async fn data(mut self, body: impl Into<String>) -> Result<QueueEntryId, IntakeError> {
        let body = body.into();
        incoming!(level = DEBUG, "DATA: {} bytes", body.len());
        self.apply(IntakeEvent::Data(body));

        let result = self.context.commit(self.mail).await;

        match &result {
            Ok(_) | Err(IntakeError::Chain(_)) => {}
            Err(err) => internal!(level = ERROR, "Mail discarded: {err}"),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_envelope_transitions() {
        let mut mail = Mail::default();

        let state = IntakeState::Idle.transition(
            IntakeEvent::MailFrom("<a@x.com>".to_string()),
            &mut mail,
        );
        assert_eq!(state, IntakeState::HaveSender);

        let state = state.transition(IntakeEvent::RcptTo("<b@y.com>".to_string()), &mut mail);
        assert_eq!(state, IntakeState::HaveRecipients);

        let state = state.transition(IntakeEvent::RcptTo("c@y.com".to_string()), &mut mail);
        assert_eq!(state, IntakeState::HaveRecipients);

        let state = state.transition(IntakeEvent::Data("body".to_string()), &mut mail);
        assert_eq!(state, IntakeState::Received);

        assert_eq!(mail.sender(), "a@x.com");
        assert_eq!(mail.recipients(), ["b@y.com".to_string(), "c@y.com".to_string()]);
        assert_eq!(mail.data(), "body");
    }

    #[test]
    fn test_received_is_terminal() {
        let mut mail = Mail::default();

        let state = IntakeState::Received
            .transition(IntakeEvent::RcptTo("b@y.com".to_string()), &mut mail);

        assert_eq!(state, IntakeState::Received);
        assert!(mail.recipients().is_empty());
    }

    #[test]
    fn test_sender_after_recipients_keeps_recipients() {
        let mut mail = Mail::default();

        let state = IntakeState::Idle
            .transition(IntakeEvent::RcptTo("b@y.com".to_string()), &mut mail)
            .transition(IntakeEvent::MailFrom("a@x.com".to_string()), &mut mail);

        assert_eq!(state, IntakeState::HaveRecipients);
        assert_eq!(mail.recipients().len(), 1);
    }
}
