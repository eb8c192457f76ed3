use mailparse::ParsedMail;
use relay_common::{Mail, internal};
use tracing::Span;

use super::{MailCallback, Plugin};

/// Vetoes every mail from one of the listed senders
#[derive(Debug)]
pub struct Reject {
    senders: Vec<String>,
    enabled: bool,
    span: Span,
}

impl Reject {
    pub fn new(senders: Vec<String>) -> Self {
        Self {
            senders,
            enabled: true,
            span: Span::none(),
        }
    }

    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

impl Plugin for Reject {
    fn name(&self) -> &'static str {
        "Reject"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn bind(&mut self, span: Span) {
        self.span = span;
    }

    fn handle(
        &self,
        _parsed: &ParsedMail<'_>,
        mail: &Mail,
        _callback: &mut dyn MailCallback,
    ) -> anyhow::Result<bool> {
        let _guard = self.span.enter();

        let blocked = self
            .senders
            .iter()
            .any(|sender| sender.eq_ignore_ascii_case(mail.sender()));

        if blocked {
            internal!(level = DEBUG, "Sender {} is on the reject list", mail.sender());
        }

        Ok(!blocked)
    }
}
