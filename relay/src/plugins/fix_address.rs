use mailparse::ParsedMail;
use relay_common::{Mail, internal};
use tracing::Span;

use super::{MailCallback, Plugin};

fn bare(address: &str) -> &str {
    let address = address.trim();
    address
        .strip_prefix('<')
        .and_then(|a| a.strip_suffix('>'))
        .unwrap_or(address)
}

/// Redirects mail whose first recipient is `match_recipient` to
/// `new_recipient`, rewriting the `To` header on the way
#[derive(Debug)]
pub struct FixAddress {
    match_recipient: String,
    new_recipient: String,
    enabled: bool,
    span: Span,
}

impl FixAddress {
    pub fn new(match_recipient: impl Into<String>, new_recipient: impl Into<String>) -> Self {
        Self {
            match_recipient: match_recipient.into(),
            new_recipient: new_recipient.into(),
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

impl Plugin for FixAddress {
    fn name(&self) -> &'static str {
        "FixAddress"
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
        callback: &mut dyn MailCallback,
    ) -> anyhow::Result<bool> {
        let _guard = self.span.enter();

        if let Some(first) = mail.recipients().first()
            && bare(first).eq_ignore_ascii_case(bare(&self.match_recipient))
        {
            internal!(
                level = INFO,
                "Changing to: field for {first} -> {}",
                self.new_recipient
            );
            callback.set_recipient(&self.new_recipient);
        }

        Ok(true)
    }
}
