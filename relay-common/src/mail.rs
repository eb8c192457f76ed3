use mailparse::{MailHeaderMap, ParsedMail};
use serde::{Deserialize, Serialize};

use crate::error::MailError;

/// One in-flight or queued message: the envelope plus the raw header and
/// body text.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mail {
    sender: String,
    recipients: Vec<String>,
    data: String,
}

impl Mail {
    pub fn new(sender: impl Into<String>, recipients: Vec<String>, data: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            recipients,
            data: data.into(),
        }
    }

    /// Returns the envelope sender for this [`Mail`]
    #[inline]
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Returns the envelope recipients for this [`Mail`]
    #[inline]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// Returns the raw header and body text
    #[inline]
    pub fn data(&self) -> &str {
        &self.data
    }

    #[inline]
    pub fn set_sender(&mut self, sender: impl Into<String>) {
        self.sender = sender.into();
    }

    #[inline]
    pub fn set_recipients(&mut self, recipients: Vec<String>) {
        self.recipients = recipients;
    }

    #[inline]
    pub fn add_recipient(&mut self, recipient: impl Into<String>) {
        self.recipients.push(recipient.into());
    }

    #[inline]
    pub fn set_data(&mut self, data: impl Into<String>) {
        self.data = data.into();
    }

    /// Ensure the mail is fit to be queued
    ///
    /// # Errors
    /// If the sender is empty or there are no recipients
    pub fn validate(&self) -> Result<(), MailError> {
        if self.sender.is_empty() {
            return Err(MailError::NoSender);
        }

        if self.recipients.is_empty() {
            return Err(MailError::NoRecipients);
        }

        Ok(())
    }

    /// Parse the raw text into its MIME structure
    ///
    /// # Errors
    /// If the text is not a parseable message
    pub fn parse(&self) -> Result<ParsedMail<'_>, MailError> {
        mailparse::parse_mail(self.data.as_bytes()).map_err(|err| MailError::Parse(err.to_string()))
    }

    /// Returns the first value of the named header, if present
    pub fn header(&self, name: &str) -> Option<String> {
        mailparse::parse_headers(self.data.as_bytes())
            .ok()
            .and_then(|(headers, _)| headers.get_first_value(name))
    }

    /// The line terminator already in use by the text, defaulting to CRLF
    fn line_ending(&self) -> &'static str {
        if self.data.contains("\r\n") || !self.data.contains('\n') {
            "\r\n"
        } else {
            "\n"
        }
    }

    /// Insert a header line at the very top of the message
    pub fn prepend_header(&mut self, name: &str, value: &str) {
        let eol = self.line_ending();
        self.data = format!("{name}: {value}{eol}{}", self.data);
    }

    /// Replace the first occurrence of a header, including any folded
    /// continuation lines. When the header is absent it is appended to the
    /// end of the header block.
    pub fn replace_header(&mut self, name: &str, value: &str) {
        let eol = self.line_ending();
        let replacement = format!("{name}: {value}{eol}");

        let mut out = String::with_capacity(self.data.len() + replacement.len());
        let mut in_headers = true;
        let mut replaced = false;
        let mut skipping = false;

        for line in self.data.split_inclusive('\n') {
            if in_headers {
                let content = line.trim_end_matches(['\r', '\n']);

                if content.is_empty() {
                    in_headers = false;
                    if !replaced {
                        out.push_str(&replacement);
                        replaced = true;
                    }
                    out.push_str(line);
                    continue;
                }

                if skipping && line.starts_with([' ', '\t']) {
                    continue;
                }
                skipping = false;

                if !replaced && header_name_is(content, name) {
                    out.push_str(&replacement);
                    replaced = true;
                    skipping = true;
                    continue;
                }
            }

            out.push_str(line);
        }

        if !replaced {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push_str(eol);
            }
            out.push_str(&replacement);
        }

        self.data = out;
    }
}

fn header_name_is(line: &str, name: &str) -> bool {
    line.split_once(':')
        .is_some_and(|(field, _)| field.trim_end().eq_ignore_ascii_case(name))
}
