use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use mailparse::{MailHeaderMap, ParsedMail};
use relay_common::{Mail, internal};
use tracing::Span;

use super::{MailCallback, Plugin};

pub(super) fn default_subject_prefix() -> String {
    String::from("Nachricht von")
}

pub(super) fn default_filename() -> String {
    String::from("message.wav")
}

/// Saves the attachment of voicemail notifications to a directory
///
/// A mail qualifies when its decoded subject starts with the configured
/// prefix. The second MIME part is written out under its own filename, or
/// the default one when it has none. Failing to save never stops the mail.
#[derive(Debug)]
pub struct SaveAttachment {
    directory: PathBuf,
    subject_prefix: String,
    default_filename: String,
    enabled: bool,
    span: Span,
}

impl SaveAttachment {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            subject_prefix: default_subject_prefix(),
            default_filename: default_filename(),
            enabled: true,
            span: Span::none(),
        }
    }

    #[must_use]
    pub fn with_subject_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.subject_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_default_filename(mut self, filename: impl Into<String>) -> Self {
        self.default_filename = filename.into();
        self
    }

    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// The attachment's own name, stripped of any directory components
    fn filename(&self, part: &ParsedMail<'_>) -> PathBuf {
        let disposition = part.get_content_disposition();
        let named = disposition
            .params
            .get("filename")
            .or_else(|| part.ctype.params.get("name"))
            .and_then(|name| Path::new(name).file_name().map(OsStr::to_os_string));

        named.map_or_else(|| PathBuf::from(&self.default_filename), PathBuf::from)
    }

    fn save(&self, parsed: &ParsedMail<'_>) -> anyhow::Result<Option<PathBuf>> {
        let Some(part) = parsed.subparts.get(1) else {
            return Ok(None);
        };

        let target = self.directory.join(self.filename(part));
        internal!(level = INFO, "Saving message to {}", target.display());

        std::fs::write(&target, part.get_body_raw()?)?;
        Ok(Some(target))
    }
}

impl Plugin for SaveAttachment {
    fn name(&self) -> &'static str {
        "SaveAttachment"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn bind(&mut self, span: Span) {
        self.span = span;
    }

    fn handle(
        &self,
        parsed: &ParsedMail<'_>,
        _mail: &Mail,
        _callback: &mut dyn MailCallback,
    ) -> anyhow::Result<bool> {
        let _guard = self.span.enter();

        let subject = parsed
            .headers
            .get_first_value("Subject")
            .unwrap_or_default();

        internal!(level = DEBUG, "Handling message with subject {subject}");

        if !subject.starts_with(&self.subject_prefix) {
            return Ok(true);
        }

        match self.save(parsed) {
            Ok(Some(_)) => {}
            Ok(None) => internal!(level = WARN, "No attachment found in '{subject}'"),
            Err(err) => internal!(level = ERROR, "Saving file failed: {err:#}"),
        }

        Ok(true)
    }
}
