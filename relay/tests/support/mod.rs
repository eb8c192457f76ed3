#![allow(dead_code)]

pub mod plugins;

use std::{io::Write, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use relay_common::{GateConfig, Mail, MailAccount};
use relay_delivery::{DeliveryError, UpstreamTransport};
use tracing_subscriber::fmt::MakeWriter;

/// Collects formatted log output for assertions
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl LogCapture {
    /// Capture everything logged on this thread until the guard drops
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::TRACE)
            .finish();

        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.buffer.lock())
            .lines()
            .map(ToString::to_string)
            .collect()
    }

    /// Lines at `level` mentioning `needle`
    pub fn count(&self, level: &str, needle: &str) -> usize {
        self.lines()
            .iter()
            .filter(|line| line.contains(level) && line.contains(needle))
            .count()
    }

    pub fn errors(&self) -> usize {
        self.count("ERROR", "")
    }
}

/// Transport that accepts every delivery and records it
#[derive(Debug, Clone, Default)]
pub struct AcceptingTransport {
    delivered: Arc<Mutex<Vec<(String, Mail)>>>,
}

impl AcceptingTransport {
    /// Upstream host and mail of every delivery so far
    pub fn delivered(&self) -> Vec<(String, Mail)> {
        self.delivered.lock().clone()
    }
}

#[async_trait]
impl UpstreamTransport for AcceptingTransport {
    async fn authenticate_gate(&self, _gate: &GateConfig) -> Result<(), DeliveryError> {
        Ok(())
    }

    async fn deliver(&self, account: &MailAccount, mail: &Mail) -> Result<(), DeliveryError> {
        self.delivered
            .lock()
            .push((account.host.clone(), mail.clone()));
        Ok(())
    }
}
