//! A TCP stream that is either plain or wrapped in TLS, with a read buffer.

use std::sync::{Arc, OnceLock};

use relay_common::internal;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tokio_rustls::{
    TlsConnector,
    client::TlsStream,
    rustls::{ClientConfig, RootCertStore, pki_types::ServerName},
};

use crate::{
    error::{ClientError, Result},
    timeouts::{ClientTimeouts, within},
};

const BUFFER_SIZE: usize = 8192;

/// Upper bound on buffered, not yet parsed, input
const MAX_BUFFER_SIZE: usize = 1024 * 1024;

enum Stream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

pub(crate) struct Connection {
    stream: Option<Stream>,
    host: String,
    buffer: Vec<u8>,
    filled: usize,
    pub(crate) timeouts: ClientTimeouts,
}

/// Process-wide client TLS configuration, trusting the native roots
fn tls_config() -> Result<Arc<ClientConfig>> {
    static CONFIG: OnceLock<Arc<ClientConfig>> = OnceLock::new();

    if let Some(config) = CONFIG.get() {
        return Ok(Arc::clone(config));
    }

    let mut roots = RootCertStore::empty();
    let certs = rustls_native_certs::load_native_certs();
    for cert in certs.certs {
        roots
            .add(cert)
            .map_err(|e| ClientError::TlsError(format!("Failed to add certificate: {e}")))?;
    }

    if !certs.errors.is_empty() {
        internal!(
            level = WARN,
            "Some native certificates could not be loaded: {:?}",
            certs.errors
        );
    }

    let config = Arc::new(
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    );

    Ok(Arc::clone(CONFIG.get_or_init(|| config)))
}

async fn handshake(host: &str, stream: TcpStream) -> Result<TlsStream<TcpStream>> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| ClientError::TlsError(format!("Invalid server name {host}: {e}")))?;

    TlsConnector::from(tls_config()?)
        .connect(server_name, stream)
        .await
        .map_err(|e| ClientError::TlsError(e.to_string()))
}

async fn connect_stream(host: &str, port: u16, tls: bool) -> Result<Stream> {
    let tcp = TcpStream::connect((host, port)).await?;

    if tls {
        Ok(Stream::Tls(Box::new(handshake(host, tcp).await?)))
    } else {
        Ok(Stream::Plain(tcp))
    }
}

impl Connection {
    /// Open a connection, encrypting it from the start when `tls` is set
    pub(crate) async fn open(
        host: &str,
        port: u16,
        tls: bool,
        timeouts: ClientTimeouts,
    ) -> Result<Self> {
        let stream = within(timeouts.connect(), "connect", connect_stream(host, port, tls)).await?;

        internal!(
            level = DEBUG,
            "Connected to {host}:{port}{}",
            if tls { " (TLS)" } else { "" }
        );

        Ok(Self {
            stream: Some(stream),
            host: host.to_string(),
            buffer: vec![0; BUFFER_SIZE],
            filled: 0,
            timeouts,
        })
    }

    pub(crate) async fn send(&mut self, data: &[u8]) -> Result<()> {
        match self.stream.as_mut().ok_or(ClientError::ConnectionClosed)? {
            Stream::Plain(stream) => stream.write_all(data).await?,
            Stream::Tls(stream) => {
                stream.write_all(data).await?;
                stream.flush().await?;
            }
        }

        Ok(())
    }

    /// Upgrade a plain stream in place, as after `STARTTLS`
    ///
    /// Any buffered plaintext is discarded.
    pub(crate) async fn upgrade(&mut self) -> Result<()> {
        match self.stream.take() {
            Some(Stream::Plain(tcp)) => {
                let tls = within(self.timeouts.connect(), "TLS handshake", handshake(&self.host, tcp))
                    .await?;
                self.stream = Some(Stream::Tls(Box::new(tls)));
                self.filled = 0;
                Ok(())
            }
            Some(tls @ Stream::Tls(_)) => {
                self.stream = Some(tls);
                Err(ClientError::TlsError("Connection is already TLS".to_string()))
            }
            None => Err(ClientError::ConnectionClosed),
        }
    }

    /// Read more bytes into the buffer, growing it when full
    async fn fill(&mut self) -> Result<()> {
        if self.filled >= self.buffer.len() {
            let new_size = self.buffer.len() * 2;
            if new_size > MAX_BUFFER_SIZE {
                return Err(ClientError::ParseError(format!(
                    "Response too large (exceeds {MAX_BUFFER_SIZE} bytes)"
                )));
            }
            self.buffer.resize(new_size, 0);
        }

        let target = &mut self.buffer[self.filled..];
        let n = match self.stream.as_mut().ok_or(ClientError::ConnectionClosed)? {
            Stream::Plain(stream) => stream.read(target).await?,
            Stream::Tls(stream) => stream.read(target).await?,
        };

        if n == 0 {
            return Err(ClientError::ConnectionClosed);
        }

        self.filled += n;
        Ok(())
    }

    /// Repeatedly try `parse` against the buffered input, reading more until
    /// it yields a value. `parse` returns the value and the bytes it used.
    pub(crate) async fn read_with<T>(
        &mut self,
        parse: impl Fn(&[u8]) -> Result<Option<(T, usize)>>,
    ) -> Result<T> {
        loop {
            if let Some((value, consumed)) = parse(&self.buffer[..self.filled])? {
                self.buffer.copy_within(consumed..self.filled, 0);
                self.filled -= consumed;
                return Ok(value);
            }

            self.fill().await?;
        }
    }

    /// Read one line, without its terminator
    pub(crate) async fn read_line(&mut self) -> Result<String> {
        self.read_with(|buffer| {
            let Some(end) = buffer.iter().position(|&b| b == b'\n') else {
                return Ok(None);
            };

            let line = std::str::from_utf8(&buffer[..end])?
                .trim_end_matches('\r')
                .to_string();

            Ok(Some((line, end + 1)))
        })
        .await
    }
}
