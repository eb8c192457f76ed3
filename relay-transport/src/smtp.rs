//! SMTP client used for delivery to the upstream server.

use base64::{Engine, engine::general_purpose::STANDARD};
use relay_common::{Credentials, incoming, internal, outgoing};

use crate::{
    connection::Connection,
    error::{ClientError, Result},
    response::Response,
    timeouts::{ClientTimeouts, within},
};

/// A client session with one SMTP server
pub struct SmtpClient {
    connection: Connection,
}

/// Normalise line endings to CRLF, dot-stuff every line beginning with `.`,
/// and append the end-of-data marker
pub fn encode_data(data: &str) -> String {
    let mut encoded = String::with_capacity(data.len() + data.len() / 32 + 5);

    for line in data.lines() {
        if line.starts_with('.') {
            encoded.push('.');
        }
        encoded.push_str(line);
        encoded.push_str("\r\n");
    }

    encoded.push_str(".\r\n");
    encoded
}

impl SmtpClient {
    /// Connect to `host:port`, using implicit TLS when `tls` is set
    ///
    /// # Errors
    /// If the connection or TLS handshake fails or times out
    pub async fn connect(host: &str, port: u16, tls: bool, timeouts: ClientTimeouts) -> Result<Self> {
        Ok(Self {
            connection: Connection::open(host, port, tls, timeouts).await?,
        })
    }

    async fn read_response(&mut self) -> Result<Response> {
        let response = self.connection.read_with(Response::parse_response).await?;
        incoming!("{} {}", response.code, response.message());
        Ok(response)
    }

    /// Read the server's greeting, which must be a 2xx reply
    ///
    /// # Errors
    /// If the read fails, times out, or the server refuses the session
    pub async fn read_greeting(&mut self) -> Result<Response> {
        within(self.connection.timeouts.command(), "greeting", self.read_response())
            .await?
            .expect_class(220, "Greeting")
    }

    /// Send a raw command line and read the reply
    ///
    /// # Errors
    /// If sending or reading fails or times out
    pub async fn command(&mut self, command: &str) -> Result<Response> {
        outgoing!("{command}");
        self.exchange(command).await
    }

    /// Like [`Self::command`] but keeps secrets out of the log
    async fn secret_command(&mut self, command: &str, shown: &str) -> Result<Response> {
        outgoing!("{shown}");
        self.exchange(command).await
    }

    async fn exchange(&mut self, command: &str) -> Result<Response> {
        let timeout = self.connection.timeouts.command();
        within(timeout, command.split(' ').next().unwrap_or(command), async {
            self.connection.send(format!("{command}\r\n").as_bytes()).await?;
            self.read_response().await
        })
        .await
    }

    /// # Errors
    /// If the server rejects `EHLO`
    pub async fn ehlo(&mut self, domain: &str) -> Result<Response> {
        self.command(&format!("EHLO {domain}"))
            .await?
            .expect_class(250, "EHLO")
    }

    /// Ask for `STARTTLS` and upgrade the connection
    ///
    /// The caller must greet again afterwards.
    ///
    /// # Errors
    /// If the server refuses or the handshake fails
    pub async fn starttls(&mut self) -> Result<Response> {
        let response = self
            .command("STARTTLS")
            .await?
            .expect_class(220, "STARTTLS")?;

        self.connection.upgrade().await?;
        internal!(level = DEBUG, "Connection upgraded to TLS");

        Ok(response)
    }

    /// `AUTH LOGIN`: username and password sent as separate base64 replies
    ///
    /// # Errors
    /// [`ClientError::AuthenticationFailed`] if the server refuses any step
    pub async fn auth_login(&mut self, credentials: &Credentials) -> Result<Response> {
        let steps = [
            ("AUTH LOGIN".to_string(), "AUTH LOGIN"),
            (STANDARD.encode(&credentials.username), "<username>"),
            (STANDARD.encode(&credentials.password), "<password>"),
        ];

        let mut last = None;
        for (index, (command, shown)) in steps.into_iter().enumerate() {
            let response = self.secret_command(&command, shown).await?;
            let expected_continue = index < 2;

            if (expected_continue && !response.is_intermediate())
                || (!expected_continue && !response.is_success())
            {
                return Err(ClientError::AuthenticationFailed {
                    code: response.code,
                    message: response.message(),
                });
            }

            last = Some(response);
        }

        last.ok_or(ClientError::ConnectionClosed)
    }

    /// `AUTH PLAIN` with the initial response `\0user\0password`
    ///
    /// # Errors
    /// [`ClientError::AuthenticationFailed`] if the server refuses
    pub async fn auth_plain(&mut self, credentials: &Credentials) -> Result<Response> {
        let token = STANDARD.encode(format!(
            "\0{}\0{}",
            credentials.username, credentials.password
        ));

        let response = self
            .secret_command(&format!("AUTH PLAIN {token}"), "AUTH PLAIN <credentials>")
            .await?;

        if response.is_success() {
            Ok(response)
        } else {
            Err(ClientError::AuthenticationFailed {
                code: response.code,
                message: response.message(),
            })
        }
    }

    /// Authenticate with `AUTH LOGIN`, falling back to `AUTH PLAIN` when the
    /// server rejects the first mechanism
    ///
    /// # Errors
    /// If both mechanisms are refused, or the connection fails
    pub async fn login(&mut self, credentials: &Credentials) -> Result<Response> {
        match self.auth_login(credentials).await {
            Ok(response) => Ok(response),
            Err(ClientError::AuthenticationFailed { code, message }) => {
                internal!(
                    level = INFO,
                    "AUTH LOGIN rejected ({code} {message}), trying AUTH PLAIN"
                );
                self.auth_plain(credentials).await
            }
            Err(err) => Err(err),
        }
    }

    /// # Errors
    /// If the server rejects the sender
    pub async fn mail_from(&mut self, from: &str) -> Result<Response> {
        self.command(&format!("MAIL FROM:<{}>", strip_brackets(from)))
            .await?
            .expect_class(250, "MAIL FROM")
    }

    /// Returns the reply as is; a refused recipient is not an error here
    ///
    /// # Errors
    /// If the exchange itself fails
    pub async fn rcpt_to(&mut self, to: &str) -> Result<Response> {
        self.command(&format!("RCPT TO:<{}>", strip_brackets(to)))
            .await
    }

    /// # Errors
    /// If the server does not answer `DATA` with 354
    pub async fn data(&mut self) -> Result<Response> {
        self.command("DATA").await?.expect_class(354, "DATA")
    }

    /// Transmit the message text and read the final reply
    ///
    /// # Errors
    /// If sending fails, times out, or the server rejects the message
    pub async fn send_data(&mut self, data: &str) -> Result<Response> {
        let encoded = encode_data(data);
        outgoing!(level = DEBUG, "<{} bytes of message data>", encoded.len());

        let timeout = self.connection.timeouts.data();
        within(timeout, "message data", async {
            self.connection.send(encoded.as_bytes()).await?;
            self.read_response().await
        })
        .await?
        .expect_class(250, "DATA end")
    }

    /// # Errors
    /// If the exchange fails
    pub async fn quit(&mut self) -> Result<Response> {
        self.command("QUIT").await
    }
}

/// Addresses may or may not arrive wrapped in angle brackets
fn strip_brackets(address: &str) -> &str {
    let trimmed = address.trim();
    trimmed
        .strip_prefix('<')
        .and_then(|a| a.strip_suffix('>'))
        .unwrap_or(trimmed)
}
