//! Mock upstream SMTP and POP3 servers
//!
//! ```rust,ignore
//! let server = MockSmtpServer::builder()
//!     .with_auth_login_response(504, "Unrecognised mechanism")
//!     .with_rcpt_to_response(550, "User unknown")
//!     .build()
//!     .await?;
//! ```

use std::{
    fmt::Write,
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::RwLock,
    time::timeout,
};

/// A command received by the mock SMTP server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Ehlo(String),
    MailFrom(String),
    RcptTo(String),
    Data,
    MessageContent(String),
    AuthLogin,
    AuthPlain(String),
    StartTls,
    Quit,
    Other(String),
}

#[derive(Debug, Clone)]
pub struct SmtpResponse {
    pub code: u16,
    pub message: String,
}

impl SmtpResponse {
    fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        format!("{} {}\r\n", self.code, self.message).into_bytes()
    }
}

#[derive(Clone)]
struct MockServerConfig {
    greeting: SmtpResponse,
    capabilities: Vec<String>,
    auth_login_response: SmtpResponse,
    auth_plain_response: SmtpResponse,
    mail_from_response: SmtpResponse,
    rcpt_to_response: SmtpResponse,
    data_response: SmtpResponse,
    data_end_response: SmtpResponse,
    response_delay: Option<Duration>,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            greeting: SmtpResponse::new(220, "Mock SMTP Server"),
            capabilities: vec!["localhost".to_string(), "AUTH LOGIN PLAIN".to_string()],
            auth_login_response: SmtpResponse::new(334, "VXNlcm5hbWU6"),
            auth_plain_response: SmtpResponse::new(235, "Authenticated"),
            mail_from_response: SmtpResponse::new(250, "OK"),
            rcpt_to_response: SmtpResponse::new(250, "OK"),
            data_response: SmtpResponse::new(354, "Start mail input; end with <CRLF>.<CRLF>"),
            data_end_response: SmtpResponse::new(250, "OK: Message accepted"),
            response_delay: None,
        }
    }
}

fn ehlo_bytes(capabilities: &[String]) -> Vec<u8> {
    let mut response = String::new();
    for (i, cap) in capabilities.iter().enumerate() {
        let separator = if i + 1 < capabilities.len() { '-' } else { ' ' };
        let _ = write!(&mut response, "250{separator}{cap}\r\n");
    }
    response.into_bytes()
}

pub struct MockSmtpServer {
    addr: SocketAddr,
    commands_received: Arc<RwLock<Vec<SmtpCommand>>>,
}

impl MockSmtpServer {
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder {
            config: MockServerConfig::default(),
        }
    }

    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    pub async fn commands(&self) -> Vec<SmtpCommand> {
        self.commands_received.read().await.clone()
    }

    /// The message bodies received so far
    pub async fn messages(&self) -> Vec<String> {
        self.commands()
            .await
            .into_iter()
            .filter_map(|command| match command {
                SmtpCommand::MessageContent(content) => Some(content),
                _ => None,
            })
            .collect()
    }

    #[allow(clippy::too_many_lines)]
    async fn handle_client(
        mut stream: TcpStream,
        config: Arc<MockServerConfig>,
        commands: Arc<RwLock<Vec<SmtpCommand>>>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        // Remaining base64 lines of an AUTH LOGIN exchange
        let mut login_steps = 0;

        writer.write_all(&config.greeting.to_bytes()).await?;

        loop {
            line.clear();
            let Ok(read) = timeout(Duration::from_secs(10), reader.read_line(&mut line)).await
            else {
                return Ok(());
            };
            if read? == 0 {
                return Ok(());
            }

            let cmd_line = line.trim_end_matches(['\r', '\n']).to_string();

            if login_steps > 0 {
                login_steps -= 1;
                let response = if login_steps > 0 {
                    SmtpResponse::new(334, "UGFzc3dvcmQ6")
                } else {
                    SmtpResponse::new(235, "Authenticated")
                };
                writer.write_all(&response.to_bytes()).await?;
                continue;
            }

            let (verb, argument) = cmd_line
                .split_once(' ')
                .map_or((cmd_line.as_str(), ""), |(verb, rest)| (verb, rest));

            let (response, command) = match verb.to_uppercase().as_str() {
                "EHLO" => (
                    ehlo_bytes(&config.capabilities),
                    SmtpCommand::Ehlo(argument.to_string()),
                ),
                "AUTH" => {
                    let (mechanism, token) =
                        argument.split_once(' ').unwrap_or((argument, ""));
                    if mechanism.eq_ignore_ascii_case("LOGIN") {
                        if config.auth_login_response.code == 334 {
                            login_steps = 2;
                        }
                        (config.auth_login_response.to_bytes(), SmtpCommand::AuthLogin)
                    } else {
                        (
                            config.auth_plain_response.to_bytes(),
                            SmtpCommand::AuthPlain(token.to_string()),
                        )
                    }
                }
                "MAIL" => (
                    config.mail_from_response.to_bytes(),
                    SmtpCommand::MailFrom(argument.to_string()),
                ),
                "RCPT" => (
                    config.rcpt_to_response.to_bytes(),
                    SmtpCommand::RcptTo(argument.to_string()),
                ),
                "DATA" => (config.data_response.to_bytes(), SmtpCommand::Data),
                "STARTTLS" => (
                    SmtpResponse::new(454, "TLS not available").to_bytes(),
                    SmtpCommand::StartTls,
                ),
                "QUIT" => {
                    commands.write().await.push(SmtpCommand::Quit);
                    writer
                        .write_all(&SmtpResponse::new(221, "Bye").to_bytes())
                        .await?;
                    return Ok(());
                }
                _ => (
                    SmtpResponse::new(500, "Unknown command").to_bytes(),
                    SmtpCommand::Other(cmd_line.clone()),
                ),
            };

            commands.write().await.push(command.clone());

            if let Some(delay) = config.response_delay {
                tokio::time::sleep(delay).await;
            }

            writer.write_all(&response).await?;

            if command == SmtpCommand::Data && config.data_response.code == 354 {
                let mut content = String::new();
                loop {
                    let mut data_line = String::new();
                    if reader.read_line(&mut data_line).await? == 0 {
                        return Ok(());
                    }
                    if data_line == ".\r\n" {
                        break;
                    }
                    content.push_str(&data_line);
                }

                commands
                    .write()
                    .await
                    .push(SmtpCommand::MessageContent(content));
                writer
                    .write_all(&config.data_end_response.to_bytes())
                    .await?;
            }
        }
    }
}

pub struct MockSmtpServerBuilder {
    config: MockServerConfig,
}

impl MockSmtpServerBuilder {
    #[must_use]
    pub fn with_greeting(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.greeting = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.config.capabilities = capabilities;
        self
    }

    /// First reply to `AUTH LOGIN`; anything but 334 rejects the mechanism
    #[must_use]
    pub fn with_auth_login_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.auth_login_response = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_auth_plain_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.auth_plain_response = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_mail_from_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.mail_from_response = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_rcpt_to_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.rcpt_to_response = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_data_end_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.data_end_response = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub const fn with_response_delay(mut self, delay: Duration) -> Self {
        self.config.response_delay = Some(delay);
        self
    }

    /// Bind to a random local port and start accepting
    ///
    /// # Errors
    /// If the listener cannot be bound
    pub async fn build(self) -> Result<MockSmtpServer, std::io::Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let config = Arc::new(self.config);
        let commands_received = Arc::new(RwLock::new(Vec::new()));

        let commands = Arc::clone(&commands_received);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let config = Arc::clone(&config);
                let commands = Arc::clone(&commands);
                tokio::spawn(async move {
                    let _ = MockSmtpServer::handle_client(stream, config, commands).await;
                });
            }
        });

        Ok(MockSmtpServer {
            addr,
            commands_received,
        })
    }
}

/// Mock POP3 server accepting a single username and password
pub struct MockPop3Server {
    addr: SocketAddr,
    logins: Arc<RwLock<Vec<(String, String)>>>,
}

impl MockPop3Server {
    /// # Errors
    /// If the listener cannot be bound
    pub async fn start(username: &str, password: &str) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let logins = Arc::new(RwLock::new(Vec::new()));
        let expected = Arc::new((username.to_string(), password.to_string()));

        let recorded = Arc::clone(&logins);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let expected = Arc::clone(&expected);
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    let _ = Self::handle_client(stream, expected, recorded).await;
                });
            }
        });

        Ok(Self { addr, logins })
    }

    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Every `USER`/`PASS` pair attempted, successful or not
    pub async fn logins(&self) -> Vec<(String, String)> {
        self.logins.read().await.clone()
    }

    async fn handle_client(
        mut stream: TcpStream,
        expected: Arc<(String, String)>,
        logins: Arc<RwLock<Vec<(String, String)>>>,
    ) -> Result<(), std::io::Error> {
        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);
        let mut user = String::new();

        writer.write_all(b"+OK Mock POP3 ready\r\n").await?;

        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await? == 0 {
                return Ok(());
            }

            let line = line.trim_end_matches(['\r', '\n']);
            let (verb, argument) = line.split_once(' ').unwrap_or((line, ""));

            match verb.to_uppercase().as_str() {
                "USER" => {
                    user = argument.to_string();
                    writer.write_all(b"+OK\r\n").await?;
                }
                "PASS" => {
                    logins
                        .write()
                        .await
                        .push((user.clone(), argument.to_string()));

                    if user == expected.0 && argument == expected.1 {
                        writer.write_all(b"+OK Logged in\r\n").await?;
                    } else {
                        writer.write_all(b"-ERR Invalid login\r\n").await?;
                    }
                }
                "QUIT" => {
                    writer.write_all(b"+OK Bye\r\n").await?;
                    return Ok(());
                }
                _ => writer.write_all(b"-ERR Unknown command\r\n").await?,
            }
        }
    }
}
