//! Minimal POP3 client: enough to log in and out again.

use relay_common::{Credentials, incoming, outgoing};

use crate::{
    connection::Connection,
    error::{ClientError, Result},
    timeouts::{ClientTimeouts, within},
};

pub struct Pop3Client {
    connection: Connection,
}

impl Pop3Client {
    /// Connect and read the `+OK` greeting
    ///
    /// # Errors
    /// If the connection fails or the server does not greet with `+OK`
    pub async fn connect(host: &str, port: u16, tls: bool, timeouts: ClientTimeouts) -> Result<Self> {
        let mut client = Self {
            connection: Connection::open(host, port, tls, timeouts).await?,
        };

        let timeout = client.connection.timeouts.command();
        within(timeout, "greeting", client.read_status("greeting")).await?;

        Ok(client)
    }

    async fn read_status(&mut self, command: &str) -> Result<String> {
        let line = self.connection.read_line().await?;
        incoming!("{line}");

        if let Some(rest) = line.strip_prefix("+OK") {
            Ok(rest.trim_start().to_string())
        } else {
            Err(ClientError::Pop3 {
                command: command.to_string(),
                message: line.strip_prefix("-ERR").unwrap_or(&line).trim().to_string(),
            })
        }
    }

    async fn command(&mut self, verb: &str, argument: Option<&str>, shown: &str) -> Result<String> {
        outgoing!("{shown}");

        let line = argument.map_or_else(|| format!("{verb}\r\n"), |arg| format!("{verb} {arg}\r\n"));
        let timeout = self.connection.timeouts.command();

        within(timeout, verb, async {
            self.connection.send(line.as_bytes()).await?;
            self.read_status(verb).await
        })
        .await
    }

    /// # Errors
    /// If the server answers `-ERR`
    pub async fn user(&mut self, username: &str) -> Result<String> {
        self.command("USER", Some(username), &format!("USER {username}"))
            .await
    }

    /// # Errors
    /// If the server answers `-ERR`
    pub async fn pass(&mut self, password: &str) -> Result<String> {
        self.command("PASS", Some(password), "PASS <password>").await
    }

    /// # Errors
    /// If the server answers `-ERR`
    pub async fn quit(&mut self) -> Result<String> {
        self.command("QUIT", None, "QUIT").await
    }

    /// `USER`, `PASS`, then `QUIT`
    ///
    /// # Errors
    /// If any step is refused
    pub async fn login(&mut self, credentials: &Credentials) -> Result<()> {
        self.user(&credentials.username).await?;
        self.pass(&credentials.password).await?;
        self.quit().await?;
        Ok(())
    }
}
