//! One delivery attempt to an upstream server.

use relay_common::{Mail, MailAccount, SecurityMode, internal};
use relay_transport::{ClientError, ClientTimeouts, SmtpClient};

use crate::error::DeliveryError;

/// Identity announced in `EHLO` when the account does not set one
const DEFAULT_LOCAL_HOSTNAME: &str = "localhost";

/// A single SMTP session delivering one mail
///
/// 1. Connect, in TLS from the start for [`SecurityMode::Ssl`]
/// 2. Read the greeting and send `EHLO`
/// 3. For [`SecurityMode::Tls`], upgrade with `STARTTLS` and greet again
/// 4. Authenticate when the account has credentials
/// 5. `MAIL FROM`, `RCPT TO` for every recipient, `DATA`
/// 6. `QUIT`, whose failure does not affect the outcome
pub struct SmtpTransaction<'a> {
    account: &'a MailAccount,
    mail: &'a Mail,
    timeouts: ClientTimeouts,
}

impl<'a> SmtpTransaction<'a> {
    #[must_use]
    pub const fn new(account: &'a MailAccount, mail: &'a Mail, timeouts: ClientTimeouts) -> Self {
        Self {
            account,
            mail,
            timeouts,
        }
    }

    fn failed(&self, source: ClientError) -> DeliveryError {
        DeliveryError::Delivery {
            host: self.account.host.clone(),
            port: self.account.port,
            source,
        }
    }

    async fn connect(&self) -> Result<SmtpClient, ClientError> {
        let account = self.account;
        let helo = account
            .local_hostname
            .as_deref()
            .unwrap_or(DEFAULT_LOCAL_HOSTNAME);

        let mut client = SmtpClient::connect(
            &account.host,
            account.port,
            account.security == SecurityMode::Ssl,
            self.timeouts,
        )
        .await?;

        client.read_greeting().await?;
        client.ehlo(helo).await?;

        if account.security == SecurityMode::Tls {
            internal!("Using STARTTLS with {}", account.host);
            client.starttls().await?;
            client.ehlo(helo).await?;
        }

        if let Some(credentials) = &account.credentials {
            client.login(credentials).await?;
        }

        Ok(client)
    }

    /// # Errors
    /// [`DeliveryError::Delivery`] if any step fails and
    /// [`DeliveryError::RecipientsRefused`] if no recipient was accepted
    pub async fn execute(self) -> Result<(), DeliveryError> {
        let mut client = self.connect().await.map_err(|e| self.failed(e))?;

        client
            .mail_from(self.mail.sender())
            .await
            .map_err(|e| self.failed(e))?;

        let mut refused = Vec::new();
        for recipient in self.mail.recipients() {
            let response = client
                .rcpt_to(recipient)
                .await
                .map_err(|e| self.failed(e))?;

            if !response.is_success() {
                internal!(
                    level = WARN,
                    "{} refused recipient {recipient}: {} {}",
                    self.account.host,
                    response.code,
                    response.message()
                );
                refused.push(recipient.clone());
            }
        }

        if refused.len() == self.mail.recipients().len() {
            let _ = client.quit().await;
            return Err(DeliveryError::RecipientsRefused {
                host: self.account.host.clone(),
                port: self.account.port,
                refused,
            });
        }

        client.data().await.map_err(|e| self.failed(e))?;
        client
            .send_data(self.mail.data())
            .await
            .map_err(|e| self.failed(e))?;

        if let Err(err) = client.quit().await {
            internal!(
                level = WARN,
                "QUIT to {} failed after successful delivery: {err}",
                self.account.host
            );
        }

        Ok(())
    }
}
