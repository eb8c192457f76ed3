use async_trait::async_trait;
use relay_common::{GateConfig, Mail, MailAccount, internal};
use relay_transport::{ClientTimeouts, Pop3Client};

use crate::{error::DeliveryError, smtp_transaction::SmtpTransaction};

/// The dispatcher's view of the network
#[async_trait]
pub trait UpstreamTransport: Send + Sync + std::fmt::Debug {
    /// Log in to the gate's mailbox server and disconnect again
    async fn authenticate_gate(&self, gate: &GateConfig) -> Result<(), DeliveryError>;

    /// Deliver a mail through the account's upstream server
    async fn deliver(&self, account: &MailAccount, mail: &Mail) -> Result<(), DeliveryError>;
}

/// The real transport, talking SMTP and POP3
#[derive(Debug, Clone, Default)]
pub struct NetworkTransport {
    timeouts: ClientTimeouts,
}

impl NetworkTransport {
    #[must_use]
    pub const fn new(timeouts: ClientTimeouts) -> Self {
        Self { timeouts }
    }
}

#[async_trait]
impl UpstreamTransport for NetworkTransport {
    async fn authenticate_gate(&self, gate: &GateConfig) -> Result<(), DeliveryError> {
        internal!(
            level = INFO,
            "Performing POP-before-SMTP against {}:{}",
            gate.host,
            gate.port
        );

        let result = async {
            let mut client =
                Pop3Client::connect(&gate.host, gate.port, gate.use_tls, self.timeouts).await?;
            client.login(&gate.credentials).await
        }
        .await;

        result.map_err(|source| DeliveryError::GateAuth {
            host: gate.host.clone(),
            port: gate.port,
            source,
        })
    }

    async fn deliver(&self, account: &MailAccount, mail: &Mail) -> Result<(), DeliveryError> {
        internal!(
            level = INFO,
            "Sending mail from: {} to: {}",
            mail.sender(),
            mail.recipients().join(",")
        );

        SmtpTransaction::new(account, mail, self.timeouts)
            .execute()
            .await
    }
}
