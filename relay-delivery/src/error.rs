//! Post-queue failures. All of them are subject to the retry/discard policy.

use relay_transport::ClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The POP-before-SMTP handshake failed
    #[error("Authentication gate {host}:{port} failed: {source}")]
    GateAuth {
        host: String,
        port: u16,
        #[source]
        source: ClientError,
    },

    /// Connecting, negotiating TLS, authenticating or transmitting failed
    #[error("Delivery to {host}:{port} failed: {source}")]
    Delivery {
        host: String,
        port: u16,
        #[source]
        source: ClientError,
    },

    /// The server accepted the sender but none of the recipients
    #[error("Every recipient was refused by {host}:{port}: {}", refused.join(", "))]
    RecipientsRefused {
        host: String,
        port: u16,
        refused: Vec<String>,
    },
}

impl DeliveryError {
    #[must_use]
    pub const fn is_gate_failure(&self) -> bool {
        matches!(self, Self::GateAuth { .. })
    }
}
