//! Outbound clients used by the dispatcher.
//!
//! - [`SmtpClient`] delivers to the upstream server, plain, upgraded with
//!   `STARTTLS`, or over implicit TLS, with `AUTH LOGIN` falling back to
//!   `AUTH PLAIN`.
//! - [`Pop3Client`] performs the login handshake against the authentication
//!   gate.

mod connection;
pub mod error;
pub mod pop3;
pub mod response;
pub mod smtp;
pub mod timeouts;

pub use error::{ClientError, Result};
pub use pop3::Pop3Client;
pub use response::{Response, ResponseLine};
pub use smtp::SmtpClient;
pub use timeouts::ClientTimeouts;
