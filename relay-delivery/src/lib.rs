//! Background delivery of queued mail.
//!
//! The [`Dispatcher`] drains the queue in passes: for each entry it resolves
//! the sender's account, performs the authentication gate when the shared
//! [`GateCache`] says it is due, and hands the mail to an
//! [`UpstreamTransport`]. Failures are either retried on the next pass or
//! discarded, depending on [`DeliveryConfig::delete_on_error`].

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod smtp_transaction;
pub mod transport;

pub use config::DeliveryConfig;
pub use dispatcher::{Dispatcher, EntryOutcome, PassSummary};
pub use error::DeliveryError;
pub use gate::GateCache;
pub use smtp_transaction::SmtpTransaction;
pub use transport::{NetworkTransport, UpstreamTransport};
