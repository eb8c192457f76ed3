//! Error types for the transport clients.

use std::{io, time::Duration};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// The server answered a command with a non-success status.
    #[error("{command} rejected: {code} {message}")]
    Rejected {
        command: String,
        code: u16,
        message: String,
    },

    /// Every offered authentication mechanism was refused.
    #[error("Authentication failed: {code} {message}")]
    AuthenticationFailed { code: u16, message: String },

    /// The POP3 server replied with `-ERR`.
    #[error("POP3 {command} failed: {message}")]
    Pop3 { command: String, message: String },

    #[error("TLS error: {0}")]
    TlsError(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: String,
        after: Duration,
    },

    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    #[error("UTF-8 error: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
