use std::time::Duration;

use serde::{Deserialize, Serialize};

mod defaults {
    pub const fn connect_secs() -> u64 {
        30
    }

    pub const fn command_secs() -> u64 {
        60
    }

    pub const fn data_secs() -> u64 {
        120
    }
}

/// Client-side timeouts shared by every upstream and gate connection
///
/// There is no per-account budget; a hung server stalls the dispatcher for
/// at most these durations per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientTimeouts {
    /// TCP connect plus TLS handshake
    ///
    /// Default: 30 seconds
    #[serde(default = "defaults::connect_secs")]
    pub connect_secs: u64,

    /// Any single command and its reply
    ///
    /// Default: 60 seconds
    #[serde(default = "defaults::command_secs")]
    pub command_secs: u64,

    /// Transmitting the message body and reading the final reply
    ///
    /// Default: 120 seconds
    #[serde(default = "defaults::data_secs")]
    pub data_secs: u64,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: defaults::connect_secs(),
            command_secs: defaults::command_secs(),
            data_secs: defaults::data_secs(),
        }
    }
}

impl ClientTimeouts {
    #[must_use]
    pub const fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    #[must_use]
    pub const fn command(&self) -> Duration {
        Duration::from_secs(self.command_secs)
    }

    #[must_use]
    pub const fn data(&self) -> Duration {
        Duration::from_secs(self.data_secs)
    }
}

/// Run `future`, mapping an elapsed deadline to [`crate::ClientError::Timeout`]
pub(crate) async fn within<T>(
    after: Duration,
    operation: &str,
    future: impl Future<Output = crate::Result<T>>,
) -> crate::Result<T> {
    tokio::time::timeout(after, future)
        .await
        .map_err(|_| crate::ClientError::Timeout {
            operation: operation.to_string(),
            after,
        })?
}
