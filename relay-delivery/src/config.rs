use std::time::Duration;

use relay_transport::ClientTimeouts;
use serde::Deserialize;

const fn default_sleep_time() -> u64 {
    30
}

const fn default_wait_after_gate() -> u64 {
    5
}

const fn default_delete_on_error() -> bool {
    true
}

/// The `[delivery]` section of the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeliveryConfig {
    /// Pause between two passes over the queue (in seconds)
    ///
    /// Default: 30
    #[serde(default = "default_sleep_time")]
    pub sleep_time_secs: u64,

    /// Settle time after a successful gate handshake, before delivering
    /// (in seconds)
    ///
    /// Default: 5
    #[serde(default = "default_wait_after_gate")]
    pub wait_after_gate_secs: u64,

    /// Remove an entry after a failed delivery instead of retrying it on
    /// the next pass
    ///
    /// Default: `true`
    #[serde(default = "default_delete_on_error")]
    pub delete_on_error: bool,

    /// Timeouts for upstream and gate connections
    #[serde(default)]
    pub timeouts: ClientTimeouts,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            sleep_time_secs: default_sleep_time(),
            wait_after_gate_secs: default_wait_after_gate(),
            delete_on_error: default_delete_on_error(),
            timeouts: ClientTimeouts::default(),
        }
    }
}

impl DeliveryConfig {
    #[must_use]
    pub const fn sleep_time(&self) -> Duration {
        Duration::from_secs(self.sleep_time_secs)
    }

    #[must_use]
    pub const fn wait_after_gate(&self) -> Duration {
        Duration::from_secs(self.wait_after_gate_secs)
    }
}
