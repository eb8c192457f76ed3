use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Time of the last successful gate handshake
///
/// One cell for the whole process, shared by every gated account: a
/// handshake for any account defers the next one for all of them.
#[derive(Debug, Default)]
pub struct GateCache {
    last_check: Mutex<Option<Instant>>,
}

impl GateCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether at least `interval` has passed since the last handshake
    pub fn is_due(&self, interval: Duration) -> bool {
        let last_check = *self.last_check.lock();
        last_check.is_none_or(|last| last.elapsed() >= interval)
    }

    /// Record a successful handshake now
    pub fn stamp(&self) {
        *self.last_check.lock() = Some(Instant::now());
    }

    pub fn last_check(&self) -> Option<Instant> {
        *self.last_check.lock()
    }
}
