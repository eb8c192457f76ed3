use std::sync::Arc;

use relay_common::{AccountDirectory, Signal, internal};
use relay_spool::{BackingStore, QueueEntryId, SpoolError};
use tokio::sync::broadcast::Receiver;

use crate::{
    config::DeliveryConfig, gate::GateCache, transport::UpstreamTransport,
};

/// What happened to one queue entry during a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Delivered and removed
    Delivered,
    /// Failed and removed because of the discard policy
    Discarded,
    /// Failed and left for the next pass
    Retained,
    /// Vanished between listing and loading
    Skipped,
}

/// Tally of one pass over the queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub delivered: usize,
    pub discarded: usize,
    pub retained: usize,
    pub skipped: usize,
    /// The pass stopped early because the authentication gate failed
    pub aborted: bool,
}

impl PassSummary {
    const fn record(&mut self, outcome: EntryOutcome) {
        match outcome {
            EntryOutcome::Delivered => self.delivered += 1,
            EntryOutcome::Discarded => self.discarded += 1,
            EntryOutcome::Retained => self.retained += 1,
            EntryOutcome::Skipped => self.skipped += 1,
        }
    }
}

enum Step {
    Continue(EntryOutcome),
    Abort(EntryOutcome),
}

/// Drains the queue in passes until shut down
#[derive(Debug)]
pub struct Dispatcher {
    config: DeliveryConfig,
    accounts: Arc<AccountDirectory>,
    spool: Arc<dyn BackingStore>,
    transport: Arc<dyn UpstreamTransport>,
    gate_cache: Arc<GateCache>,
}

impl Dispatcher {
    pub fn new(
        config: DeliveryConfig,
        accounts: Arc<AccountDirectory>,
        spool: Arc<dyn BackingStore>,
        transport: Arc<dyn UpstreamTransport>,
    ) -> Self {
        Self {
            config,
            accounts,
            spool,
            transport,
            gate_cache: Arc::new(GateCache::new()),
        }
    }

    /// Share an existing gate cache instead of starting with an empty one
    #[must_use]
    pub fn with_gate_cache(mut self, gate_cache: Arc<GateCache>) -> Self {
        self.gate_cache = gate_cache;
        self
    }

    pub fn gate_cache(&self) -> &Arc<GateCache> {
        &self.gate_cache
    }

    /// Apply the failure policy to an entry
    async fn fail(&self, id: &QueueEntryId) -> EntryOutcome {
        if !self.config.delete_on_error {
            internal!(level = INFO, "Keeping {id} for the next pass");
            return EntryOutcome::Retained;
        }

        internal!(level = WARN, "Can't process mail. Removing {id}");
        match self.spool.remove(id).await {
            Ok(()) => EntryOutcome::Discarded,
            Err(err) => {
                internal!(level = ERROR, "Unable to remove {id}: {err}");
                EntryOutcome::Retained
            }
        }
    }

    async fn process(&self, id: &QueueEntryId) -> Step {
        let mail = match self.spool.load(id).await {
            Ok(mail) => mail,
            Err(SpoolError::NotFound(_)) => {
                internal!(level = DEBUG, "Entry {id} disappeared before loading");
                return Step::Continue(EntryOutcome::Skipped);
            }
            Err(err) => {
                internal!(level = ERROR, "Reading mail {id} failed: {err}");
                return Step::Continue(self.fail(id).await);
            }
        };

        let account = match self.accounts.resolve(mail.sender()) {
            Ok(account) => account,
            Err(err) => {
                internal!(level = ERROR, "{err} ({id})");
                return Step::Continue(self.fail(id).await);
            }
        };

        if let Some(gate) = &account.gate
            && self.gate_cache.is_due(gate.recheck_interval)
        {
            if let Err(err) = self.transport.authenticate_gate(gate).await {
                internal!(level = ERROR, "{err} ({id})");
                return Step::Abort(self.fail(id).await);
            }

            self.gate_cache.stamp();
            tokio::time::sleep(self.config.wait_after_gate()).await;
        }

        match self.transport.deliver(&account, &mail).await {
            Ok(()) => match self.spool.remove(id).await {
                Ok(()) => {
                    internal!(level = INFO, "Delivered {id}, removed from queue");
                    Step::Continue(EntryOutcome::Delivered)
                }
                Err(err) => {
                    internal!(
                        level = ERROR,
                        "Delivered {id} but could not remove it, it will be sent again: {err}"
                    );
                    Step::Continue(EntryOutcome::Delivered)
                }
            },
            Err(err) => {
                internal!(level = ERROR, "{err} ({id})");
                Step::Continue(self.fail(id).await)
            }
        }
    }

    /// One pass over a snapshot of the queue
    ///
    /// A failed gate handshake ends the pass after applying the failure
    /// policy to the entry that triggered it.
    pub async fn run_pass(&self) -> PassSummary {
        let mut summary = PassSummary::default();

        let ids = match self.spool.list().await {
            Ok(ids) => ids,
            Err(err) => {
                internal!(level = ERROR, "Unable to list queue: {err}");
                return summary;
            }
        };

        for id in ids {
            match self.process(&id).await {
                Step::Continue(outcome) => summary.record(outcome),
                Step::Abort(outcome) => {
                    summary.record(outcome);
                    summary.aborted = true;
                    break;
                }
            }
        }

        if summary != PassSummary::default() {
            internal!(level = DEBUG, "Pass finished: {summary:?}");
        }

        summary
    }

    /// Run passes forever, sleeping between them
    ///
    /// A shutdown signal is honoured between passes; a pass in progress runs
    /// to completion.
    pub async fn serve(&self, mut shutdown: Receiver<Signal>) {
        internal!(
            level = INFO,
            "Dispatcher starting, polling every {}s",
            self.config.sleep_time_secs
        );

        loop {
            self.run_pass().await;

            tokio::select! {
                () = tokio::time::sleep(self.config.sleep_time()) => {}
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown | Signal::Finalised) => {
                            internal!("Dispatcher received shutdown signal");
                        }
                        Err(err) => {
                            internal!(level = ERROR, "Dispatcher shutdown channel error: {err}");
                        }
                    }
                    break;
                }
            }
        }

        internal!("Dispatcher shutdown complete");
    }
}
