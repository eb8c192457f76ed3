use std::sync::Arc;

use anyhow::Context as _;
use relay_common::{AccountDirectory, Signal, internal, logging};
use relay_delivery::{DeliveryConfig, Dispatcher, GateCache, NetworkTransport, UpstreamTransport};
use relay_spool::BackingStore;
use tokio::sync::broadcast;

use crate::{
    chain::ProcessingChain,
    config::RelayConfig,
    intake::{IntakeContext, IntakeSession},
};

/// Everything the relay runs: intake, the queue and the dispatcher
///
/// The account directory, spool and gate cache are shared between intake
/// sessions and the dispatcher.
#[derive(Debug)]
pub struct Relay {
    intake: Arc<IntakeContext>,
    accounts: Arc<AccountDirectory>,
    spool: Arc<dyn BackingStore>,
    delivery: DeliveryConfig,
    gate_cache: Arc<GateCache>,
}

impl Relay {
    pub fn new(
        identity: impl Into<String>,
        chain: ProcessingChain,
        accounts: AccountDirectory,
        spool: Arc<dyn BackingStore>,
        delivery: DeliveryConfig,
    ) -> Self {
        let accounts = Arc::new(accounts);

        Self {
            intake: Arc::new(IntakeContext::new(
                identity,
                chain,
                Arc::clone(&accounts),
                Arc::clone(&spool),
            )),
            accounts,
            spool,
            delivery,
            gate_cache: Arc::new(GateCache::new()),
        }
    }

    /// Validate the accounts, prepare the queue and register the plugins
    ///
    /// # Errors
    /// If an account is misconfigured or the queue cannot be initialised
    pub fn from_config(config: RelayConfig) -> anyhow::Result<Self> {
        let accounts = AccountDirectory::from_config(config.accounts)?;
        internal!(level = INFO, "Loaded {} account(s)", accounts.len());

        let spool = config
            .spool
            .into_backing_store()
            .context("Unable to initialise the queue")?;

        let chain = ProcessingChain::from_config(config.plugins);

        Ok(Self::new(
            config.relay.identity,
            chain,
            accounts,
            spool,
            config.delivery,
        ))
    }

    /// A fresh intake session for one submission
    pub fn session(&self) -> IntakeSession {
        self.intake.session()
    }

    pub const fn spool(&self) -> &Arc<dyn BackingStore> {
        &self.spool
    }

    pub const fn accounts(&self) -> &Arc<AccountDirectory> {
        &self.accounts
    }

    pub fn chain(&self) -> &ProcessingChain {
        self.intake.chain()
    }

    /// A dispatcher sharing this relay's queue, accounts and gate cache
    pub fn dispatcher(&self, transport: Arc<dyn UpstreamTransport>) -> Dispatcher {
        Dispatcher::new(
            self.delivery.clone(),
            Arc::clone(&self.accounts),
            Arc::clone(&self.spool),
            transport,
        )
        .with_gate_cache(Arc::clone(&self.gate_cache))
    }

    /// Run the dispatcher until SIGINT or SIGTERM
    ///
    /// The pass in progress when the signal arrives is allowed to finish.
    ///
    /// # Errors
    /// If the signal handlers cannot be installed
    pub async fn run(self) -> anyhow::Result<()> {
        internal!(level = INFO, "Relay running");

        let (sender, receiver) = broadcast::channel(16);
        let dispatcher =
            self.dispatcher(Arc::new(NetworkTransport::new(self.delivery.timeouts)));

        let serve = dispatcher.serve(receiver);
        tokio::pin!(serve);

        let signalled = tokio::select! {
            () = &mut serve => false,
            result = wait_for_signal() => {
                result?;
                true
            }
        };

        if signalled {
            if let Err(err) = sender.send(Signal::Shutdown) {
                internal!(level = WARN, "Dispatcher already gone: {err}");
            }
            serve.await;
        }

        internal!(level = INFO, "Shutting down...");
        Ok(())
    }
}

async fn wait_for_signal() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            internal!(level = INFO, "CTRL+C entered, finishing the current pass");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate signal received, finishing the current pass");
        }
    };

    Ok(())
}

/// Load the configuration and install the log subscriber
///
/// # Errors
/// If no configuration file can be found or it fails to load
pub fn bootstrap(explicit: Option<std::path::PathBuf>) -> anyhow::Result<RelayConfig> {
    let path = RelayConfig::locate(explicit).context(
        "No configuration file found (use --config, RELAY_CONFIG, ./relay.toml or /etc/relay/relay.toml)",
    )?;

    let config = RelayConfig::load(&path)?;
    logging::init(&config.logging).context("Unable to open the log file")?;
    internal!(level = INFO, "Using configuration {}", path.display());

    Ok(config)
}
