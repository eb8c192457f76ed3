//! The relay daemon: delivers queued mail until interrupted

use std::path::PathBuf;

use clap::Parser;
use relay::{Relay, bootstrap};

#[derive(Parser, Debug)]
#[command(name = "relayd")]
#[command(about = "Store-and-forward SMTP relay", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file (default: $RELAY_CONFIG, ./relay.toml,
    /// /etc/relay/relay.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = bootstrap(cli.config)?;
    Relay::from_config(config)?.run().await
}
