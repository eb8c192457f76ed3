//! Command-line utility for the relay
//!
//! - Submitting a mail through the same intake path the relay uses
//! - Listing, viewing and deleting queued mail

use std::{io::Read, path::PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use relay::{Relay, RelayConfig, bootstrap};
use relay_spool::{BackingStore, QueueEntryId};

/// Command-line utility for the relay
#[derive(Parser, Debug)]
#[command(name = "relayctl")]
#[command(about = "Submit mail to and inspect the relay queue", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file (default: $RELAY_CONFIG, ./relay.toml,
    /// /etc/relay/relay.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a mail through the processing chain and queue it
    Submit {
        /// Envelope sender
        #[arg(long)]
        from: String,

        /// Envelope recipient (repeatable)
        #[arg(long, required = true)]
        to: Vec<String>,

        /// File holding the raw message, or `-` for stdin
        #[arg(default_value = "-")]
        file: String,
    },
    /// Queue management commands
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
}

#[derive(Subcommand, Debug)]
enum QueueAction {
    /// List queued mail, oldest first
    List,
    /// Show the envelope and text of one queued mail
    View {
        /// Entry ID to view
        id: String,
    },
    /// Remove one mail from the queue without delivering it
    Delete {
        /// Entry ID to delete
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = bootstrap(cli.config)?;
    ensure_durable(&config)?;
    let relay = Relay::from_config(config)?;

    match cli.command {
        Commands::Submit { from, to, file } => cmd_submit(&relay, &from, &to, &file).await,
        Commands::Queue { action } => match action {
            QueueAction::List => cmd_list(relay.spool().as_ref()).await,
            QueueAction::View { id } => cmd_view(relay.spool().as_ref(), &id).await,
            QueueAction::Delete { id } => cmd_delete(relay.spool().as_ref(), &id).await,
        },
    }
}

/// A memory queue would vanish with this process
fn ensure_durable(config: &RelayConfig) -> anyhow::Result<()> {
    if config.spool.path().is_none() {
        anyhow::bail!("relayctl needs a file spool; the configured spool lives in memory");
    }

    Ok(())
}

fn read_message(file: &str) -> anyhow::Result<String> {
    if file == "-" {
        let mut message = String::new();
        std::io::stdin()
            .read_to_string(&mut message)
            .context("Unable to read message from stdin")?;
        Ok(message)
    } else {
        std::fs::read_to_string(file).with_context(|| format!("Unable to read {file}"))
    }
}

async fn cmd_submit(relay: &Relay, from: &str, to: &[String], file: &str) -> anyhow::Result<()> {
    let message = read_message(file)?;

    let mut session = relay.session();
    session.mail_from(from);
    for recipient in to {
        session.rcpt_to(recipient);
    }

    let id = session.data(message).await?;
    println!("{id}");

    Ok(())
}

fn parse_id(id: &str) -> anyhow::Result<QueueEntryId> {
    id.parse()
        .map_err(|err| anyhow::anyhow!("Invalid entry ID {id}: {err}"))
}

fn format_age(id: &QueueEntryId) -> String {
    let created = chrono::DateTime::<chrono::Utc>::from(id.ulid().datetime());
    let age_secs = chrono::Utc::now()
        .signed_duration_since(created)
        .num_seconds()
        .max(0);

    match age_secs {
        0..60 => format!("{age_secs}s"),
        60..3600 => format!("{}m", age_secs / 60),
        3600..86400 => format!("{}h", age_secs / 3600),
        _ => format!("{}d", age_secs / 86400),
    }
}

async fn cmd_list(spool: &dyn BackingStore) -> anyhow::Result<()> {
    let ids = spool.list().await?;

    println!("{:<28} {:<32} {:<8}", "ENTRY ID", "SENDER", "AGE");
    println!("{}", "-".repeat(70));

    for id in &ids {
        let sender = match spool.load(id).await {
            Ok(mail) => mail.sender().to_string(),
            Err(err) => format!("<{err}>"),
        };
        println!("{id:<28} {sender:<32} {:<8}", format_age(id));
    }

    println!("\nTotal: {} message(s)", ids.len());
    Ok(())
}

async fn cmd_view(spool: &dyn BackingStore, id: &str) -> anyhow::Result<()> {
    let id = parse_id(id)?;
    let mail = spool.load(&id).await?;

    println!("Entry ID: {id}");
    println!("Age: {}", format_age(&id));
    println!();
    println!("Envelope:");
    println!("  From: {}", mail.sender());
    println!("  To: {}", mail.recipients().len());
    for recipient in mail.recipients() {
        println!("    - {recipient}");
    }
    println!();
    println!("{}", mail.data());

    Ok(())
}

async fn cmd_delete(spool: &dyn BackingStore, id: &str) -> anyhow::Result<()> {
    let id = parse_id(id)?;
    spool.remove(&id).await?;

    println!("Removed {id}");
    Ok(())
}
