//! CLI for batchpub
//!
//! Subcommands:
//! - `publish`: publish stdin lines through a batch publisher backed by the
//!   in-memory client (useful for smoke tests of batching settings)
//! - `config`: print the effective configuration

use std::sync::Arc;

use batchpub::config::{Settings, load_config};
use batchpub::utils::logging;
use batchpub::{BatchPublisher, ClientError, MemoryClient, Message};
use clap::Parser;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "batchpub")]
enum Command {
    /// Publish every line read from stdin as one message
    Publish {
        /// Topic the messages are published to
        #[arg(long, default_value = "projects/local/topics/batchpub")]
        topic: String,
        /// Attribute attached to every message, as key=value (repeatable)
        #[arg(long = "attribute", value_parser = parse_attribute)]
        attributes: Vec<(String, String)>,
        /// Make the in-memory client reject every batch
        #[arg(long)]
        fail: bool,
    },
    /// Print the effective configuration as JSON
    Config,
}

fn parse_attribute(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cmd = Command::parse();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {}", e);
            std::process::exit(2);
        }
    };
    logging::init(&settings.logging.level);

    let outcome = match cmd {
        Command::Publish {
            topic,
            attributes,
            fail,
        } => run_publish(&settings, topic, attributes, fail).await,
        Command::Config => print_config(&settings),
    };

    if let Err(e) = outcome {
        error!("batchpub failed: {}", e);
        std::process::exit(1);
    }
}

async fn run_publish(
    settings: &Settings,
    topic: String,
    attributes: Vec<(String, String)>,
    fail: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = Arc::new(MemoryClient::new());
    if fail {
        client.fail_with(ClientError::Rejected("--fail was given".to_string()));
    }
    let publisher = BatchPublisher::from_settings(topic, client.clone(), settings);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut submitted = 0usize;

    while let Some(line) = lines.next_line().await? {
        let message = Message::from(line).with_attributes(attributes.iter().cloned());
        let tx = tx.clone();
        publisher
            .publish_with_callback(message, move |result| {
                let _ = tx.send(result);
            })
            .await?;
        submitted += 1;
    }
    drop(tx);

    publisher.shutdown(None).await;

    let mut failed = 0usize;
    while let Some(result) = rx.recv().await {
        let line = match &result.outcome {
            Ok(id) => json!({ "message_id": id, "bytes": result.message.data.len() }),
            Err(e) => {
                failed += 1;
                json!({ "error": e.to_string(), "bytes": result.message.data.len() })
            }
        };
        println!("{line}");
    }

    info!(
        submitted,
        failed,
        batches = client.batch_sizes().len(),
        "publish finished"
    );
    Ok(())
}

fn print_config(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(settings)?);
    Ok(())
}
