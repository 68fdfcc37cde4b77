//! courierctl - publish to and listen on a courier topic service.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use courier::{Connector, ConnectorConfig};
use courierconf::CourierConfig;

mod commands;
mod telemetry;

#[derive(Parser)]
#[command(name = "courierctl", version, about = "Publish to and listen on a courier topic service")]
struct Cli {
    /// Config file (replaces ./courier.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Service base URL (overrides config)
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Publish one message
    Publish {
        topic: String,
        key: String,
        /// Message value as JSON
        value: String,
        /// Send VALUE as a plain string instead of parsing it as JSON
        #[arg(long)]
        string: bool,
    },
    /// Subscribe and print messages until interrupted
    Listen {
        /// Topics to subscribe (defaults to polling.topics from config)
        topics: Vec<String>,
        /// Sweep period in milliseconds (overrides config)
        #[arg(long)]
        period_ms: Option<u64>,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        CourierConfig::load_from(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(url) = cli.url {
        config.server.url = url;
        config.validate().context("Invalid --url")?;
    }

    telemetry::init(&config.telemetry.log_level)?;

    match cli.command {
        Command::Publish {
            topic,
            key,
            value,
            string,
        } => {
            let connector: Connector =
                Connector::new(connector_config(&config), Default::default());
            commands::publish(&connector, &topic, &key, &value, string).await
        }
        Command::Listen { topics, period_ms } => {
            if let Some(ms) = period_ms {
                config.polling.period_ms = ms;
                config.validate().context("Invalid --period-ms")?;
            }
            let topics = if topics.is_empty() {
                config.polling.topics.clone()
            } else {
                topics
            };
            let connector: Connector =
                Connector::new(connector_config(&config), Default::default());
            commands::listen(&connector, &topics).await
        }
        Command::Config => {
            print!("{}", config.to_toml());
            Ok(())
        }
    }
}

fn connector_config(config: &CourierConfig) -> ConnectorConfig {
    ConnectorConfig::new(config.server.url.clone())
        .with_poll_period(config.poll_period())
        .with_request_timeout(config.request_timeout())
}
