//! Subcommand implementations.

use anyhow::{bail, Context, Result};
use courier::{handler, Connector};
use serde_json::Value;
use tracing::info;

/// Parse a command-line value into the JSON carried by the message.
pub fn parse_value(raw: &str, as_string: bool) -> Result<Value> {
    if as_string {
        return Ok(Value::String(raw.to_string()));
    }
    serde_json::from_str(raw)
        .with_context(|| format!("VALUE is not valid JSON (use --string for plain text): {}", raw))
}

pub async fn publish(
    connector: &Connector,
    topic: &str,
    key: &str,
    raw: &str,
    as_string: bool,
) -> Result<()> {
    let value = parse_value(raw, as_string)?;
    connector
        .publish(topic, key, value)
        .await
        .with_context(|| format!("Failed to publish to '{}'", topic))?;
    info!(topic, key, "Published");
    Ok(())
}

pub async fn listen(connector: &Connector, topics: &[String]) -> Result<()> {
    if topics.is_empty() {
        bail!("No topics given and polling.topics is empty");
    }

    for topic in topics {
        let name = topic.clone();
        connector
            .register_topic(
                topic,
                handler(move |key: &str, value: Value| {
                    println!("{}\t{}\t{}", name, key, value);
                }),
            )
            .await
            .with_context(|| format!("Failed to subscribe to '{}'", topic))?;
    }

    connector.start()?;
    info!(topics = ?topics, "Listening, Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for Ctrl-C")?;

    info!("Shutting down");
    connector.shutdown().await;
    Ok(())
}
