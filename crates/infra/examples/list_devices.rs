//! Example: Listing homes, devices and node temperatures
//!
//! Walks every home on the account and prints the status of each node.
//!
//! # Setup
//!
//! 1. Provide credentials through `HELKI_*` environment variables or a
//!    `helki.toml` / `helki.json` file in the working directory.
//!
//! 2. Run this example: ```bash RUST_LOG=helki_infra=debug cargo run
//!    --example list_devices ```

use anyhow::Context;
use helki_infra::{config, HelkiClient};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::load().context("no usable Helki configuration")?;
    let client = HelkiClient::from_config(&config)?;

    println!("Helki devices");
    println!("=============\n");

    for home in client.get_grouped_devices().await? {
        println!("{} ({} devices)", home.name, home.devs.len());

        for device in &home.devs {
            println!("  {} [{}] firmware {}", device.name, device.dev_id, device.fw_version);

            for node in client.get_nodes(&device.dev_id).await? {
                if !node.is_reachable() {
                    println!("    {}: unreachable", node.label());
                    continue;
                }

                match client.get_status(&device.dev_id, &node).await {
                    Ok(status) => println!(
                        "    {}: {:?}, {} -> {} {:?}{}",
                        node.label(),
                        status.mode,
                        status.mtemp,
                        status.stemp,
                        status.units,
                        if status.is_heating() { " (heating)" } else { "" }
                    ),
                    Err(e) => println!("    {}: {e}", node.label()),
                }
            }
        }
    }

    if let Some(tokens) = client.token_manager() {
        if let Some(secs) = tokens.seconds_until_expiry().await {
            println!("\nToken valid for another {secs}s");
        }
    }

    Ok(())
}
