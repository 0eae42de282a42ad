//! Run the peer registry.

use anyhow::{Context, Result};
use blockbard_tracker::{TrackerConfig, TrackerServer};
use clap::Args;
use colored::Colorize;

#[derive(Args)]
pub struct TrackerArgs {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:8000")]
    listen: String,

    /// Milliseconds a client has to send its command
    #[arg(long, default_value = "5000")]
    read_timeout_ms: u64,
}

pub async fn run(args: TrackerArgs) -> Result<()> {
    let config = TrackerConfig {
        listen_addr: args.listen,
        read_timeout_ms: args.read_timeout_ms,
    };

    let server = TrackerServer::bind(&config)
        .await
        .with_context(|| format!("Failed to bind tracker on {}", config.listen_addr))?;
    let registry = server.registry();

    println!(
        "{}  Tracker listening on {}",
        "✓".green().bold(),
        server.local_addr()?.to_string().bright_yellow()
    );
    println!("{}", "Press Ctrl+C to stop.".bright_black());

    tokio::select! {
        result = server.run() => result.context("Tracker stopped")?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            println!();
            println!(
                "Stopping tracker with {} registered peer(s)",
                registry.len().await.to_string().bright_cyan()
            );
        }
    }

    Ok(())
}
