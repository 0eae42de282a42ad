//! blockbard CLI entry point.

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "blockbard")]
#[command(about = "A peer-to-peer proof-of-work ledger for collaborative writing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<commands::Commands>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "blockbard=info".into()))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(cmd) => {
            if let Err(e) = commands::run(cmd).await {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("blockbard - a peer-to-peer proof-of-work ledger");
            println!("Run 'blockbard --help' for usage information.");
        }
    }
}
