//! CLI commands module.

use anyhow::Result;
use clap::Subcommand;

mod chain;
mod node;
mod tracker;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the peer registry
    Tracker(tracker::TrackerArgs),
    /// Run a node
    Node(node::NodeArgs),
    /// Inspect a persisted ledger
    Chain(chain::ChainArgs),
}

pub async fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Tracker(args) => tracker::run(args).await,
        Commands::Node(args) => node::run(args).await,
        Commands::Chain(args) => chain::run(args),
    }
}
