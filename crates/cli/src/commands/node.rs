//! Run a node.

use anyhow::{Context, Result};
use blockbard_node::{ContentSource, Node, NodeConfig, VerseNarrator};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Args)]
pub struct NodeArgs {
    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on for peers
    #[arg(short, long)]
    listen: Option<String>,

    /// Tracker address
    #[arg(short, long)]
    tracker: Option<String>,

    /// Identifier advertised to peers (defaults to the bound address)
    #[arg(long)]
    node_id: Option<String>,

    /// Difficulty of a fresh ledger
    #[arg(long)]
    difficulty: Option<usize>,

    /// Directory for ledger snapshots
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Only listen and sync; do not mine
    #[arg(long)]
    no_mine: bool,
}

impl NodeArgs {
    fn into_config(self) -> Result<(NodeConfig, bool)> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_file(path)
                .with_context(|| format!("Failed to load config {:?}", path))?,
            None => NodeConfig::default(),
        };

        if let Some(listen) = self.listen {
            config.listen_addr = listen;
        }
        if let Some(tracker) = self.tracker {
            config.tracker_addr = tracker;
        }
        if self.node_id.is_some() {
            config.node_id = self.node_id;
        }
        if let Some(difficulty) = self.difficulty {
            config.initial_difficulty = difficulty;
        }
        if self.data_dir.is_some() {
            config.data_dir = self.data_dir;
        }

        Ok((config, !self.no_mine))
    }
}

pub async fn run(args: NodeArgs) -> Result<()> {
    let (config, mine) = args.into_config()?;
    let source: Option<Box<dyn ContentSource>> = if mine {
        Some(Box::new(VerseNarrator::new()))
    } else {
        None
    };

    let node = Node::start(config.clone(), source)
        .await
        .with_context(|| format!("Failed to start node on {}", config.listen_addr))?;

    println!("{}", "Node running".bold().cyan());
    println!();
    println!("  Node ID:    {}", node.node_id().bright_yellow());
    println!("  Tracker:    {}", config.tracker_addr.bright_black());
    println!(
        "  Blocks:     {}",
        node.chain_length().await.to_string().bright_cyan()
    );
    println!(
        "  Mining:     {}",
        if mine { "on".green() } else { "off".bright_black() }
    );
    if let Some(dir) = &config.data_dir {
        println!("  Data dir:   {}", dir.display().to_string().bright_black());
    }
    println!();
    println!("{}", "Press Ctrl+C to stop.".bright_black());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    println!();
    let length = node.chain_length().await;
    node.shutdown().await.context("Node did not shut down cleanly")?;
    println!(
        "{}  Stopped with {} blocks",
        "✓".green().bold(),
        length.to_string().bright_cyan()
    );
    Ok(())
}
