//! Inspect a persisted ledger.

use anyhow::{Context, Result};
use blockbard_chain::Blockchain;
use blockbard_core::{block::format_timestamp, Block};
use blockbard_node::ContentRecord;
use blockbard_storage::{ChainStore, Storage};
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct ChainArgs {
    #[command(subcommand)]
    command: ChainCommand,
}

#[derive(Subcommand)]
enum ChainCommand {
    /// List the most recent blocks
    List {
        /// Node data directory
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,

        /// Number of blocks to show
        #[arg(short, long, default_value = "10")]
        count: usize,
    },
    /// Show one block in detail
    Info {
        /// Node data directory
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,

        /// Block index or hash
        block_id: String,
    },
}

pub fn run(args: ChainArgs) -> Result<()> {
    match args.command {
        ChainCommand::List { data_dir, count } => list_blocks(&data_dir, count),
        ChainCommand::Info { data_dir, block_id } => show_block_info(&data_dir, &block_id),
    }
}

fn load_ledger(data_dir: &Path) -> Result<Blockchain> {
    let storage = Storage::open(data_dir).with_context(|| {
        format!(
            "Failed to open {:?}. Is a node still running on it?",
            data_dir
        )
    })?;

    ChainStore::new(&storage)
        .load_ledger()
        .context("Failed to read ledger snapshot")?
        .with_context(|| format!("No ledger snapshot in {:?}", data_dir))
}

fn list_blocks(data_dir: &Path, count: usize) -> Result<()> {
    let ledger = load_ledger(data_dir)?;

    println!();
    println!(
        "{} {}",
        "Recent Blocks:".bold().cyan(),
        format!("(difficulty {})", ledger.difficulty()).bright_black()
    );
    println!();

    for block in ledger.blocks().iter().rev().take(count) {
        println!(
            "  {} {} {} {}",
            format!("#{}", block.index).bright_black(),
            block.hash.get(..16).unwrap_or(&block.hash).bright_yellow(),
            block.author.as_deref().unwrap_or("-").bright_cyan(),
            preview(&text_of(block), 48)
        );
    }

    println!();
    Ok(())
}

fn show_block_info(data_dir: &Path, block_id: &str) -> Result<()> {
    let ledger = load_ledger(data_dir)?;

    let block = match block_id.parse::<u64>() {
        Ok(index) => ledger
            .get_block(index)
            .with_context(|| format!("Block #{} not found", index))?,
        Err(_) => ledger
            .get_block_by_hash(block_id)
            .with_context(|| format!("Block {} not found", block_id))?,
    };

    print_block(block);
    Ok(())
}

fn print_block(block: &Block) {
    let record = ContentRecord::from_data(&block.data);
    let absent = || "-".bright_black().to_string();

    println!();
    println!("{}", "Block Information:".bold().cyan());
    println!();
    println!("  Index:          {}", block.index.to_string().bright_cyan());
    println!("  Hash:           {}", block.hash.bright_yellow());
    println!("  Previous Hash:  {}", block.previous_hash.bright_black());
    println!(
        "  Timestamp:      {}",
        format_timestamp(block.timestamp).bright_black()
    );
    println!("  Nonce:          {}", block.nonce.to_string().bright_black());
    println!(
        "  Author:         {}",
        block
            .author
            .as_deref()
            .map(|a| a.bright_cyan().to_string())
            .unwrap_or_else(absent)
    );
    println!(
        "  Position:       {}",
        block
            .position_hash
            .as_deref()
            .map(|h| h.bright_black().to_string())
            .unwrap_or_else(absent)
    );
    println!(
        "  Prev Position:  {}",
        block
            .previous_position_hash
            .as_deref()
            .map(|h| h.bright_black().to_string())
            .unwrap_or_else(absent)
    );
    if let Some(position) = record.as_ref().and_then(|r| r.position.as_ref()) {
        println!("  Place:          {}", position.canonical_json().bright_cyan());
    }
    println!();
    println!("  {}", text_of(block));
    println!();
}

/// The readable text of a block: the content of a content record, or the
/// raw payload otherwise.
fn text_of(block: &Block) -> String {
    ContentRecord::from_data(&block.data)
        .map(|record| record.content)
        .unwrap_or_else(|| block.data.clone())
}

fn preview(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let cut: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", cut)
}
