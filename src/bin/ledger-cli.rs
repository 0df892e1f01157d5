#![forbid(unsafe_code)]
//! Inspect and write to an OpenLedger database

use clap::{Parser, Subcommand};
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use openledger::config::{load_config, LedgerConfig};
use openledger::transaction::Transaction;
use openledger::{get_ledger_with_config, Ledger};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a ledger.toml; defaults to $OPENLEDGER_CONFIG or ./ledger.toml
    #[arg(long, global = true)]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shows chain height, tip and state hashes
    Status,
    /// Lists the most recent blocks
    Blocks {
        /// Number of blocks to show
        #[arg(long, default_value_t = 10)]
        limit: u64,
    },
    /// Sets a key in a single-transaction batch and commits it
    Put {
        key: String,
        value: String,
        /// Batch id; defaults to a timestamp-based id
        #[arg(long)]
        batch: Option<String>,
    },
    /// Deletes a key in a single-transaction batch and commits it
    Delete {
        key: String,
        #[arg(long)]
        batch: Option<String>,
    },
    /// Reads a committed key
    Get { key: String },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => LedgerConfig::from_file(path)?,
        None => load_config()?,
    };
    let ledger = get_ledger_with_config(&config)?;

    match &cli.command {
        Commands::Status => status(ledger)?,
        Commands::Blocks { limit } => blocks(ledger, *limit)?,
        Commands::Put { key, value, batch } => {
            let payload = format!("put {}={}", key, value).into_bytes();
            run_batch(ledger, batch.as_deref(), payload, |l| l.set_state(key, value.as_bytes().to_vec()))?
        }
        Commands::Delete { key, batch } => {
            let payload = format!("delete {}", key).into_bytes();
            run_batch(ledger, batch.as_deref(), payload, |l| l.delete_state(key))?
        }
        Commands::Get { key } => match ledger.get_state(key, true)? {
            Some(value) => println!("{} = {}", key.bright_white(), String::from_utf8_lossy(&value).bright_green()),
            None => println!("{}", format!("{} is not set", key).yellow()),
        },
    }

    Ok(())
}

fn status(ledger: &Ledger) -> Result<(), Box<dyn std::error::Error>> {
    let height = ledger.blockchain_height();
    let tip = match height.checked_sub(1) {
        Some(last) => ledger.get_block(last)?.map(|b| hex::encode(b.hash())),
        None => None,
    };

    println!("{}", "OpenLedger status".bright_cyan().bold());
    println!("{}", "-----------------".bright_cyan());
    println!("Height:      {}", height.to_string().bright_white());
    println!("Tip:         {}", tip.unwrap_or_else(|| "none".to_string()).bright_white());
    println!("State hash:  {}", hex::encode(ledger.get_state_hash()?).bright_white());
    println!("Proposer:    {}", ledger.proposer_id().bright_white());
    Ok(())
}

fn blocks(ledger: &Ledger, limit: u64) -> Result<(), Box<dyn std::error::Error>> {
    let height = ledger.blockchain_height();
    if height == 0 {
        println!("{}", "No blocks committed yet.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Height").add_attribute(Attribute::Bold),
            Cell::new("Hash").add_attribute(Attribute::Bold),
            Cell::new("Txs").add_attribute(Attribute::Bold),
            Cell::new("State hash").add_attribute(Attribute::Bold),
            Cell::new("Time").add_attribute(Attribute::Bold),
        ]);

    for h in (height.saturating_sub(limit)..height).rev() {
        if let Some(block) = ledger.get_block(h)? {
            let time = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(block.header.timestamp as i64)
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default();
            table.add_row(vec![
                Cell::new(h),
                Cell::new(&hex::encode(block.hash())[..16]),
                Cell::new(block.transactions.len()),
                Cell::new(&hex::encode(block.header.state_hash)[..16]),
                Cell::new(time),
            ]);
        }
    }

    println!("{table}");
    Ok(())
}

fn run_batch<F>(
    ledger: &Ledger,
    batch: Option<&str>,
    payload: Vec<u8>,
    execute: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(&Ledger) -> openledger::Result<()>,
{
    let batch_id = batch
        .map(str::to_string)
        .unwrap_or_else(|| format!("cli-{}", chrono::Utc::now().timestamp_millis()));

    ledger.begin_tx_batch(batch_id.as_str())?;
    if let Err(e) = execute(ledger) {
        ledger.rollback_tx_batch(batch_id.as_str())?;
        return Err(e.into());
    }

    let tx = Transaction::new(batch_id.clone(), payload);
    match ledger.commit_tx_batch(batch_id.as_str(), vec![tx], Vec::new()) {
        Ok(height) => {
            println!("{}", format!("Committed batch {} as block {}", batch_id, height).bright_green());
            Ok(())
        }
        Err(e) => {
            ledger.rollback_tx_batch(batch_id.as_str())?;
            Err(e.into())
        }
    }
}
