use std::path::{Path, PathBuf};

use anyhow::Result;
use cellchain_core::PubKey;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod node;
mod snapshot;
mod txgen;

use cli::{Cli, Commands, SnapshotCommands};
use config::{generate_sample_config, NodeConfig};
use node::Node;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, blocks } => {
            run_node(config, blocks)?;
        }
        Commands::Init { output } => {
            init_logging("info");
            init_config(&output)?;
        }
        Commands::Keygen { output } => {
            init_logging("info");
            generate_key(output)?;
        }
        Commands::Txgen { command } => {
            init_logging("info");
            txgen::handle_txgen(command)?;
        }
        Commands::Snapshot { command } => {
            init_logging("warn");
            match command {
                SnapshotCommands::Inspect { path } => snapshot::inspect(&path)?,
            }
        }
    }

    Ok(())
}

/// Install the fmt subscriber; `RUST_LOG` wins over `default_level`
fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Open the node state and replay a blocks file into it
fn run_node(config_path: PathBuf, blocks: Option<PathBuf>) -> Result<()> {
    if !config_path.exists() {
        init_logging("info");
        error!(
            "Configuration file not found: {:?}. Run 'cellchain init' to create one.",
            config_path
        );
        return Err(anyhow::anyhow!("Configuration file not found"));
    }
    let config = NodeConfig::load(&config_path)?;
    init_logging(&config.log_level);
    info!("Loaded configuration from {:?}", config_path);

    let mut node = Node::open(config)?;
    match blocks {
        Some(path) => {
            let blocks = txgen::read_blocks(&path)?;
            info!(blocks = blocks.len(), "replaying {:?}", path);
            let receipts = node.replay(&blocks)?;
            for receipt in &receipts {
                println!("{}", serde_json::to_string(receipt)?);
            }
        }
        None => {
            info!(height = node.height(), "no blocks to replay");
        }
    }

    println!("height: {}", node.height());
    println!("state root: {}", node.state_root()?);
    for (key, votes) in node.executor().host().system.elected() {
        println!("validator {} votes {}", key, votes);
    }
    Ok(())
}

/// Initialize a new configuration file
fn init_config(output: &Path) -> Result<()> {
    info!("Generating sample configuration");

    let config = generate_sample_config();
    config.save(output)?;

    info!("Configuration saved to {:?}", output);
    for key in &config.genesis.initial_validators {
        info!("  Initial validator: {}", key);
    }

    println!("\nConfiguration file created: {}", output.display());
    println!("Edit the file to customize your node settings.");
    println!("\nTo replay blocks, run:");
    println!("  cellchain run --config {} --blocks blocks.json", output.display());

    Ok(())
}

/// Generate a random validator key
fn generate_key(output: Option<PathBuf>) -> Result<()> {
    let key = PubKey::random();

    println!("Generated validator key:");
    println!("  Public key: {}", key.to_hex());
    println!("  Address:    {}", key.address().to_hex());

    if let Some(path) = output {
        std::fs::write(&path, key.to_hex())?;
        info!("Key saved to {:?}", path);
    }

    Ok(())
}
