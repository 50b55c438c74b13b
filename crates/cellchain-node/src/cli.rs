use std::path::PathBuf;

use cellchain_core::{parse_amount, Address, PubKey, U256};
use clap::{Parser, Subcommand};

/// Cellchain - contract execution node
#[derive(Parser)]
#[command(name = "cellchain")]
#[command(about = "Cellchain node and utilities")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open (or create) the node state and replay blocks into it
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,

        /// JSON file holding an array of blocks to execute
        #[arg(short, long)]
        blocks: Option<PathBuf>,
    },

    /// Initialize a new node configuration
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Generate a random validator key
    Keygen {
        /// Output file for the key
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate unsigned transactions and blocks for testing
    Txgen {
        #[command(subcommand)]
        command: TxGenCommands,
    },

    /// Snapshot utilities
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommands,
    },
}

#[derive(Subcommand)]
pub enum SnapshotCommands {
    /// Print the state root and validator set of a snapshot file
    Inspect {
        /// Snapshot file
        #[arg(short, long, default_value = "cellchain-data/state.bin")]
        path: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum TxGenCommands {
    /// Lock native value as stake
    Stake {
        /// Sending account
        #[arg(long)]
        from: Address,
        /// Native value attached (base units)
        #[arg(long, value_parser = parse_amount)]
        value: U256,
        /// Output file (JSON)
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Release stake
    Unstake {
        #[arg(long)]
        from: Address,
        #[arg(long, value_parser = parse_amount)]
        amount: U256,
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Delegate stake to a validator
    Delegate {
        #[arg(long)]
        from: Address,
        /// Validator key (0x-hex, 33 bytes)
        #[arg(long)]
        validator: PubKey,
        #[arg(long, value_parser = parse_amount)]
        amount: U256,
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Withdraw a delegation
    Undelegate {
        #[arg(long)]
        from: Address,
        #[arg(long)]
        validator: PubKey,
        #[arg(long, value_parser = parse_amount)]
        amount: U256,
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Vote for a new slot count; sent from the validator's own address
    VoteSlots {
        #[arg(long)]
        validator: PubKey,
        #[arg(long)]
        slots: u64,
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Mint energy (registry owner only)
    Mint {
        #[arg(long)]
        from: Address,
        #[arg(long)]
        to: Address,
        #[arg(long, value_parser = parse_amount)]
        amount: U256,
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Transfer energy
    Transfer {
        #[arg(long)]
        from: Address,
        #[arg(long)]
        to: Address,
        #[arg(long, value_parser = parse_amount)]
        amount: U256,
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Mint a player token
    MintPlayer {
        #[arg(long)]
        from: Address,
        #[arg(long)]
        name: String,
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Bundle transaction files into a blocks file for `run --blocks`
    Block {
        /// Block height
        #[arg(long)]
        height: u64,
        /// Transaction files, in execution order
        #[arg(long, num_args = 1.., value_delimiter = ',')]
        txs: Vec<PathBuf>,
        /// Blocks file to append to (created if missing)
        #[arg(short, long)]
        out: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_delegate() {
        let key = PubKey([2u8; 33]);
        let cli = Cli::try_parse_from([
            "cellchain",
            "txgen",
            "delegate",
            "--from",
            &Address([1u8; 20]).to_hex(),
            "--validator",
            &key.to_hex(),
            "--amount",
            "5000000000",
            "--out",
            "tx.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Txgen {
                command: TxGenCommands::Delegate { validator, amount, .. },
            } => {
                assert_eq!(validator, key);
                assert_eq!(amount, U256::from(5_000_000_000u64));
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_bad_amount_rejected() {
        let result = Cli::try_parse_from([
            "cellchain",
            "txgen",
            "unstake",
            "--from",
            &Address([1u8; 20]).to_hex(),
            "--amount",
            "-3",
            "--out",
            "tx.json",
        ]);
        assert!(result.is_err());
    }
}
