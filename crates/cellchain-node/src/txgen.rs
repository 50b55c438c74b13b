use std::path::Path;

use anyhow::{bail, Result};
use cellchain_core::{Block, Call, Transaction};

use crate::cli::TxGenCommands;

pub fn handle_txgen(command: TxGenCommands) -> Result<()> {
    match command {
        TxGenCommands::Stake { from, value, out } => {
            let tx = Transaction::new(from, Call::Stake).with_value(value);
            write_tx(&tx, &out)?;
        }

        TxGenCommands::Unstake { from, amount, out } => {
            write_tx(&Transaction::new(from, Call::Unstake { amount }), &out)?;
        }

        TxGenCommands::Delegate {
            from,
            validator,
            amount,
            out,
        } => {
            write_tx(&Transaction::new(from, Call::Delegate { validator, amount }), &out)?;
        }

        TxGenCommands::Undelegate {
            from,
            validator,
            amount,
            out,
        } => {
            write_tx(&Transaction::new(from, Call::Undelegate { validator, amount }), &out)?;
        }

        TxGenCommands::VoteSlots { validator, slots, out } => {
            let tx = Transaction::new(validator.address(), Call::VoteSlots { validator, slots });
            write_tx(&tx, &out)?;
        }

        TxGenCommands::Mint { from, to, amount, out } => {
            write_tx(&Transaction::new(from, Call::Mint { to, amount }), &out)?;
        }

        TxGenCommands::Transfer { from, to, amount, out } => {
            write_tx(&Transaction::new(from, Call::Transfer { to, amount }), &out)?;
        }

        TxGenCommands::MintPlayer { from, name, out } => {
            if name.trim().is_empty() {
                bail!("Player name must not be empty");
            }
            write_tx(&Transaction::new(from, Call::MintPlayer { name }), &out)?;
        }

        TxGenCommands::Block { height, txs, out } => {
            let transactions = txs.iter().map(|path| read_tx(path)).collect::<Result<Vec<_>>>()?;
            let count = append_block(&out, Block::new(height, transactions))?;
            println!("{} now holds {} block(s)", out.display(), count);
        }
    }

    Ok(())
}

fn write_tx(tx: &Transaction, out: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(tx)?;
    std::fs::write(out, json)?;
    Ok(())
}

fn read_tx(path: &Path) -> Result<Transaction> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Read a blocks file, or an empty list if it does not exist yet
pub fn read_blocks(path: &Path) -> Result<Vec<Block>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Append `block` to the blocks file; heights must increase by one
fn append_block(path: &Path, block: Block) -> Result<usize> {
    let mut blocks = read_blocks(path)?;
    if let Some(last) = blocks.last() {
        if block.height != last.height + 1 {
            bail!(
                "Block height {} does not follow {} in {}",
                block.height,
                last.height,
                path.display()
            );
        }
    }
    blocks.push(block);
    std::fs::write(path, serde_json::to_string_pretty(&blocks)?)?;
    Ok(blocks.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellchain_core::{Address, PubKey, U256};
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cellchain-txgen-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_vote_slots_sent_from_validator_address() {
        let dir = temp_dir("vote");
        let out = dir.join("vote.json");
        let validator = PubKey([3u8; 33]);
        handle_txgen(TxGenCommands::VoteSlots {
            validator,
            slots: 5,
            out: out.clone(),
        })
        .unwrap();

        let tx = read_tx(&out).unwrap();
        assert_eq!(tx.sender, validator.address());
        assert_eq!(tx.call, Call::VoteSlots { validator, slots: 5 });
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_block_file_accumulates() {
        let dir = temp_dir("block");
        let tx_path = dir.join("stake.json");
        let blocks_path = dir.join("blocks.json");
        handle_txgen(TxGenCommands::Stake {
            from: Address([1u8; 20]),
            value: U256::from(1_000_000_000u64),
            out: tx_path.clone(),
        })
        .unwrap();

        for height in 1..=2 {
            handle_txgen(TxGenCommands::Block {
                height,
                txs: vec![tx_path.clone()],
                out: blocks_path.clone(),
            })
            .unwrap();
        }
        let blocks = read_blocks(&blocks_path).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].transactions[0].call, Call::Stake);

        // a gap in heights is refused
        let gap = handle_txgen(TxGenCommands::Block {
            height: 5,
            txs: vec![tx_path],
            out: blocks_path,
        });
        assert!(gap.is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
