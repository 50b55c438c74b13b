use std::path::Path;

use anyhow::{bail, Result};
use cellchain_core::{Hash, PubKey};
use cellchain_state::storage::codec;
use cellchain_state::FileStorage;
use cellchain_vm::Executor;
use serde::Serialize;

/// What a snapshot file holds, as printed by `snapshot inspect`
#[derive(Debug, Serialize)]
pub struct SnapshotSummary {
    pub height: u64,
    pub keys: usize,
    pub state_root: Hash,
    pub num_slots: u64,
    pub max_slots: u64,
    pub elected: Vec<(PubKey, u64)>,
    pub players: u64,
}

pub fn summarize(path: &Path) -> Result<SnapshotSummary> {
    if !path.exists() {
        bail!("Snapshot not found: {}", path.display());
    }
    let storage = FileStorage::open(path)?;
    let Some(height) = codec::read_value::<_, u64>(&storage, "node", "height")? else {
        bail!("{} is not a node snapshot", path.display());
    };
    let executor = Executor::load(&storage)?;
    let host = executor.host();

    Ok(SnapshotSummary {
        height,
        keys: storage.entries().len(),
        state_root: executor.state_root()?,
        num_slots: host.system.num_slots(),
        max_slots: host.system.max_slots(),
        elected: host.system.elected(),
        players: host.players.total_supply(),
    })
}

pub fn inspect(path: &Path) -> Result<()> {
    let summary = summarize(path)?;
    println!("Snapshot {}:", path.display());
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::generate_sample_config;
    use crate::node::Node;

    #[test]
    fn test_summarize_genesis_snapshot() {
        let mut config = generate_sample_config();
        config.data_dir = std::env::temp_dir().join(format!("cellchain-snapshot-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&config.data_dir);
        let node = Node::open(config.clone()).unwrap();

        let summary = summarize(&config.snapshot_path()).unwrap();
        assert_eq!(summary.height, 0);
        assert_eq!(summary.num_slots, 4);
        assert_eq!(summary.elected.len(), 4);
        assert_eq!(summary.state_root, node.state_root().unwrap());
        std::fs::remove_dir_all(&config.data_dir).unwrap();
    }

    #[test]
    fn test_missing_snapshot() {
        assert!(summarize(Path::new("/nonexistent/cellchain/state.bin")).is_err());
    }
}
