use anyhow::{bail, Result};
use cellchain_core::{Block, Hash};
use cellchain_state::storage::codec;
use cellchain_state::{FileStorage, Storage};
use cellchain_vm::{BlockReceipt, Executor};
use tracing::{error, info};

use crate::config::NodeConfig;

const NODE_NAMESPACE: &str = "node";

/// The Cellchain node: the contract host plus its snapshot file
pub struct Node {
    config: NodeConfig,
    executor: Executor,
    storage: FileStorage,
    height: u64,
}

impl Node {
    /// Open the snapshot in the data directory, or initialise genesis
    /// state if there is none yet
    pub fn open(config: NodeConfig) -> Result<Self> {
        let storage = FileStorage::open(config.snapshot_path())?;

        match codec::read_value::<_, u64>(&storage, NODE_NAMESPACE, "height")? {
            Some(height) => {
                let executor = Executor::load(&storage)?;
                info!(height, path = %storage.path().display(), "loaded snapshot");
                Ok(Node {
                    config,
                    executor,
                    storage,
                    height,
                })
            }
            None => {
                let genesis = config.to_genesis_config()?;
                let executor = Executor::genesis(&genesis)?;
                let mut node = Node {
                    config,
                    executor,
                    storage,
                    height: 0,
                };
                node.snapshot()?;
                info!("Genesis state initialized");
                Ok(node)
            }
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn state_root(&self) -> Result<Hash> {
        Ok(self.executor.state_root()?)
    }

    /// Execute `blocks` in order on top of the current height
    pub fn replay(&mut self, blocks: &[Block]) -> Result<Vec<BlockReceipt>> {
        let mut receipts = Vec::with_capacity(blocks.len());
        for block in blocks {
            if block.height != self.height + 1 {
                bail!(
                    "Block height {} does not follow current height {}",
                    block.height,
                    self.height
                );
            }

            let receipt = self.executor.execute_block(block)?;
            self.height = block.height;
            for update in &receipt.validator_updates {
                info!(
                    height = self.height,
                    validator = %update.pub_key,
                    power = update.power,
                    "validator update"
                );
            }
            receipts.push(receipt);

            if self.config.snapshot_every_block {
                self.snapshot()?;
            }
        }

        if !self.config.snapshot_every_block && !blocks.is_empty() {
            self.snapshot()?;
        }
        info!(height = self.height, root = %self.state_root()?, "replay finished");
        Ok(receipts)
    }

    /// Persist the committed state and current height
    pub fn snapshot(&mut self) -> Result<()> {
        let written = self
            .executor
            .dump(&mut self.storage)
            .map_err(anyhow::Error::from)
            .and_then(|()| {
                codec::write_value(&mut self.storage, NODE_NAMESPACE, "height", &self.height)?;
                Ok(())
            });
        if let Err(e) = written {
            error!(height = self.height, "snapshot aborted: {}", e);
            self.storage.rollback();
            return Err(e);
        }

        self.storage.commit()?;
        info!(
            height = self.height,
            path = %self.storage.path().display(),
            "snapshot written"
        );
        Ok(())
    }
}
