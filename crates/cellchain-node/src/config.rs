use std::path::{Path, PathBuf};

use anyhow::Result;
use cellchain_core::{Address, EnergyGenesis, GenesisConfig, PubKey};
use serde::{Deserialize, Serialize};

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Chain ID
    pub chain_id: u64,

    /// Node data directory
    pub data_dir: PathBuf,

    /// Default log filter, overridden by `RUST_LOG`
    pub log_level: String,

    /// Write a snapshot after every block instead of once per replay
    pub snapshot_every_block: bool,

    /// Genesis configuration
    pub genesis: GenesisConfigFile,
}

/// Genesis configuration for file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisConfigFile {
    /// Initial validator keys (0x-hex, 33 bytes)
    pub initial_validators: Vec<String>,
    pub initial_num_slots: u64,
    pub max_slots: u64,
    /// Owner of every genesis contract (0x-hex address)
    pub creator: String,
    #[serde(default)]
    pub energy: EnergyGenesis,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            chain_id: 1,
            data_dir: PathBuf::from("./cellchain-data"),
            log_level: "info".to_string(),
            snapshot_every_block: false,
            genesis: GenesisConfigFile::default(),
        }
    }
}

impl Default for GenesisConfigFile {
    fn default() -> Self {
        GenesisConfigFile {
            initial_validators: vec![],
            initial_num_slots: 0,
            max_slots: 16,
            creator: Address::ZERO.to_hex(),
            energy: EnergyGenesis::default(),
        }
    }
}

impl NodeConfig {
    /// Load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NodeConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Snapshot file inside the data directory
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("state.bin")
    }

    /// Convert genesis config to core type
    pub fn to_genesis_config(&self) -> Result<GenesisConfig> {
        let initial_validators = self
            .genesis
            .initial_validators
            .iter()
            .map(|s| PubKey::from_hex(s).map_err(|e| anyhow::anyhow!("validator key {s}: {e}")))
            .collect::<Result<Vec<_>>>()?;

        let creator = Address::from_hex(&self.genesis.creator)
            .map_err(|e| anyhow::anyhow!("creator address: {e}"))?;

        Ok(GenesisConfig {
            chain_id: self.chain_id,
            initial_validators,
            initial_num_slots: self.genesis.initial_num_slots,
            max_slots: self.genesis.max_slots,
            creator,
            energy: self.genesis.energy.clone(),
        })
    }
}

/// Generate a sample configuration for testing
pub fn generate_sample_config() -> NodeConfig {
    let validators: Vec<PubKey> = (0..4).map(|_| PubKey::random()).collect();

    NodeConfig {
        genesis: GenesisConfigFile {
            initial_validators: validators.iter().map(PubKey::to_hex).collect(),
            initial_num_slots: 4,
            max_slots: 16,
            creator: Address::random().to_hex(),
            energy: EnergyGenesis::default(),
        },
        ..NodeConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.chain_id, 1);
        assert_eq!(config.snapshot_path(), PathBuf::from("./cellchain-data/state.bin"));
    }

    #[test]
    fn test_sample_config() {
        let config = generate_sample_config();
        assert_eq!(config.genesis.initial_validators.len(), 4);
        assert!(config.genesis.initial_validators[0].starts_with("0x"));
    }

    #[test]
    fn test_genesis_conversion() {
        let config = generate_sample_config();
        let genesis = config.to_genesis_config().unwrap();
        assert_eq!(genesis.chain_id, config.chain_id);
        assert_eq!(genesis.initial_validators.len(), 4);
        assert_eq!(genesis.creator.to_hex(), config.genesis.creator);
    }

    #[test]
    fn test_bad_validator_key_rejected() {
        let mut config = generate_sample_config();
        config.genesis.initial_validators.push("0x1234".to_string());
        assert!(config.to_genesis_config().is_err());
    }

    #[test]
    fn test_config_file_roundtrip() {
        let dir = std::env::temp_dir().join(format!("cellchain-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");

        let config = generate_sample_config();
        config.save(&path).unwrap();
        let loaded = NodeConfig::load(&path).unwrap();
        assert_eq!(loaded.genesis.creator, config.genesis.creator);
        assert_eq!(loaded.log_level, "info");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
