use crate::core::{MAX_NONCE_ATTEMPTS, MINING_DIFFICULTY, MINING_REWARD, MINING_TIMER_SEC};
use crate::error::{BlockchainError, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5001;
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_PEER_TIMEOUT_MS: u64 = 5000;
const DEFAULT_PEER_RETRIES: u32 = 3;
const DEFAULT_PEER_BACKOFF_MS: u64 = 200;

const CONFIG_PATH_KEY: &str = "NODE_CONFIG";
const HOST_KEY: &str = "NODE_HOST";
const PORT_KEY: &str = "PORT";
const NEIGHBORS_KEY: &str = "NEIGHBORS";
const DATA_DIR_KEY: &str = "DATA_DIR";
const DIFFICULTY_KEY: &str = "MINING_DIFFICULTY";
const REWARD_KEY: &str = "MINING_REWARD";
const INTERVAL_KEY: &str = "MINING_INTERVAL_SECS";
const MAX_NONCE_KEY: &str = "MAX_NONCE_ATTEMPTS";
const PEER_TIMEOUT_KEY: &str = "PEER_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MiningSettings {
    pub difficulty: usize,
    pub reward: f32,
    pub interval_secs: u64,
    pub max_nonce_attempts: u64,
    /// Start the background mining loop when the node boots
    pub autostart: bool,
}

impl Default for MiningSettings {
    fn default() -> Self {
        MiningSettings {
            difficulty: MINING_DIFFICULTY,
            reward: MINING_REWARD,
            interval_secs: MINING_TIMER_SEC,
            max_nonce_attempts: MAX_NONCE_ATTEMPTS,
            autostart: true,
        }
    }
}

impl MiningSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PeerSettings {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for PeerSettings {
    fn default() -> Self {
        PeerSettings {
            timeout_ms: DEFAULT_PEER_TIMEOUT_MS,
            max_retries: DEFAULT_PEER_RETRIES,
            backoff_ms: DEFAULT_PEER_BACKOFF_MS,
        }
    }
}

impl PeerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Everything a node needs to boot.
///
/// Layered lowest to highest priority: built-in defaults, then an optional
/// TOML file, then environment variables. CLI flags are applied last by the
/// caller.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    pub neighbors: Vec<String>,
    pub data_dir: PathBuf,
    pub mining: MiningSettings,
    pub peers: PeerSettings,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            neighbors: Vec::new(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            mining: MiningSettings::default(),
            peers: PeerSettings::default(),
        }
    }
}

impl NodeConfig {
    /// Builds the configuration from the process environment. `path` wins
    /// over `NODE_CONFIG` when both name a file.
    pub fn load(path: Option<&Path>) -> Result<NodeConfig> {
        let file = path
            .map(Path::to_path_buf)
            .or_else(|| env::var(CONFIG_PATH_KEY).ok().map(PathBuf::from));

        let mut config = match file {
            Some(file) => Self::from_file(&file)?,
            None => NodeConfig::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<NodeConfig> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            BlockchainError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<NodeConfig> {
        Ok(toml::from_str(text)?)
    }

    /// Applies `KEY=value` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(HOST_KEY) {
            self.host = host;
        }
        if let Some(port) = lookup(PORT_KEY) {
            self.port = parse_var(PORT_KEY, &port)?;
        }
        if let Some(neighbors) = lookup(NEIGHBORS_KEY) {
            self.neighbors = parse_neighbors(&neighbors);
        }
        if let Some(dir) = lookup(DATA_DIR_KEY) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(difficulty) = lookup(DIFFICULTY_KEY) {
            self.mining.difficulty = parse_var(DIFFICULTY_KEY, &difficulty)?;
        }
        if let Some(reward) = lookup(REWARD_KEY) {
            self.mining.reward = parse_var(REWARD_KEY, &reward)?;
        }
        if let Some(interval) = lookup(INTERVAL_KEY) {
            self.mining.interval_secs = parse_var(INTERVAL_KEY, &interval)?;
        }
        if let Some(attempts) = lookup(MAX_NONCE_KEY) {
            self.mining.max_nonce_attempts = parse_var(MAX_NONCE_KEY, &attempts)?;
        }
        if let Some(timeout) = lookup(PEER_TIMEOUT_KEY) {
            self.peers.timeout_ms = parse_var(PEER_TIMEOUT_KEY, &timeout)?;
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Per-node database directory, e.g. `data/node_5001`.
    pub fn node_db_path(&self) -> PathBuf {
        self.data_dir.join(format!("node_{}", self.port))
    }
}

/// Splits a comma-separated neighbor list, dropping blanks.
pub fn parse_neighbors(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from)
        .collect()
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| BlockchainError::Config(format!("Invalid value for {key}: {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.port, 5001);
        assert_eq!(config.mining.difficulty, 3);
        assert_eq!(config.mining.interval_secs, 20);
        assert!(config.neighbors.is_empty());
        assert_eq!(config.node_db_path(), PathBuf::from("data").join("node_5001"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = NodeConfig::from_toml(
            r#"
            port = 5002
            neighbors = ["http://127.0.0.1:5001"]

            [mining]
            difficulty = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 5002);
        assert_eq!(config.neighbors, vec!["http://127.0.0.1:5001"]);
        assert_eq!(config.mining.difficulty, 2);
        assert_eq!(config.mining.reward, MINING_REWARD);
        assert_eq!(config.peers, PeerSettings::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = NodeConfig::from_toml("port = 5002").unwrap();
        let vars: HashMap<&str, &str> = [
            ("PORT", "5003"),
            ("NEIGHBORS", "http://a:1, ,http://b:2"),
            ("MINING_INTERVAL_SECS", "5"),
        ]
        .into_iter()
        .collect();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.port, 5003);
        assert_eq!(config.neighbors, vec!["http://a:1", "http://b:2"]);
        assert_eq!(config.mining.interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_bad_override_is_a_config_error() {
        let mut config = NodeConfig::default();
        let result = config.apply_overrides(|key| (key == "PORT").then(|| "abc".to_string()));
        assert!(matches!(result, Err(BlockchainError::Config(_))));
    }

    #[test]
    fn test_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = NodeConfig::from_file(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(BlockchainError::Config(_))));
    }
}
