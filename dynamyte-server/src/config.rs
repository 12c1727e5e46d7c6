use dynamyte_core::{DynamyteError, QuorumConfig, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub replication: ReplicationConfig,
    #[serde(default)]
    pub peer: PeerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// `host:port` identity placed on the ring and used by peers to reach us.
    pub node_id: String,
    pub bind_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default)]
    pub nodes: Vec<String>,
    #[serde(default = "default_virtual_nodes")]
    pub virtual_nodes: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            virtual_nodes: default_virtual_nodes(),
        }
    }
}

fn default_virtual_nodes() -> usize {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    #[serde(default = "default_replication_factor")]
    pub replication_factor: usize,
    #[serde(default = "default_quorum")]
    pub read_quorum: usize,
    #[serde(default = "default_quorum")]
    pub write_quorum: usize,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            replication_factor: default_replication_factor(),
            read_quorum: default_quorum(),
            write_quorum: default_quorum(),
        }
    }
}

fn default_replication_factor() -> usize {
    3
}

fn default_quorum() -> usize {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    #[serde(default = "default_peer_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_peer_timeout_ms(),
        }
    }
}

fn default_peer_timeout_ms() -> u64 {
    2000
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(::config::Environment::with_prefix("DYNAMYTE").separator("__"))
            .build()
            .map_err(|e| DynamyteError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| DynamyteError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.node.node_id.trim().is_empty() {
            return Err(DynamyteError::Config("node.node_id cannot be empty".to_string()));
        }

        if self.cluster.virtual_nodes == 0 {
            return Err(DynamyteError::Config(
                "cluster.virtual_nodes must be at least 1".to_string(),
            ));
        }

        let quorum = self.quorum()?;
        if !quorum.is_strict() {
            tracing::warn!(
                "R + W <= N ({} + {} <= {}); reads may miss the latest write",
                quorum.read_quorum,
                quorum.write_quorum,
                quorum.replication_factor
            );
        }

        Ok(())
    }

    pub fn quorum(&self) -> Result<QuorumConfig> {
        QuorumConfig::new(
            self.replication.replication_factor,
            self.replication.read_quorum,
            self.replication.write_quorum,
        )
    }

    /// Every ring member, the local node included, without duplicates.
    pub fn cluster_nodes(&self) -> Vec<String> {
        let mut nodes = vec![self.node.node_id.clone()];
        for node in &self.cluster.nodes {
            if !nodes.contains(node) {
                nodes.push(node.clone());
            }
        }
        nodes
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer.timeout_ms)
    }
}
