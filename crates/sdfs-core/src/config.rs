//! Configuration for an SDFS node.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::Member;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdfsConfig {
    #[serde(default)]
    pub node: NodeConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub ring: RingConfig,

    #[serde(default)]
    pub churn: ChurnConfig,

    #[serde(default)]
    pub gc: GcConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub membership: MembershipConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for SdfsConfig {
    fn default() -> Self {
        Self {
            node: NodeConfig::default(),
            network: NetworkConfig::default(),
            ring: RingConfig::default(),
            churn: ChurnConfig::default(),
            gc: GcConfig::default(),
            timeouts: TimeoutConfig::default(),
            membership: MembershipConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SdfsConfig {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("failed to read config: {e}")))?;

        toml::from_str(&content).map_err(|e| crate::Error::Config(format!("failed to parse config: {e}")))
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(id) = std::env::var("SDFS_MEMBER_ID") {
            config.node.member_id = id;
        }
        if let Ok(dir) = std::env::var("SDFS_DATA_ROOT") {
            config.node.data_root = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("SDFS_FETCHED_ROOT") {
            config.node.fetched_root = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("SDFS_BIND_ADDRESS") {
            config.network.bind_address = addr;
        }
        if let Ok(port) = std::env::var("SDFS_REPLICA_PORT") {
            if let Ok(p) = port.parse() {
                config.network.replica_port = p;
            }
        }
        if let Ok(port) = std::env::var("SDFS_MASTER_PORT") {
            if let Ok(p) = port.parse() {
                config.network.master_port = p;
            }
        }
        if let Ok(level) = std::env::var("SDFS_LOG_LEVEL") {
            config.logging.level = level;
        }

        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub member_id: String,
    pub data_root: PathBuf,
    pub fetched_root: PathBuf,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            member_id: String::new(),
            data_root: PathBuf::from("./sdfs"),
            fetched_root: PathBuf::from("./fetched"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub bind_address: String,
    pub replica_port: u16,
    pub master_port: u16,
    pub control_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            replica_port: 7780,
            master_port: 7779,
            control_port: 7778,
        }
    }
}

/// Ring/placement constants. Defaults match `original_source`'s
/// `config.go` (RING_SIZE, NUM_REPLICAS, QUORUM_SIZE, READ_CONSISTENCY,
/// NUM_VERSIONS).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RingConfig {
    pub ring_size_bits: u32,
    pub num_replicas: usize,
    pub quorum_size: usize,
    pub read_consistency: usize,
    pub num_versions: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            ring_size_bits: 32,
            num_replicas: 5,
            quorum_size: 4,
            read_consistency: 2,
            num_versions: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChurnConfig {
    pub churn_timeout_ms: u64,
}

impl Default for ChurnConfig {
    fn default() -> Self {
        Self { churn_timeout_ms: 1500 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GcConfig {
    pub period_secs: u64,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self { period_secs: 5 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub dial_secs: u64,
    pub rpc_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { dial_secs: 5, rpc_secs: 5 }
    }
}

/// Which `MembershipService` implementation to construct. `static` is the
/// only one shipped by the core (see `sdfs-cluster::membership`); the real
/// gossip/failure-detector protocol is an external collaborator. `members`
/// is the closed, complete cluster roster `StaticMembershipService` reads
/// once at startup; `seeds` is left for a future discovery-based kind to
/// bootstrap from instead of a full roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipConfig {
    pub kind: String,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub seeds: Vec<String>,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            kind: "static".to_string(),
            members: Vec::new(),
            seeds: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_constants() {
        let cfg = SdfsConfig::default();
        assert_eq!(cfg.ring.ring_size_bits, 32);
        assert_eq!(cfg.ring.num_replicas, 5);
        assert_eq!(cfg.ring.quorum_size, 4);
        assert_eq!(cfg.ring.read_consistency, 2);
        assert_eq!(cfg.ring.num_versions, 5);
        assert_eq!(cfg.churn.churn_timeout_ms, 1500);
        assert_eq!(cfg.gc.period_secs, 5);
        assert_eq!(cfg.network.master_port, 7779);
        assert_eq!(cfg.network.replica_port, 7780);
        assert_eq!(cfg.network.control_port, 7778);
    }

    #[test]
    fn parses_toml_round_trip() {
        let cfg = SdfsConfig::default();
        let toml_str = toml::to_string(&cfg).unwrap();
        let parsed: SdfsConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.ring.num_replicas, cfg.ring.num_replicas);
    }
}
