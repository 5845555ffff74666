//! Configuration for the SDFS CLI client.
//!
//! Config file location: `~/.sdfs/config.toml` (or `--config <path>`).
//!
//! ```toml
//! master_port = 7779
//! fetched_root = "./fetched"
//!
//! [[members]]
//! member_id = "n1"
//! address = "10.0.0.1"
//! port = 7780
//! ```
//!
//! `members` is the same static membership snapshot the node daemons load
//! from `[membership] seeds` — the client re-derives the current master
//! from it locally (`MembershipList::current_master`) rather than asking
//! any one node who's in charge.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use sdfs_core::types::Member;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub members: Vec<Member>,

    /// The replica this client is co-located with, if any. Only `store`
    /// needs it (`REQ_LIST_FILES` is defined as client-to-self-replica).
    #[serde(default)]
    pub self_replica: Option<Member>,

    #[serde(default = "default_master_port")]
    pub master_port: u16,

    #[serde(default = "default_fetched_root")]
    pub fetched_root: PathBuf,

    #[serde(default = "default_dial_secs")]
    pub dial_timeout_secs: u64,
}

fn default_master_port() -> u16 {
    7779
}

fn default_fetched_root() -> PathBuf {
    PathBuf::from("./fetched")
}

fn default_dial_secs() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            master_port: default_master_port(),
            fetched_root: default_fetched_root(),
            dial_timeout_secs: default_dial_secs(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read client config at {path}"))?;
        toml::from_str(&content).with_context(|| format!("failed to parse client config at {path}"))
    }

    /// Default config path: `~/.sdfs/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        directories::UserDirs::new().map(|d| d.home_dir().join(".sdfs").join("config.toml"))
    }

    pub fn load(explicit_path: Option<&str>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(path.to_str().unwrap()),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.members.is_empty() {
            anyhow::bail!("no cluster members configured; set [[members]] in the client config");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_toml_round_trip() {
        let toml_str = r#"
            master_port = 7779
            fetched_root = "./fetched"

            [[members]]
            member_id = "n1"
            address = "10.0.0.1"
            port = 7780
        "#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.members.len(), 1);
        assert_eq!(cfg.members[0].member_id, "n1");
    }

    #[test]
    fn empty_members_fails_validation() {
        let cfg = Config::default();
        assert!(cfg.validate().is_err());
    }
}
