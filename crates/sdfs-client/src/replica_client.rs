//! Dialing helper for the client's direct replica-protocol connections
//! (metadata/data/versions/put/list), separate from the master RPC path.
//!
//! Grounded in `original_source/mp3-sdfs/client.go`'s
//! `QueryReplicaForLatestVersion`/`SendFileToReplica`'s `net.DialTimeout`.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpStream;
use tokio::time::timeout;

use sdfs_core::types::Member;

use crate::config::Config;

pub async fn dial_replica(config: &Config, member: &Member) -> Result<TcpStream> {
    let addr = (member.address.as_str(), member.port as u16);
    timeout(Duration::from_secs(config.dial_timeout_secs), TcpStream::connect(addr))
        .await
        .with_context(|| format!("timed out dialing replica {} at {}:{}", member.member_id, member.address, member.port))?
        .with_context(|| format!("failed to connect to replica {} at {}:{}", member.member_id, member.address, member.port))
}
