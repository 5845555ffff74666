//! Master RPC stub for the CLI client.
//!
//! Grounded in `original_source/mp3-sdfs/client.go`'s `NewClient`/
//! `GetReplicas`/`GetReplicasNonQuorum`/`FinalizeWrite` — a fresh
//! connection to whichever member is currently master, one per command
//! invocation, torn down when the command finishes.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use sdfs_core::types::{Member, MembershipList, SdfsName};
use sdfs_wire::{Request, RequestKind, Response};

use crate::config::Config;

/// Re-derives the current master from the configured membership snapshot
/// and opens one connection to it.
pub async fn dial_master(config: &Config) -> Result<TcpStream> {
    let list = MembershipList::new(config.members.clone(), config.members[0].clone());
    let master = list.current_master().map_err(|e| anyhow!("no master available: {e}"))?;

    debug!(member_id = %master.member_id, address = %master.address, "dialing master");
    let addr = (master.address.as_str(), config.master_port);
    let stream = timeout(Duration::from_secs(config.dial_timeout_secs), TcpStream::connect(addr))
        .await
        .with_context(|| format!("timed out dialing master at {}:{}", master.address, config.master_port))?
        .with_context(|| format!("failed to connect to master at {}:{}", master.address, config.master_port))?;
    Ok(stream)
}

/// `GET_REPLICAS` (quorum-shuffled) or `GET_REPLICAS_NON_QUORUM` (full
/// placement), depending on `quorum`.
pub async fn get_replicas(config: &Config, name: &SdfsName, quorum: bool) -> Result<Vec<Member>> {
    let mut stream = dial_master(config).await?;
    let kind = if quorum { RequestKind::MasterGetReplicas } else { RequestKind::MasterGetReplicasNonQuorum };
    let mut req = Request::new(kind);
    req.sdfs_name = Some(name.clone());
    sdfs_wire::send_request(&mut stream, &req).await?;
    let resp = sdfs_wire::recv_response(&mut stream).await?;
    Ok(resp.members.unwrap_or_default())
}

/// `FINALIZE_WRITE`: hands the master the quorum this command already
/// wrote to, plus the content hash it got back. Returns the
/// master-assigned version timestamp.
pub async fn finalize_write(config: &Config, quorum: &[Member], name: &SdfsName, content_hash: &str) -> Result<i64> {
    let mut stream = dial_master(config).await?;
    let mut req = Request::new(RequestKind::MasterFinalizeWrite);
    req.sdfs_name = Some(name.clone());
    req.content_hash = Some(content_hash.to_string());
    req.members = Some(quorum.to_vec());
    sdfs_wire::send_request(&mut stream, &req).await?;
    let resp = sdfs_wire::recv_response(&mut stream).await?;
    resp.version_ns.ok_or_else(|| anyhow!("master did not return a version for finalize_write"))
}

/// `FINALIZE_DELETE`: returns the master-assigned delete timestamp.
pub async fn finalize_delete(config: &Config, name: &SdfsName) -> Result<i64> {
    let mut stream = dial_master(config).await?;
    let mut req = Request::new(RequestKind::MasterFinalizeDelete);
    req.sdfs_name = Some(name.clone());
    sdfs_wire::send_request(&mut stream, &req).await?;
    let resp = sdfs_wire::recv_response(&mut stream).await?;
    resp.version_ns.ok_or_else(|| anyhow!("master did not return a version for finalize_delete"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_master_picks_lowest_id() {
        let members = vec![Member::new("z", "10.0.0.9", 7780), Member::new("a", "10.0.0.1", 7780)];
        let list = MembershipList::new(members.clone(), members[0].clone());
        assert_eq!(list.current_master().unwrap().member_id, "a");
    }
}
