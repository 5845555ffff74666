//! Master election and the master-only RPCs, folded into the same
//! length-prefixed wire protocol as the replica data path (see DESIGN.md's
//! Open Question on transport).
//!
//! Grounded in `original_source/mp3-sdfs/master.go`: `MembershipListChanged`
//! for election, `RunPartitioner`/`selectQuorum` for placement, and
//! `FinalizeWrite`/`FinalizeDelete` for the quorum-commit RPCs.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

use sdfs_core::config::{RingConfig, TimeoutConfig};
use sdfs_core::types::Member;
use sdfs_core::utils::now_nanos;
use sdfs_wire::{Request, RequestKind, Response, ResponseCode};

use crate::error::ClusterResult;
use crate::membership::MembershipService;
use crate::partition::{run_partitioner, select_quorum};
use crate::transport;

/// Tracks whether this node currently believes itself to be master and
/// owns the listener task while it does. Only one RPC server instance
/// exists at a time; it is torn down the moment election says otherwise.
struct MasterState {
    active: bool,
    listener_task: Option<tokio::task::JoinHandle<()>>,
}

pub struct MasterService<M: MembershipService> {
    membership: Arc<M>,
    ring: RingConfig,
    timeouts: TimeoutConfig,
    state: Mutex<MasterState>,
    /// Serializes `finalize_write`/`finalize_delete` so the version/delete
    /// timestamp this node assigns is taken, and fanned out to replicas,
    /// under a single critical section — two concurrent finalizes for the
    /// same name can never observe or hand out the same (or an
    /// out-of-order) timestamp.
    finalize_lock: AsyncMutex<()>,
}

impl<M: MembershipService + 'static> MasterService<M> {
    pub fn new(membership: Arc<M>, ring: RingConfig, timeouts: TimeoutConfig) -> Arc<Self> {
        Arc::new(Self {
            membership,
            ring,
            timeouts,
            state: Mutex::new(MasterState { active: false, listener_task: None }),
            finalize_lock: AsyncMutex::new(()),
        })
    }

    /// Re-derives the master from the current membership snapshot and
    /// starts or stops the RPC listener to match. Called by `ChurnLoop`
    /// after every settled membership change.
    pub async fn membership_list_changed(self: &Arc<Self>, bind_address: &str, port: u16) -> ClusterResult<()> {
        let members = self.membership.list_members();
        let self_node = self.membership.list_self();

        let is_master = members
            .iter()
            .filter(|m| !m.member_id.is_empty())
            .min_by(|a, b| a.member_id.cmp(&b.member_id))
            .map(|m| m.member_id == self_node.member_id)
            .unwrap_or(false);

        let (should_start, should_stop) = {
            let state = self.state.lock();
            (is_master && !state.active, !is_master && state.active)
        };

        if should_start {
            self.start(bind_address, port).await?;
        } else if should_stop {
            self.stop();
        }
        Ok(())
    }

    async fn start(self: &Arc<Self>, bind_address: &str, port: u16) -> ClusterResult<()> {
        let listener = TcpListener::bind((bind_address, port)).await?;
        info!(bind_address, port, "elected master, starting RPC listener");
        let this = self.clone();
        let task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        let svc = this.clone();
                        tokio::spawn(async move {
                            if let Err(e) = svc.handle_connection(stream).await {
                                warn!(%peer, error = %e, "master connection handler failed");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "master listener accept failed");
                        break;
                    }
                }
            }
        });

        let mut state = self.state.lock();
        state.active = true;
        state.listener_task = Some(task);
        Ok(())
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        if let Some(task) = state.listener_task.take() {
            task.abort();
        }
        state.active = false;
        info!("lost master election, RPC listener stopped");
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    async fn handle_connection(self: Arc<Self>, mut stream: TcpStream) -> ClusterResult<()> {
        let req = sdfs_wire::recv_request(&mut stream).await?;
        match req.kind {
            RequestKind::MasterGetReplicas => self.handle_get_replicas(&mut stream, req, true).await,
            RequestKind::MasterGetReplicasNonQuorum => self.handle_get_replicas(&mut stream, req, false).await,
            RequestKind::MasterFinalizeWrite => self.handle_finalize_write_rpc(&mut stream, req).await,
            RequestKind::MasterFinalizeDelete => self.handle_finalize_delete_rpc(&mut stream, req).await,
            other => {
                warn!(kind = ?other, "unexpected request kind on master connection");
                sdfs_wire::try_send_error(&mut stream, ResponseCode::BadRequest).await;
                Ok(())
            }
        }
    }

    async fn handle_get_replicas(&self, stream: &mut TcpStream, req: Request, quorum: bool) -> ClusterResult<()> {
        let Some(name) = req.sdfs_name else {
            sdfs_wire::try_send_error(stream, ResponseCode::BadRequest).await;
            return Ok(());
        };
        let owners = self.placement(&name, quorum);
        if owners.is_empty() {
            sdfs_wire::try_send_error(stream, ResponseCode::MiscError).await;
            return Ok(());
        }
        let resp = Response { members: Some(owners), ..Response::ok() };
        sdfs_wire::send_response(stream, &resp).await?;
        Ok(())
    }

    /// Ring owners for `name`, optionally shuffled and truncated to
    /// quorum. Exposed separately from the RPC handler so a co-located
    /// client role can call it without a network round-trip to itself.
    pub fn placement(&self, name: &sdfs_core::types::SdfsName, quorum: bool) -> Vec<Member> {
        let members = self.membership.list_members();
        let owners = run_partitioner(&members, name.as_str(), self.ring.ring_size_bits, self.ring.num_replicas);
        if quorum {
            select_quorum(owners, self.ring.quorum_size)
        } else {
            owners
        }
    }

    async fn handle_finalize_write_rpc(&self, stream: &mut TcpStream, req: Request) -> ClusterResult<()> {
        let (Some(name), Some(hash), Some(quorum)) = (req.sdfs_name, req.content_hash, req.members) else {
            sdfs_wire::try_send_error(stream, ResponseCode::BadRequest).await;
            return Ok(());
        };
        let version = self.finalize_write(&quorum, &name, &hash).await?;
        let resp = Response { version_ns: Some(version), ..Response::ok() };
        sdfs_wire::send_response(stream, &resp).await?;
        Ok(())
    }

    async fn handle_finalize_delete_rpc(&self, stream: &mut TcpStream, req: Request) -> ClusterResult<()> {
        let Some(name) = req.sdfs_name else {
            sdfs_wire::try_send_error(stream, ResponseCode::BadRequest).await;
            return Ok(());
        };
        let version = self.finalize_delete(&name).await?;
        let resp = Response { version_ns: Some(version), ..Response::ok() };
        sdfs_wire::send_response(stream, &resp).await?;
        Ok(())
    }

    /// Assigns a fresh version timestamp and pushes `FINALIZE_WRITE` to
    /// every replica in `quorum`. Per-replica failures are logged, never
    /// propagated: the quorum write already succeeded from the client's
    /// perspective once Master assigned a timestamp, and a straggler
    /// replica is expected to catch up via the next `Replicate()` pass.
    pub async fn finalize_write(&self, quorum: &[Member], name: &sdfs_core::types::SdfsName, content_hash: &str) -> ClusterResult<i64> {
        let _guard = self.finalize_lock.lock().await;
        let version = now_nanos();
        let mut req = Request::new(RequestKind::MasterFinalizeWrite);
        req.sdfs_name = Some(name.clone());
        req.version_ns = Some(version);
        req.content_hash = Some(content_hash.to_string());

        for replica in quorum {
            if let Err(e) = self.unicast(replica, &req).await {
                warn!(peer = %replica.member_id, name = %name, error = %e, "finalize_write to replica failed");
            }
        }
        Ok(version)
    }

    /// Assigns a delete timestamp and pushes `FINALIZE_DELETE` to every
    /// ring owner of `name` (not just a quorum — a delete should reach
    /// everyone that might still answer reads for it).
    pub async fn finalize_delete(&self, name: &sdfs_core::types::SdfsName) -> ClusterResult<i64> {
        let _guard = self.finalize_lock.lock().await;
        let delete_time = now_nanos();
        let owners = self.placement(name, false);

        let mut req = Request::new(RequestKind::MasterFinalizeDelete);
        req.sdfs_name = Some(name.clone());
        req.version_ns = Some(delete_time);

        for replica in &owners {
            if let Err(e) = self.unicast(replica, &req).await {
                warn!(peer = %replica.member_id, name = %name, error = %e, "finalize_delete to replica failed");
            }
        }
        Ok(delete_time)
    }

    async fn unicast(&self, replica: &Member, req: &Request) -> ClusterResult<Response> {
        transport::unicast(replica, replica.port as u16, Duration::from_secs(self.timeouts.dial_secs), req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::StaticMembershipService;

    fn member(id: &str) -> Member {
        Member::new(id, "127.0.0.1", 7780)
    }

    #[tokio::test]
    async fn placement_returns_quorum_subset() {
        let members = vec![member("n1"), member("n2"), member("n3"), member("n4"), member("n5")];
        let self_node = members[0].clone();
        let membership = Arc::new(StaticMembershipService::new(members, self_node));
        let master = MasterService::new(membership, RingConfig::default(), TimeoutConfig::default());

        let name = sdfs_core::types::SdfsName::new("a.txt").unwrap();
        let quorum = master.placement(&name, true);
        assert_eq!(quorum.len(), 4);
        let full = master.placement(&name, false);
        assert_eq!(full.len(), 5);
    }

    #[tokio::test]
    async fn not_active_until_started() {
        let members = vec![member("n1")];
        let self_node = members[0].clone();
        let membership = Arc::new(StaticMembershipService::new(members, self_node));
        let master = MasterService::new(membership, RingConfig::default(), TimeoutConfig::default());
        assert!(!master.is_active());
    }
}
