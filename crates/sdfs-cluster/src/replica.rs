//! The replica data-connection daemon: one handler task per accepted TCP
//! connection, the active replication pass, and the garbage collector.
//!
//! Grounded in `original_source/mp3-sdfs/replica.go`'s `DataConnAccept`
//! switch, `Replicate`, and `GarbageCollect`.

use std::collections::{HashSet, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use sdfs_core::config::{RingConfig, TimeoutConfig};
use sdfs_core::types::{merge_k_latest, FileVersionSet, Member, SdfsName, Version};
use sdfs_core::utils::now_nanos;
use sdfs_storage::LocalStore;
use sdfs_wire::{FileListEntry, Request, RequestKind, Response, ResponseCode};

use crate::error::{ClusterError, ClusterResult};
use crate::membership::MembershipService;
use crate::partition::run_partitioner;
use crate::transport;

/// Owns local storage, dispatches incoming replica-protocol requests, and
/// drives replication/GC against the current membership.
pub struct ReplicaService<M: MembershipService> {
    store: Arc<LocalStore>,
    membership: Arc<M>,
    ring: RingConfig,
    timeouts: TimeoutConfig,
    /// `ReplicationJobs`: versions currently promised to a peer mid-offer,
    /// so a second concurrent offer (or GC) doesn't race the same fetch.
    inflight: AsyncMutex<FileVersionSet>,
}

impl<M: MembershipService + 'static> ReplicaService<M> {
    pub fn new(store: Arc<LocalStore>, membership: Arc<M>, ring: RingConfig, timeouts: TimeoutConfig) -> Arc<Self> {
        Arc::new(Self {
            store,
            membership,
            ring,
            timeouts,
            inflight: AsyncMutex::new(FileVersionSet::new()),
        })
    }

    /// Binds the replica data port and spawns one handler task per
    /// accepted connection, forever.
    pub async fn serve(self: Arc<Self>, bind_address: &str, port: u16) -> ClusterResult<()> {
        let listener = TcpListener::bind((bind_address, port)).await?;
        info!(bind_address, port, "replica listening");
        loop {
            let (stream, peer) = listener.accept().await?;
            let this = self.clone();
            tokio::spawn(async move {
                if let Err(e) = this.handle_connection(stream).await {
                    warn!(%peer, error = %e, "replica connection handler failed");
                }
            });
        }
    }

    /// Reads one request and dispatches by kind. `QUERY_CONTAINED_FILES`
    /// keeps the connection for subsequent `REPLICA_SEND_FILE`
    /// sub-transactions; every other kind is one request/response (plus,
    /// for read paths, a raw byte stream after the response frame).
    async fn handle_connection(self: Arc<Self>, mut stream: TcpStream) -> ClusterResult<()> {
        let req = sdfs_wire::recv_request(&mut stream).await?;
        debug!(kind = ?req.kind, "dispatching replica request");

        match req.kind {
            RequestKind::ReqFileMetadata => self.handle_req_file_metadata(&mut stream, req).await,
            RequestKind::ReqFileData => self.handle_req_file_data(&mut stream, req).await,
            RequestKind::ReqKVersions => self.handle_req_k_versions(&mut stream, req).await,
            RequestKind::SendFileData => self.handle_send_file_data(&mut stream, req).await,
            RequestKind::ReqListFiles => self.handle_req_list_files(&mut stream).await,
            RequestKind::MasterFinalizeWrite => self.handle_finalize_write(&mut stream, req).await,
            RequestKind::MasterFinalizeDelete => self.handle_finalize_delete(&mut stream, req).await,
            RequestKind::ReplicaQueryFiles => self.handle_query_contained_files(&mut stream, req).await,
            other => {
                warn!(kind = ?other, "unexpected request kind on replica data connection");
                sdfs_wire::try_send_error(&mut stream, ResponseCode::BadRequest).await;
                Ok(())
            }
        }
    }

    async fn name_or_bad_request(&self, stream: &mut TcpStream, req: &Request) -> ClusterResult<Option<SdfsName>> {
        match &req.sdfs_name {
            Some(name) => Ok(Some(name.clone())),
            None => {
                sdfs_wire::try_send_error(stream, ResponseCode::BadRequest).await;
                Ok(None)
            }
        }
    }

    async fn handle_req_file_metadata(&self, stream: &mut TcpStream, req: Request) -> ClusterResult<()> {
        let Some(name) = self.name_or_bad_request(stream, &req).await? else {
            return Ok(());
        };
        match self.store.acquire_handles(1, &name, i64::MAX).await {
            Ok(handles) if handles.is_empty() => {
                sdfs_wire::try_send_error(stream, ResponseCode::FileNotFound).await;
            }
            Ok(handles) => {
                let h = &handles[0];
                let resp = Response {
                    returning_size: Some(h.size),
                    version_ns: Some(h.version),
                    ..Response::ok()
                };
                sdfs_wire::send_response(stream, &resp).await?;
            }
            Err(sdfs_core::Error::NotExist(_)) => {
                sdfs_wire::try_send_error(stream, ResponseCode::FileNotFound).await;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn handle_req_file_data(&self, stream: &mut TcpStream, req: Request) -> ClusterResult<()> {
        let Some(name) = self.name_or_bad_request(stream, &req).await? else {
            return Ok(());
        };
        let upper_bound = req.upper_version_bound_ns.unwrap_or(i64::MAX);
        match self.store.acquire_handles(1, &name, upper_bound).await {
            Ok(handles) if handles.is_empty() => {
                sdfs_wire::try_send_error(stream, ResponseCode::FileNotFound).await;
            }
            Ok(handles) => {
                let h = &handles[0];
                let resp = Response {
                    returning_size: Some(h.size),
                    version_ns: Some(h.version),
                    ..Response::ok()
                };
                sdfs_wire::send_response(stream, &resp).await?;
                let mut file = tokio::fs::File::open(&h.path).await?;
                tokio::io::copy(&mut file, stream).await?;
            }
            Err(sdfs_core::Error::NotExist(_)) => {
                sdfs_wire::try_send_error(stream, ResponseCode::FileNotFound).await;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn handle_req_k_versions(&self, stream: &mut TcpStream, req: Request) -> ClusterResult<()> {
        let Some(name) = self.name_or_bad_request(stream, &req).await? else {
            return Ok(());
        };
        let k = req.k_versions.unwrap_or(1).max(1) as i64;
        match self.store.acquire_handles(k, &name, i64::MAX).await {
            Ok(handles) => {
                let file_list = handles
                    .into_iter()
                    .map(|h| FileListEntry { name: h.name, version: h.version })
                    .collect();
                let resp = Response { file_list: Some(file_list), ..Response::ok() };
                sdfs_wire::send_response(stream, &resp).await?;
            }
            Err(sdfs_core::Error::NotExist(_)) => {
                sdfs_wire::try_send_error(stream, ResponseCode::FileNotFound).await;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Client PUT. Dumps exactly `file_size` gzip-compressed bytes to a tmp
    /// blob, hashing the *decompressed* content, and hands the hash back.
    /// No publish happens here — that's Master's `FINALIZE_WRITE`.
    async fn handle_send_file_data(&self, stream: &mut TcpStream, req: Request) -> ClusterResult<()> {
        let Some(file_size) = req.file_size else {
            sdfs_wire::try_send_error(stream, ResponseCode::BadRequest).await;
            return Ok(());
        };
        sdfs_wire::send_response(stream, &Response::ok()).await?;
        let hash = self.store.dump_gzip_to_tmp(&mut *stream, file_size).await?;
        let resp = Response { content_hash: Some(hash), ..Response::ok() };
        sdfs_wire::send_response(stream, &resp).await?;
        Ok(())
    }

    async fn handle_req_list_files(&self, stream: &mut TcpStream) -> ClusterResult<()> {
        let handles = self.store.list_directory().await?;
        let file_list = handles
            .into_iter()
            .map(|h| FileListEntry { name: h.name, version: h.version })
            .collect();
        let resp = Response { file_list: Some(file_list), ..Response::ok() };
        sdfs_wire::send_response(stream, &resp).await?;
        Ok(())
    }

    async fn handle_finalize_write(&self, stream: &mut TcpStream, req: Request) -> ClusterResult<()> {
        let (Some(name), Some(version), Some(hash)) = (req.sdfs_name, req.version_ns, req.content_hash) else {
            sdfs_wire::try_send_error(stream, ResponseCode::BadRequest).await;
            return Ok(());
        };
        self.store.publish(&hash, version, &name).await?;
        sdfs_wire::send_response(stream, &Response::ok()).await?;
        Ok(())
    }

    async fn handle_finalize_delete(&self, stream: &mut TcpStream, req: Request) -> ClusterResult<()> {
        let (Some(name), Some(delete_time)) = (req.sdfs_name, req.version_ns) else {
            sdfs_wire::try_send_error(stream, ResponseCode::BadRequest).await;
            return Ok(());
        };
        match self.store.remove(&name, delete_time).await {
            Ok(preserved) => {
                if preserved {
                    warn!(name = %name, delete_time, "delete raced a newer write; newer version preserved");
                }
                sdfs_wire::send_response(stream, &Response::ok()).await?;
            }
            Err(sdfs_core::Error::NotExist(_)) => {
                sdfs_wire::try_send_error(stream, ResponseCode::FileNotFound).await;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Peer replication offer: reconcile the peer's `file_version_set`
    /// against what we already hold, reserve the fetch set under
    /// `inflight`, reply with what we want, then read that many
    /// `REPLICA_SEND_FILE` sub-transactions off the same connection.
    ///
    /// Holding `inflight` across the reply send is deliberate — see
    /// spec.md §5's lock-held-network-I/O exception — so a second offer
    /// racing this one can't double-reserve the same versions.
    async fn handle_query_contained_files(&self, stream: &mut TcpStream, req: Request) -> ClusterResult<()> {
        let offered = req.file_version_set.unwrap_or_default();

        let want = {
            let mut inflight = self.inflight.lock().await;
            let local = self.store.list_all_versions().await?;

            let mut want = FileVersionSet::new();
            for (name, offered_versions) in &offered {
                let have = local.get(name).cloned().unwrap_or_default();
                let result = merge_k_latest(&have, offered_versions, self.ring.num_versions);
                if result.fetch.is_empty() {
                    continue;
                }
                let already_inflight = inflight.get(name).cloned().unwrap_or_default();
                let still_wanted: BTreeSet<Version> = result.fetch.difference(&already_inflight).copied().collect();
                if !still_wanted.is_empty() {
                    want.insert(name.clone(), still_wanted);
                }
            }

            for (name, versions) in &want {
                inflight.entry(name.clone()).or_default().extend(versions);
            }

            let resp = Response { requested_file_version_set: Some(want.clone()), ..Response::ok() };
            sdfs_wire::send_response(stream, &resp).await?;
            want
        };

        let total: usize = want.values().map(|v| v.len()).sum();
        let mut received = 0;
        let mut failure = None;
        for _ in 0..total {
            match self.recv_one_replica_file(stream).await {
                Ok((name, version)) => {
                    self.clear_inflight(&name, version).await;
                    received += 1;
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = failure {
            warn!(error = %e, received, total, "replication offer aborted mid-transfer");
            let mut inflight = self.inflight.lock().await;
            for (name, versions) in &want {
                for v in versions {
                    release_version(&mut inflight, name, *v);
                }
            }
        }

        Ok(())
    }

    /// Reads one `REPLICA_SEND_FILE` header plus its raw byte payload,
    /// publishing directly under the offered `(name, version)`. The bytes
    /// transferred here are already gzip-framed (copied verbatim from the
    /// peer's `stored/` tree), so no decompression is needed to name the
    /// staging blob — see DESIGN.md's Open Question on this.
    async fn recv_one_replica_file(&self, stream: &mut TcpStream) -> ClusterResult<(SdfsName, Version)> {
        let header = sdfs_wire::recv_request(stream).await?;
        if header.kind != RequestKind::ReplicaSendFile {
            sdfs_wire::try_send_error(stream, ResponseCode::BadRequest).await;
            return Err(ClusterError::NoOwningReplicas("expected REPLICA_SEND_FILE".into()));
        }
        let (Some(name), Some(version), Some(size)) = (header.sdfs_name, header.version_ns, header.file_size) else {
            sdfs_wire::try_send_error(stream, ResponseCode::BadRequest).await;
            return Err(ClusterError::NoOwningReplicas("incomplete REPLICA_SEND_FILE header".into()));
        };
        sdfs_wire::send_response(stream, &Response::ok()).await?;
        let hash = self.store.dump_to_tmp(&mut *stream, size).await?;
        self.store.publish(&hash, version, &name).await?;
        Ok((name, version))
    }

    async fn clear_inflight(&self, name: &SdfsName, version: Version) {
        let mut inflight = self.inflight.lock().await;
        release_version(&mut inflight, name, version);
    }

    /// One active replication pass: offers this node's full holdings to
    /// every distinct co-owner of every locally-stored file, once each.
    pub async fn replicate(&self) -> ClusterResult<()> {
        let mine = self.store.list_all_versions().await?;
        if mine.is_empty() {
            return Ok(());
        }

        let members = self.membership.list_members();
        let self_node = self.membership.list_self();
        let mut visited: HashSet<String> = HashSet::new();

        for name in mine.keys() {
            let owners = run_partitioner(&members, name.as_str(), self.ring.ring_size_bits, self.ring.num_replicas);
            for owner in owners {
                if owner.member_id == self_node.member_id || !visited.insert(owner.member_id.clone()) {
                    continue;
                }
                if let Err(e) = self.replicate_to(&owner, &mine).await {
                    warn!(peer = %owner.member_id, error = %e, "replication pass to peer failed");
                }
            }
        }
        Ok(())
    }

    async fn replicate_to(&self, owner: &Member, mine: &FileVersionSet) -> ClusterResult<()> {
        let mut stream = transport::dial(&owner.address, owner.port as u16, Duration::from_secs(self.timeouts.dial_secs)).await?;

        let mut req = Request::new(RequestKind::ReplicaQueryFiles);
        req.file_version_set = Some(mine.clone());
        sdfs_wire::send_request(&mut stream, &req).await?;
        let resp = sdfs_wire::recv_response(&mut stream).await?;
        let want = resp.requested_file_version_set.unwrap_or_default();

        for (name, versions) in want {
            for version in versions {
                let handles = self.store.acquire_handles(1, &name, version).await?;
                let Some(handle) = handles.into_iter().find(|h| h.version == version) else {
                    warn!(name = %name, version, "peer requested a version we no longer hold");
                    continue;
                };

                let mut header = Request::new(RequestKind::ReplicaSendFile);
                header.sdfs_name = Some(name.clone());
                header.version_ns = Some(version);
                header.file_size = Some(handle.size);
                sdfs_wire::send_request(&mut stream, &header).await?;
                sdfs_wire::recv_response(&mut stream).await?;

                let mut file = tokio::fs::File::open(&handle.path).await?;
                tokio::io::copy(&mut file, &mut stream).await?;
            }
        }
        Ok(())
    }

    /// Removes every locally-stored file this node is no longer a ring
    /// owner of. Runs under `inflight`'s lock, same as the original's
    /// `GarbageCollect`, so GC can't race a concurrent replication offer's
    /// reservation bookkeeping.
    pub async fn garbage_collect(&self) -> ClusterResult<()> {
        let _inflight = self.inflight.lock().await;
        let mine = self.store.list_all_versions().await?;
        let members = self.membership.list_members();
        let self_node = self.membership.list_self();

        for name in mine.keys() {
            let owners = run_partitioner(&members, name.as_str(), self.ring.ring_size_bits, self.ring.num_replicas);
            if owners.iter().any(|o| o.member_id == self_node.member_id) {
                continue;
            }
            match self.store.remove(name, now_nanos()).await {
                Ok(preserved) => {
                    if preserved {
                        warn!(name = %name, "gc delete raced a newer write; newer version preserved");
                    } else {
                        info!(name = %name, "garbage collected file no longer owned");
                    }
                }
                Err(sdfs_core::Error::NotExist(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Spawns the periodic GC loop. Returned handle is owned by the node's
    /// startup sequence, which aborts it on shutdown.
    pub fn spawn_gc_daemon(self: Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = self.garbage_collect().await {
                    error!(error = %e, "garbage collection pass failed");
                }
            }
        })
    }
}

fn release_version(inflight: &mut FileVersionSet, name: &SdfsName, version: Version) {
    if let Some(versions) = inflight.get_mut(name) {
        versions.remove(&version);
        if versions.is_empty() {
            inflight.remove(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::StaticMembershipService;
    use std::io::Cursor;

    async fn fresh_service() -> (Arc<ReplicaService<StaticMembershipService>>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalStore::init(dir.path().join("sdfs")).await.unwrap());
        let self_member = Member::new("n1", "127.0.0.1", 7780);
        let membership = Arc::new(StaticMembershipService::new(vec![self_member.clone()], self_member));
        let svc = ReplicaService::new(store, membership, RingConfig::default(), TimeoutConfig::default());
        (svc, dir)
    }

    #[tokio::test]
    async fn garbage_collect_keeps_owned_files() {
        let (svc, _dir) = fresh_service().await;
        let name = SdfsName::new("a.txt").unwrap();
        let hash = svc.store.dump_to_tmp(Cursor::new(b"x".as_slice()), 1).await.unwrap();
        svc.store.publish(&hash, 1, &name).await.unwrap();

        // this node is the sole member, so it owns everything; GC is a no-op
        svc.garbage_collect().await.unwrap();
        let versions = svc.store.list_all_versions().await.unwrap();
        assert!(versions.contains_key(&name));
    }

    #[tokio::test]
    async fn garbage_collect_removes_files_no_longer_owned() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalStore::init(dir.path().join("sdfs")).await.unwrap());
        let self_member = Member::new("n1", "127.0.0.1", 7780);
        let other = Member::new("n2", "127.0.0.2", 7780);
        // two members, but membership.list_members() only reports `other` —
        // simulating this node having fallen off the ring for every file.
        let membership = Arc::new(StaticMembershipService::new(vec![other], self_member));
        let svc = ReplicaService::new(store, membership, RingConfig::default(), TimeoutConfig::default());

        let name = SdfsName::new("a.txt").unwrap();
        let hash = svc.store.dump_to_tmp(Cursor::new(b"x".as_slice()), 1).await.unwrap();
        svc.store.publish(&hash, 1, &name).await.unwrap();

        svc.garbage_collect().await.unwrap();
        let versions = svc.store.list_all_versions().await.unwrap();
        assert!(!versions.contains_key(&name));
    }

    #[tokio::test]
    async fn garbage_collect_is_empty_store_no_op() {
        let (svc, _dir) = fresh_service().await;
        svc.garbage_collect().await.unwrap();
        let versions = svc.store.list_all_versions().await.unwrap();
        assert!(versions.is_empty());
    }

    #[tokio::test]
    async fn replicate_on_empty_store_does_nothing() {
        let (svc, _dir) = fresh_service().await;
        svc.replicate().await.unwrap();
    }

    #[test]
    fn release_version_drops_empty_file_entry() {
        let mut set = FileVersionSet::new();
        let name = SdfsName::new("a.txt").unwrap();
        set.insert(name.clone(), [1i64].into_iter().collect());
        release_version(&mut set, &name, 1);
        assert!(!set.contains_key(&name));
    }
}
