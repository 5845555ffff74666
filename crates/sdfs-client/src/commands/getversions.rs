//! `getversions` — pull the `k` most recent versions of a file.
//!
//! Grounded in `original_source/mp3-sdfs/client.go`'s `GetVersions`:
//! non-quorum placement, `REQ_K_VERSIONS` to every owner, merge the
//! reported `(name, version)` pairs into a descending unique list, then
//! fetch each of the top `k` from whichever replica reported it, writing
//! `<local>-version-<i>` files (newest first, `i` starting at 0).

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{bail, Result};
use tracing::warn;

use sdfs_core::types::{Member, SdfsName, Version};
use sdfs_wire::{Request, RequestKind};

use crate::commands::get::fetch_from_replica;
use crate::config::Config;
use crate::{master_client, replica_client};

pub async fn execute(config: &Config, sdfs_name: &str, k: usize, dest_prefix: Option<&str>) -> Result<()> {
    let k = k.max(1);
    let name = SdfsName::new(sdfs_name)?;
    let owners = master_client::get_replicas(config, &name, false).await?;
    if owners.is_empty() {
        bail!("master reported no replicas for {sdfs_name}");
    }

    // (version, owner) pairs, deduped by version, newest first.
    let mut by_version: Vec<(Version, Member)> = Vec::new();
    let mut seen: BTreeSet<Version> = BTreeSet::new();
    for owner in &owners {
        match query_k_versions(config, owner, &name, k).await {
            Ok(versions) => {
                for version in versions {
                    if seen.insert(version) {
                        by_version.push((version, owner.clone()));
                    }
                }
            }
            Err(e) => warn!(peer = %owner.member_id, error = %e, "k-versions query failed"),
        }
    }
    by_version.sort_by(|a, b| b.0.cmp(&a.0));
    by_version.truncate(k);

    if by_version.is_empty() {
        bail!("{sdfs_name} has no versions on any queried replica");
    }

    let prefix = dest_prefix.unwrap_or(sdfs_name);
    for (i, (version, owner)) in by_version.iter().enumerate() {
        let dest = PathBuf::from(format!("{prefix}-version-{i}"));
        match fetch_from_replica(config, owner, &name, *version, &dest).await {
            Ok(got) => println!("fetched {sdfs_name} version {got} to {}", dest.display()),
            Err(e) => warn!(peer = %owner.member_id, version, error = %e, "fetch failed"),
        }
    }
    Ok(())
}

async fn query_k_versions(config: &Config, owner: &Member, name: &SdfsName, k: usize) -> Result<Vec<Version>> {
    let stream = replica_client::dial_replica(config, owner).await?;
    let (mut read_half, mut write_half) = stream.into_split();
    let mut req = Request::new(RequestKind::ReqKVersions);
    req.sdfs_name = Some(name.clone());
    req.k_versions = Some(k);
    sdfs_wire::send_request(&mut write_half, &req).await?;
    let resp = sdfs_wire::recv_response(&mut read_half).await?;
    Ok(resp.file_list.unwrap_or_default().into_iter().map(|e| e.version).collect())
}
