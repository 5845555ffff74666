//! `get` — fetch the newest version of a file into the local `fetched/`
//! area.
//!
//! Grounded in `original_source/mp3-sdfs/client.go`'s `GetFile`: ask a
//! read-consistency subset of replicas for metadata, pick whoever reports
//! the newest version, then pull the bytes from it.

use anyhow::{bail, Context, Result};
use tokio::fs::File;
use tracing::warn;

use sdfs_core::types::{Member, SdfsName, Version};
use sdfs_wire::{Request, RequestKind};

use crate::config::Config;
use crate::progress::create_spinner;
use crate::{master_client, replica_client};

const READ_CONSISTENCY: usize = 2;

pub async fn execute(config: &Config, sdfs_name: &str, dest_path: Option<&str>) -> Result<()> {
    let name = SdfsName::new(sdfs_name)?;
    let mut candidates = master_client::get_replicas(config, &name, false).await?;
    candidates.truncate(READ_CONSISTENCY.max(1));
    if candidates.is_empty() {
        bail!("master reported no replicas for {sdfs_name}");
    }

    let spinner = create_spinner(&format!("locating newest version of {sdfs_name}"));
    let mut best: Option<(Member, Version)> = None;
    for replica in &candidates {
        match query_metadata(config, replica, &name).await {
            Ok(version) => {
                if best.as_ref().map(|(_, v)| version > *v).unwrap_or(true) {
                    best = Some((replica.clone(), version));
                }
            }
            Err(e) => warn!(peer = %replica.member_id, error = %e, "metadata query failed"),
        }
    }
    spinner.finish_and_clear();

    let Some((replica, version)) = best else {
        bail!("{sdfs_name} not found on any queried replica");
    };

    let dest = dest_path
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| config.fetched_root.join(sdfs_name));
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    fetch_from_replica(config, &replica, &name, i64::MAX, &dest).await?;
    println!("fetched {sdfs_name} (version {version}) to {}", dest.display());
    Ok(())
}

async fn query_metadata(config: &Config, replica: &Member, name: &SdfsName) -> Result<Version> {
    let stream = replica_client::dial_replica(config, replica).await?;
    let (mut read_half, mut write_half) = stream.into_split();
    let mut req = Request::new(RequestKind::ReqFileMetadata);
    req.sdfs_name = Some(name.clone());
    sdfs_wire::send_request(&mut write_half, &req).await?;
    let resp = sdfs_wire::recv_response(&mut read_half).await?;
    resp.version_ns.context("replica did not report a version")
}

/// Fetches the newest version `<= upper_bound` from `replica`, writing the
/// decompressed content to `dest`. Used directly by `getversions` too.
pub async fn fetch_from_replica(
    config: &Config,
    replica: &Member,
    name: &SdfsName,
    upper_bound: Version,
    dest: &std::path::Path,
) -> Result<Version> {
    let stream = replica_client::dial_replica(config, replica).await?;
    let (mut read_half, mut write_half) = stream.into_split();
    let mut req = Request::new(RequestKind::ReqFileData);
    req.sdfs_name = Some(name.clone());
    req.upper_version_bound_ns = Some(upper_bound);
    sdfs_wire::send_request(&mut write_half, &req).await?;
    let resp = sdfs_wire::recv_response(&mut read_half).await?;
    let size = resp.returning_size.context("replica did not report a size")?;
    let version = resp.version_ns.context("replica did not report a version")?;

    let out = File::create(dest).await.with_context(|| format!("creating {}", dest.display()))?;
    let limited = tokio::io::AsyncReadExt::take(read_half, size);
    sdfs_wire::recv_file_from_gzip(limited, out).await?;
    Ok(version)
}
