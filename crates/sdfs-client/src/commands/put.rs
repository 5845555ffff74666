//! `put` — write a local file into the store.
//!
//! Grounded in `original_source/mp3-sdfs/client.go`'s `PutFile`: get a
//! quorum of replicas from master, gzip-stream the file to each one,
//! collect a content hash, then ask master to finalize the write.

use anyhow::{bail, Context, Result};
use tokio::fs::File;
use tracing::warn;

use sdfs_core::types::SdfsName;
use sdfs_wire::{Request, RequestKind};

use crate::config::Config;
use crate::progress::create_transfer_progress;
use crate::{master_client, replica_client};

pub async fn execute(config: &Config, local_path: &str, sdfs_name: &str) -> Result<()> {
    let name = SdfsName::new(sdfs_name)?;
    let quorum = master_client::get_replicas(config, &name, true).await?;
    if quorum.is_empty() {
        bail!("master returned an empty replica quorum for {sdfs_name}");
    }

    let encoded_size = {
        let file = File::open(local_path).await.with_context(|| format!("opening {local_path}"))?;
        sdfs_wire::gzip_encoded_size(file).await?
    };

    let pb = create_transfer_progress(encoded_size, sdfs_name);
    let mut content_hash = None;
    for replica in &quorum {
        let file = File::open(local_path).await.with_context(|| format!("re-opening {local_path}"))?;
        match send_to_replica(config, replica, &name, file, encoded_size).await {
            Ok(hash) => {
                pb.inc(encoded_size / quorum.len() as u64);
                content_hash.get_or_insert(hash);
            }
            Err(e) => warn!(peer = %replica.member_id, error = %e, "put to replica failed"),
        }
    }
    pb.finish_with_message("uploaded");

    let Some(content_hash) = content_hash else {
        bail!("put failed: no replica in the quorum accepted {sdfs_name}");
    };

    let version = master_client::finalize_write(config, &quorum, &name, &content_hash).await?;
    println!("put {sdfs_name} as version {version}");
    Ok(())
}

async fn send_to_replica(
    config: &Config,
    replica: &sdfs_core::types::Member,
    name: &SdfsName,
    file: File,
    encoded_size: u64,
) -> Result<String> {
    let stream = replica_client::dial_replica(config, replica).await?;
    // Split into owned halves: `send_file_as_gzip` drives a synchronous
    // gzip encoder from a blocking task, which needs a `'static` writer.
    let (mut read_half, mut write_half) = stream.into_split();

    let mut req = Request::new(RequestKind::SendFileData);
    req.sdfs_name = Some(name.clone());
    req.file_size = Some(encoded_size);
    sdfs_wire::send_request(&mut write_half, &req).await?;
    sdfs_wire::recv_response(&mut read_half).await?;

    sdfs_wire::send_file_as_gzip(file, write_half).await?;
    let resp = sdfs_wire::recv_response(&mut read_half).await?;
    resp.content_hash.context("replica did not return a content hash")
}
