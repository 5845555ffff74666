//! `store` — list everything held by the replica this client is
//! co-located with.
//!
//! Grounded in `original_source/mp3-sdfs/client.go`'s `Store`: a plain
//! `REQ_LIST_FILES` to the local replica, no master involved.

use anyhow::{bail, Result};

use sdfs_wire::{Request, RequestKind};

use crate::config::Config;
use crate::replica_client;
use crate::utils::Table;

pub async fn execute(config: &Config) -> Result<()> {
    let Some(self_replica) = &config.self_replica else {
        bail!("`store` needs a [self_replica] entry in the client config naming the co-located node");
    };

    let stream = replica_client::dial_replica(config, self_replica).await?;
    let (mut read_half, mut write_half) = stream.into_split();
    let req = Request::new(RequestKind::ReqListFiles);
    sdfs_wire::send_request(&mut write_half, &req).await?;
    let resp = sdfs_wire::recv_response(&mut read_half).await?;
    let entries = resp.file_list.unwrap_or_default();

    let mut table = Table::new(&["NAME", "VERSION"]);
    for entry in &entries {
        table.push(vec![entry.name.to_string(), entry.version.to_string()]);
    }
    print!("{table}");
    Ok(())
}
