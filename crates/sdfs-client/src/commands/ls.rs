//! `ls` — ask every ring owner of a file whether they have it, and print a
//! table of who answered.
//!
//! Grounded in `original_source/mp3-sdfs/client.go`'s `Ls`: full
//! (non-quorum) placement, `REQ_FILE_METADATA` to each owner, tabwriter
//! output.

use anyhow::Result;
use colored::Colorize;

use sdfs_core::types::SdfsName;
use sdfs_wire::{Request, RequestKind};

use crate::config::Config;
use crate::utils::Table;
use crate::{master_client, replica_client};

pub async fn execute(config: &Config, sdfs_name: &str) -> Result<()> {
    let name = SdfsName::new(sdfs_name)?;
    let owners = master_client::get_replicas(config, &name, false).await?;

    let mut table = Table::new(&["MEMBER", "ADDRESS", "VERSION", "SIZE"]);
    for owner in &owners {
        let stream = replica_client::dial_replica(config, owner).await;
        let row = match stream {
            Ok(stream) => {
                let (mut read_half, mut write_half) = stream.into_split();
                let mut req = Request::new(RequestKind::ReqFileMetadata);
                req.sdfs_name = Some(name.clone());
                if sdfs_wire::send_request(&mut write_half, &req).await.is_err() {
                    [owner.member_id.clone(), owner.address.clone(), "-".into(), "unreachable".red().to_string()]
                } else {
                    match sdfs_wire::recv_response(&mut read_half).await {
                        Ok(resp) => [
                            owner.member_id.clone(),
                            owner.address.clone(),
                            resp.version_ns.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
                            resp.returning_size
                                .map(|s| s.to_string())
                                .unwrap_or_else(|| "not found".yellow().to_string()),
                        ],
                        Err(_) => [owner.member_id.clone(), owner.address.clone(), "-".into(), "not found".yellow().to_string()],
                    }
                }
            }
            Err(_) => [owner.member_id.clone(), owner.address.clone(), "-".into(), "unreachable".red().to_string()],
        };
        table.push(row.to_vec());
    }

    print!("{table}");
    Ok(())
}
