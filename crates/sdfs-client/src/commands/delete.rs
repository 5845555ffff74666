//! `delete` — ask master to finalize a delete across every ring owner.
//!
//! Grounded in `original_source/mp3-sdfs/client.go`'s `DeleteFile`.

use anyhow::Result;

use sdfs_core::types::SdfsName;

use crate::config::Config;
use crate::master_client;

pub async fn execute(config: &Config, sdfs_name: &str) -> Result<()> {
    let name = SdfsName::new(sdfs_name)?;
    let delete_time = master_client::finalize_delete(config, &name).await?;
    println!("deleted {sdfs_name} (delete time {delete_time})");
    Ok(())
}
