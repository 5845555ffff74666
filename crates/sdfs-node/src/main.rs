//! SDFS node daemon: runs one replica and, when elected, one master on the
//! same process.
//!
//! Grounded in `original_source/mp3-sdfs`'s `main.go` (replica + master
//! started from the same binary, driven by membership churn).

mod churn;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sdfs_cluster::{MasterService, ReplicaService, StaticMembershipService};
use sdfs_core::SdfsConfig;
use sdfs_storage::LocalStore;

use churn::ChurnLoop;

#[derive(Parser)]
#[command(name = "sdfs-node")]
#[command(author = "SDFS Team")]
#[command(version = sdfs_core::VERSION)]
#[command(about = "SDFS replica/master daemon", long_about = None)]
struct Cli {
    /// Node config file path
    #[arg(short, long, env = "SDFS_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SdfsConfig::from_file(path).context("loading node config")?,
        None => SdfsConfig::from_env(),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();

    if config.node.member_id.is_empty() {
        anyhow::bail!("node.member_id must be set");
    }

    let self_node = config
        .membership
        .members
        .iter()
        .find(|m| m.member_id == config.node.member_id)
        .cloned()
        .context("node.member_id is not present in [membership] members")?;

    info!(member_id = %self_node.member_id, address = %self_node.address, "starting sdfs-node");

    let membership = Arc::new(StaticMembershipService::new(config.membership.members.clone(), self_node.clone()));

    let store = Arc::new(LocalStore::init(&config.node.data_root).await.context("initializing local store")?);

    let timeouts = config.timeouts;
    let ring = config.ring;

    let replica = ReplicaService::new(store, membership.clone(), ring, timeouts);
    let master = MasterService::new(membership.clone(), ring, timeouts);

    let bind_address = config.network.bind_address.clone();
    let replica_port = config.network.replica_port;
    let master_port = config.network.master_port;

    let serve_handle = {
        let replica = replica.clone();
        let bind_address = bind_address.clone();
        tokio::spawn(async move {
            if let Err(e) = replica.serve(&bind_address, replica_port).await {
                tracing::error!(error = %e, "replica listener exited");
            }
        })
    };

    let gc_period = std::time::Duration::from_secs(config.gc.period_secs);
    let _gc_handle = replica.clone().spawn_gc_daemon(gc_period);

    let churn_loop = ChurnLoop::new(
        membership.clone(),
        master,
        replica,
        bind_address,
        master_port,
        std::time::Duration::from_millis(config.churn.churn_timeout_ms),
    );
    let churn_handle = tokio::spawn(churn_loop.run());

    membership.announce();

    tokio::select! {
        res = serve_handle => { res.context("replica listener task panicked")?; }
        res = churn_handle => { res.context("churn loop task panicked")?; }
    }

    Ok(())
}
