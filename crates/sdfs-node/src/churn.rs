//! Debounced membership-change driver.
//!
//! Grounded in spec.md's "Debounce (ChurnLoop)": on each membership
//! notification, reset a `CHURN_TIMEOUT_MS` timer; on timer fire, refresh
//! membership, reconsider master status, then run a replication pass.
//! Rapid churn collapses into one refresh at the tail — `tokio::time::sleep`
//! reset on every new notification does exactly that, rather than firing
//! once per notification.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use sdfs_cluster::{MasterService, MembershipService, ReplicaService};

pub struct ChurnLoop<M: MembershipService> {
    membership: Arc<M>,
    master: Arc<MasterService<M>>,
    replica: Arc<ReplicaService<M>>,
    bind_address: String,
    master_port: u16,
    debounce: Duration,
}

impl<M: MembershipService + 'static> ChurnLoop<M> {
    pub fn new(
        membership: Arc<M>,
        master: Arc<MasterService<M>>,
        replica: Arc<ReplicaService<M>>,
        bind_address: String,
        master_port: u16,
        debounce: Duration,
    ) -> Self {
        Self { membership, master, replica, bind_address, master_port, debounce }
    }

    pub async fn run(self) {
        let mut changes = self.membership.changes();
        loop {
            if changes.changed().await.is_err() {
                info!("membership channel closed, churn loop exiting");
                return;
            }

            // Collapse a burst of notifications into one refresh: keep
            // resetting the debounce window as long as new signals keep
            // arriving within it.
            loop {
                match tokio::time::timeout(self.debounce, changes.changed()).await {
                    Ok(Ok(())) => continue,
                    Ok(Err(_)) => {
                        info!("membership channel closed, churn loop exiting");
                        return;
                    }
                    Err(_elapsed) => break,
                }
            }

            if let Err(e) = self.master.membership_list_changed(&self.bind_address, self.master_port).await {
                error!(error = %e, "master election/placement refresh failed");
            }
            if let Err(e) = self.replica.replicate().await {
                error!(error = %e, "replication pass failed");
            }
        }
    }
}
