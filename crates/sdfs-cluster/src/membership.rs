//! Membership as a black box: `list_members()`, `list_self()`, and a churn
//! notification signal, per the core's dependency on it.
//!
//! Ships one concrete implementation — a static, config-driven member list
//! that never churns on its own — grounded in the async notification-channel
//! plumbing of `hafiz-cluster/src/discovery.rs`'s `DiscoveryService`, without
//! its HTTP join-handshake (the actual gossip/failure-detector protocol is
//! out of scope; see DESIGN.md).

use tokio::sync::watch;

use sdfs_core::types::Member;

/// What the rest of the cluster crate needs from membership: the current
/// list, this node's own entry, and a signal that fires whenever either may
/// have changed. Implementations decide how membership is actually
/// discovered; the core never inspects that mechanism.
pub trait MembershipService: Send + Sync {
    fn list_members(&self) -> Vec<Member>;
    fn list_self(&self) -> Member;

    /// A fresh receiver on the churn-notification channel. Every value sent
    /// means "re-read `list_members()`/`list_self()`, something may have
    /// changed" — the payload itself carries no information.
    fn changes(&self) -> watch::Receiver<()>;
}

/// Reads `[membership] seeds` once at startup and never changes it again.
/// The notification channel exists so `ChurnLoop` runs identically whether
/// membership is static or, eventually, backed by a real failure detector;
/// for this implementation it only ever fires once, to kick off the first
/// election + replication pass.
pub struct StaticMembershipService {
    members: Vec<Member>,
    self_node: Member,
    tx: watch::Sender<()>,
}

impl StaticMembershipService {
    pub fn new(members: Vec<Member>, self_node: Member) -> Self {
        let (tx, _rx) = watch::channel(());
        Self { members, self_node, tx }
    }

    /// Fires the notification channel once. Called by the node's startup
    /// sequence after construction so `ChurnLoop` runs its first pass.
    pub fn announce(&self) {
        let _ = self.tx.send(());
    }
}

impl MembershipService for StaticMembershipService {
    fn list_members(&self) -> Vec<Member> {
        self.members.clone()
    }

    fn list_self(&self) -> Member {
        self.self_node.clone()
    }

    fn changes(&self) -> watch::Receiver<()> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_service_reports_the_configured_list() {
        let members = vec![Member::new("a", "10.0.0.1", 7780), Member::new("b", "10.0.0.2", 7780)];
        let svc = StaticMembershipService::new(members.clone(), members[0].clone());
        assert_eq!(svc.list_members(), members);
        assert_eq!(svc.list_self(), members[0]);
    }

    #[tokio::test]
    async fn announce_wakes_a_subscriber() {
        let svc = StaticMembershipService::new(vec![], Member::default());
        let mut rx = svc.changes();
        svc.announce();
        rx.changed().await.unwrap();
    }
}
