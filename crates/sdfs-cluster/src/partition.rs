//! Chord-style ring partitioning and quorum selection.
//!
//! Grounded in `original_source/mp3-sdfs/schema/node.go`'s `RunPartitioner`
//! and `master.go`'s `selectQuorum`.

use rand::seq::SliceRandom;

use sdfs_core::types::{ring_id, Member};

/// Determines which members own `sdfs_name`: hashes the name into the ring,
/// then walks the membership (sorted by each member's own ring id) forward
/// from the first id that is `>=` the file's id, collecting up to
/// `num_replicas` distinct members. Wraps around if the ring id search
/// starts past the last member. Returns fewer than `num_replicas` only if
/// the cluster itself has fewer members.
pub fn run_partitioner(members: &[Member], sdfs_name: &str, ring_size_bits: u32, num_replicas: usize) -> Vec<Member> {
    if members.is_empty() {
        return Vec::new();
    }

    let file_id = ring_id(sdfs_name, ring_size_bits);

    let mut sorted: Vec<&Member> = members.iter().collect();
    sorted.sort_by_key(|m| ring_id(&m.member_id, ring_size_bits));

    let start = sorted
        .iter()
        .position(|m| ring_id(&m.member_id, ring_size_bits) >= file_id)
        .unwrap_or(0);

    let take = num_replicas.min(sorted.len());
    (0..take).map(|i| sorted[(start + i) % sorted.len()].clone()).collect()
}

/// Shuffles `replicas` and truncates to `quorum_size` (or fewer, if there
/// aren't that many replicas). Mirrors `selectQuorum`'s random subset pick.
pub fn select_quorum(mut replicas: Vec<Member>, quorum_size: usize) -> Vec<Member> {
    replicas.shuffle(&mut rand::thread_rng());
    replicas.truncate(quorum_size);
    replicas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members(ids: &[&str]) -> Vec<Member> {
        ids.iter().map(|id| Member::new(*id, format!("{id}.example"), 7780)).collect()
    }

    #[test]
    fn empty_membership_yields_no_owners() {
        assert!(run_partitioner(&[], "a.txt", 32, 5).is_empty());
    }

    #[test]
    fn partitioner_returns_fewer_than_num_replicas_when_cluster_is_small() {
        let m = members(&["n1", "n2", "n3"]);
        let owners = run_partitioner(&m, "a.txt", 32, 5);
        assert_eq!(owners.len(), 3);
    }

    #[test]
    fn partitioner_is_deterministic_for_the_same_membership() {
        let m = members(&["n1", "n2", "n3", "n4", "n5", "n6", "n7"]);
        let a = run_partitioner(&m, "some-file", 32, 5);
        let b = run_partitioner(&m, "some-file", 32, 5);
        assert_eq!(a, b);
    }

    #[test]
    fn partitioner_returns_distinct_members() {
        let m = members(&["n1", "n2", "n3", "n4", "n5", "n6", "n7"]);
        let owners = run_partitioner(&m, "some-file", 32, 5);
        let mut ids: Vec<_> = owners.iter().map(|m| m.member_id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), owners.len());
    }

    #[test]
    fn select_quorum_never_exceeds_requested_size() {
        let m = members(&["n1", "n2", "n3"]);
        let quorum = select_quorum(m, 4);
        assert_eq!(quorum.len(), 3);
    }

    #[test]
    fn select_quorum_truncates_to_requested_size() {
        let m = members(&["n1", "n2", "n3", "n4", "n5"]);
        let quorum = select_quorum(m, 4);
        assert_eq!(quorum.len(), 4);
    }
}
