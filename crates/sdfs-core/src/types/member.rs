//! Cluster membership data model.

use serde::{Deserialize, Serialize};

/// A cluster node and its contact information.
///
/// `member_id` is totally ordered (plain string comparison); the member
/// with the lexicographically smallest id among the live set is master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub member_id: String,
    pub address: String,
    pub port: u32,
    #[serde(default)]
    pub pings_dropped: u32,
}

impl Member {
    pub fn new(member_id: impl Into<String>, address: impl Into<String>, port: u32) -> Self {
        Self {
            member_id: member_id.into(),
            address: address.into(),
            port,
            pings_dropped: 0,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// A snapshot of the cluster's membership, mutated only by the membership
/// service. Callers that need to observe churn should wrap this in a
/// `parking_lot::RwLock` (or similar) and take brief read/write locks for
/// snapshot copies, per the concurrency model.
#[derive(Debug, Clone, Default)]
pub struct MembershipList {
    pub members: Vec<Member>,
    pub self_node: Member,
}

impl MembershipList {
    pub fn new(members: Vec<Member>, self_node: Member) -> Self {
        Self { members, self_node }
    }

    /// The member with the lexicographically smallest `member_id`.
    ///
    /// Mirrors `schema.MemList.CurrMasterNode()`: assumes the caller already
    /// holds whatever lock guards this list.
    pub fn current_master(&self) -> crate::Result<&Member> {
        self.members
            .iter()
            .filter(|m| !m.member_id.is_empty())
            .min_by(|a, b| a.member_id.cmp(&b.member_id))
            .ok_or(crate::Error::EmptyMembershipList)
    }

    pub fn is_self_master(&self) -> crate::Result<bool> {
        Ok(self.current_master()?.member_id == self.self_node.member_id)
    }

    pub fn get(&self, member_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.member_id == member_id)
    }
}

impl Default for Member {
    fn default() -> Self {
        Self {
            member_id: String::new(),
            address: String::new(),
            port: 0,
            pings_dropped: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_master_is_lowest_id() {
        let list = MembershipList::new(
            vec![
                Member::new("c", "10.0.0.3", 7780),
                Member::new("a", "10.0.0.1", 7780),
                Member::new("b", "10.0.0.2", 7780),
            ],
            Member::new("a", "10.0.0.1", 7780),
        );
        assert_eq!(list.current_master().unwrap().member_id, "a");
        assert!(list.is_self_master().unwrap());
    }

    #[test]
    fn empty_list_has_no_master() {
        let list = MembershipList::new(vec![], Member::default());
        assert!(list.current_master().is_err());
    }
}
