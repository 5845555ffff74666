//! Membership, ring placement, master election, and the replica data
//! daemon for an SDFS node.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      sdfs-cluster                         │
//! ├──────────────────────────────────────────────────────────┤
//! │  MembershipService  │  MasterService   │  ReplicaService  │
//! │  - list_members()   │  - election      │  - TCP dispatch  │
//! │  - list_self()       │  - GetReplicas*  │  - replicate()   │
//! │  - changes() signal  │  - FinalizeWrite │  - garbage_collect│
//! │                      │  - FinalizeDelete│                  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Master and Replica are both driven by the node's ChurnLoop, which
//! debounces `MembershipService::changes()` notifications and, on each
//! settled tick, re-runs election and then a replication pass.

mod error;
mod master;
mod membership;
mod partition;
mod replica;
mod transport;

pub use error::{ClusterError, ClusterResult};
pub use master::MasterService;
pub use membership::{MembershipService, StaticMembershipService};
pub use partition::{run_partitioner, select_quorum};
pub use replica::ReplicaService;
