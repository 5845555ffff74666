//! Core data types for the SDFS node: membership, names, versions, and the
//! pure set-algebra used to reconcile replicas.

mod fileset;
mod member;
mod ring;

pub use fileset::{diff_for_deletes, merge_k_latest, ContentHash, FileVersionSet, MergeResult, SdfsName, Version};
pub use member::{Member, MembershipList};
pub use ring::ring_id;
