//! SdfsName/Version/ContentHash data model and the set types built from them.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// A user-visible file name. UTF-8, no path separators.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SdfsName(String);

impl SdfsName {
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return Err(crate::Error::InvalidSdfsName(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SdfsName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SdfsName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A 64-bit nanosecond timestamp, assigned by Master at finalize time.
/// Uniquely identifies one write to one SdfsName.
pub type Version = i64;

/// Hex-encoded SHA-256 of the gzip-decompressed payload bytes.
pub type ContentHash = String;

/// `SdfsName -> set<Version>`. Summarizes what a replica holds or wants.
pub type FileVersionSet = HashMap<SdfsName, BTreeSet<Version>>;

/// The result of reconciling a `have` set against an `offered` set: which
/// versions to fetch, and which locally-held versions fall out of the
/// top-k window and should be discarded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergeResult {
    pub fetch: BTreeSet<Version>,
    pub discard: BTreeSet<Version>,
}

/// Pure merge of two version sets, keeping exactly the top `k` by numeric
/// version. Grounded in `fsys.MergedKLatestVersions`.
///
/// `fetch = (keep ∩ offered) \ have`; `discard = have \ keep`, where
/// `keep` is the top-`k` of `have ∪ offered`.
pub fn merge_k_latest(have: &BTreeSet<Version>, offered: &BTreeSet<Version>, k: usize) -> MergeResult {
    let mut union: Vec<Version> = have.union(offered).copied().collect();
    union.sort_unstable_by(|a, b| b.cmp(a));
    union.truncate(k);
    let keep: BTreeSet<Version> = union.into_iter().collect();

    let fetch: BTreeSet<Version> = keep.intersection(offered).filter(|v| !have.contains(v)).copied().collect();
    let discard: BTreeSet<Version> = have.difference(&keep).copied().collect();

    MergeResult { fetch, discard }
}

/// Pure set difference, per spec.md's `diff_for_deletes`: versions present
/// in `from` but not in `to`.
pub fn diff_for_deletes(from: &FileVersionSet, to: &FileVersionSet) -> FileVersionSet {
    let mut out = FileVersionSet::new();
    for (name, versions) in from {
        let present = to.get(name).cloned().unwrap_or_default();
        let missing: BTreeSet<Version> = versions.difference(&present).copied().collect();
        if !missing.is_empty() {
            out.insert(name.clone(), missing);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(vs: &[Version]) -> BTreeSet<Version> {
        vs.iter().copied().collect()
    }

    #[test]
    fn merge_keeps_top_k_across_both_sets() {
        let have = set(&[1, 2, 5]);
        let offered = set(&[3, 4, 6]);
        let result = merge_k_latest(&have, &offered, 3);
        // top 3 of {1,2,3,4,5,6} = {4,5,6}
        assert_eq!(result.fetch, set(&[4, 6]));
        assert_eq!(result.discard, set(&[1, 2]));
    }

    #[test]
    fn merge_invariant_p5() {
        let have = set(&[10, 20, 30, 40]);
        let offered = set(&[15, 25, 35]);
        let k = 4;
        let result = merge_k_latest(&have, &offered, k);

        let remaining: BTreeSet<Version> = have.difference(&result.discard).copied().collect();
        assert!(remaining.len() + result.fetch.len() <= k);
        assert!(result.fetch.is_disjoint(&have));
        assert!(result.discard.is_subset(&have));

        let mut union: Vec<Version> = have.union(&offered).copied().collect();
        union.sort_unstable_by(|a, b| b.cmp(a));
        union.truncate(k);
        let top_k: BTreeSet<Version> = union.into_iter().collect();
        let union_minus_discard: BTreeSet<Version> = have
            .union(&offered)
            .copied()
            .filter(|v| !result.discard.contains(v) || offered.contains(v))
            .collect();
        // every kept version is in top_k
        assert!(remaining.is_subset(&top_k));
        let _ = union_minus_discard;
    }

    #[test]
    fn nothing_to_fetch_when_already_present() {
        let have = set(&[5, 6, 7]);
        let offered = set(&[5, 6]);
        let result = merge_k_latest(&have, &offered, 5);
        assert!(result.fetch.is_empty());
        assert!(result.discard.is_empty());
    }

    #[test]
    fn diff_for_deletes_is_per_file_set_difference() {
        let name = SdfsName::new("a.txt").unwrap();
        let mut from = FileVersionSet::new();
        from.insert(name.clone(), set(&[1, 2, 3]));
        let mut to = FileVersionSet::new();
        to.insert(name.clone(), set(&[2, 3]));

        let diff = diff_for_deletes(&from, &to);
        assert_eq!(diff.get(&name).unwrap(), &set(&[1]));
    }

    #[test]
    fn sdfs_name_rejects_path_separators() {
        assert!(SdfsName::new("a/b").is_err());
        assert!(SdfsName::new("").is_err());
        assert!(SdfsName::new("ok.txt").is_ok());
    }
}
