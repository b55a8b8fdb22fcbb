//! Mount types.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::archive::{ArchiveEntry, ArchiveIndex};
use crate::fingerprint::ContentFingerprint;

/// Priority rank. Higher ranks override lower ones.
pub type PriorityRank = i64;

/// Identifier of a mounted archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MountId(String);

impl MountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Well-known rank bands.
///
/// Base content loads first, official expansions over it, third-party mods
/// over those, and archives the user explicitly ordered on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PriorityClass {
    Base,
    Expansion,
    Mod,
    UserOverride,
}

impl PriorityClass {
    pub fn rank(&self) -> PriorityRank {
        match self {
            PriorityClass::Base => 0,
            PriorityClass::Expansion => 50,
            PriorityClass::Mod => 100,
            PriorityClass::UserOverride => 200,
        }
    }
}

impl fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PriorityClass::Base => "base",
            PriorityClass::Expansion => "expansion",
            PriorityClass::Mod => "mod",
            PriorityClass::UserOverride => "user-override",
        };
        f.write_str(s)
    }
}

/// A loaded archive.
///
/// Owns the archive bytes; member reads are zero-copy slices of them.
#[derive(Debug, Clone)]
pub struct Mount {
    pub(crate) id: MountId,
    pub(crate) display_name: String,
    pub(crate) priority_rank: PriorityRank,
    /// Monotonic mount order, used to break rank ties.
    pub(crate) sequence: u64,
    pub(crate) fingerprint: ContentFingerprint,
    pub(crate) is_user_provided: bool,
    pub(crate) index: Arc<ArchiveIndex>,
    pub(crate) data: Bytes,
}

impl Mount {
    pub fn id(&self) -> &MountId {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn priority_rank(&self) -> PriorityRank {
        self.priority_rank
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn fingerprint(&self) -> &ContentFingerprint {
        &self.fingerprint
    }

    pub fn is_user_provided(&self) -> bool {
        self.is_user_provided
    }

    pub fn index(&self) -> &ArchiveIndex {
        &self.index
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Bytes of one member.
    pub fn read_entry(&self, entry: &ArchiveEntry) -> Bytes {
        self.data.slice(entry.range())
    }

    /// Bytes of a member by path.
    pub fn read(&self, path: &str) -> Option<Bytes> {
        self.index.get(path).map(|e| self.read_entry(e))
    }

    /// Sort key for overlay resolution (ascending = applied first).
    pub(crate) fn order_key(&self) -> (PriorityRank, u64) {
        (self.priority_rank, self.sequence)
    }

    pub fn info(&self) -> MountInfo {
        MountInfo {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            priority_rank: self.priority_rank,
            fingerprint: self.fingerprint.clone(),
            is_user_provided: self.is_user_provided,
            file_count: self.index.len(),
            total_size: self.index.total_size(),
        }
    }
}

/// Snapshot of a mount without its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    pub id: MountId,
    pub display_name: String,
    pub priority_rank: PriorityRank,
    pub fingerprint: ContentFingerprint,
    pub is_user_provided: bool,
    pub file_count: usize,
    pub total_size: u64,
}

/// Returned by a successful mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountHandle {
    pub id: MountId,
    pub fingerprint: ContentFingerprint,
    pub priority_rank: PriorityRank,
    pub file_count: usize,
}

/// Parameters for mounting an archive.
///
/// # Example
///
/// ```
/// use pakmount::overlay::{MountRequest, PriorityClass};
///
/// let request = MountRequest::new("pak0.pak", vec![0u8; 12])
///     .with_id("base")
///     .with_priority(PriorityClass::Base.rank());
/// assert_eq!(request.display_name(), "pak0.pak");
/// ```
#[derive(Debug, Clone)]
pub struct MountRequest {
    pub(crate) bytes: Bytes,
    pub(crate) id: Option<MountId>,
    pub(crate) display_name: String,
    pub(crate) is_user_provided: bool,
    pub(crate) priority_rank: Option<PriorityRank>,
}

impl MountRequest {
    pub fn new(display_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            id: None,
            display_name: display_name.into(),
            is_user_provided: false,
            priority_rank: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<MountId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn user_provided(mut self, is_user_provided: bool) -> Self {
        self.is_user_provided = is_user_provided;
        self
    }

    /// Explicit rank. Without one, the rank is derived from the archive's
    /// detected [`PriorityClass`].
    pub fn with_priority(mut self, rank: PriorityRank) -> Self {
        self.priority_rank = Some(rank);
        self
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_class_ranks_ordered() {
        assert_eq!(PriorityClass::Base.rank(), 0);
        assert_eq!(PriorityClass::Expansion.rank(), 50);
        assert_eq!(PriorityClass::Mod.rank(), 100);
        assert_eq!(PriorityClass::UserOverride.rank(), 200);
        assert!(PriorityClass::Mod > PriorityClass::Expansion);
    }

    #[test]
    fn test_mount_reads_slices() {
        let data = Bytes::from_static(b"....hello....");
        let index = ArchiveIndex::from_entries(vec![ArchiveEntry::new("greeting.txt", 4, 5)]);
        let mount = Mount {
            id: MountId::from("m"),
            display_name: "m.pak".into(),
            priority_rank: 0,
            sequence: 0,
            fingerprint: ContentFingerprint::compute(&data, "m.pak"),
            is_user_provided: false,
            index: Arc::new(index),
            data,
        };

        assert_eq!(mount.read("GREETING.TXT").unwrap(), Bytes::from_static(b"hello"));
        assert!(mount.read("other").is_none());
        assert_eq!(mount.info().file_count, 1);
        assert_eq!(mount.info().total_size, 5);
    }

    #[test]
    fn test_request_builder() {
        let request = MountRequest::new("mod.pak", vec![1, 2])
            .with_id("mymod")
            .user_provided(true)
            .with_priority(7);
        assert_eq!(request.id, Some(MountId::from("mymod")));
        assert!(request.is_user_provided);
        assert_eq!(request.priority_rank, Some(7));
        assert_eq!(request.bytes().len(), 2);
    }
}
