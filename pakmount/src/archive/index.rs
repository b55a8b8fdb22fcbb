//! Archive member index.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Location of one member inside an archive's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Normalised relative path (see [`normalize_path`]).
    pub path: String,
    /// Byte offset of the member within the archive.
    pub offset: u64,
    /// Member length in bytes.
    pub length: u64,
}

impl ArchiveEntry {
    pub fn new(path: impl AsRef<str>, offset: u64, length: u64) -> Self {
        Self {
            path: normalize_path(path.as_ref()),
            offset,
            length,
        }
    }

    /// Byte range of this member.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset as usize..(self.offset + self.length) as usize
    }
}

/// Ordered list of members decoded from one archive.
///
/// Paths are unique: when the source directory lists a name twice, the
/// later record replaces the earlier one in place. The index is cheap to
/// serialise and is what the archive-index cache stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveIndex {
    entries: Vec<ArchiveEntry>,
}

impl ArchiveIndex {
    /// Build an index, collapsing duplicate paths (later wins).
    pub fn from_entries(entries: impl IntoIterator<Item = ArchiveEntry>) -> Self {
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut out: Vec<ArchiveEntry> = Vec::new();
        for entry in entries {
            match positions.get(&entry.path) {
                Some(&i) => out[i] = entry,
                None => {
                    positions.insert(entry.path.clone(), out.len());
                    out.push(entry);
                }
            }
        }
        Self { entries: out }
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Linear lookup; the overlay keeps its own hash index for hot paths.
    pub fn get(&self, path: &str) -> Option<&ArchiveEntry> {
        let path = normalize_path(path);
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Sum of member lengths.
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.length).sum()
    }
}

/// Normalise an archive path.
///
/// Backslashes become `/`, leading slashes and `./` segments are dropped,
/// repeated separators collapse, and the result is lowercased.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect::<Vec<_>>()
        .join("/")
        .to_lowercase()
}
