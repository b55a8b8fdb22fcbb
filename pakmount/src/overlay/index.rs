//! Derived path → winning mount index.

use std::collections::{BTreeSet, HashMap};

use crate::archive::{normalize_path, ArchiveEntry};
use crate::codec::extension;

use super::mount::{Mount, MountId};

/// Where a resolved path's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    pub mount_id: MountId,
    pub entry: ArchiveEntry,
}

/// Resolved file information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub path: String,
    pub size: u64,
    pub source_mount_id: MountId,
}

/// Contents of one merged directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryListing {
    /// Files directly in the directory, sorted by name.
    pub files: Vec<FileStat>,
    /// Names of immediate subdirectories, sorted.
    pub subdirectories: Vec<String>,
}

#[derive(Debug, Default, Clone)]
struct DirNode {
    subdirectories: BTreeSet<String>,
    files: BTreeSet<String>,
}

/// Merged view of every mount.
///
/// Built by applying mounts in ascending priority order: each mount's
/// entries overwrite earlier ones, so the last writer (highest rank, most
/// recent on ties) wins. Directories are the union over all mounts.
/// The index is disposable and rebuilt in full after every registry change.
#[derive(Debug, Default, Clone)]
pub struct OverlayIndex {
    files: HashMap<String, FileSource>,
    directories: HashMap<String, DirNode>,
}

impl OverlayIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `mounts`, which must already be in resolution order.
    pub fn build<'a>(mounts: impl IntoIterator<Item = &'a Mount>) -> Self {
        let mut index = Self::new();
        index.directories.insert(String::new(), DirNode::default());

        for mount in mounts {
            for entry in mount.index().entries() {
                index.files.insert(
                    entry.path.clone(),
                    FileSource {
                        mount_id: mount.id().clone(),
                        entry: entry.clone(),
                    },
                );
                index.add_parents(&entry.path);
            }
        }
        index
    }

    fn add_parents(&mut self, path: &str) {
        let (mut dir, file) = split_parent(path);
        self.directories
            .entry(dir.to_string())
            .or_default()
            .files
            .insert(file.to_string());

        while !dir.is_empty() {
            let (parent, name) = split_parent(dir);
            let node = self.directories.entry(parent.to_string()).or_default();
            if !node.subdirectories.insert(name.to_string()) {
                break;
            }
            dir = parent;
        }
    }

    /// Winning source for `path`.
    pub fn resolve(&self, path: &str) -> Option<&FileSource> {
        self.files.get(&normalize_path(path))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.resolve(path).is_some()
    }

    pub fn stat(&self, path: &str) -> Option<FileStat> {
        self.resolve(path).map(to_stat)
    }

    pub fn is_directory(&self, path: &str) -> bool {
        self.directories.contains_key(&normalize_path(path))
    }

    /// Merged listing of `dir` (`""` for the root).
    ///
    /// Returns an empty listing for unknown directories.
    pub fn list(&self, dir: &str) -> DirectoryListing {
        let dir = normalize_path(dir);
        let Some(node) = self.directories.get(&dir) else {
            return DirectoryListing::default();
        };

        let files = node
            .files
            .iter()
            .filter_map(|name| self.files.get(&join(&dir, name)).map(to_stat))
            .collect();

        DirectoryListing {
            files,
            subdirectories: node.subdirectories.iter().cloned().collect(),
        }
    }

    /// Files whose extension equals `ext` (case-insensitive, leading dot
    /// optional), sorted by path.
    pub fn find_by_extension(&self, ext: &str) -> Vec<FileStat> {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.collect_sorted(|path| extension(path) == ext)
    }

    /// Files whose path matches a glob pattern, sorted by path.
    pub fn find_matching(&self, pattern: &glob::Pattern) -> Vec<FileStat> {
        let options = glob::MatchOptions {
            case_sensitive: false,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        self.collect_sorted(|path| pattern.matches_with(path, options))
    }

    /// Paths won by `mount_id`, sorted.
    pub fn winners_for(&self, mount_id: &MountId) -> Vec<FileStat> {
        let mut stats: Vec<FileStat> = self
            .files
            .values()
            .filter(|s| &s.mount_id == mount_id)
            .map(to_stat)
            .collect();
        stats.sort_by(|a, b| a.path.cmp(&b.path));
        stats
    }

    fn collect_sorted(&self, mut predicate: impl FnMut(&str) -> bool) -> Vec<FileStat> {
        let mut stats: Vec<FileStat> = self
            .files
            .iter()
            .filter(|(path, _)| predicate(path))
            .map(|(_, source)| to_stat(source))
            .collect();
        stats.sort_by(|a, b| a.path.cmp(&b.path));
        stats
    }

    /// All resolved paths, unordered.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Number of resolved files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn directory_count(&self) -> usize {
        self.directories.len()
    }
}

fn to_stat(source: &FileSource) -> FileStat {
    FileStat {
        path: source.entry.path.clone(),
        size: source.entry.length,
        source_mount_id: source.mount_id.clone(),
    }
}

fn split_parent(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(i) => (&path[..i], &path[i + 1..]),
        None => ("", path),
    }
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::registry::tests::mount;
    use crate::overlay::registry::MountRegistry;

    fn build(mounts: Vec<Mount>) -> OverlayIndex {
        let mut registry = MountRegistry::new();
        for m in mounts {
            registry.insert(m).unwrap();
        }
        OverlayIndex::build(registry.ordered())
    }

    #[test]
    fn test_empty_index() {
        let index = OverlayIndex::build(std::iter::empty());
        assert!(index.is_empty());
        assert!(index.resolve("x.txt").is_none());
        assert!(index.list("").files.is_empty());
        assert!(index.is_directory(""));
    }

    #[test]
    fn test_higher_rank_wins() {
        let index = build(vec![
            mount("b", 10, &[("x.txt", "B")]),
            mount("a", 0, &[("x.txt", "A"), ("only_a.txt", "A")]),
        ]);

        assert_eq!(index.resolve("x.txt").unwrap().mount_id.as_str(), "b");
        assert_eq!(index.resolve("only_a.txt").unwrap().mount_id.as_str(), "a");
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_equal_rank_most_recent_wins() {
        let index = build(vec![
            mount("first", 5, &[("x.txt", "1")]),
            mount("second", 5, &[("x.txt", "2")]),
        ]);
        assert_eq!(index.resolve("X.TXT").unwrap().mount_id.as_str(), "second");
    }

    #[test]
    fn test_list_unions_directories() {
        let index = build(vec![
            mount(
                "base",
                0,
                &[("pics/colormap.pcx", "p"), ("maps/base1.bsp", "m")],
            ),
            mount(
                "mod",
                100,
                &[("maps/mymap.bsp", "mm"), ("pics/colormap.pcx", "override")],
            ),
        ]);

        let root = index.list("");
        assert_eq!(root.subdirectories, vec!["maps", "pics"]);
        assert!(root.files.is_empty());

        let maps = index.list("maps/");
        let names: Vec<&str> = maps.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(names, vec!["maps/base1.bsp", "maps/mymap.bsp"]);

        let pics = index.list("pics");
        assert_eq!(pics.files.len(), 1);
        assert_eq!(pics.files[0].source_mount_id.as_str(), "mod");
        assert_eq!(pics.files[0].size, 8);

        assert_eq!(index.list("nope"), DirectoryListing::default());
    }

    #[test]
    fn test_nested_directories() {
        let index = build(vec![mount(
            "a",
            0,
            &[("models/items/armor/tris.md2", "x")],
        )]);

        assert_eq!(index.list("").subdirectories, vec!["models"]);
        assert_eq!(index.list("models").subdirectories, vec!["items"]);
        assert_eq!(index.list("models/items").subdirectories, vec!["armor"]);
        assert!(index.is_directory("models/items/armor"));
        assert_eq!(index.directory_count(), 4);
    }

    #[test]
    fn test_find_by_extension() {
        let index = build(vec![mount(
            "a",
            0,
            &[("b.WAV", "1"), ("sound/a.wav", "2"), ("c.pcx", "3")],
        )]);

        let found = index.find_by_extension(".wav");
        let paths: Vec<&str> = found.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["b.wav", "sound/a.wav"]);
        assert!(index.find_by_extension("md2").is_empty());
    }

    #[test]
    fn test_find_matching() {
        let index = build(vec![mount(
            "a",
            0,
            &[("maps/base1.bsp", "1"), ("maps/base2.bsp", "2"), ("maps/q2dm1.bsp", "3")],
        )]);

        let pattern = glob::Pattern::new("maps/BASE*.bsp").unwrap();
        assert_eq!(index.find_matching(&pattern).len(), 2);
    }

    #[test]
    fn test_winners_for() {
        let index = build(vec![
            mount("a", 0, &[("x.txt", "A"), ("y.txt", "A")]),
            mount("b", 10, &[("x.txt", "B")]),
        ]);

        let a: Vec<String> = index
            .winners_for(&MountId::from("a"))
            .into_iter()
            .map(|s| s.path)
            .collect();
        assert_eq!(a, vec!["y.txt"]);
    }
}
