//! Hierarchical views of the overlay for browsers.

use std::collections::{BTreeSet, HashMap};

use super::index::{FileStat, OverlayIndex};
use super::mount::{Mount, MountId};

/// How [`build_tree`] groups files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    /// One tree of resolved files.
    #[default]
    Merged,
    /// One subtree per mount, holding only the files that mount wins.
    ByMount,
}

/// Node of a file tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    /// VFS path, prefixed with `"{mount_id}:"` in the by-mount view.
    pub path: String,
    pub is_directory: bool,
    pub is_mount_root: bool,
    /// Set on every node of a by-mount subtree.
    pub mount_id: Option<MountId>,
    pub is_user_provided: bool,
    pub children: Vec<TreeNode>,
    /// Resolved file info for file nodes.
    pub file: Option<FileStat>,
}

impl TreeNode {
    fn directory(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_directory: true,
            is_mount_root: false,
            mount_id: None,
            is_user_provided: false,
            children: Vec::new(),
            file: None,
        }
    }

    /// Path usable with the VFS read/stat calls.
    pub fn vfs_path(&self) -> &str {
        match &self.mount_id {
            Some(id) => self
                .path
                .strip_prefix(id.as_str())
                .and_then(|p| p.strip_prefix(':'))
                .unwrap_or(&self.path),
            None => &self.path,
        }
    }

    /// Total file nodes below (and including) this node.
    pub fn file_count(&self) -> usize {
        if self.is_directory {
            self.children.iter().map(TreeNode::file_count).sum()
        } else {
            1
        }
    }

    /// Depth-first search for a node by tree path.
    pub fn find(&self, path: &str) -> Option<&TreeNode> {
        if self.path == path {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(path))
    }
}

/// Build a tree rooted at a node named `root` with an empty path.
///
/// `mounts` is only consulted in [`ViewMode::ByMount`].
pub fn build_tree<'a>(
    index: &OverlayIndex,
    mounts: impl IntoIterator<Item = &'a Mount>,
    mode: ViewMode,
) -> TreeNode {
    let mut root = TreeNode::directory("root", "");

    match mode {
        ViewMode::Merged => {
            let files: Vec<FileStat> = index
                .paths()
                .filter_map(|p| index.stat(p))
                .collect();
            fill(&mut root, files, None);
        }
        ViewMode::ByMount => {
            for mount in mounts {
                let mut mount_root = TreeNode::directory(mount.display_name(), mount.id().as_str());
                mount_root.is_mount_root = true;
                mount_root.mount_id = Some(mount.id().clone());
                mount_root.is_user_provided = mount.is_user_provided();

                fill(&mut mount_root, index.winners_for(mount.id()), Some(mount.id()));
                root.children.push(mount_root);
            }
        }
    }

    sort_tree(&mut root);
    root
}

/// Insert `files` (with their parent directories) under `root`.
fn fill(root: &mut TreeNode, files: Vec<FileStat>, mount_id: Option<&MountId>) {
    let display = |path: &str| match mount_id {
        Some(id) => format!("{}:{}", id, path),
        None => path.to_string(),
    };

    let mut dirs: BTreeSet<String> = BTreeSet::new();
    for file in &files {
        let mut current = file.path.as_str();
        while let Some(i) = current.rfind('/') {
            current = &current[..i];
            dirs.insert(current.to_string());
        }
    }

    // Parents sort before children, so each directory's parent exists
    // by the time it is attached.
    let mut nodes: HashMap<String, TreeNode> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for dir in &dirs {
        let name = dir.rsplit('/').next().unwrap_or(dir);
        let mut node = TreeNode::directory(name, display(dir));
        node.mount_id = mount_id.cloned();
        nodes.insert(dir.clone(), node);
        order.push(dir.clone());
    }

    let mut loose_files: Vec<TreeNode> = Vec::new();
    for file in files {
        let (parent, name) = match file.path.rfind('/') {
            Some(i) => (file.path[..i].to_string(), file.path[i + 1..].to_string()),
            None => (String::new(), file.path.clone()),
        };
        let node = TreeNode {
            name,
            path: display(&file.path),
            is_directory: false,
            is_mount_root: false,
            mount_id: mount_id.cloned(),
            is_user_provided: false,
            children: Vec::new(),
            file: Some(file),
        };
        match nodes.get_mut(&parent) {
            Some(dir) => dir.children.push(node),
            None => loose_files.push(node),
        }
    }

    // Attach deepest directories first.
    for dir in order.iter().rev() {
        let Some(node) = nodes.remove(dir) else {
            continue;
        };
        match dir.rfind('/') {
            Some(i) => match nodes.get_mut(&dir[..i]) {
                Some(parent) => parent.children.push(node),
                None => root.children.push(node),
            },
            None => root.children.push(node),
        }
    }
    root.children.extend(loose_files);
}

fn sort_tree(node: &mut TreeNode) {
    node.children.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.name.cmp(&b.name))
    });
    for child in &mut node.children {
        sort_tree(child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::registry::tests::mount;
    use crate::overlay::registry::MountRegistry;

    fn registry() -> MountRegistry {
        let mut registry = MountRegistry::new();
        registry
            .insert(mount(
                "base",
                0,
                &[
                    ("pics/colormap.pcx", "p"),
                    ("maps/base1.bsp", "m"),
                    ("default.cfg", "c"),
                ],
            ))
            .unwrap();
        registry
            .insert(mount("mod", 100, &[("maps/base1.bsp", "override"), ("Zed.txt", "z")]))
            .unwrap();
        registry
    }

    fn names(node: &TreeNode) -> Vec<&str> {
        node.children.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_merged_tree_sorted_dirs_first() {
        let registry = registry();
        let index = OverlayIndex::build(registry.ordered());
        let tree = build_tree(&index, registry.ordered(), ViewMode::Merged);

        assert_eq!(names(&tree), vec!["maps", "pics", "default.cfg", "zed.txt"]);
        assert_eq!(tree.file_count(), 4);

        let bsp = tree.find("maps/base1.bsp").unwrap();
        assert_eq!(bsp.file.as_ref().unwrap().source_mount_id.as_str(), "mod");
        assert_eq!(bsp.vfs_path(), "maps/base1.bsp");
    }

    #[test]
    fn test_by_mount_tree_lists_winners_only() {
        let registry = registry();
        let index = OverlayIndex::build(registry.ordered());
        let tree = build_tree(&index, registry.ordered(), ViewMode::ByMount);

        assert_eq!(names(&tree), vec!["base.pak", "mod.pak"]);
        let base = &tree.children[0];
        assert!(base.is_mount_root);
        assert_eq!(base.path, "base");
        // maps/base1.bsp is won by "mod", so base only keeps two files.
        assert_eq!(base.file_count(), 2);
        assert!(base.find("base:maps/base1.bsp").is_none());

        let cfg = base.find("base:default.cfg").unwrap();
        assert_eq!(cfg.vfs_path(), "default.cfg");

        let modded = tree.find("mod:maps/base1.bsp").unwrap();
        assert_eq!(modded.vfs_path(), "maps/base1.bsp");
        assert_eq!(tree.find("mod:maps").unwrap().vfs_path(), "maps");
    }

    #[test]
    fn test_empty_tree() {
        let tree = build_tree(&OverlayIndex::new(), std::iter::empty(), ViewMode::Merged);
        assert!(tree.children.is_empty());
        assert_eq!(tree.file_count(), 0);
        assert_eq!(tree.path, "");
    }
}
