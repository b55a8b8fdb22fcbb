//! Mount bookkeeping and overlay resolution.
//!
//! - [`MountRegistry`] owns every loaded [`Mount`]
//! - [`OverlayIndex`] is the derived path → winner map, rebuilt from the
//!   registry after each change
//! - [`PriorityReorderProtocol`] turns an explicit order into ranks
//! - [`detect_mod`] classifies archives into [`PriorityClass`]es
//! - [`build_tree`] renders the overlay as a browsable tree
//!
//! Resolution is last-writer-wins over mounts sorted by ascending
//! `(priority_rank, sequence)`: the highest rank wins, and on equal ranks
//! the most recently mounted archive wins.

mod classify;
mod index;
mod mount;
mod registry;
mod reorder;
mod tree;

pub use classify::{detect_mod, detect_mods, detect_priority_class, ModInfo, ModManifest};
pub use index::{DirectoryListing, FileSource, FileStat, OverlayIndex};
pub use mount::{
    Mount, MountHandle, MountId, MountInfo, MountRequest, PriorityClass, PriorityRank,
};
pub use registry::MountRegistry;
pub use reorder::{PriorityReorderProtocol, DEFAULT_REORDER_SPACING};
pub use tree::{build_tree, TreeNode, ViewMode};
