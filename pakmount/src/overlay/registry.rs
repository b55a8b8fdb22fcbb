//! Registry of mounted archives.

use std::collections::HashMap;

use super::mount::{Mount, MountId, MountInfo, PriorityRank};
use crate::error::{VfsError, VfsResult};

/// Owns every [`Mount`].
///
/// The registry only stores mounts and their ranks; resolution happens in
/// [`OverlayIndex`](super::OverlayIndex), which is rebuilt from
/// [`ordered`](Self::ordered) after each mutation.
#[derive(Debug, Default)]
pub struct MountRegistry {
    mounts: HashMap<MountId, Mount>,
    next_sequence: u64,
}

impl MountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick an unused id for `display_name`: the name itself, or the name
    /// with a `~N` suffix when taken.
    pub fn unique_id(&self, display_name: &str) -> MountId {
        let base = MountId::new(display_name);
        if !self.mounts.contains_key(&base) {
            return base;
        }
        (2u64..)
            .map(|n| MountId::new(format!("{}~{}", display_name, n)))
            .find(|id| !self.mounts.contains_key(id))
            .unwrap_or(base)
    }

    /// Store a mount, assigning its tie-break sequence.
    pub fn insert(&mut self, mut mount: Mount) -> VfsResult<&Mount> {
        if self.mounts.contains_key(&mount.id) {
            return Err(VfsError::DuplicateMount(mount.id));
        }
        mount.sequence = self.next_sequence;
        self.next_sequence += 1;

        let id = mount.id.clone();
        Ok(&*self.mounts.entry(id).or_insert(mount))
    }

    pub fn remove(&mut self, id: &MountId) -> VfsResult<Mount> {
        self.mounts
            .remove(id)
            .ok_or_else(|| VfsError::UnknownMount(id.clone()))
    }

    /// Change a mount's rank. Returns the previous rank.
    pub fn set_priority(&mut self, id: &MountId, rank: PriorityRank) -> VfsResult<PriorityRank> {
        let mount = self
            .mounts
            .get_mut(id)
            .ok_or_else(|| VfsError::UnknownMount(id.clone()))?;
        Ok(std::mem::replace(&mut mount.priority_rank, rank))
    }

    pub fn get(&self, id: &MountId) -> Option<&Mount> {
        self.mounts.get(id)
    }

    pub fn contains(&self, id: &MountId) -> bool {
        self.mounts.contains_key(id)
    }

    /// Mounts in resolution order: ascending rank, then mount order.
    pub fn ordered(&self) -> Vec<&Mount> {
        let mut mounts: Vec<&Mount> = self.mounts.values().collect();
        mounts.sort_by_key(|m| m.order_key());
        mounts
    }

    /// Snapshot of all mounts in resolution order.
    pub fn list(&self) -> Vec<MountInfo> {
        self.ordered().into_iter().map(Mount::info).collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &MountId> {
        self.mounts.keys()
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    pub fn clear(&mut self) {
        self.mounts.clear();
    }
}
