//! Explicit reordering of mounts.

use std::collections::HashSet;

use super::mount::{MountId, PriorityClass, PriorityRank};
use super::registry::MountRegistry;
use crate::error::{VfsError, VfsResult};

/// Default gap between consecutive reordered ranks.
pub const DEFAULT_REORDER_SPACING: PriorityRank = 10;

/// Assigns evenly spaced ranks from a user-supplied order.
///
/// The first id gets `base_floor`, the next `base_floor + spacing`, and so
/// on, so the last id in the list wins every conflict. The gaps leave room
/// for later single-mount priority changes without renumbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityReorderProtocol {
    base_floor: PriorityRank,
    spacing: PriorityRank,
}

impl PriorityReorderProtocol {
    pub fn new(base_floor: PriorityRank, spacing: PriorityRank) -> Self {
        Self {
            base_floor,
            spacing: spacing.max(1),
        }
    }

    pub fn base_floor(&self) -> PriorityRank {
        self.base_floor
    }

    pub fn spacing(&self) -> PriorityRank {
        self.spacing
    }

    /// Rank for the mount at `position` in the order.
    pub fn rank_for(&self, position: usize) -> PriorityRank {
        self.base_floor + position as PriorityRank * self.spacing
    }

    /// Ranks for `order`, lowest first.
    pub fn ranks(&self, order: &[MountId]) -> Vec<(MountId, PriorityRank)> {
        order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), self.rank_for(i)))
            .collect()
    }

    /// Validate `order` and write the new ranks into `registry`.
    ///
    /// `order` must name every mounted id exactly once. Nothing is changed
    /// when validation fails. The caller rebuilds the overlay once
    /// afterwards.
    pub fn apply(
        &self,
        registry: &mut MountRegistry,
        order: &[MountId],
    ) -> VfsResult<Vec<(MountId, PriorityRank)>> {
        let mut seen = HashSet::with_capacity(order.len());
        for id in order {
            if !registry.contains(id) {
                return Err(VfsError::UnknownMount(id.clone()));
            }
            if !seen.insert(id) {
                return Err(VfsError::InvalidReorder(format!("'{}' listed twice", id)));
            }
        }
        if seen.len() != registry.len() {
            let mut missing: Vec<&str> = registry
                .ids()
                .filter(|id| !seen.contains(id))
                .map(MountId::as_str)
                .collect();
            missing.sort_unstable();
            return Err(VfsError::InvalidReorder(format!(
                "missing mounts: {}",
                missing.join(", ")
            )));
        }

        let ranks = self.ranks(order);
        for (id, rank) in &ranks {
            registry.set_priority(id, *rank)?;
        }
        Ok(ranks)
    }
}

impl Default for PriorityReorderProtocol {
    fn default() -> Self {
        Self::new(PriorityClass::UserOverride.rank(), DEFAULT_REORDER_SPACING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::registry::tests::mount;

    fn ids(names: &[&str]) -> Vec<MountId> {
        names.iter().map(|n| MountId::from(*n)).collect()
    }

    fn registry(names: &[&str]) -> MountRegistry {
        let mut registry = MountRegistry::new();
        for name in names {
            registry.insert(mount(name, 0, &[])).unwrap();
        }
        registry
    }

    #[test]
    fn test_default_floor_is_user_override() {
        let protocol = PriorityReorderProtocol::default();
        assert_eq!(protocol.rank_for(0), 200);
        assert_eq!(protocol.rank_for(3), 230);
    }

    #[test]
    fn test_ranks_from_zero_floor() {
        let protocol = PriorityReorderProtocol::new(0, 10);
        let ranks = protocol.ranks(&ids(&["B", "A"]));
        assert_eq!(ranks, vec![(MountId::from("B"), 0), (MountId::from("A"), 10)]);
    }

    #[test]
    fn test_apply_sets_ranks() {
        let mut registry = registry(&["A", "B"]);
        PriorityReorderProtocol::new(0, 10)
            .apply(&mut registry, &ids(&["B", "A"]))
            .unwrap();

        assert_eq!(registry.get(&MountId::from("B")).unwrap().priority_rank(), 0);
        assert_eq!(registry.get(&MountId::from("A")).unwrap().priority_rank(), 10);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut registry = registry(&["A", "B", "C"]);
        let protocol = PriorityReorderProtocol::default();
        let order = ids(&["C", "A", "B"]);

        let first = protocol.apply(&mut registry, &order).unwrap();
        let second = protocol.apply(&mut registry, &order).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_apply_rejects_partial_order_without_changes() {
        let mut registry = registry(&["A", "B"]);
        let err = PriorityReorderProtocol::new(0, 10)
            .apply(&mut registry, &ids(&["B"]))
            .unwrap_err();

        assert!(matches!(err, VfsError::InvalidReorder(ref m) if m.contains('A')));
        assert_eq!(registry.get(&MountId::from("B")).unwrap().priority_rank(), 0);
    }

    #[test]
    fn test_apply_rejects_duplicates_and_unknown() {
        let mut registry = registry(&["A", "B"]);
        let protocol = PriorityReorderProtocol::default();

        assert!(matches!(
            protocol.apply(&mut registry, &ids(&["A", "A"])),
            Err(VfsError::InvalidReorder(_))
        ));
        assert!(matches!(
            protocol.apply(&mut registry, &ids(&["A", "Z"])),
            Err(VfsError::UnknownMount(_))
        ));
    }

    #[test]
    fn test_spacing_clamped() {
        assert_eq!(PriorityReorderProtocol::new(5, 0).spacing(), 1);
    }
}
